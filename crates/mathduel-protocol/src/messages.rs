//! Request/ack/event frames — the conversation layer of the protocol.
//!
//! Clients speak in [`Request`]s (a sequence number plus a tagged action);
//! the server answers each request with exactly one `ack` frame carrying the
//! same sequence number, and pushes [`ServerFrame`] events to every member
//! of a room when authoritative state changes.

use serde::{Deserialize, Serialize};

use crate::types::{
    CardId, Difficulty, GameStateView, PlayerId, PlayerNumber, PlayerStatus, PresenceEntry,
    RoomId,
};

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// Top-level client frame: a client-chosen sequence number and an action.
///
/// The sequence number is opaque to the server — it is echoed back in the
/// ack so the client can pair replies with pending requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub seq: u64,
    pub action: ClientAction,
}

/// Every action a client can take, tagged with `type`.
///
/// The `startGame`/`setRoomOptions` hand-size field accepts the synonyms
/// older clients used (`handSize`, `cardsPerPlayer`) alongside the canonical
/// `initialHandSize`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientAction {
    CreateRoom,
    JoinRoom {
        room_id: RoomId,
    },
    StartGame {
        room_id: RoomId,
        #[serde(default)]
        difficulty: Option<Difficulty>,
        #[serde(default, alias = "handSize", alias = "cardsPerPlayer")]
        initial_hand_size: Option<u8>,
    },
    SelectCard {
        room_id: RoomId,
        player_number: PlayerNumber,
        card_id: CardId,
    },
    SubmitAnswer {
        room_id: RoomId,
        player_number: PlayerNumber,
        answer: i64,
    },
    NextRound {
        room_id: RoomId,
    },
    ResetGame {
        room_id: RoomId,
    },
    RequestRematch {
        room_id: RoomId,
        player_number: PlayerNumber,
    },
    SetPresence {
        room_id: RoomId,
        status: PlayerStatus,
    },
    SetRoomOptions {
        room_id: RoomId,
        #[serde(default)]
        difficulty: Option<Difficulty>,
        #[serde(default, alias = "handSize", alias = "cardsPerPlayer")]
        initial_hand_size: Option<u8>,
    },
    LeaveRoom {
        room_id: RoomId,
    },
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Every frame the server sends, tagged with `type`.
///
/// `ack` answers exactly one request (matched by `seq`); all other variants
/// are room broadcasts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerFrame {
    Ack {
        seq: u64,
        #[serde(flatten)]
        body: AckBody,
    },
    OtherPlayerConnected {
        room_id: RoomId,
    },
    OtherPlayerDisconnected {
        room_id: RoomId,
        player_number: PlayerNumber,
    },
    PresenceUpdate {
        room_id: RoomId,
        players: Vec<PresenceEntry>,
    },
    StateUpdate {
        room_id: RoomId,
        state: GameStateView,
        /// Milliseconds until the scheduled automatic round advance.
        /// Present only on the broadcast that resolves a round.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        advance_after_ms: Option<u64>,
        /// Absolute deadline (Unix epoch ms) for the automatic advance.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        advance_deadline_ms: Option<u64>,
    },
    RematchRequested {
        room_id: RoomId,
        player_number: PlayerNumber,
    },
}

/// Body of an `ack` frame. Untagged: the field set itself identifies the
/// shape, matching the per-action ack table. Variants are ordered most
/// specific first so deserialization picks the right one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum AckBody {
    /// Ack for `createRoom` and `joinRoom`.
    RoomJoined {
        room_id: RoomId,
        room_name: String,
        player_id: PlayerId,
        player_number: PlayerNumber,
        other_player_connected: bool,
    },
    /// Ack for `leaveRoom`.
    RoomLeft {
        ok: bool,
        room_id: RoomId,
        deleted: bool,
        remaining: usize,
    },
    /// Ack for `requestRematch` while the other player has not asked yet.
    RematchWaiting { ok: bool, waiting: bool },
    /// Ack for `requestRematch` once both seats have asked.
    RematchConfirmed { ok: bool, both_confirmed: bool },
    /// Any rejected action. The message is human-readable and shown to the
    /// initiating player only.
    Error { error: String },
    /// Plain success for actions with nothing else to report.
    Ok { ok: bool },
}

impl AckBody {
    /// Plain `{ok: true}` success.
    pub fn ok() -> Self {
        Self::Ok { ok: true }
    }

    /// Error ack from anything displayable.
    pub fn error(err: impl std::fmt::Display) -> Self {
        Self::Error {
            error: err.to_string(),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
