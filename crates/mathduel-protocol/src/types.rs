//! Core wire types: identities, cards, game options, and the client-facing
//! game-state snapshot.
//!
//! Everything in this module is serialized to JSON and crosses the network,
//! so field names follow the client convention (`camelCase`) and every type
//! carries `Serialize`/`Deserialize`.

use serde::{Deserialize, Serialize};

use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a connection.
///
/// Assigned by the server from an atomic counter when a socket is accepted.
/// Never reused within a process lifetime. Not serialized to clients — it is
/// the server's private key for "who is on the other end of this socket".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnId(pub u64);

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A room's join code: 6 uppercase alphanumeric characters.
///
/// This is what one player reads out loud to the other, so it is short and
/// unambiguous. Uniqueness is enforced at generation time by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A player's opaque identifier: 16 random hex characters.
///
/// Issued when a player enters a room and echoed back in acks. It carries no
/// identity beyond "this seat in this room" — there is no account system.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Seat number within a room. Assigned by join order and never reused
/// within a room's lifetime: the creator is always `One`.
///
/// Serialized as the plain numbers `1` and `2` — clients index UI by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum PlayerNumber {
    One,
    Two,
}

impl PlayerNumber {
    /// The other seat at the table.
    pub fn other(self) -> Self {
        match self {
            Self::One => Self::Two,
            Self::Two => Self::One,
        }
    }

    /// Client-facing label, used for the `winner` field ("player1"/"player2").
    pub fn label(self) -> &'static str {
        match self {
            Self::One => "player1",
            Self::Two => "player2",
        }
    }
}

impl From<PlayerNumber> for u8 {
    fn from(n: PlayerNumber) -> u8 {
        match n {
            PlayerNumber::One => 1,
            PlayerNumber::Two => 2,
        }
    }
}

impl TryFrom<u8> for PlayerNumber {
    type Error = String;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        match n {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            other => Err(format!("player number must be 1 or 2, got {other}")),
        }
    }
}

impl fmt::Display for PlayerNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

/// A member's presence status within a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlayerStatus {
    /// In the room, game not started (or finished).
    Lobby,
    /// Actively playing.
    InGame,
    /// Has left the room. Transient — the membership record is removed
    /// right after this status is reported.
    Left,
}

// ---------------------------------------------------------------------------
// Game options
// ---------------------------------------------------------------------------

/// Requested difficulty. The server stores and echoes it; clients use it to
/// tune their own timers and presentation. It does not change problem
/// generation on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
}

/// Per-room game configuration, set at creation and adjustable in the lobby.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameOptions {
    pub difficulty: Difficulty,
    /// Cards dealt to each player at game start. Clamped to `1..=22` so two
    /// hands always fit in one 44-card deck.
    pub initial_hand_size: u8,
}

impl GameOptions {
    /// Largest hand size that still lets both players draw from one deck.
    pub const MAX_HAND_SIZE: u8 = 22;

    /// Applies partial overrides (from `startGame` / `setRoomOptions`
    /// payloads), clamping the hand size into the valid range.
    pub fn apply(&mut self, difficulty: Option<Difficulty>, hand_size: Option<u8>) {
        if let Some(d) = difficulty {
            self.difficulty = d;
        }
        if let Some(n) = hand_size {
            self.initial_hand_size = n.clamp(1, Self::MAX_HAND_SIZE);
        }
    }
}

impl Default for GameOptions {
    fn default() -> Self {
        Self {
            difficulty: Difficulty::Normal,
            initial_hand_size: 7,
        }
    }
}

// ---------------------------------------------------------------------------
// Cards
// ---------------------------------------------------------------------------

/// Identifier of a card, unique within one game instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(pub u32);

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "card-{}", self.0)
    }
}

/// Card suit. Cosmetic only — arithmetic uses the value alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Suit {
    Clubs,
    Diamonds,
    Hearts,
    Spades,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Clubs, Suit::Diamonds, Suit::Hearts, Suit::Spades];
}

/// A single playing card. Values run 2–12 so any product fits a times table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: CardId,
    pub value: u8,
    pub suit: Suit,
}

// ---------------------------------------------------------------------------
// Game-state snapshot (server → client)
// ---------------------------------------------------------------------------

/// The current arithmetic problem: multiply the two operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    pub a: u8,
    pub b: u8,
}

/// One resolved round, appended to the game history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundRecord {
    pub a: u8,
    pub b: u8,
    pub answer: i64,
    /// `None` means both players answered wrong.
    pub solved_by: Option<PlayerNumber>,
    /// Unix epoch milliseconds at resolution time.
    pub timestamp_ms: u64,
}

/// Full client-facing snapshot of a room's game.
///
/// The server is authoritative: everything a client renders comes from this
/// snapshot, including the correct answer (clients reveal it after the round
/// resolves). The `roundInProgress`/`problemSolved`/`gameOver` booleans are
/// derived by the server from its internal round phase when the snapshot is
/// built — they are mutually consistent by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateView {
    pub player1_hand: Vec<Card>,
    pub player2_hand: Vec<Card>,
    pub player1_selected: Option<CardId>,
    pub player2_selected: Option<CardId>,
    pub problem: Option<Problem>,
    pub correct_answer: Option<i64>,
    pub answer_options: Vec<i64>,
    pub player1_answered: bool,
    pub player2_answered: bool,
    pub player1_answer: Option<i64>,
    pub player2_answer: Option<i64>,
    pub player1_score: u32,
    pub player2_score: u32,
    pub round_in_progress: bool,
    pub problem_solved: bool,
    pub solved_by: Option<PlayerNumber>,
    pub game_over: bool,
    /// `"player1"` or `"player2"`; `None` while running or on a tie.
    pub winner: Option<String>,
    /// Whether clients should show the problem and options or keep them
    /// masked (cleared while only one side has selected).
    pub reveal: bool,
    /// Safe-to-stop-animating hint: true once the server has already
    /// advanced, false after a fresh deal that clients should animate.
    pub deal_complete: bool,
    /// Companion hint telling clients to advance their local view.
    pub advance_clients: bool,
    pub history: Vec<RoundRecord>,
}

// ---------------------------------------------------------------------------
// Presence / room summaries
// ---------------------------------------------------------------------------

/// One member's entry in a presence snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceEntry {
    pub player_number: PlayerNumber,
    pub status: PlayerStatus,
}

/// Room summary for listing surfaces (debug/admin reads).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub room_id: RoomId,
    pub room_name: String,
    pub players: Vec<PresenceEntry>,
    pub options: GameOptions,
}

// =========================================================================
// Tests
// =========================================================================
