//! Room and membership records.

use std::time::Instant;

use mathduel_protocol::{
    ConnId, GameOptions, PlayerId, PlayerNumber, PlayerStatus, PresenceEntry, RoomId,
};

/// One seat in a room.
#[derive(Debug, Clone)]
pub struct Player {
    /// Opaque identifier echoed back to the client.
    pub id: PlayerId,
    /// Seat number, fixed for the lifetime of the membership.
    pub number: PlayerNumber,
    /// The connection currently occupying this seat.
    pub conn: ConnId,
    /// Presence status reported to the other player.
    pub status: PlayerStatus,
}

/// A matchmaking/session container for up to two connections.
///
/// Membership order is join order: index 0 is the creator. The room never
/// holds game state itself — the game store keys off the room id, so the
/// two lifecycles can be torn down together without either owning the other.
#[derive(Debug)]
pub struct Room {
    pub id: RoomId,
    /// Cosmetic display name, generated at creation.
    pub name: String,
    pub(crate) players: Vec<Player>,
    pub created_at: Instant,
    pub last_activity: Instant,
    pub options: GameOptions,
    /// Stamped when membership reaches zero. Under the current leave
    /// policy an empty room is deleted in the same call, so this is only
    /// ever observed by the idle sweep if that policy changes.
    pub empty_since: Option<Instant>,
}

impl Room {
    pub(crate) fn new(id: RoomId, name: String) -> Self {
        let now = Instant::now();
        Self {
            id,
            name,
            players: Vec::with_capacity(2),
            created_at: now,
            last_activity: now,
            options: GameOptions::default(),
            empty_since: None,
        }
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= 2
    }

    /// Whether the given seat number is already occupied. Seat numbers are
    /// never reassigned within a room's lifetime, so a vacated seat stays
    /// closed.
    pub fn seat_taken(&self, number: PlayerNumber) -> bool {
        self.players.iter().any(|p| p.number == number)
    }

    pub fn member_by_conn(&self, conn: ConnId) -> Option<&Player> {
        self.players.iter().find(|p| p.conn == conn)
    }

    pub(crate) fn member_by_conn_mut(&mut self, conn: ConnId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.conn == conn)
    }

    pub fn member_by_number(&self, number: PlayerNumber) -> Option<&Player> {
        self.players.iter().find(|p| p.number == number)
    }

    /// All member connections, in join order.
    pub fn conns(&self) -> Vec<ConnId> {
        self.players.iter().map(|p| p.conn).collect()
    }

    /// Presence snapshot for broadcast: each member's seat and status.
    pub fn presence(&self) -> Vec<PresenceEntry> {
        self.players
            .iter()
            .map(|p| PresenceEntry {
                player_number: p.number,
                status: p.status,
            })
            .collect()
    }
}
