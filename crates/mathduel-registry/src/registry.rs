//! The room registry: tracks all rooms and which connection sits where.
//!
//! # Concurrency note
//!
//! `RoomRegistry` is NOT thread-safe by itself — plain `HashMap`s, no
//! locks. It is owned by the server's shared state and accessed through a
//! mutex at a higher level; every membership mutation in the process goes
//! through the methods here, which keeps the two maps in sync.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use mathduel_protocol::{
    ConnId, PlayerId, PlayerNumber, PlayerStatus, RoomId, RoomSummary,
};
use rand::Rng;

use crate::{Player, RegistryError, Room, names};

/// Alphabet for join codes: uppercase alphanumerics without the characters
/// players routinely misread over voice (0/O, 1/I).
const CODE_ALPHABET: &[u8] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZ";
const CODE_LEN: usize = 6;

/// Outcome of removing a connection from its room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveOutcome {
    pub room_id: RoomId,
    /// Seat the departing connection held.
    pub player_number: PlayerNumber,
    /// Whether the room was deleted because it became empty.
    pub deleted: bool,
    /// Members still present after the removal.
    pub remaining: usize,
    /// Connections of the remaining members, for notifications.
    pub remaining_conns: Vec<ConnId>,
}

/// Data echoed back to a player who just entered a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Joined {
    pub room_id: RoomId,
    pub room_name: String,
    pub player_id: PlayerId,
    pub player_number: PlayerNumber,
    /// True when a second player is present after this join.
    pub other_player_connected: bool,
}

/// Tracks every active room and an index from connection to room.
///
/// Invariant: a connection is a member of at most one room, and `by_conn`
/// mirrors the membership lists exactly.
pub struct RoomRegistry {
    rooms: HashMap<RoomId, Room>,
    by_conn: HashMap<ConnId, RoomId>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: HashMap::new(),
            by_conn: HashMap::new(),
        }
    }

    /// Creates a room and seats the creator as player 1. Never fails.
    ///
    /// If the connection is somehow still indexed in another room the stale
    /// membership is dropped first — that would be a bookkeeping bug
    /// upstream, and it must not corrupt the one-room-per-connection
    /// invariant here.
    pub fn create_room(&mut self, conn: ConnId) -> Joined {
        if self.by_conn.contains_key(&conn) {
            tracing::warn!(%conn, "connection creating a room while still in one; detaching");
            self.leave_room(conn);
        }

        let mut rng = rand::rng();
        let room_id = self.fresh_room_id(&mut rng);
        let mut room = Room::new(room_id.clone(), names::room_name(&mut rng));

        let player = Player {
            id: fresh_player_id(&mut rng),
            number: PlayerNumber::One,
            conn,
            status: PlayerStatus::Lobby,
        };
        let joined = Joined {
            room_id: room_id.clone(),
            room_name: room.name.clone(),
            player_id: player.id.clone(),
            player_number: PlayerNumber::One,
            other_player_connected: false,
        };
        room.players.push(player);

        self.rooms.insert(room_id.clone(), room);
        self.by_conn.insert(conn, room_id.clone());
        tracing::info!(room_id = %joined.room_id, %conn, "room created");
        joined
    }

    /// Seats a connection as player 2 in an existing room.
    ///
    /// Seat 2 is never reassigned: a room whose second seat was vacated
    /// reports itself full rather than reissue the number.
    pub fn join_room(&mut self, room_id: &RoomId, conn: ConnId) -> Result<Joined, RegistryError> {
        if self.by_conn.contains_key(&conn) {
            tracing::warn!(%conn, "connection joining a room while still in one; detaching");
            self.leave_room(conn);
        }

        let room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| RegistryError::RoomNotFound(room_id.clone()))?;
        if room.is_full() || room.seat_taken(PlayerNumber::Two) {
            return Err(RegistryError::RoomFull(room_id.clone()));
        }

        let mut rng = rand::rng();
        let player = Player {
            id: fresh_player_id(&mut rng),
            number: PlayerNumber::Two,
            conn,
            status: PlayerStatus::Lobby,
        };
        let joined = Joined {
            room_id: room_id.clone(),
            room_name: room.name.clone(),
            player_id: player.id.clone(),
            player_number: PlayerNumber::Two,
            other_player_connected: true,
        };
        room.players.push(player);
        room.last_activity = Instant::now();

        self.by_conn.insert(conn, room_id.clone());
        tracing::info!(%room_id, %conn, players = 2, "player joined");
        Ok(joined)
    }

    /// Removes a connection from whatever room contains it.
    ///
    /// The member is marked `Left` (so a presence snapshot taken during
    /// this call reports it) and then dropped from membership. A room that
    /// reaches zero members is deleted immediately — `empty_since` is
    /// stamped first so the deferred-deletion contract of
    /// [`sweep_idle_rooms`](Self::sweep_idle_rooms) stays observable.
    ///
    /// Returns `None` if the connection was not in any room.
    pub fn leave_room(&mut self, conn: ConnId) -> Option<LeaveOutcome> {
        let room_id = self.by_conn.remove(&conn)?;
        let room = self.rooms.get_mut(&room_id)?;

        let idx = room.players.iter().position(|p| p.conn == conn)?;
        room.players[idx].status = PlayerStatus::Left;
        let player_number = room.players[idx].number;
        room.players.remove(idx);
        room.last_activity = Instant::now();

        let remaining = room.player_count();
        let remaining_conns = room.conns();
        let deleted = remaining == 0;
        if deleted {
            room.empty_since = Some(Instant::now());
            self.rooms.remove(&room_id);
            tracing::info!(%room_id, "room emptied and deleted");
        } else {
            tracing::info!(%room_id, %conn, remaining, "player left");
        }

        Some(LeaveOutcome {
            room_id,
            player_number,
            deleted,
            remaining,
            remaining_conns,
        })
    }

    /// Updates a member's presence status. Returns false (and changes
    /// nothing) when the room or member is unknown.
    pub fn set_player_status(
        &mut self,
        room_id: &RoomId,
        conn: ConnId,
        status: PlayerStatus,
    ) -> bool {
        let Some(room) = self.rooms.get_mut(room_id) else {
            return false;
        };
        let Some(player) = room.member_by_conn_mut(conn) else {
            return false;
        };
        player.status = status;
        room.last_activity = Instant::now();
        true
    }

    /// Marks every member of a room with the given status (used when a game
    /// starts or a rematch begins). False if the room is unknown.
    pub fn set_all_statuses(&mut self, room_id: &RoomId, status: PlayerStatus) -> bool {
        let Some(room) = self.rooms.get_mut(room_id) else {
            return false;
        };
        for player in &mut room.players {
            player.status = status;
        }
        true
    }

    /// The room containing a connection, if any.
    pub fn find_by_conn(&self, conn: ConnId) -> Option<&Room> {
        let room_id = self.by_conn.get(&conn)?;
        self.rooms.get(room_id)
    }

    pub fn get(&self, room_id: &RoomId) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    pub fn get_mut(&mut self, room_id: &RoomId) -> Option<&mut Room> {
        self.rooms.get_mut(room_id)
    }

    /// Stamps a room's last-activity time. Unknown rooms are ignored.
    pub fn touch(&mut self, room_id: &RoomId) {
        if let Some(room) = self.rooms.get_mut(room_id) {
            room.last_activity = Instant::now();
        }
    }

    /// Membership/status/options summaries for listing surfaces.
    pub fn list(&self) -> Vec<RoomSummary> {
        self.rooms
            .values()
            .map(|room| RoomSummary {
                room_id: room.id.clone(),
                room_name: room.name.clone(),
                players: room.presence(),
                options: room.options,
            })
            .collect()
    }

    /// Deletes rooms that have sat empty for longer than `ttl` and returns
    /// their ids.
    ///
    /// Under the current leave policy rooms are deleted the moment they
    /// empty, so nothing ever qualifies; this stays as the safety net that
    /// takes over if leaving switches to deferred deletion.
    pub fn sweep_idle_rooms(&mut self, ttl: Duration) -> Vec<RoomId> {
        let now = Instant::now();
        let stale: Vec<RoomId> = self
            .rooms
            .values()
            .filter(|room| {
                room.player_count() == 0
                    && room
                        .empty_since
                        .is_some_and(|since| now.duration_since(since) > ttl)
            })
            .map(|room| room.id.clone())
            .collect();

        for room_id in &stale {
            self.rooms.remove(room_id);
            tracing::info!(%room_id, "idle room swept");
        }
        stale
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Generates a join code not currently in use.
    fn fresh_room_id(&self, rng: &mut impl Rng) -> RoomId {
        loop {
            let code: String = (0..CODE_LEN)
                .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
                .collect();
            let id = RoomId(code);
            if !self.rooms.contains_key(&id) {
                return id;
            }
        }
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Random 16-hex-char player identifier.
fn fresh_player_id(rng: &mut impl Rng) -> PlayerId {
    let bytes: [u8; 8] = rng.random();
    PlayerId(bytes.iter().map(|b| format!("{b:02x}")).collect())
}

// =========================================================================
// Tests
// =========================================================================
