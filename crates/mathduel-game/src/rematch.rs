//! Rematch consensus bookkeeping.
//!
//! A finished game resets only once BOTH seats have asked for a rematch
//! within the same request-set epoch. The set clears on every reset —
//! explicit or rematch-triggered — so a request from a previous game can
//! never count toward the next one.

use std::collections::{HashMap, HashSet};

use mathduel_protocol::{PlayerNumber, RoomId};

/// What a rematch request led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RematchOutcome {
    /// This seat's request is recorded; the other seat has not asked yet.
    Waiting,
    /// Both seats have asked — the caller should reset the game now and
    /// the set has already been cleared.
    BothConfirmed,
}

/// Per-room pending rematch requests.
#[derive(Default)]
pub struct RematchBook {
    pending: HashMap<RoomId, HashSet<PlayerNumber>>,
}

impl RematchBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a seat's rematch request. Duplicate requests from the same
    /// seat are idempotent.
    pub fn request(&mut self, room_id: &RoomId, n: PlayerNumber) -> RematchOutcome {
        let set = self.pending.entry(room_id.clone()).or_default();
        set.insert(n);
        if set.contains(&PlayerNumber::One) && set.contains(&PlayerNumber::Two) {
            self.pending.remove(room_id);
            tracing::info!(%room_id, "rematch confirmed by both players");
            RematchOutcome::BothConfirmed
        } else {
            tracing::debug!(%room_id, player = %n, "rematch requested, waiting for other player");
            RematchOutcome::Waiting
        }
    }

    /// Clears a room's pending set: called on any game reset and when the
    /// room is destroyed.
    pub fn clear(&mut self, room_id: &RoomId) {
        self.pending.remove(room_id);
    }

    /// Seats with an outstanding request for a room.
    pub fn pending(&self, room_id: &RoomId) -> usize {
        self.pending.get(room_id).map_or(0, HashSet::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room(id: &str) -> RoomId {
        RoomId(id.into())
    }

    #[test]
    fn test_single_request_waits() {
        let mut book = RematchBook::new();
        let outcome = book.request(&room("R"), PlayerNumber::One);
        assert_eq!(outcome, RematchOutcome::Waiting);
        assert_eq!(book.pending(&room("R")), 1);
    }

    #[test]
    fn test_same_seat_twice_never_confirms() {
        let mut book = RematchBook::new();
        book.request(&room("R"), PlayerNumber::One);
        let outcome = book.request(&room("R"), PlayerNumber::One);
        assert_eq!(outcome, RematchOutcome::Waiting, "one seat is not consensus");
        assert_eq!(book.pending(&room("R")), 1);
    }

    #[test]
    fn test_both_seats_confirm_and_clear_epoch() {
        let mut book = RematchBook::new();
        book.request(&room("R"), PlayerNumber::Two);
        let outcome = book.request(&room("R"), PlayerNumber::One);
        assert_eq!(outcome, RematchOutcome::BothConfirmed);
        assert_eq!(book.pending(&room("R")), 0, "set cleared for the next epoch");
    }

    #[test]
    fn test_clear_resets_epoch_midway() {
        // An explicit game reset discards a half-collected set; the next
        // request starts a new epoch and must wait again.
        let mut book = RematchBook::new();
        book.request(&room("R"), PlayerNumber::One);
        book.clear(&room("R"));

        let outcome = book.request(&room("R"), PlayerNumber::Two);

        assert_eq!(outcome, RematchOutcome::Waiting);
    }

    #[test]
    fn test_rooms_are_independent() {
        let mut book = RematchBook::new();
        book.request(&room("A"), PlayerNumber::One);
        book.request(&room("B"), PlayerNumber::Two);
        assert_eq!(book.pending(&room("A")), 1);
        assert_eq!(book.pending(&room("B")), 1);
    }
}
