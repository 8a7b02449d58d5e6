//! The game store: one [`GameState`] per room with an active game.
//!
//! The store is the sole mutation point for game state, the same way the
//! registry is for membership. It is not thread-safe by itself — the
//! server shares it behind a mutex.

use std::collections::HashMap;

use mathduel_protocol::{GameOptions, RoomId};
use rand::Rng;

use crate::GameState;

#[derive(Default)]
pub struct GameStore {
    games: HashMap<RoomId, GameState>,
}

impl GameStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts (or restarts) a room's game with a fresh deal. Any previous
    /// state for the room is replaced wholesale — never partially reused.
    pub fn init_game(
        &mut self,
        room_id: &RoomId,
        options: GameOptions,
        rng: &mut impl Rng,
    ) -> &GameState {
        let state = GameState::deal(options, rng);
        tracing::info!(
            %room_id,
            hand_size = options.initial_hand_size,
            "game initialized"
        );
        self.games.insert(room_id.clone(), state);
        self.games.get(room_id).expect("just inserted")
    }

    pub fn get(&self, room_id: &RoomId) -> Option<&GameState> {
        self.games.get(room_id)
    }

    pub fn get_mut(&mut self, room_id: &RoomId) -> Option<&mut GameState> {
        self.games.get_mut(room_id)
    }

    /// Drops a room's game (room deleted or explicit teardown).
    pub fn remove(&mut self, room_id: &RoomId) -> Option<GameState> {
        self.games.remove(room_id)
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }
}
