//! Authoritative game state and the round phase machine.
//!
//! The phase enum is the single source of truth for "where is this round";
//! the client-facing booleans (`roundInProgress`, `problemSolved`,
//! `gameOver`) are derived from it when a snapshot is built, so they cannot
//! drift apart.

use mathduel_protocol::{Card, CardId, GameStateView, PlayerNumber, Problem, RoundRecord};

/// Where a room's game currently stands.
///
/// ```text
/// Dealt → AwaitingSecondSelection → ProblemActive → Resolved
///       → PendingAdvance → Dealt | GameOver
/// ```
///
/// - **Dealt**: hands are out, no selections yet.
/// - **AwaitingSecondSelection**: exactly one player has selected.
/// - **ProblemActive**: both selected, problem generated, answers open.
/// - **Resolved**: solved (or both wrong); the round is closed but no
///   automatic advance is armed yet.
/// - **PendingAdvance**: an automatic advance timer is armed. New
///   selections are rejected in this phase — this replaces the ad hoc
///   room-level `transitioning` flag with a phase the type system can see.
/// - **GameOver**: a hand emptied on advance. Terminal until a rematch or
///   reset replaces the state wholesale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    Dealt,
    AwaitingSecondSelection,
    ProblemActive,
    Resolved,
    PendingAdvance,
    GameOver,
}

/// One value per seat. Keeps "player 1 vs player 2" bookkeeping out of
/// index arithmetic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PerPlayer<T> {
    pub one: T,
    pub two: T,
}

impl<T> PerPlayer<T> {
    pub fn get(&self, n: PlayerNumber) -> &T {
        match n {
            PlayerNumber::One => &self.one,
            PlayerNumber::Two => &self.two,
        }
    }

    pub fn get_mut(&mut self, n: PlayerNumber) -> &mut T {
        match n {
            PlayerNumber::One => &mut self.one,
            PlayerNumber::Two => &mut self.two,
        }
    }
}

/// The server-owned snapshot of one room's game.
///
/// Created by [`GameState::deal`](crate::GameState::deal), mutated only
/// through the operations in `engine.rs`, replaced wholesale on
/// reset/rematch, and destroyed with the owning room.
#[derive(Debug, Clone)]
pub struct GameState {
    pub hands: PerPlayer<Vec<Card>>,
    pub selected: PerPlayer<Option<CardId>>,
    pub problem: Option<Problem>,
    pub correct_answer: Option<i64>,
    /// Exactly 4 distinct values (including the correct one) while a
    /// problem is active; empty otherwise.
    pub answer_options: Vec<i64>,
    pub answered: PerPlayer<bool>,
    pub submitted: PerPlayer<Option<i64>>,
    pub scores: PerPlayer<u32>,
    pub phase: RoundPhase,
    /// Who solved the current round; `None` during the round and also the
    /// final value when both players answered wrong.
    pub solved_by: Option<PlayerNumber>,
    /// Set once on transition to `GameOver`; `None` means tie.
    pub winner: Option<PlayerNumber>,
    /// Whether clients may show the problem, or must keep it masked.
    pub reveal: bool,
    /// Client animation hints. A fresh deal leaves both false so clients
    /// animate dealing; a server-side advance sets both true.
    pub deal_complete: bool,
    pub advance_clients: bool,
    /// Append-only log of resolved rounds.
    pub history: Vec<RoundRecord>,
}

impl GameState {
    pub fn round_in_progress(&self) -> bool {
        matches!(self.phase, RoundPhase::ProblemActive)
    }

    pub fn problem_solved(&self) -> bool {
        matches!(self.phase, RoundPhase::Resolved | RoundPhase::PendingAdvance)
    }

    pub fn game_over(&self) -> bool {
        matches!(self.phase, RoundPhase::GameOver)
    }

    /// The card a player currently has selected, looked up in their hand.
    pub fn selected_card(&self, n: PlayerNumber) -> Option<Card> {
        let id = (*self.selected.get(n))?;
        self.hands.get(n).iter().find(|c| c.id == id).copied()
    }

    /// Builds the client-facing snapshot. Booleans are derived from the
    /// phase here, nowhere else.
    pub fn view(&self) -> GameStateView {
        GameStateView {
            player1_hand: self.hands.one.clone(),
            player2_hand: self.hands.two.clone(),
            player1_selected: self.selected.one,
            player2_selected: self.selected.two,
            problem: self.problem,
            correct_answer: self.correct_answer,
            answer_options: self.answer_options.clone(),
            player1_answered: self.answered.one,
            player2_answered: self.answered.two,
            player1_answer: self.submitted.one,
            player2_answer: self.submitted.two,
            player1_score: self.scores.one,
            player2_score: self.scores.two,
            round_in_progress: self.round_in_progress(),
            problem_solved: self.problem_solved(),
            solved_by: self.solved_by,
            game_over: self.game_over(),
            winner: self.winner.map(|n| n.label().to_string()),
            reveal: self.reveal,
            deal_complete: self.deal_complete,
            advance_clients: self.advance_clients,
            history: self.history.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_player_get_routes_by_seat() {
        let mut pair = PerPlayer { one: 1u32, two: 2u32 };
        assert_eq!(*pair.get(PlayerNumber::One), 1);
        assert_eq!(*pair.get(PlayerNumber::Two), 2);
        *pair.get_mut(PlayerNumber::Two) = 9;
        assert_eq!(pair.two, 9);
    }

    #[test]
    fn test_view_booleans_follow_phase() {
        let mut state = crate::GameState::deal(
            mathduel_protocol::GameOptions::default(),
            &mut rand::rng(),
        );

        state.phase = RoundPhase::ProblemActive;
        let view = state.view();
        assert!(view.round_in_progress);
        assert!(!view.problem_solved);
        assert!(!view.game_over);

        state.phase = RoundPhase::PendingAdvance;
        let view = state.view();
        assert!(!view.round_in_progress);
        assert!(view.problem_solved);

        state.phase = RoundPhase::GameOver;
        state.winner = Some(PlayerNumber::Two);
        let view = state.view();
        assert!(view.game_over);
        assert_eq!(view.winner.as_deref(), Some("player2"));
    }
}
