//! Round operations: dealing, selection, problem generation, answer
//! resolution, and round advancement.
//!
//! Every mutation of a [`GameState`] in the process happens through the
//! methods here, each of which runs to completion synchronously — the
//! caller holds the state lock for the duration, so a partially-applied
//! round can never be observed.

use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

use mathduel_protocol::{CardId, GameOptions, PlayerNumber, Problem, RoundRecord};
use rand::Rng;
use rand::seq::SliceRandom;

use crate::card::shuffled_deck;
use crate::state::{GameState, PerPlayer, RoundPhase};

/// Wrong answer options are the correct answer shifted by this much in
/// either direction, clamped to stay positive.
const OPTION_OFFSET_MAX: i64 = 20;

/// Result of an answer submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// No round in progress, or the round is already solved — nothing
    /// changed (double-scoring guard).
    Ignored,
    /// The answer was recorded but the round stays open (wrong answer,
    /// other player still thinking).
    Recorded,
    /// The round resolved: `Some(n)` scored, `None` means both wrong.
    Resolved(Option<PlayerNumber>),
}

/// Result of a round advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// No solved round to advance past — nothing changed.
    Ignored,
    Advanced {
        game_over: bool,
    },
}

impl GameState {
    /// Deals a fresh game: shuffled 44-card deck, `initial_hand_size`
    /// cards to each player, every round field at its baseline.
    ///
    /// The animation hints start false so clients run the dealing
    /// animation; a round advance flips them.
    pub fn deal(options: GameOptions, rng: &mut impl Rng) -> Self {
        let mut deck = shuffled_deck(rng);
        let hand_size = usize::from(options.initial_hand_size.clamp(1, GameOptions::MAX_HAND_SIZE));
        let one: Vec<_> = deck.drain(..hand_size).collect();
        let two: Vec<_> = deck.drain(..hand_size).collect();

        Self {
            hands: PerPlayer { one, two },
            selected: PerPlayer::default(),
            problem: None,
            correct_answer: None,
            answer_options: Vec::new(),
            answered: PerPlayer::default(),
            submitted: PerPlayer::default(),
            scores: PerPlayer::default(),
            phase: RoundPhase::Dealt,
            solved_by: None,
            winner: None,
            reveal: false,
            deal_complete: false,
            advance_clients: false,
            history: Vec::new(),
        }
    }

    /// Records a card selection for one player.
    ///
    /// While an automatic advance is pending the call is a no-op, so a new
    /// round cannot start while the previous one is still closing. A card
    /// id that is not literally in the player's hand clears that player's
    /// selection instead of trusting the client.
    ///
    /// Once both players hold a selection the problem is generated; with
    /// only one selection the reveal flag is explicitly cleared so no
    /// stale problem from a previous round leaks through. Re-selecting
    /// while a problem is active is allowed and regenerates the problem.
    pub fn select_card(&mut self, n: PlayerNumber, card_id: CardId, rng: &mut impl Rng) {
        if matches!(self.phase, RoundPhase::PendingAdvance | RoundPhase::GameOver) {
            tracing::debug!(player = %n, "selection ignored while round is closing");
            return;
        }

        let in_hand = self.hands.get(n).iter().any(|c| c.id == card_id);
        *self.selected.get_mut(n) = in_hand.then_some(card_id);
        if !in_hand {
            tracing::debug!(player = %n, %card_id, "selected card not in hand; selection cleared");
        }

        match (
            self.selected_card(PlayerNumber::One),
            self.selected_card(PlayerNumber::Two),
        ) {
            (Some(a), Some(b)) => self.open_round(a.value, b.value, rng),
            (first, second) => {
                // Mask the problem until both sides have committed.
                self.reveal = false;
                self.phase = if first.is_some() || second.is_some() {
                    RoundPhase::AwaitingSecondSelection
                } else {
                    RoundPhase::Dealt
                };
            }
        }
    }

    /// Generates the problem from the two selected values and opens the
    /// round for answers.
    fn open_round(&mut self, a: u8, b: u8, rng: &mut impl Rng) {
        let correct = i64::from(a) * i64::from(b);
        self.problem = Some(Problem { a, b });
        self.correct_answer = Some(correct);
        self.answer_options = answer_options(correct, rng);
        self.answered = PerPlayer::default();
        self.submitted = PerPlayer::default();
        self.solved_by = None;
        self.reveal = true;
        self.phase = RoundPhase::ProblemActive;
        tracing::debug!(a, b, correct, "round opened");
    }

    /// Records an answer and resolves the round when warranted.
    ///
    /// A no-op when no round is open or it already resolved — a late or
    /// duplicate answer can never score twice. The raw submitted value is
    /// kept regardless of correctness so clients can show what each
    /// player tried.
    pub fn submit_answer(&mut self, n: PlayerNumber, answer: i64) -> SubmitOutcome {
        if !matches!(self.phase, RoundPhase::ProblemActive) {
            return SubmitOutcome::Ignored;
        }
        let Some(correct) = self.correct_answer else {
            // ProblemActive implies a generated problem; treat violations
            // as ignorable rather than poisoning the room.
            tracing::warn!("round active without a correct answer; ignoring submission");
            return SubmitOutcome::Ignored;
        };

        *self.submitted.get_mut(n) = Some(answer);
        *self.answered.get_mut(n) = true;

        if answer == correct {
            *self.scores.get_mut(n) += 1;
            self.resolve_round(Some(n));
            SubmitOutcome::Resolved(Some(n))
        } else if *self.answered.get(n.other()) {
            // The other player has already answered — and since a correct
            // answer resolves immediately, theirs was wrong too.
            self.resolve_round(None);
            SubmitOutcome::Resolved(None)
        } else {
            SubmitOutcome::Recorded
        }
    }

    fn resolve_round(&mut self, solver: Option<PlayerNumber>) {
        self.solved_by = solver;
        self.phase = RoundPhase::Resolved;
        if let Some(Problem { a, b }) = self.problem {
            self.history.push(RoundRecord {
                a,
                b,
                answer: self.correct_answer.unwrap_or_default(),
                solved_by: solver,
                timestamp_ms: epoch_ms(),
            });
        }
        tracing::debug!(solver = ?solver, "round resolved");
    }

    /// Marks the pending automatic advance: selections are rejected until
    /// the advance runs or is cancelled. No-op unless the round resolved.
    pub fn mark_pending_advance(&mut self) {
        if matches!(self.phase, RoundPhase::Resolved) {
            self.phase = RoundPhase::PendingAdvance;
        }
    }

    /// Reverts a cancelled pending advance so the room is not left locked.
    pub fn clear_pending_advance(&mut self) {
        if matches!(self.phase, RoundPhase::PendingAdvance) {
            self.phase = RoundPhase::Resolved;
        }
    }

    /// Closes a resolved round: discards the played cards, checks for game
    /// over, and resets every per-round field to the pre-selection
    /// baseline.
    ///
    /// Only a resolved round can advance; calling this in any other phase
    /// changes nothing, which is what makes a raced manual/automatic
    /// advance apply exactly once.
    pub fn advance_round(&mut self) -> AdvanceOutcome {
        if !matches!(self.phase, RoundPhase::Resolved | RoundPhase::PendingAdvance) {
            return AdvanceOutcome::Ignored;
        }

        for n in [PlayerNumber::One, PlayerNumber::Two] {
            if let Some(id) = *self.selected.get(n) {
                self.hands.get_mut(n).retain(|c| c.id != id);
            }
        }

        self.selected = PerPlayer::default();
        self.answered = PerPlayer::default();
        self.submitted = PerPlayer::default();
        self.problem = None;
        self.correct_answer = None;
        self.answer_options.clear();
        self.solved_by = None;
        self.reveal = false;
        // The server has already advanced — clients skip the deal
        // animation and move on.
        self.deal_complete = true;
        self.advance_clients = true;

        let game_over = self.hands.one.is_empty() || self.hands.two.is_empty();
        if game_over {
            self.phase = RoundPhase::GameOver;
            self.winner = match self.scores.one.cmp(&self.scores.two) {
                std::cmp::Ordering::Greater => Some(PlayerNumber::One),
                std::cmp::Ordering::Less => Some(PlayerNumber::Two),
                std::cmp::Ordering::Equal => None,
            };
            tracing::info!(winner = ?self.winner, "game over");
        } else {
            self.phase = RoundPhase::Dealt;
        }

        AdvanceOutcome::Advanced { game_over }
    }
}

/// 4 distinct answer options including `correct`, in random order.
///
/// Wrong options are produced by repeatedly offsetting the correct answer
/// by ±[1, 20], clamped to a minimum of 1, and deduplicated until the set
/// has 4 members.
fn answer_options(correct: i64, rng: &mut impl Rng) -> Vec<i64> {
    let mut seen: HashSet<i64> = HashSet::from([correct]);
    let mut options = vec![correct];
    while options.len() < 4 {
        let offset = rng.random_range(1..=OPTION_OFFSET_MAX);
        let candidate = if rng.random_bool(0.5) {
            correct + offset
        } else {
            correct - offset
        };
        let candidate = candidate.max(1);
        if seen.insert(candidate) {
            options.push(candidate);
        }
    }
    options.shuffle(rng);
    options
}

/// Unix epoch milliseconds, for history timestamps.
pub(crate) fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use mathduel_protocol::Difficulty;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    fn options(hand_size: u8) -> GameOptions {
        GameOptions {
            difficulty: Difficulty::Normal,
            initial_hand_size: hand_size,
        }
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    /// Selects each player's first card and returns their values.
    fn select_first_cards(state: &mut GameState, rng: &mut StdRng) -> (u8, u8) {
        let c1 = state.hands.one[0];
        let c2 = state.hands.two[0];
        state.select_card(PlayerNumber::One, c1.id, rng);
        state.select_card(PlayerNumber::Two, c2.id, rng);
        (c1.value, c2.value)
    }

    // =====================================================================
    // deal()
    // =====================================================================

    #[test]
    fn test_deal_hands_have_requested_size_and_disjoint_cards() {
        let mut rng = rng();
        let state = GameState::deal(options(7), &mut rng);

        assert_eq!(state.hands.one.len(), 7);
        assert_eq!(state.hands.two.len(), 7);

        let ids: HashSet<_> = state
            .hands
            .one
            .iter()
            .chain(state.hands.two.iter())
            .map(|c| c.id)
            .collect();
        assert_eq!(ids.len(), 14, "no card id repeats across hands");

        for card in state.hands.one.iter().chain(state.hands.two.iter()) {
            assert!((2..=12).contains(&card.value));
        }
    }

    #[test]
    fn test_deal_baseline_round_fields() {
        let state = GameState::deal(options(3), &mut rng());
        assert_eq!(state.phase, RoundPhase::Dealt);
        assert!(state.problem.is_none());
        assert!(state.answer_options.is_empty());
        assert!(!state.reveal);
        assert!(!state.deal_complete, "fresh deal animates");
        assert!(!state.advance_clients);
        assert!(state.history.is_empty());
        assert_eq!(state.scores, PerPlayer { one: 0, two: 0 });
    }

    #[test]
    fn test_deal_repeated_calls_produce_fresh_shuffles() {
        // Idempotent in effect, not value-identical: two deals from
        // different rng states almost surely differ.
        let mut rng = rng();
        let a = GameState::deal(options(22), &mut rng);
        let b = GameState::deal(options(22), &mut rng);
        let a_ids: Vec<_> = a.hands.one.iter().map(|c| c.id).collect();
        let b_ids: Vec<_> = b.hands.one.iter().map(|c| c.id).collect();
        assert_ne!(a_ids, b_ids);
    }

    // =====================================================================
    // select_card() / problem generation
    // =====================================================================

    #[test]
    fn test_select_one_card_awaits_second_and_masks() {
        let mut rng = rng();
        let mut state = GameState::deal(options(3), &mut rng);
        state.reveal = true; // pretend a previous round left it set

        let card = state.hands.one[0];
        state.select_card(PlayerNumber::One, card.id, &mut rng);

        assert_eq!(state.phase, RoundPhase::AwaitingSecondSelection);
        assert_eq!(state.selected.one, Some(card.id));
        assert!(!state.reveal, "single selection masks the problem");
        assert!(state.problem.is_none());
    }

    #[test]
    fn test_select_both_cards_generates_product_problem() {
        let mut rng = rng();
        let mut state = GameState::deal(options(3), &mut rng);

        let (a, b) = select_first_cards(&mut state, &mut rng);

        assert_eq!(state.phase, RoundPhase::ProblemActive);
        assert!(state.round_in_progress());
        assert_eq!(state.problem, Some(Problem { a, b }));
        assert_eq!(state.correct_answer, Some(i64::from(a) * i64::from(b)));
        assert!(state.reveal);
        assert!(!state.answered.one && !state.answered.two);
        assert!(state.submitted.one.is_none() && state.submitted.two.is_none());
    }

    #[test]
    fn test_answer_options_are_four_distinct_and_contain_correct() {
        // Run across many rounds so the dedup/clamp paths all get hit.
        let mut rng = rng();
        for _ in 0..200 {
            let correct = i64::from(rng.random_range(2u8..=12)) * i64::from(rng.random_range(2u8..=12));
            let opts = answer_options(correct, &mut rng);
            assert_eq!(opts.len(), 4);
            let set: HashSet<_> = opts.iter().copied().collect();
            assert_eq!(set.len(), 4, "options distinct: {opts:?}");
            assert!(set.contains(&correct));
            assert!(opts.iter().all(|&o| o >= 1), "clamped to >= 1: {opts:?}");
        }
    }

    #[test]
    fn test_answer_options_order_is_randomized() {
        // The correct answer must not always sit first.
        let mut rng = rng();
        let mut first_is_correct = 0;
        for _ in 0..100 {
            if answer_options(36, &mut rng)[0] == 36 {
                first_is_correct += 1;
            }
        }
        assert!(first_is_correct < 100, "correct answer always first");
    }

    #[test]
    fn test_select_unknown_card_clears_selection() {
        let mut rng = rng();
        let mut state = GameState::deal(options(3), &mut rng);
        let own = state.hands.one[0];
        state.select_card(PlayerNumber::One, own.id, &mut rng);

        // A card from the opponent's hand is not in player 1's hand.
        let foreign = state.hands.two[0];
        state.select_card(PlayerNumber::One, foreign.id, &mut rng);

        assert_eq!(state.selected.one, None, "treated as no selection");
        assert_eq!(state.phase, RoundPhase::Dealt);
    }

    #[test]
    fn test_select_rejected_while_pending_advance() {
        let mut rng = rng();
        let mut state = GameState::deal(options(3), &mut rng);
        select_first_cards(&mut state, &mut rng);
        let correct = state.correct_answer.unwrap();
        state.submit_answer(PlayerNumber::One, correct);
        state.mark_pending_advance();

        let before_selected = state.selected.clone();
        let card = state.hands.two[1];
        state.select_card(PlayerNumber::Two, card.id, &mut rng);

        assert_eq!(state.phase, RoundPhase::PendingAdvance, "unchanged");
        assert_eq!(state.selected, before_selected, "selection untouched");
    }

    #[test]
    fn test_reselect_during_active_round_regenerates_problem() {
        let mut rng = rng();
        let mut state = GameState::deal(options(3), &mut rng);
        select_first_cards(&mut state, &mut rng);

        let replacement = state.hands.one[1];
        state.select_card(PlayerNumber::One, replacement.id, &mut rng);

        assert_eq!(state.phase, RoundPhase::ProblemActive);
        let problem = state.problem.unwrap();
        assert_eq!(problem.a, replacement.value);
    }

    // =====================================================================
    // submit_answer()
    // =====================================================================

    #[test]
    fn test_submit_correct_answer_scores_and_resolves() {
        let mut rng = rng();
        let mut state = GameState::deal(options(3), &mut rng);
        let (a, b) = select_first_cards(&mut state, &mut rng);
        let correct = i64::from(a) * i64::from(b);

        let outcome = state.submit_answer(PlayerNumber::Two, correct);

        assert_eq!(outcome, SubmitOutcome::Resolved(Some(PlayerNumber::Two)));
        assert_eq!(state.scores.two, 1);
        assert_eq!(state.scores.one, 0);
        assert_eq!(state.solved_by, Some(PlayerNumber::Two));
        assert!(state.problem_solved());
        assert_eq!(state.history.len(), 1);
        let rec = &state.history[0];
        assert_eq!((rec.a, rec.b, rec.answer), (a, b, correct));
        assert_eq!(rec.solved_by, Some(PlayerNumber::Two));
    }

    #[test]
    fn test_submit_wrong_answer_waits_for_other_player() {
        let mut rng = rng();
        let mut state = GameState::deal(options(3), &mut rng);
        select_first_cards(&mut state, &mut rng);
        let correct = state.correct_answer.unwrap();

        let outcome = state.submit_answer(PlayerNumber::One, correct + 1);

        assert_eq!(outcome, SubmitOutcome::Recorded);
        assert!(state.round_in_progress(), "round stays open");
        assert!(state.answered.one);
        assert_eq!(state.submitted.one, Some(correct + 1), "raw value kept");
        assert!(state.history.is_empty());
    }

    #[test]
    fn test_both_wrong_resolves_with_null_solver_and_no_score() {
        let mut rng = rng();
        let mut state = GameState::deal(options(3), &mut rng);
        select_first_cards(&mut state, &mut rng);
        let correct = state.correct_answer.unwrap();

        state.submit_answer(PlayerNumber::One, correct + 1);
        let outcome = state.submit_answer(PlayerNumber::Two, correct + 2);

        assert_eq!(outcome, SubmitOutcome::Resolved(None));
        assert_eq!(state.solved_by, None);
        assert_eq!(state.scores, PerPlayer { one: 0, two: 0 });
        assert_eq!(state.history.len(), 1);
        assert_eq!(state.history[0].solved_by, None);
    }

    #[test]
    fn test_submit_after_resolution_is_ignored() {
        let mut rng = rng();
        let mut state = GameState::deal(options(3), &mut rng);
        select_first_cards(&mut state, &mut rng);
        let correct = state.correct_answer.unwrap();
        state.submit_answer(PlayerNumber::Two, correct);

        let outcome = state.submit_answer(PlayerNumber::One, correct);

        assert_eq!(outcome, SubmitOutcome::Ignored, "no double scoring");
        assert_eq!(state.scores.one, 0);
        assert_eq!(state.scores.two, 1);
        assert_eq!(state.history.len(), 1);
    }

    #[test]
    fn test_submit_without_round_is_ignored() {
        let mut rng = rng();
        let mut state = GameState::deal(options(3), &mut rng);
        assert_eq!(state.submit_answer(PlayerNumber::One, 12), SubmitOutcome::Ignored);
    }

    // =====================================================================
    // advance_round()
    // =====================================================================

    #[test]
    fn test_advance_removes_exactly_the_selected_cards() {
        let mut rng = rng();
        let mut state = GameState::deal(options(3), &mut rng);
        let c1 = state.hands.one[0];
        let c2 = state.hands.two[0];
        select_first_cards(&mut state, &mut rng);
        let correct = state.correct_answer.unwrap();
        state.submit_answer(PlayerNumber::One, correct);

        let outcome = state.advance_round();

        assert_eq!(outcome, AdvanceOutcome::Advanced { game_over: false });
        assert_eq!(state.hands.one.len(), 2);
        assert_eq!(state.hands.two.len(), 2);
        assert!(state.hands.one.iter().all(|c| c.id != c1.id));
        assert!(state.hands.two.iter().all(|c| c.id != c2.id));
    }

    #[test]
    fn test_advance_resets_round_fields_and_flags_clients() {
        let mut rng = rng();
        let mut state = GameState::deal(options(3), &mut rng);
        select_first_cards(&mut state, &mut rng);
        let correct = state.correct_answer.unwrap();
        state.submit_answer(PlayerNumber::Two, correct);

        state.advance_round();

        assert_eq!(state.phase, RoundPhase::Dealt);
        assert!(state.problem.is_none());
        assert!(state.correct_answer.is_none());
        assert!(state.answer_options.is_empty());
        assert_eq!(state.selected, PerPlayer::default());
        assert_eq!(state.submitted, PerPlayer::default());
        assert!(!state.reveal);
        assert!(state.deal_complete, "server already advanced");
        assert!(state.advance_clients);
        assert_eq!(state.history.len(), 1, "history survives the reset");
    }

    #[test]
    fn test_advance_without_resolution_is_ignored() {
        let mut rng = rng();
        let mut state = GameState::deal(options(3), &mut rng);
        select_first_cards(&mut state, &mut rng);

        let outcome = state.advance_round();

        assert_eq!(outcome, AdvanceOutcome::Ignored);
        assert!(state.round_in_progress(), "round untouched");
        assert_eq!(state.hands.one.len(), 3, "no card removal");
    }

    #[test]
    fn test_double_advance_applies_once() {
        // The raced manual/automatic advance: the second call finds the
        // phase already reset and must not remove more cards.
        let mut rng = rng();
        let mut state = GameState::deal(options(3), &mut rng);
        select_first_cards(&mut state, &mut rng);
        let correct = state.correct_answer.unwrap();
        state.submit_answer(PlayerNumber::One, correct);
        state.mark_pending_advance();

        assert!(matches!(state.advance_round(), AdvanceOutcome::Advanced { .. }));
        let hands_after = (state.hands.one.len(), state.hands.two.len());

        assert_eq!(state.advance_round(), AdvanceOutcome::Ignored);
        assert_eq!(
            (state.hands.one.len(), state.hands.two.len()),
            hands_after,
            "no double card removal"
        );
    }

    #[test]
    fn test_last_round_ends_game_with_score_winner() {
        let mut rng = rng();
        let mut state = GameState::deal(options(1), &mut rng);
        select_first_cards(&mut state, &mut rng);
        let correct = state.correct_answer.unwrap();
        state.submit_answer(PlayerNumber::Two, correct);

        let outcome = state.advance_round();

        assert_eq!(outcome, AdvanceOutcome::Advanced { game_over: true });
        assert!(state.game_over());
        assert!(state.hands.one.is_empty() && state.hands.two.is_empty());
        assert_eq!(state.winner, Some(PlayerNumber::Two));
        assert_eq!(state.view().winner.as_deref(), Some("player2"));
    }

    #[test]
    fn test_tied_scores_produce_no_winner() {
        let mut rng = rng();
        let mut state = GameState::deal(options(1), &mut rng);
        select_first_cards(&mut state, &mut rng);
        let correct = state.correct_answer.unwrap();
        // Both wrong: scores stay 0–0.
        state.submit_answer(PlayerNumber::One, correct + 1);
        state.submit_answer(PlayerNumber::Two, correct + 3);

        state.advance_round();

        assert!(state.game_over());
        assert_eq!(state.winner, None, "tie has no winner");
        assert_eq!(state.view().winner, None);
    }

    // =====================================================================
    // pending-advance marks
    // =====================================================================

    #[test]
    fn test_pending_advance_only_applies_to_resolved_rounds() {
        let mut rng = rng();
        let mut state = GameState::deal(options(3), &mut rng);

        state.mark_pending_advance();
        assert_eq!(state.phase, RoundPhase::Dealt, "nothing to close yet");

        select_first_cards(&mut state, &mut rng);
        let correct = state.correct_answer.unwrap();
        state.submit_answer(PlayerNumber::One, correct);
        state.mark_pending_advance();
        assert_eq!(state.phase, RoundPhase::PendingAdvance);

        state.clear_pending_advance();
        assert_eq!(state.phase, RoundPhase::Resolved, "room not left locked");
    }
}
