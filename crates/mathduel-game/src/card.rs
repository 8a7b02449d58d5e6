//! Deck construction and shuffling.

use mathduel_protocol::{Card, CardId, Suit};
use rand::Rng;
use rand::seq::SliceRandom;

/// Smallest and largest card values. 4 suits × values 2..=12 gives the
/// fixed 44-card deck.
pub const MIN_VALUE: u8 = 2;
pub const MAX_VALUE: u8 = 12;

/// Total cards in a fresh deck.
pub const DECK_SIZE: usize = 44;

/// Builds the full ordered deck: every (suit, value) pair exactly once,
/// with ids assigned sequentially so they are unique within the game.
pub fn build_deck() -> Vec<Card> {
    let mut deck = Vec::with_capacity(DECK_SIZE);
    let mut next_id = 0u32;
    for suit in Suit::ALL {
        for value in MIN_VALUE..=MAX_VALUE {
            deck.push(Card {
                id: CardId(next_id),
                value,
                suit,
            });
            next_id += 1;
        }
    }
    deck
}

/// A full deck in uniformly random order (Fisher–Yates via `shuffle`).
pub fn shuffled_deck(rng: &mut impl Rng) -> Vec<Card> {
    let mut deck = build_deck();
    deck.shuffle(rng);
    deck
}
