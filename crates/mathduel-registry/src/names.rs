//! Decorative room-name generation.
//!
//! Purely cosmetic: the name is shown in lobbies and acks but nothing keys
//! off it. Collisions are harmless.

use rand::Rng;
use rand::seq::IndexedRandom;

const ADJECTIVES: &[&str] = &[
    "Brave", "Clever", "Daring", "Eager", "Fierce", "Gentle", "Happy", "Jolly", "Keen", "Lucky",
    "Mighty", "Nimble", "Plucky", "Quick", "Rapid", "Sly", "Swift", "Tidy", "Witty", "Zesty",
];

const NOUNS: &[&str] = &[
    "Badger", "Condor", "Dolphin", "Falcon", "Gecko", "Heron", "Ibex", "Jaguar", "Koala", "Lynx",
    "Marmot", "Narwhal", "Otter", "Panther", "Quokka", "Raven", "Stoat", "Tapir", "Walrus",
    "Wombat",
];

/// Picks a two-word display name like "Swift Otter".
pub fn room_name(rng: &mut impl Rng) -> String {
    let adjective = ADJECTIVES.choose(rng).expect("non-empty list");
    let noun = NOUNS.choose(rng).expect("non-empty list");
    format!("{adjective} {noun}")
}
