//! Room and player membership lifecycle for Mathduel.
//!
//! # Key types
//!
//! - [`RoomRegistry`] — creates/deletes rooms, seats and removes players,
//!   answers presence queries
//! - [`Room`] / [`Player`] — the membership records
//! - [`Joined`] / [`LeaveOutcome`] — operation results the service layer
//!   turns into acks and notifications
//! - [`RegistryError`] — membership failures

mod error;
mod names;
mod registry;
mod room;

pub use error::RegistryError;
pub use registry::{Joined, LeaveOutcome, RoomRegistry};
pub use room::{Player, Room};
