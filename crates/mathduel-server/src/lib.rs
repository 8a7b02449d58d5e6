//! # Mathduel server
//!
//! Authoritative WebSocket server for a two-player card arithmetic game.
//! Two clients are matched into a room; the server owns all game truth —
//! hands, selections, generated problems, scores, round progression — so
//! clients cannot desync or cheat by disagreeing on outcomes.
//!
//! Layers, bottom up:
//!
//! - `mathduel-protocol` — wire frames and the JSON codec
//! - `mathduel-registry` — room/player membership
//! - `mathduel-game` — the round state machine
//! - `mathduel-timers` — cancellable deferred tasks (auto-advance,
//!   presence debounce)
//! - this crate — the socket edge, action orchestration, and broadcasts

mod config;
mod error;
mod handler;
mod server;
mod service;

pub use config::ServerConfig;
pub use error::ServerError;
pub use server::{MathduelServer, MathduelServerBuilder};
pub use service::App;
