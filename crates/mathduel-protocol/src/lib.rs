//! Wire protocol for Mathduel.
//!
//! Defines the language clients and server speak:
//!
//! - **Types** ([`GameStateView`], [`Card`], identities, options) — the
//!   structures that travel on the wire.
//! - **Messages** ([`Request`], [`ClientAction`], [`ServerFrame`],
//!   [`AckBody`]) — the request/ack/broadcast conversation.
//! - **Codec** ([`Codec`], [`JsonCodec`]) — how frames become bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! The protocol layer knows nothing about rooms, games, or sockets — it
//! only defines shapes and serialization.

mod codec;
mod error;
mod messages;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use messages::{AckBody, ClientAction, Request, ServerFrame};
pub use types::{
    Card, CardId, ConnId, Difficulty, GameOptions, GameStateView, PlayerId, PlayerNumber,
    PlayerStatus, PresenceEntry, Problem, RoomId, RoomSummary, RoundRecord, Suit,
};
