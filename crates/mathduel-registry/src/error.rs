//! Error types for the registry layer.

use mathduel_protocol::{ConnId, RoomId};

/// Errors that can occur during room membership operations.
///
/// Messages are surfaced verbatim in error acks, so they are written for
/// the player reading them, not for a log file.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// No room exists with the given join code.
    #[error("room {0} not found")]
    RoomNotFound(RoomId),

    /// Both seats are taken.
    #[error("room {0} is full")]
    RoomFull(RoomId),

    /// The connection is not a member of any room.
    #[error("connection {0} is not in a room")]
    NotInRoom(ConnId),
}
