//! Unified error type for the server crate.
//!
//! Every variant's message is written for the player: rejected actions are
//! answered with an `{error: ...}` ack carrying exactly this text, sent to
//! the initiating connection only.

use mathduel_protocol::ProtocolError;
use mathduel_registry::RegistryError;

/// Reasons an action can be rejected or a connection torn down.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Membership failures: room not found, room full, not in a room.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Encode/decode failures on the wire.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Someone other than player 1 tried to start the game.
    #[error("only player 1 can start the game")]
    NotAuthorized,

    /// Game start requested with fewer than 2 members present.
    #[error("cannot start the game without 2 players")]
    InsufficientPlayers,

    /// A required payload field was absent.
    #[error("{0}")]
    MissingField(String),

    /// Unexpected failure while processing an action.
    #[error("internal error: {0}")]
    Internal(String),

    /// Transport failure while accepting or speaking WebSocket.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Listener-level I/O failure (bind, accept).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use mathduel_protocol::RoomId;

    #[test]
    fn test_registry_error_message_passes_through() {
        let err: ServerError = RegistryError::RoomNotFound(RoomId("AB12CD".into())).into();
        assert_eq!(err.to_string(), "room AB12CD not found");
    }

    #[test]
    fn test_authorization_messages_are_player_readable() {
        assert_eq!(
            ServerError::NotAuthorized.to_string(),
            "only player 1 can start the game"
        );
        assert_eq!(
            ServerError::InsufficientPlayers.to_string(),
            "cannot start the game without 2 players"
        );
    }
}
