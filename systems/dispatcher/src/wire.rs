//! Messages exchanged between clients and the authoritative server.
//!
//! Frames are bincode encodings of [`ClientMessage`] and [`ServerMessage`].

use parkscript_core::{ActionArgs, GameActionResult, PlayerId, RequestId};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

/// Whether a request only predicts or actually applies an action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestKind {
    /// Side-effect free prediction.
    Query,
    /// Authoritative execution.
    Execute,
}

/// Action request sent by a client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    /// Correlates the eventual response.
    pub request: RequestId,
    /// Identifier of the action.
    pub action: String,
    /// Action arguments.
    pub args: ActionArgs,
    /// Query or execute.
    pub kind: RequestKind,
}

/// Frames sent from a client to the server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ClientMessage {
    /// First frame of every connection.
    Hello {
        /// Display name of the joining player.
        name: String,
    },
    /// Request to query or execute an action.
    Action(ActionRequest),
    /// Chat line to broadcast.
    Chat {
        /// Message text.
        message: String,
    },
    /// Orderly disconnect.
    Goodbye,
}

/// Frames sent from the server to clients.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ServerMessage {
    /// Handshake reply assigning the client its player identifier.
    Welcome {
        /// Identifier assigned to the client.
        player: PlayerId,
        /// Name of the server.
        server_name: String,
        /// Greeting shown to joining players.
        greeting: String,
        /// Players already in the session, with their display names.
        players: Vec<(PlayerId, String)>,
    },
    /// Terminal result of a client's request.
    Response {
        /// Request being answered.
        request: RequestId,
        /// Result of the query or execution.
        result: GameActionResult,
    },
    /// Action executed by the server that every client must apply.
    Replicate {
        /// Player on whose behalf the action ran.
        player: PlayerId,
        /// Identifier of the action.
        action: String,
        /// Arguments the action ran with.
        args: ActionArgs,
    },
    /// Chat line from a player.
    Chat {
        /// Sender of the message.
        player: PlayerId,
        /// Message text.
        message: String,
    },
    /// A player is present in the session.
    PlayerJoined {
        /// Identifier of the player.
        player: PlayerId,
        /// Display name of the player.
        name: String,
    },
    /// A player left the session.
    PlayerLeft {
        /// Identifier of the player.
        player: PlayerId,
    },
    /// The server closed the connection.
    Kicked {
        /// Reason shown to the player.
        reason: String,
    },
}

/// Failure to encode or decode a frame.
#[derive(Debug, Error)]
#[error("frame codec failed: {0}")]
pub struct WireError(#[from] bincode::Error);

/// Encodes a message into a frame.
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, WireError> {
    Ok(bincode::serialize(message)?)
}

/// Decodes a frame into a message.
pub fn decode<T: DeserializeOwned>(frame: &[u8]) -> Result<T, WireError> {
    Ok(bincode::deserialize(frame)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parkscript_core::{ActionStatus, Coord3, ExpenditureType};

    #[test]
    fn request_frame_round_trips() {
        let message = ClientMessage::Action(ActionRequest {
            request: RequestId::new(41),
            action: "smallsceneryplace".to_owned(),
            args: ActionArgs::new().with("x", 3).with("object", 12),
            kind: RequestKind::Execute,
        });
        let frame = encode(&message).expect("encode");
        let decoded: ClientMessage = decode(&frame).expect("decode");
        assert_eq!(decoded, message);
    }

    #[test]
    fn response_frame_carries_full_result() {
        let message = ServerMessage::Response {
            request: RequestId::new(2),
            result: GameActionResult::failure(ActionStatus::NoClearance, "Blocked", "Tree")
                .at(Coord3::new(32, 64, 112)),
        };
        let frame = encode(&message).expect("encode");
        let decoded: ServerMessage = decode(&frame).expect("decode");
        assert_eq!(decoded, message);

        let ok = GameActionResult::success(Coord3::default(), 5, ExpenditureType::Wages);
        let decoded: GameActionResult = decode(&encode(&ok).expect("encode")).expect("decode");
        assert_eq!(decoded.expenditure_type, ExpenditureType::Wages);
    }

    #[test]
    fn truncated_frame_is_rejected() {
        let frame = encode(&ServerMessage::PlayerLeft {
            player: PlayerId::new(3),
        })
        .expect("encode");
        assert!(decode::<ServerMessage>(&frame[..frame.len() - 1]).is_err());
    }
}
