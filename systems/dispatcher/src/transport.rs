//! In-process message channel standing in for a network socket.

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::wire::{self, WireError};

/// Failure to exchange a frame with the peer.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer endpoint was dropped.
    #[error("peer disconnected")]
    Disconnected,
    /// A frame could not be encoded or decoded.
    #[error(transparent)]
    Wire(#[from] WireError),
}

/// One side of a bidirectional frame channel.
#[derive(Debug)]
pub struct Endpoint {
    outgoing: Sender<Vec<u8>>,
    incoming: Receiver<Vec<u8>>,
}

/// Creates two connected endpoints.
#[must_use]
pub fn loopback() -> (Endpoint, Endpoint) {
    let (left_tx, right_rx) = unbounded();
    let (right_tx, left_rx) = unbounded();
    (
        Endpoint {
            outgoing: left_tx,
            incoming: left_rx,
        },
        Endpoint {
            outgoing: right_tx,
            incoming: right_rx,
        },
    )
}

impl Endpoint {
    /// Encodes and sends a message.
    pub fn send<T: Serialize>(&self, message: &T) -> Result<(), TransportError> {
        let frame = wire::encode(message)?;
        self.outgoing
            .send(frame)
            .map_err(|_| TransportError::Disconnected)
    }

    /// Receives the next queued message without blocking.
    pub fn try_recv<T: DeserializeOwned>(&self) -> Result<Option<T>, TransportError> {
        match self.incoming.try_recv() {
            Ok(frame) => Ok(Some(wire::decode(&frame)?)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(TransportError::Disconnected),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::ClientMessage;

    #[test]
    fn frames_arrive_in_order() {
        let (client, server) = loopback();
        for message in ["a", "b"] {
            client
                .send(&ClientMessage::Chat {
                    message: message.to_owned(),
                })
                .expect("peer alive");
        }
        client.send(&ClientMessage::Goodbye).expect("peer alive");

        let mut received = Vec::new();
        while let Some(message) = server.try_recv::<ClientMessage>().expect("peer alive") {
            received.push(message);
        }
        assert_eq!(received.len(), 3);
        assert_eq!(received[2], ClientMessage::Goodbye);
    }

    #[test]
    fn dropped_peer_is_reported_after_queued_frames() {
        let (client, server) = loopback();
        client.send(&ClientMessage::Goodbye).expect("peer alive");
        drop(client);

        assert!(matches!(
            server.try_recv::<ClientMessage>(),
            Ok(Some(ClientMessage::Goodbye))
        ));
        assert!(matches!(
            server.try_recv::<ClientMessage>(),
            Err(TransportError::Disconnected)
        ));
        assert!(matches!(
            server.send(&ClientMessage::Goodbye),
            Err(TransportError::Disconnected)
        ));
    }
}
