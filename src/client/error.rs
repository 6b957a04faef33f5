use std::fmt::{Display, Formatter};

use thiserror::Error;

pub use crate::protocol::error::Error as ProtocolError;
use crate::protocol::traits::{ReadError, WriteError};

use crate::client::checkpoint::CheckpointError;
use crate::connection::{self, BrokerAddress};
use crate::topic::TopicPartition;

/// Which request a [`Error::ServerError`] refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestContext {
    /// Request was for a topic
    Topic(String),

    /// Request was for a partition
    Partition(String, i32),
}

impl Display for RequestContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Topic(t) => write!(f, "topic \"{t}\""),
            Self::Partition(t, p) => write!(f, "partition {p} of topic \"{t}\""),
        }
    }
}

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("No broker reachable{}", display_target(.target))]
    NoBrokerReachable {
        target: Option<BrokerAddress>,

        /// Error of the last connection that was tried
        #[source]
        last_error: Option<connection::Error>,
    },

    #[error("Cannot decode response: {0}")]
    Read(#[from] ReadError),

    #[error("Cannot encode request: {0}")]
    Write(#[from] WriteError),

    #[error("Unknown topic or partition: {0}")]
    UnknownTopicPartition(TopicPartition),

    #[error("Unknown topic: {0}")]
    UnknownTopic(String),

    #[error("No leader available for {0}")]
    LeaderNotAvailable(TopicPartition),

    #[error("Server error {protocol_error:?} for {request}")]
    ServerError {
        protocol_error: ProtocolError,
        request: RequestContext,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid broker address: {0:?}")]
    InvalidBrokerAddress(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),
}

impl Error {
    /// Broker error code carried by this error, if any.
    pub fn protocol_error(&self) -> Option<ProtocolError> {
        match self {
            Self::ServerError { protocol_error, .. } => Some(*protocol_error),
            _ => None,
        }
    }

    /// Whether a metadata refresh may resolve this error.
    pub fn is_stale_metadata(&self) -> bool {
        match self {
            Self::UnknownTopicPartition(_) | Self::LeaderNotAvailable(_) => true,
            Self::ServerError { protocol_error, .. } => matches!(
                protocol_error,
                ProtocolError::UnknownTopicOrPartition
                    | ProtocolError::LeaderNotAvailable
                    | ProtocolError::NotLeaderForPartition
            ),
            _ => false,
        }
    }
}

fn display_target(target: &Option<BrokerAddress>) -> String {
    target
        .as_ref()
        .map(|t| format!(" for broker {t}"))
        .unwrap_or_default()
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = Error::NoBrokerReachable {
            target: Some(BrokerAddress::new("localhost", 9092)),
            last_error: None,
        };
        assert_eq!(err.to_string(), "No broker reachable for broker localhost:9092");

        let err = Error::NoBrokerReachable {
            target: None,
            last_error: Some(connection::Error::ConnectionReset),
        };
        assert_eq!(err.to_string(), "No broker reachable");
        assert!(std::error::Error::source(&err).is_some());

        let err = Error::ServerError {
            protocol_error: ProtocolError::OffsetOutOfRange,
            request: RequestContext::Partition("t".to_string(), 3),
        };
        assert_eq!(
            err.to_string(),
            "Server error OffsetOutOfRange for partition 3 of topic \"t\""
        );
        assert_eq!(err.protocol_error(), Some(ProtocolError::OffsetOutOfRange));
        assert!(!err.is_stale_metadata());
    }

    #[test]
    fn test_stale_metadata() {
        assert!(Error::LeaderNotAvailable(TopicPartition::new("t", 0)).is_stale_metadata());
        assert!(Error::ServerError {
            protocol_error: ProtocolError::NotLeaderForPartition,
            request: RequestContext::Partition("t".to_string(), 0),
        }
        .is_stale_metadata());
        assert!(!Error::InvalidResponse("x".to_string()).is_stale_metadata());
    }
}
