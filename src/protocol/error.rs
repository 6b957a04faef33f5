//! Error codes returned by the broker.
//!
//! # References
//! - <https://cwiki.apache.org/confluence/display/KAFKA/A+Guide+To+The+Kafka+Protocol#AGuideToTheKafkaProtocol-ErrorCodes>

use thiserror::Error as ThisError;

#[derive(Debug, ThisError, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Error {
    #[error("Unknown server error")]
    UnknownServerError,

    #[error("Offset out of range")]
    OffsetOutOfRange,

    #[error("Corrupt message")]
    CorruptMessage,

    #[error("Unknown topic or partition")]
    UnknownTopicOrPartition,

    #[error("Invalid message size")]
    InvalidMessageSize,

    #[error("Leader not available")]
    LeaderNotAvailable,

    #[error("Not leader for partition")]
    NotLeaderForPartition,

    #[error("Request timed out")]
    RequestTimedOut,

    #[error("Broker not available")]
    BrokerNotAvailable,

    #[error("Replica not available")]
    ReplicaNotAvailable,

    #[error("Message too large")]
    MessageTooLarge,

    #[error("Stale controller epoch")]
    StaleControllerEpoch,

    #[error("Offset metadata too large")]
    OffsetMetadataTooLarge,

    #[error("Unknown error code {0}")]
    Unknown(i16),
}

impl Error {
    /// Maps a wire error code to an error, `0` meaning "no error".
    pub fn new(code: i16) -> Option<Self> {
        match code {
            0 => None,
            -1 => Some(Self::UnknownServerError),
            1 => Some(Self::OffsetOutOfRange),
            2 => Some(Self::CorruptMessage),
            3 => Some(Self::UnknownTopicOrPartition),
            4 => Some(Self::InvalidMessageSize),
            5 => Some(Self::LeaderNotAvailable),
            6 => Some(Self::NotLeaderForPartition),
            7 => Some(Self::RequestTimedOut),
            8 => Some(Self::BrokerNotAvailable),
            9 => Some(Self::ReplicaNotAvailable),
            10 => Some(Self::MessageTooLarge),
            11 => Some(Self::StaleControllerEpoch),
            12 => Some(Self::OffsetMetadataTooLarge),
            _ => Some(Self::Unknown(code)),
        }
    }

    pub fn code(&self) -> i16 {
        match self {
            Self::UnknownServerError => -1,
            Self::OffsetOutOfRange => 1,
            Self::CorruptMessage => 2,
            Self::UnknownTopicOrPartition => 3,
            Self::InvalidMessageSize => 4,
            Self::LeaderNotAvailable => 5,
            Self::NotLeaderForPartition => 6,
            Self::RequestTimedOut => 7,
            Self::BrokerNotAvailable => 8,
            Self::ReplicaNotAvailable => 9,
            Self::MessageTooLarge => 10,
            Self::StaleControllerEpoch => 11,
            Self::OffsetMetadataTooLarge => 12,
            Self::Unknown(code) => *code,
        }
    }
}

/// Encodes an optional error back into its wire code.
pub(crate) fn error_code(error: Option<Error>) -> i16 {
    error.map(|e| e.code()).unwrap_or_default()
}
