//! Information about the build-process.

/// Default client ID that is sent to the broker.
pub const DEFAULT_CLIENT_ID: &str = "kafka-basic";
