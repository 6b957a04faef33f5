//! Wire protocol, version 0 of every API.
//!
//! # References
//! - <https://cwiki.apache.org/confluence/display/KAFKA/A+Guide+To+The+Kafka+Protocol>

pub mod api_key;
pub mod api_version;
pub mod error;
pub mod messages;
pub mod primitives;
pub mod record;
pub mod traits;

#[cfg(test)]
pub(crate) mod test_utils;
