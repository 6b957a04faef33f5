//! Request type tags.
//!
//! Only the four APIs a plain producer/consumer needs are named; every other tag is carried as
//! [`ApiKey::Unknown`].
//!
//! # References
//! - <https://cwiki.apache.org/confluence/display/KAFKA/A+Guide+To+The+Kafka+Protocol#AGuideToTheKafkaProtocol-ApiKeys>

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub enum ApiKey {
    /// Append messages to a partition (0).
    Produce,

    /// Read messages of a partition (1).
    Fetch,

    /// Look up offsets by time (2).
    ListOffsets,

    /// Brokers, topics and partition leaders (3).
    Metadata,

    /// Any tag this client never sends.
    Unknown(i16),
}

const PRODUCE: i16 = 0;
const FETCH: i16 = 1;
const LIST_OFFSETS: i16 = 2;
const METADATA: i16 = 3;

impl From<i16> for ApiKey {
    fn from(key: i16) -> Self {
        match key {
            PRODUCE => Self::Produce,
            FETCH => Self::Fetch,
            LIST_OFFSETS => Self::ListOffsets,
            METADATA => Self::Metadata,
            other => Self::Unknown(other),
        }
    }
}

impl From<ApiKey> for i16 {
    fn from(key: ApiKey) -> Self {
        match key {
            ApiKey::Produce => PRODUCE,
            ApiKey::Fetch => FETCH,
            ApiKey::ListOffsets => LIST_OFFSETS,
            ApiKey::Metadata => METADATA,
            ApiKey::Unknown(code) => code,
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_known_tags() {
        assert_eq!(ApiKey::from(0), ApiKey::Produce);
        assert_eq!(ApiKey::from(3), ApiKey::Metadata);
        // offset commit, a later addition this client does not speak
        assert_eq!(ApiKey::from(8), ApiKey::Unknown(8));
        assert_eq!(i16::from(ApiKey::ListOffsets), 2);
    }

    proptest! {
        #[test]
        fn roundtrip_int16(code: i16) {
            assert_eq!(i16::from(ApiKey::from(code)), code);
        }

        #[test]
        fn roundtrip_api_key(key: ApiKey) {
            // `Unknown(0)` and friends normalize to the named variant
            let key = ApiKey::from(i16::from(key));
            assert_eq!(ApiKey::from(i16::from(key)), key);
        }
    }
}
