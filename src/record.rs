use std::fmt::{Display, Formatter};

/// Mask selecting the compression codec from a message's attribute flags.
pub const ATTRIBUTE_CODEC_MASK: i8 = 0x03;

/// The only message format this client speaks.
pub const MAGIC_V0: i8 = 0;

/// A single message as stored in a partition's log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Message format version.
    pub magic: i8,

    /// Attribute flags, the lowest two bits select the compression codec.
    pub attributes: i8,

    pub key: Option<Vec<u8>>,

    pub value: Option<Vec<u8>>,
}

impl Record {
    /// Creates an uncompressed format-0 record without a key.
    pub fn new(value: impl Into<Vec<u8>>) -> Self {
        Self {
            magic: MAGIC_V0,
            attributes: 0,
            key: None,
            value: Some(value.into()),
        }
    }

    pub fn with_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Compression codec selected by the attribute flags.
    pub fn compression(&self) -> Compression {
        Compression::from_attributes(self.attributes)
    }

    /// Approximate size on the wire, used for logging only.
    pub fn approximate_size(&self) -> usize {
        self.key.as_ref().map(|k| k.len()).unwrap_or_default()
            + self.value.as_ref().map(|v| v.len()).unwrap_or_default()
    }
}

/// Record that has offset information attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordAndOffset {
    pub record: Record,
    pub offset: i64,
}

/// Compression codec as encoded in the attribute flags.
///
/// Only [`Compression::NoCompression`] can be decoded, everything else is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Compression {
    NoCompression,
    Gzip,
    Snappy,
    Unknown(i8),
}

impl Compression {
    pub fn from_attributes(attributes: i8) -> Self {
        match attributes & ATTRIBUTE_CODEC_MASK {
            0 => Self::NoCompression,
            1 => Self::Gzip,
            2 => Self::Snappy,
            other => Self::Unknown(other),
        }
    }
}

impl Display for Compression {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoCompression => write!(f, "none"),
            Self::Gzip => write!(f, "gzip"),
            Self::Snappy => write!(f, "snappy"),
            Self::Unknown(codec) => write!(f, "unknown codec {codec}"),
        }
    }
}
