use std::io::{Read, Write};

use thiserror::Error;

use crate::record::Compression;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ReadError {
    /// Tried to read past the end of the buffer.
    #[error("Buffer underflow: not enough data left")]
    BufferUnderflow,

    #[error("Cannot read data: {0}")]
    IO(std::io::Error),

    #[error("Overflow converting integer: {0}")]
    Overflow(#[from] std::num::TryFromIntError),

    #[error("Malformed data: {0}")]
    Malformed(#[from] Box<dyn std::error::Error + Send + Sync>),

    #[error("Message checksum failed: stored {expected:#010x}, computed {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("Compression not supported: {0}")]
    UnsupportedCompression(Compression),

    /// The message set ended before a single complete message could be read.
    ///
    /// The request has to be retried with a larger `max_bytes`.
    #[error("Fetch buffer too small to hold a single message, retry with a larger max_bytes")]
    FetchBufferTooSmall,
}

impl From<std::io::Error> for ReadError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::UnexpectedEof => Self::BufferUnderflow,
            _ => Self::IO(e),
        }
    }
}

pub trait ReadType<R>: Sized
where
    R: Read,
{
    fn read(reader: &mut R) -> Result<Self, ReadError>;
}

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum WriteError {
    #[error("Cannot write data: {0}")]
    IO(#[from] std::io::Error),

    #[error("Overflow converting integer: {0}")]
    Overflow(#[from] std::num::TryFromIntError),

    #[error("Malformed data: {0}")]
    Malformed(#[from] Box<dyn std::error::Error + Send + Sync>),
}

pub trait WriteType<W>: Sized
where
    W: Write,
{
    fn write(&self, writer: &mut W) -> Result<(), WriteError>;
}
