//! Message sets in the original (format 0) layout.
//!
//! ```text
//! MessageSet => [Offset MessageSize Message]
//!   Offset => int64
//!   MessageSize => int32
//!
//! Message => Crc MagicByte Attributes Key Value
//!   Crc => int32
//!   MagicByte => int8
//!   Attributes => int8
//!   Key => bytes
//!   Value => bytes
//! ```
//!
//! Unlike every other structure in the protocol, a message set is not preceded by an element count, and a fetch
//! response may cut off its last message half-way. Decoding therefore happens lazily through [`MessageSetIter`].
//!
//! # References
//! - <https://cwiki.apache.org/confluence/display/KAFKA/A+Guide+To+The+Kafka+Protocol#AGuideToTheKafkaProtocol-Messagesets>

use std::io::{Cursor, Read, Write};
use std::iter::FusedIterator;

use super::traits::{ReadError, ReadType, WriteError, WriteType};
use crate::record::{Compression, Record, RecordAndOffset, MAGIC_V0};

/// Size of the CRC prefix of every message.
const CRC_SIZE: usize = 4;

/// Raw message set bytes as carried by produce requests and fetch responses.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MessageSet(Vec<u8>);

impl MessageSet {
    /// Encodes records into a message set.
    pub fn from_records<'a, I>(records: I) -> Result<Self, WriteError>
    where
        I: IntoIterator<Item = &'a RecordAndOffset>,
    {
        let mut buf = vec![];
        for RecordAndOffset { record, offset } in records {
            let mut message = vec![];
            write_message(record, &mut message)?;

            offset.write(&mut buf)?;
            i32::try_from(message.len())?.write(&mut buf)?;
            buf.write_all(&message)?;
        }

        Ok(Self(buf))
    }

    /// Wraps bytes as they came off the wire.
    pub fn from_bytes(buf: Vec<u8>) -> Self {
        Self(buf)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Lazily decodes the contained messages.
    pub fn iter(&self) -> MessageSetIter<'_> {
        MessageSetIter {
            cursor: Cursor::new(&self.0),
            yielded: false,
            done: false,
        }
    }
}

impl<R> ReadType<R> for MessageSet
where
    R: Read,
{
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        let buf = Option::<Vec<u8>>::read(reader)?.unwrap_or_default();
        Ok(Self(buf))
    }
}

impl<W> WriteType<W> for MessageSet
where
    W: Write,
{
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        i32::try_from(self.0.len())?.write(writer)?;
        writer.write_all(&self.0)?;
        Ok(())
    }
}

/// Forward-only iterator over the messages of a [`MessageSet`].
///
/// A message cut off at the end of the buffer ends the iteration silently if at least one complete message was seen
/// before. If not even the first message fits, [`ReadError::FetchBufferTooSmall`] is yielded once. Errors confined to
/// a single complete message (checksum, compression) are yielded and iteration continues with the next message.
#[derive(Debug)]
pub struct MessageSetIter<'a> {
    cursor: Cursor<&'a Vec<u8>>,
    yielded: bool,
    done: bool,
}

impl<'a> MessageSetIter<'a> {
    fn read_entry(&mut self) -> Result<(i64, &'a [u8]), ReadError> {
        let offset = i64::read(&mut self.cursor)?;
        let len = i32::read(&mut self.cursor)?;
        let len = usize::try_from(len).map_err(|_| {
            ReadError::Malformed(format!("Invalid negative message size: {len}").into())
        })?;

        let buf: &'a Vec<u8> = *self.cursor.get_ref();
        let start = usize::try_from(self.cursor.position())?;
        let end = start
            .checked_add(len)
            .filter(|end| *end <= buf.len())
            .ok_or(ReadError::BufferUnderflow)?;
        self.cursor.set_position(u64::try_from(end)?);

        Ok((offset, &buf[start..end]))
    }
}

impl Iterator for MessageSetIter<'_> {
    type Item = Result<RecordAndOffset, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.cursor.position() >= self.cursor.get_ref().len() as u64 {
            return None;
        }

        match self.read_entry() {
            Ok((offset, data)) => {
                self.yielded = true;
                Some(read_message(data).map(|record| RecordAndOffset { record, offset }))
            }
            Err(ReadError::BufferUnderflow) => {
                // Partial trailing message, the broker is allowed to send those.
                self.done = true;
                if self.yielded {
                    None
                } else {
                    Some(Err(ReadError::FetchBufferTooSmall))
                }
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl FusedIterator for MessageSetIter<'_> {}

/// Decodes a single message, verifying its CRC32 first.
pub(crate) fn read_message(data: &[u8]) -> Result<Record, ReadError> {
    if data.len() < CRC_SIZE {
        return Err(ReadError::BufferUnderflow);
    }
    let (crc, body) = data.split_at(CRC_SIZE);
    let expected = u32::from_be_bytes([crc[0], crc[1], crc[2], crc[3]]);
    let actual = crc32fast::hash(body);
    if expected != actual {
        return Err(ReadError::ChecksumMismatch { expected, actual });
    }

    let mut reader = Cursor::new(body);
    let magic = i8::read(&mut reader)?;
    if magic != MAGIC_V0 {
        return Err(ReadError::Malformed(
            format!("Unsupported message format version: {magic}").into(),
        ));
    }
    let attributes = i8::read(&mut reader)?;
    let key = Option::<Vec<u8>>::read(&mut reader)?;
    let value = Option::<Vec<u8>>::read(&mut reader)?;

    match Compression::from_attributes(attributes) {
        Compression::NoCompression => Ok(Record {
            magic,
            attributes,
            key,
            value,
        }),
        compression => Err(ReadError::UnsupportedCompression(compression)),
    }
}

/// Encodes a single message including its CRC32.
pub(crate) fn write_message<W>(record: &Record, writer: &mut W) -> Result<(), WriteError>
where
    W: Write,
{
    if record.magic != MAGIC_V0 {
        return Err(WriteError::Malformed(
            format!("Unexpected magic number: {}", record.magic).into(),
        ));
    }

    let mut body = vec![];
    record.magic.write(&mut body)?;
    record.attributes.write(&mut body)?;
    record.key.write(&mut body)?;
    record.value.write(&mut body)?;

    writer.write_all(&crc32fast::hash(&body).to_be_bytes())?;
    writer.write_all(&body)?;
    Ok(())
}
