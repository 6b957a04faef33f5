use std::io::{Read, Write};

use super::RequestBody;
use crate::protocol::{
    api_key::ApiKey,
    error::{error_code, Error as ApiError},
    record::MessageSet,
    traits::{ReadError, ReadType, WriteError, WriteType},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProduceRequestPartition {
    /// The partition index.
    pub partition_index: i32,

    /// The record data to be produced.
    pub records: MessageSet,
}

impl<W> WriteType<W> for ProduceRequestPartition
where
    W: Write,
{
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        self.partition_index.write(writer)?;
        self.records.write(writer)?;
        Ok(())
    }
}

impl<R> ReadType<R> for ProduceRequestPartition
where
    R: Read,
{
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        Ok(Self {
            partition_index: i32::read(reader)?,
            records: MessageSet::read(reader)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProduceRequestTopic {
    /// The topic name.
    pub name: String,

    /// Each partition to produce to.
    pub partitions: Vec<ProduceRequestPartition>,
}

impl<W> WriteType<W> for ProduceRequestTopic
where
    W: Write,
{
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        self.name.write(writer)?;
        self.partitions.write(writer)?;
        Ok(())
    }
}

impl<R> ReadType<R> for ProduceRequestTopic
where
    R: Read,
{
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        Ok(Self {
            name: String::read(reader)?,
            partitions: Vec::<ProduceRequestPartition>::read(reader)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProduceRequest {
    /// The number of acknowledgments the producer requires the leader to have received before considering a request
    /// complete.
    ///
    /// Allowed values: 0 for no acknowledgments, 1 for only the leader and -1 for the full ISR.
    pub acks: i16,

    /// The timeout to await a response in milliseconds.
    pub timeout_ms: i32,

    /// Each topic to produce to.
    pub topics: Vec<ProduceRequestTopic>,
}

impl RequestBody for ProduceRequest {
    type ResponseBody = ProduceResponse;

    const API_KEY: ApiKey = ApiKey::Produce;
}

impl<W> WriteType<W> for ProduceRequest
where
    W: Write,
{
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        self.acks.write(writer)?;
        self.timeout_ms.write(writer)?;
        self.topics.write(writer)?;
        Ok(())
    }
}

// only needed by brokers, helpful for testing
impl<R> ReadType<R> for ProduceRequest
where
    R: Read,
{
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        Ok(Self {
            acks: i16::read(reader)?,
            timeout_ms: i32::read(reader)?,
            topics: Vec::<ProduceRequestTopic>::read(reader)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProduceResponsePartition {
    /// The partition index.
    pub partition_index: i32,

    /// The error code, or 0 if there was no error.
    pub error: Option<ApiError>,

    /// The offset assigned to the first message of the appended set.
    pub base_offset: i64,
}

impl<R> ReadType<R> for ProduceResponsePartition
where
    R: Read,
{
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        Ok(Self {
            partition_index: i32::read(reader)?,
            error: ApiError::new(i16::read(reader)?),
            base_offset: i64::read(reader)?,
        })
    }
}

impl<W> WriteType<W> for ProduceResponsePartition
where
    W: Write,
{
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        self.partition_index.write(writer)?;
        error_code(self.error).write(writer)?;
        self.base_offset.write(writer)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProduceResponseTopic {
    /// The topic name.
    pub name: String,

    /// Each partition that we produced to within the topic.
    pub partitions: Vec<ProduceResponsePartition>,
}

impl<R> ReadType<R> for ProduceResponseTopic
where
    R: Read,
{
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        Ok(Self {
            name: String::read(reader)?,
            partitions: Vec::<ProduceResponsePartition>::read(reader)?,
        })
    }
}

impl<W> WriteType<W> for ProduceResponseTopic
where
    W: Write,
{
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        self.name.write(writer)?;
        self.partitions.write(writer)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProduceResponse {
    /// Each produce response.
    pub topics: Vec<ProduceResponseTopic>,
}

impl<R> ReadType<R> for ProduceResponse
where
    R: Read,
{
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        Ok(Self {
            topics: Vec::<ProduceResponseTopic>::read(reader)?,
        })
    }
}

impl<W> WriteType<W> for ProduceResponse
where
    W: Write,
{
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        self.topics.write(writer)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::record::{Record, RecordAndOffset};

    #[test]
    fn request() {
        let records = MessageSet::from_records(&[RecordAndOffset {
            record: Record::new("foo"),
            offset: 0,
        }])
        .unwrap();

        let req = ProduceRequest {
            acks: 1,
            timeout_ms: 1000,
            topics: vec![ProduceRequestTopic {
                name: "t".to_string(),
                partitions: vec![ProduceRequestPartition {
                    partition_index: 2,
                    records,
                }],
            }],
        };

        let mut buf = vec![];
        req.write(&mut buf).unwrap();

        let want = [
            0x00, 0x01, // acks
            0x00, 0x00, 0x03, 0xe8, // timeout
            0x00, 0x00, 0x00, 0x01, // number of topics
            0x00, 0x01, b't', // topic
            0x00, 0x00, 0x00, 0x01, // number of partitions
            0x00, 0x00, 0x00, 0x02, // partition
            0x00, 0x00, 0x00, 0x1d, // message set size
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // offset
            0x00, 0x00, 0x00, 0x11, // message size
        ];
        assert_eq!(&buf[..want.len()], want);
        assert_eq!(buf.len(), want.len() + 0x11);

        let restored = ProduceRequest::read(&mut Cursor::new(buf)).unwrap();
        assert_eq!(restored, req);
    }

    #[test]
    fn response() {
        let data = [
            0x00, 0x00, 0x00, 0x01, // number of topics
            0x00, 0x05, b't', b'o', b'p', b'i', b'c', // topic
            0x00, 0x00, 0x00, 0x02, // number of partitions
            0x00, 0x00, 0x00, 0x00, // partition
            0x00, 0x00, // error
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, // base offset
            0x00, 0x00, 0x00, 0x01, // partition
            0x00, 0x06, // error
            0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, // base offset
        ];

        let got = ProduceResponse::read(&mut Cursor::new(data)).unwrap();
        assert_eq!(
            got,
            ProduceResponse {
                topics: vec![ProduceResponseTopic {
                    name: "topic".to_string(),
                    partitions: vec![
                        ProduceResponsePartition {
                            partition_index: 0,
                            error: None,
                            base_offset: 0xff,
                        },
                        ProduceResponsePartition {
                            partition_index: 1,
                            error: Some(ApiError::NotLeaderForPartition),
                            base_offset: -1,
                        },
                    ],
                }],
            }
        );

        let mut buf = vec![];
        got.write(&mut buf).unwrap();
        assert_eq!(buf, data);
    }
}
