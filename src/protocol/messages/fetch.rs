use std::io::{Read, Write};

use crate::protocol::{
    api_key::ApiKey,
    error::{error_code, Error as ApiError},
    record::MessageSet,
    traits::{ReadError, ReadType, WriteError, WriteType},
};

use super::RequestBody;

/// Replica ID used by ordinary consumers.
pub const CONSUMER_REPLICA_ID: i32 = -1;

#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_copy_implementations)]
pub struct FetchRequestPartition {
    /// The partition index.
    pub partition: i32,

    /// The message offset.
    pub fetch_offset: i64,

    /// The maximum bytes to fetch from this partition.
    pub partition_max_bytes: i32,
}

impl<W> WriteType<W> for FetchRequestPartition
where
    W: Write,
{
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        self.partition.write(writer)?;
        self.fetch_offset.write(writer)?;
        self.partition_max_bytes.write(writer)?;
        Ok(())
    }
}

impl<R> ReadType<R> for FetchRequestPartition
where
    R: Read,
{
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        Ok(Self {
            partition: i32::read(reader)?,
            fetch_offset: i64::read(reader)?,
            partition_max_bytes: i32::read(reader)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequestTopic {
    /// The name of the topic to fetch.
    pub topic: String,

    /// The partitions to fetch.
    pub partitions: Vec<FetchRequestPartition>,
}

impl<W> WriteType<W> for FetchRequestTopic
where
    W: Write,
{
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        self.topic.write(writer)?;
        self.partitions.write(writer)?;
        Ok(())
    }
}

impl<R> ReadType<R> for FetchRequestTopic
where
    R: Read,
{
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        Ok(Self {
            topic: String::read(reader)?,
            partitions: Vec::<FetchRequestPartition>::read(reader)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// The broker ID of the follower, of -1 if this request is from a consumer.
    pub replica_id: i32,

    /// The maximum time in milliseconds to wait for the response.
    pub max_wait_ms: i32,

    /// The minimum bytes to accumulate in the response.
    pub min_bytes: i32,

    /// The topics to fetch.
    pub topics: Vec<FetchRequestTopic>,
}

impl<W> WriteType<W> for FetchRequest
where
    W: Write,
{
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        self.replica_id.write(writer)?;
        self.max_wait_ms.write(writer)?;
        self.min_bytes.write(writer)?;
        self.topics.write(writer)?;
        Ok(())
    }
}

// only needed by brokers, helpful for testing
impl<R> ReadType<R> for FetchRequest
where
    R: Read,
{
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        Ok(Self {
            replica_id: i32::read(reader)?,
            max_wait_ms: i32::read(reader)?,
            min_bytes: i32::read(reader)?,
            topics: Vec::<FetchRequestTopic>::read(reader)?,
        })
    }
}

impl RequestBody for FetchRequest {
    type ResponseBody = FetchResponse;

    const API_KEY: ApiKey = ApiKey::Fetch;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponsePartition {
    /// The partition index.
    pub partition_index: i32,

    /// The error code, or 0 if there was no fetch error.
    pub error_code: Option<ApiError>,

    /// The current high water mark.
    pub high_watermark: i64,

    /// The record data.
    ///
    /// The last message may be truncated, see [`MessageSetIter`](crate::protocol::record::MessageSetIter).
    pub records: MessageSet,
}

impl<R> ReadType<R> for FetchResponsePartition
where
    R: Read,
{
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        Ok(Self {
            partition_index: i32::read(reader)?,
            error_code: ApiError::new(i16::read(reader)?),
            high_watermark: i64::read(reader)?,
            records: MessageSet::read(reader)?,
        })
    }
}

impl<W> WriteType<W> for FetchResponsePartition
where
    W: Write,
{
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        self.partition_index.write(writer)?;
        error_code(self.error_code).write(writer)?;
        self.high_watermark.write(writer)?;
        self.records.write(writer)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponseTopic {
    /// The topic name.
    pub topic: String,

    /// The topic partitions.
    pub partitions: Vec<FetchResponsePartition>,
}

impl<R> ReadType<R> for FetchResponseTopic
where
    R: Read,
{
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        Ok(Self {
            topic: String::read(reader)?,
            partitions: Vec::<FetchResponsePartition>::read(reader)?,
        })
    }
}

impl<W> WriteType<W> for FetchResponseTopic
where
    W: Write,
{
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        self.topic.write(writer)?;
        self.partitions.write(writer)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    /// The response topics.
    pub responses: Vec<FetchResponseTopic>,
}

impl<R> ReadType<R> for FetchResponse
where
    R: Read,
{
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        Ok(Self {
            responses: Vec::<FetchResponseTopic>::read(reader)?,
        })
    }
}

impl<W> WriteType<W> for FetchResponse
where
    W: Write,
{
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        self.responses.write(writer)
    }
}
