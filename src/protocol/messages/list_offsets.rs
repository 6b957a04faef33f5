//! `ListOffsets` request and response.
//!
//! # References
//! - [KIP-79](https://cwiki.apache.org/confluence/pages/viewpage.action?pageId=65868090)
use std::io::{Read, Write};

use crate::protocol::{
    api_key::ApiKey,
    error::{error_code, Error as ApiError},
    traits::{ReadError, ReadType, WriteError, WriteType},
};

use super::RequestBody;

/// Timestamp asking for the offset that the next produced message will get.
pub const LATEST_TIMESTAMP: i64 = -1;

/// Timestamp asking for the oldest offset still retained.
pub const EARLIEST_TIMESTAMP: i64 = -2;

#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_copy_implementations)]
pub struct ListOffsetsRequestPartition {
    /// The partition index.
    pub partition_index: i32,

    /// Return up to `max_num_offsets` offsets of segments starting at or before this timestamp.
    ///
    /// Per [KIP-79] this can have the following special values:
    ///
    /// - `-1`: latest offset
    /// - `-2`: earlist offset
    ///
    /// [KIP-79]: https://cwiki.apache.org/confluence/pages/viewpage.action?pageId=65868090
    pub timestamp: i64,

    /// The maximum number of offsets to report.
    pub max_num_offsets: i32,
}

impl<W> WriteType<W> for ListOffsetsRequestPartition
where
    W: Write,
{
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        self.partition_index.write(writer)?;
        self.timestamp.write(writer)?;
        self.max_num_offsets.write(writer)?;
        Ok(())
    }
}

impl<R> ReadType<R> for ListOffsetsRequestPartition
where
    R: Read,
{
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        Ok(Self {
            partition_index: i32::read(reader)?,
            timestamp: i64::read(reader)?,
            max_num_offsets: i32::read(reader)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOffsetsRequestTopic {
    /// The topic name.
    pub name: String,

    /// Each partition in the request.
    pub partitions: Vec<ListOffsetsRequestPartition>,
}

impl<W> WriteType<W> for ListOffsetsRequestTopic
where
    W: Write,
{
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        self.name.write(writer)?;
        self.partitions.write(writer)?;
        Ok(())
    }
}

impl<R> ReadType<R> for ListOffsetsRequestTopic
where
    R: Read,
{
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        Ok(Self {
            name: String::read(reader)?,
            partitions: Vec::<ListOffsetsRequestPartition>::read(reader)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOffsetsRequest {
    /// The broker ID of the requestor, or -1 if this request is being made by a normal consumer.
    pub replica_id: i32,

    /// Each topic in the request.
    pub topics: Vec<ListOffsetsRequestTopic>,
}

impl<W> WriteType<W> for ListOffsetsRequest
where
    W: Write,
{
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        self.replica_id.write(writer)?;
        self.topics.write(writer)?;
        Ok(())
    }
}

// only needed by brokers, helpful for testing
impl<R> ReadType<R> for ListOffsetsRequest
where
    R: Read,
{
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        Ok(Self {
            replica_id: i32::read(reader)?,
            topics: Vec::<ListOffsetsRequestTopic>::read(reader)?,
        })
    }
}

impl RequestBody for ListOffsetsRequest {
    type ResponseBody = ListOffsetsResponse;

    const API_KEY: ApiKey = ApiKey::ListOffsets;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOffsetsResponsePartition {
    /// The partition index.
    pub partition_index: i32,

    /// The partition error code, or 0 if there was no error.
    pub error_code: Option<ApiError>,

    /// The result offsets, newest first.
    pub offsets: Vec<i64>,
}

impl<R> ReadType<R> for ListOffsetsResponsePartition
where
    R: Read,
{
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        Ok(Self {
            partition_index: i32::read(reader)?,
            error_code: ApiError::new(i16::read(reader)?),
            offsets: Vec::<i64>::read(reader)?,
        })
    }
}

impl<W> WriteType<W> for ListOffsetsResponsePartition
where
    W: Write,
{
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        self.partition_index.write(writer)?;
        error_code(self.error_code).write(writer)?;
        self.offsets.write(writer)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOffsetsResponseTopic {
    /// The topic name.
    pub name: String,

    /// Each partition in the response.
    pub partitions: Vec<ListOffsetsResponsePartition>,
}

impl<R> ReadType<R> for ListOffsetsResponseTopic
where
    R: Read,
{
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        Ok(Self {
            name: String::read(reader)?,
            partitions: Vec::<ListOffsetsResponsePartition>::read(reader)?,
        })
    }
}

impl<W> WriteType<W> for ListOffsetsResponseTopic
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
pub struct ListOffsetsResponse {
    /// Each topic in the response.
    pub topics: Vec<ListOffsetsResponseTopic>,
}

impl<R> ReadType<R> for ListOffsetsResponse
where
    R: Read,
{
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        Ok(Self {
            topics: Vec::<ListOffsetsResponseTopic>::read(reader)?,
        })
    }
}

impl<W> WriteType<W> for ListOffsetsResponse
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

    #[test]
    fn request() {
        let req = ListOffsetsRequest {
            replica_id: -1,
            topics: vec![ListOffsetsRequestTopic {
                name: "t".to_string(),
                partitions: vec![ListOffsetsRequestPartition {
                    partition_index: 3,
                    timestamp: EARLIEST_TIMESTAMP,
                    max_num_offsets: 1,
                }],
            }],
        };

        let mut buf = vec![];
        req.write(&mut buf).unwrap();
        assert_eq!(
            buf,
            [
                0xff, 0xff, 0xff, 0xff, // replica id
                0x00, 0x00, 0x00, 0x01, // number of topics
                0x00, 0x01, b't', // topic
                0x00, 0x00, 0x00, 0x01, // number of partitions
                0x00, 0x00, 0x00, 0x03, // partition
                0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe, // timestamp
                0x00, 0x00, 0x00, 0x01, // max offsets
            ]
        );

        let restored = ListOffsetsRequest::read(&mut Cursor::new(buf)).unwrap();
        assert_eq!(restored, req);
    }

    #[test]
    fn response() {
        let data = [
            0x00, 0x00, 0x00, 0x01, // number of topics
            0x00, 0x01, b't', // topic
            0x00, 0x00, 0x00, 0x01, // number of partitions
            0x00, 0x00, 0x00, 0x03, // partition
            0x00, 0x00, // error
            0x00, 0x00, 0x00, 0x02, // number of offsets
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2a, //
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, //
        ];

        let got = ListOffsetsResponse::read(&mut Cursor::new(data)).unwrap();
        assert_eq!(
            got,
            ListOffsetsResponse {
                topics: vec![ListOffsetsResponseTopic {
                    name: "t".to_string(),
                    partitions: vec![ListOffsetsResponsePartition {
                        partition_index: 3,
                        error_code: None,
                        offsets: vec![42, 0],
                    }],
                }],
            }
        );

        let mut buf = vec![];
        got.write(&mut buf).unwrap();
        assert_eq!(buf, data);
    }
}
