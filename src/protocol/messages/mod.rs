//! Individual API messages.
//!
//! Every request is framed as
//!
//! ```text
//! Size RequestHeader RequestBody
//!   Size => int32
//! ```
//!
//! and every response as
//!
//! ```text
//! Size ResponseHeader ResponseBody
//!   Size => int32
//! ```
//!
//! The size prefix of responses is handled by the connection, so [`decode_response`] starts at the header.

use std::io::Cursor;

use super::{
    api_key::ApiKey,
    api_version::ApiVersion,
    traits::{ReadError, ReadType, WriteError, WriteType},
};

mod fetch;
pub use fetch::*;
mod header;
pub use header::*;
mod list_offsets;
pub use list_offsets::*;
mod metadata;
pub use metadata::*;
mod produce;
pub use produce::*;

/// Size of the length prefix in front of every request and response.
pub const LENGTH_PREFIX_SIZE: usize = 4;

pub trait RequestBody {
    /// The response type that will follow when issuing this request.
    type ResponseBody;

    /// Kind of this request.
    const API_KEY: ApiKey;
}

/// Encodes a request header and body, wrapped into the length prefix.
pub fn encode_request<B>(
    correlation_id: i32,
    client_id: &str,
    body: &B,
) -> Result<Vec<u8>, WriteError>
where
    B: RequestBody + WriteType<Vec<u8>>,
{
    let header = RequestHeader {
        request_api_key: B::API_KEY,
        request_api_version: ApiVersion::V0,
        correlation_id,
        client_id: client_id.to_string(),
    };

    // reserve the length prefix, patched in once the size is known
    let mut buf = vec![0u8; LENGTH_PREFIX_SIZE];
    header.write(&mut buf)?;
    body.write(&mut buf)?;

    let len = i32::try_from(buf.len() - LENGTH_PREFIX_SIZE)?;
    buf[..LENGTH_PREFIX_SIZE].copy_from_slice(&len.to_be_bytes());

    Ok(buf)
}

/// Decodes a response frame, i.e. the bytes following the length prefix.
pub fn decode_response<B>(frame: Vec<u8>) -> Result<(ResponseHeader, B::ResponseBody), ReadError>
where
    B: RequestBody,
    B::ResponseBody: ReadType<Cursor<Vec<u8>>>,
{
    let mut reader = Cursor::new(frame);
    let header = ResponseHeader::read(&mut reader)?;
    let body = B::ResponseBody::read(&mut reader)?;
    Ok((header, body))
}
