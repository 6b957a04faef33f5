//! Framed request/response exchange with a single broker.
//!
//! Every frame on the wire is an `int32` size followed by that many bytes. [`BrokerConnection`] only handles the
//! framing; encoding and decoding the frame contents is left to [`crate::protocol::messages`].

use std::fmt::{Debug, Display, Formatter};
use std::future::Future;
use std::io;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::protocol::messages::LENGTH_PREFIX_SIZE;

pub mod topology;

/// Default timeout for connecting, sending and receiving.
pub const DEFAULT_SOCKET_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum Error {
    #[error("Cannot connect to {broker}: {source}")]
    Connect {
        broker: BrokerAddress,
        source: io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[source] io::Error),

    #[error("Socket operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Connection reset by peer")]
    ConnectionReset,

    #[error("Invalid frame size {size}, limit is {limit}")]
    InvalidFrameSize { size: i32, limit: usize },

    #[error("Response belongs to request {actual}, expected {expected}")]
    CorrelationIdMismatch { expected: i32, actual: i32 },
}

impl Error {
    /// Whether the peer dropped the connection, in which case a reconnect is worth a try.
    pub fn is_reset(&self) -> bool {
        match self {
            Self::ConnectionReset => true,
            Self::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            // the peer closed the socket before the frame was complete
            io::ErrorKind::UnexpectedEof => Self::ConnectionReset,
            _ => Self::Io(e),
        }
    }
}

/// Host and port of a broker.
///
/// This is the identity of a connection, independent of whether a socket is currently open.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BrokerAddress {
    pub host: String,
    pub port: i32,
}

impl BrokerAddress {
    pub fn new(host: impl Into<String>, port: i32) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parses `host:port`.
    pub fn parse(s: &str) -> Option<Self> {
        let (host, port) = s.trim().rsplit_once(':')?;
        let port = port.parse::<u16>().ok()?;
        if host.is_empty() {
            return None;
        }

        Some(Self::new(host, i32::from(port)))
    }
}

impl Display for BrokerAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A request/response channel to one broker.
///
/// A response must be received before the next request is sent on the same transport. A transport whose exchange was
/// abandoned halfway must be [closed](Self::close) before it is used again.
#[async_trait]
pub trait BrokerTransport: Debug + Send + Sync {
    /// The broker this transport talks to.
    fn address(&self) -> &BrokerAddress;

    /// (Re-)opens the underlying connection, dropping the current one if any.
    async fn connect(&mut self) -> Result<(), Error>;

    /// Writes a complete frame, including its length prefix.
    async fn send(&mut self, payload: &[u8]) -> Result<(), Error>;

    /// Reads the next frame and returns its bytes without the length prefix.
    async fn receive(&mut self) -> Result<Vec<u8>, Error>;

    /// Drops the underlying connection. The next send or receive reconnects.
    fn close(&mut self);
}

/// TCP connection to a single broker.
///
/// The socket is opened lazily and dropped on the first error, so the next use reconnects. Sending while the response
/// of the previous request is still unread reconnects as well.
pub struct BrokerConnection {
    address: BrokerAddress,
    timeout: Duration,
    max_message_size: usize,
    stream: Option<TcpStream>,

    /// A request went out and its response was not read yet
    in_flight: bool,
}

impl BrokerConnection {
    pub fn new(address: BrokerAddress, timeout: Duration, max_message_size: usize) -> Self {
        Self {
            address,
            timeout,
            max_message_size,
            stream: None,
            in_flight: false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn stream(&mut self) -> Result<&mut TcpStream, Error> {
        if self.stream.is_none() {
            self.connect().await?;
        }
        self.stream.as_mut().ok_or(Error::ConnectionReset)
    }
}

impl Debug for BrokerConnection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerConnection")
            .field("address", &self.address)
            .field("timeout", &self.timeout)
            .field("connected", &self.stream.is_some())
            .finish_non_exhaustive()
    }
}

impl Display for BrokerConnection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.address, f)
    }
}

impl PartialEq for BrokerConnection {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for BrokerConnection {}

impl PartialOrd for BrokerConnection {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BrokerConnection {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.address.cmp(&other.address)
    }
}

#[async_trait]
impl BrokerTransport for BrokerConnection {
    fn address(&self) -> &BrokerAddress {
        &self.address
    }

    async fn connect(&mut self) -> Result<(), Error> {
        self.stream = None;

        let port = u16::try_from(self.address.port).map_err(|_| Error::Connect {
            broker: self.address.clone(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "port out of range"),
        })?;

        debug!(broker=%self.address, "Connecting to broker");
        let stream = with_timeout(self.timeout, async {
            TcpStream::connect((self.address.host.as_str(), port))
                .await
                .map_err(|source| Error::Connect {
                    broker: self.address.clone(),
                    source,
                })
        })
        .await?;
        stream.set_nodelay(true)?;

        self.stream = Some(stream);
        Ok(())
    }

    async fn send(&mut self, payload: &[u8]) -> Result<(), Error> {
        // set before writing, a cancelled write leaves a partial frame behind
        if std::mem::replace(&mut self.in_flight, true) {
            debug!(broker=%self.address, "Previous response was never read, reconnecting");
            self.stream = None;
        }

        let timeout = self.timeout;
        let result = match self.stream().await {
            Ok(stream) => {
                with_timeout(timeout, async {
                    stream.write_all(payload).await?;
                    stream.flush().await?;
                    Ok::<_, Error>(())
                })
                .await
            }
            Err(e) => Err(e),
        };

        if result.is_err() {
            self.stream = None;
            self.in_flight = false;
        }
        result
    }

    async fn receive(&mut self) -> Result<Vec<u8>, Error> {
        let timeout = self.timeout;
        let max_message_size = self.max_message_size;
        let stream = self.stream().await?;

        let result = with_timeout(timeout, read_frame(stream, max_message_size)).await;

        self.in_flight = false;
        if result.is_err() {
            self.stream = None;
        }
        result
    }

    fn close(&mut self) {
        self.in_flight = false;
        if self.stream.take().is_some() {
            debug!(broker=%self.address, "Closed broker connection");
        }
    }
}

async fn with_timeout<T, F>(timeout: Duration, f: F) -> Result<T, Error>
where
    F: Future<Output = Result<T, Error>> + Send,
{
    match tokio::time::timeout(timeout, f).await {
        Ok(res) => res,
        Err(_) => Err(Error::Timeout(timeout)),
    }
}

/// Reads one length-prefixed frame.
///
/// `read_exact` loops over short reads, a zero-byte read before the frame is complete surfaces as
/// [`Error::ConnectionReset`].
pub(crate) async fn read_frame<R>(reader: &mut R, max_message_size: usize) -> Result<Vec<u8>, Error>
where
    R: AsyncRead + Send + Unpin,
{
    let mut len_buf = [0u8; LENGTH_PREFIX_SIZE];
    reader.read_exact(&mut len_buf).await?;

    let size = i32::from_be_bytes(len_buf);
    let len = usize::try_from(size)
        .ok()
        .filter(|len| *len <= max_message_size)
        .ok_or(Error::InvalidFrameSize {
            size,
            limit: max_message_size,
        })?;

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(buf)
}
