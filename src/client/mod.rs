use std::io::Cursor;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{
    build_info::DEFAULT_CLIENT_ID,
    connection::{
        self,
        topology::{Broker, ClusterTopology, ClusterView},
        BrokerAddress, BrokerConnection, BrokerTransport, DEFAULT_SOCKET_TIMEOUT,
    },
    protocol::{
        messages::{
            decode_response, encode_request, FetchRequest, FetchRequestPartition,
            FetchRequestTopic, ListOffsetsRequest, ListOffsetsRequestPartition,
            ListOffsetsRequestTopic, MetadataRequest, ProduceRequest, ProduceRequestPartition,
            ProduceRequestTopic, RequestBody, CONSUMER_REPLICA_ID, EARLIEST_TIMESTAMP,
            LATEST_TIMESTAMP, LENGTH_PREFIX_SIZE,
        },
        record::MessageSet,
        traits::{ReadType, WriteType},
    },
    record::{Record, RecordAndOffset},
    topic::{Topic, TopicPartition},
};

pub mod checkpoint;
pub mod consumer;
pub mod error;
pub mod producer;

use error::{Error, RequestContext, Result};

/// Default maximum size of a response frame.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 100 * 1024 * 1024; // 100MB

/// Default time the broker may wait for `min_bytes` to accumulate in a fetch.
pub const DEFAULT_FETCH_MAX_WAIT_MS: i32 = 100;

/// Default amount of data a fetch waits for.
pub const DEFAULT_FETCH_MIN_BYTES: i32 = 4096;

/// Default number of acknowledgements a produce request waits for.
pub const DEFAULT_PRODUCE_ACKS: i16 = 1;

/// Default time the broker may take to gather acknowledgements.
pub const DEFAULT_PRODUCE_TIMEOUT_MS: i32 = 1000;

/// Which offset to look up with [`Client::get_offset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetAt {
    /// Earliest existing record.
    ///
    /// This is NOT the earliest produced record but the earliest record that is still kept, i.e. the offset might
    /// change if records are pruned by Kafka (e.g. due to a retention policy).
    Earliest,

    /// The offset that the next produced record will get.
    Latest,

    /// Offsets of the log segments starting at or before the given time.
    Timestamp(DateTime<Utc>),
}

impl OffsetAt {
    fn timestamp(&self) -> i64 {
        match self {
            Self::Earliest => EARLIEST_TIMESTAMP,
            Self::Latest => LATEST_TIMESTAMP,
            Self::Timestamp(ts) => ts.timestamp_millis(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RequestSettings {
    fetch_max_wait_ms: i32,
    fetch_min_bytes: i32,
    produce_acks: i16,
    produce_timeout_ms: i32,
}

impl Default for RequestSettings {
    fn default() -> Self {
        Self {
            fetch_max_wait_ms: DEFAULT_FETCH_MAX_WAIT_MS,
            fetch_min_bytes: DEFAULT_FETCH_MIN_BYTES,
            produce_acks: DEFAULT_PRODUCE_ACKS,
            produce_timeout_ms: DEFAULT_PRODUCE_TIMEOUT_MS,
        }
    }
}

/// Builder for [`Client`].
pub struct ClientBuilder {
    bootstrap_brokers: Vec<String>,
    client_id: Option<Arc<str>>,
    socket_timeout: Duration,
    max_message_size: usize,
    settings: RequestSettings,
}

impl ClientBuilder {
    /// Create a new [`ClientBuilder`] with the list of bootstrap brokers, given as `host:port`.
    ///
    /// The list is the complete set of brokers the client will ever talk to, in the order they are tried.
    pub fn new(bootstrap_brokers: Vec<String>) -> Self {
        Self {
            bootstrap_brokers,
            client_id: None,
            socket_timeout: DEFAULT_SOCKET_TIMEOUT,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            settings: RequestSettings::default(),
        }
    }

    /// Sets client ID.
    pub fn client_id(mut self, client_id: impl Into<Arc<str>>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Timeout for connecting to a broker and for every single send or receive.
    pub fn socket_timeout(mut self, timeout: Duration) -> Self {
        self.socket_timeout = timeout;
        self
    }

    /// Set maximum size (in bytes) of message frames that can be received from a broker.
    ///
    /// Setting this too small will result in failures all over the place since metadata requests cannot be handled
    /// any longer.
    pub fn max_message_size(mut self, max_message_size: usize) -> Self {
        self.max_message_size = max_message_size;
        self
    }

    /// Maximum time in milliseconds the broker may block a fetch waiting for data.
    pub fn fetch_max_wait_ms(mut self, max_wait_ms: i32) -> Self {
        self.settings.fetch_max_wait_ms = max_wait_ms;
        self
    }

    /// Minimum number of bytes the broker accumulates before answering a fetch.
    pub fn fetch_min_bytes(mut self, min_bytes: i32) -> Self {
        self.settings.fetch_min_bytes = min_bytes;
        self
    }

    /// Number of acknowledgements a produce request waits for, `-1` for the full ISR.
    ///
    /// `0` is not supported: the broker does not answer such requests, so every produce would time out.
    pub fn produce_acks(mut self, acks: i16) -> Self {
        self.settings.produce_acks = acks;
        self
    }

    /// Time in milliseconds the broker may take to gather the acknowledgements.
    pub fn produce_timeout_ms(mut self, timeout_ms: i32) -> Self {
        self.settings.produce_timeout_ms = timeout_ms;
        self
    }

    /// Build [`Client`] and load the cluster metadata.
    pub async fn build(self) -> Result<Client> {
        let transports = self
            .bootstrap_brokers
            .iter()
            .map(|broker| {
                let address = BrokerAddress::parse(broker)
                    .ok_or_else(|| Error::InvalidBrokerAddress(broker.clone()))?;
                Ok(Box::new(BrokerConnection::new(
                    address,
                    self.socket_timeout,
                    self.max_message_size,
                )) as Box<dyn BrokerTransport>)
            })
            .collect::<Result<Vec<_>>>()?;

        let client = self.build_with_transports(transports);
        client.refresh_metadata().await?;

        Ok(client)
    }

    /// Build [`Client`] over the given transports, without contacting any broker.
    pub fn build_with_transports(self, transports: Vec<Box<dyn BrokerTransport>>) -> Client {
        Client {
            transports: Mutex::new(transports),
            topology: ClusterTopology::default(),
            correlation_id: AtomicI32::new(0),
            client_id: self
                .client_id
                .unwrap_or_else(|| Arc::from(DEFAULT_CLIENT_ID)),
            settings: self.settings,
        }
    }
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder").finish_non_exhaustive()
    }
}

/// Top-level cluster-wide client.
///
/// Keeps the current [`ClusterView`] and routes per-partition requests to the partition leader. Requests are
/// strictly sequential: the connection list stays locked from sending a request until its response arrived.
///
/// Must be constructed using [`ClientBuilder`] or [`Client::from_transports`].
#[derive(Debug)]
pub struct Client {
    transports: Mutex<Vec<Box<dyn BrokerTransport>>>,
    topology: ClusterTopology,
    correlation_id: AtomicI32,
    client_id: Arc<str>,
    settings: RequestSettings,
}

impl Client {
    /// Creates a client with default settings over the given transports, without contacting any broker.
    pub fn from_transports(transports: Vec<Box<dyn BrokerTransport>>) -> Self {
        ClientBuilder::new(vec![]).build_with_transports(transports)
    }

    /// Returns the current cluster snapshot.
    pub fn view(&self) -> Arc<ClusterView> {
        self.topology.get()
    }

    /// Returns a list of brokers from cluster topology
    pub fn brokers(&self) -> Vec<Broker> {
        self.topology.get().brokers().cloned().collect()
    }

    /// Returns a list of topics in the cluster, as of the last metadata refresh.
    pub fn list_topics(&self) -> Vec<Topic> {
        self.topology.get().topics().cloned().collect()
    }

    /// Returns the partition IDs of a topic in ascending order, empty if the topic is unknown.
    pub fn topic_partitions(&self, topic: &str) -> Vec<i32> {
        self.topology.get().topic_partitions(topic)
    }

    /// Asks any reachable broker for the metadata of all topics and replaces the cluster view.
    ///
    /// The current view is kept if this fails.
    pub async fn refresh_metadata(&self) -> Result<()> {
        let response = self
            .request(&MetadataRequest { topics: vec![] }, None)
            .await?;

        self.topology.update(ClusterView::from_metadata(&response));
        Ok(())
    }

    /// Returns the current leader of a partition.
    pub fn leader_for(&self, topic: &str, partition: i32) -> Result<Broker> {
        let view = self.topology.get();
        let tp = TopicPartition::new(topic, partition);

        if view.partition(topic, partition).is_none() {
            return Err(Error::UnknownTopicPartition(tp));
        }

        view.leader(&tp)
            .cloned()
            .ok_or(Error::LeaderNotAvailable(tp))
    }

    /// Sends a raw request frame and returns the raw response frame.
    ///
    /// Connections are tried in the configured order. If `target` is given, only connections to that broker are
    /// tried. A connection that fails is skipped; if the peer reset it, a reconnect is attempted first so that the
    /// next request finds it usable. A response carrying another correlation ID than `request` counts as a failure
    /// of that connection, which is closed.
    ///
    /// Dropping the returned future between sending the request and reading the response closes the connection in
    /// use, so the unread response cannot be taken for the answer to a later request.
    pub async fn route_and_send(
        &self,
        request: &[u8],
        target: Option<&BrokerAddress>,
    ) -> Result<Vec<u8>> {
        let mut transports = self.transports.lock().await;
        let mut last_error = None;

        for transport in transports.iter_mut() {
            if let Some(target) = target {
                if transport.address() != target {
                    continue;
                }
            }

            let res = exchange(transport.as_mut(), request).await;

            match res {
                Ok(response) => return Ok(response),
                Err(e) => {
                    warn!(
                        broker=%transport.address(),
                        e=%e,
                        "Broker request failed, trying next connection",
                    );

                    if e.is_reset() {
                        if let Err(e) = transport.connect().await {
                            warn!(broker=%transport.address(), e=%e, "Reconnect failed");
                        }
                    } else if matches!(e, connection::Error::CorrelationIdMismatch { .. }) {
                        transport.close();
                    }

                    last_error = Some(e);
                }
            }
        }

        Err(Error::NoBrokerReachable {
            target: target.cloned(),
            last_error,
        })
    }

    /// Fetches the records of a partition starting at `offset`.
    ///
    /// Returns the records and the high watermark of the partition. A message cut off at the end of the response is
    /// dropped; if not even the first message fits into `max_bytes`, this fails with
    /// [`ReadError::FetchBufferTooSmall`](crate::protocol::traits::ReadError::FetchBufferTooSmall).
    pub async fn fetch(
        &self,
        topic: &str,
        partition: i32,
        offset: i64,
        max_bytes: i32,
    ) -> Result<(Vec<RecordAndOffset>, i64)> {
        if self.topology.is_empty() {
            self.refresh_metadata().await?;
        }
        let leader = self.leader_for(topic, partition)?;

        let request = FetchRequest {
            replica_id: CONSUMER_REPLICA_ID,
            max_wait_ms: self.settings.fetch_max_wait_ms,
            min_bytes: self.settings.fetch_min_bytes,
            topics: vec![FetchRequestTopic {
                topic: topic.to_string(),
                partitions: vec![FetchRequestPartition {
                    partition,
                    fetch_offset: offset,
                    partition_max_bytes: max_bytes,
                }],
            }],
        };
        let response = self.request(&request, Some(&leader.address())).await?;

        let partition_response = response
            .responses
            .into_iter()
            .filter(|t| t.topic == topic)
            .flat_map(|t| t.partitions)
            .find(|p| p.partition_index == partition)
            .ok_or_else(|| {
                Error::InvalidResponse(format!("no fetch result for {topic}/{partition}"))
            })?;

        if let Some(protocol_error) = partition_response.error_code {
            return Err(Error::ServerError {
                protocol_error,
                request: RequestContext::Partition(topic.to_string(), partition),
            });
        }

        let records = partition_response
            .records
            .iter()
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            topic,
            partition,
            offset,
            n_records = records.len(),
            high_watermark = partition_response.high_watermark,
            "Fetched records",
        );
        Ok((records, partition_response.high_watermark))
    }

    /// Appends records to a partition and returns the offset of the first one.
    pub async fn produce(&self, topic: &str, partition: i32, records: Vec<Record>) -> Result<i64> {
        let leader = self.leader_for(topic, partition)?;

        // the broker assigns the real offsets
        let records = records
            .into_iter()
            .map(|record| RecordAndOffset { record, offset: 0 })
            .collect::<Vec<_>>();

        let request = ProduceRequest {
            acks: self.settings.produce_acks,
            timeout_ms: self.settings.produce_timeout_ms,
            topics: vec![ProduceRequestTopic {
                name: topic.to_string(),
                partitions: vec![ProduceRequestPartition {
                    partition_index: partition,
                    records: MessageSet::from_records(&records)?,
                }],
            }],
        };
        let response = self.request(&request, Some(&leader.address())).await?;

        let partition_response = response
            .topics
            .into_iter()
            .filter(|t| t.name == topic)
            .flat_map(|t| t.partitions)
            .find(|p| p.partition_index == partition)
            .ok_or_else(|| {
                Error::InvalidResponse(format!("no produce result for {topic}/{partition}"))
            })?;

        if let Some(protocol_error) = partition_response.error {
            return Err(Error::ServerError {
                protocol_error,
                request: RequestContext::Partition(topic.to_string(), partition),
            });
        }

        debug!(
            topic,
            partition,
            n_records = records.len(),
            n_bytes = records
                .iter()
                .map(|r| r.record.approximate_size())
                .sum::<usize>(),
            base_offset = partition_response.base_offset,
            "Produced records",
        );
        Ok(partition_response.base_offset)
    }

    /// Looks up up to `max_offsets` offsets of a partition, newest first.
    pub async fn get_offset(
        &self,
        topic: &str,
        partition: i32,
        at: OffsetAt,
        max_offsets: i32,
    ) -> Result<Vec<i64>> {
        let leader = self.leader_for(topic, partition)?;

        let request = ListOffsetsRequest {
            replica_id: CONSUMER_REPLICA_ID,
            topics: vec![ListOffsetsRequestTopic {
                name: topic.to_string(),
                partitions: vec![ListOffsetsRequestPartition {
                    partition_index: partition,
                    timestamp: at.timestamp(),
                    max_num_offsets: max_offsets,
                }],
            }],
        };
        let response = self.request(&request, Some(&leader.address())).await?;

        let partition_response = response
            .topics
            .into_iter()
            .filter(|t| t.name == topic)
            .flat_map(|t| t.partitions)
            .find(|p| p.partition_index == partition)
            .ok_or_else(|| {
                Error::InvalidResponse(format!("no offsets for {topic}/{partition}"))
            })?;

        if let Some(protocol_error) = partition_response.error_code {
            return Err(Error::ServerError {
                protocol_error,
                request: RequestContext::Partition(topic.to_string(), partition),
            });
        }

        Ok(partition_response.offsets)
    }

    /// Drops every broker connection. They are re-opened on next use.
    pub async fn close(&self) {
        for transport in self.transports.lock().await.iter_mut() {
            transport.close();
        }
    }

    fn next_correlation_id(&self) -> i32 {
        self.correlation_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn request<B>(&self, body: &B, target: Option<&BrokerAddress>) -> Result<B::ResponseBody>
    where
        B: RequestBody + WriteType<Vec<u8>> + Sync,
        B::ResponseBody: ReadType<Cursor<Vec<u8>>>,
    {
        let correlation_id = self.next_correlation_id();
        let request = encode_request(correlation_id, &self.client_id, body)?;

        debug!(
            api_key=?B::API_KEY,
            correlation_id,
            target=?target.map(|t| t.to_string()),
            "Sending request",
        );
        let frame = self.route_and_send(&request, target).await?;

        let (_header, response) = decode_response::<B>(frame)?;
        Ok(response)
    }
}

/// Position of the correlation ID in a request frame, behind the size, API key and API version.
const REQUEST_CORRELATION_ID_OFFSET: usize = LENGTH_PREFIX_SIZE + 4;

fn correlation_id_at(frame: &[u8], offset: usize) -> Option<i32> {
    let bytes = frame.get(offset..offset + 4)?.try_into().ok()?;
    Some(i32::from_be_bytes(bytes))
}

/// Closes a transport whose request went out but whose response was not read.
struct InFlight<'a> {
    transport: &'a mut dyn BrokerTransport,
    done: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.done {
            warn!(broker=%self.transport.address(), "Request abandoned, closing connection");
            self.transport.close();
        }
    }
}

/// Sends one request frame and reads its response over `transport`.
async fn exchange(
    transport: &mut dyn BrokerTransport,
    request: &[u8],
) -> Result<Vec<u8>, connection::Error> {
    let mut in_flight = InFlight {
        transport,
        done: false,
    };

    let res = match in_flight.transport.send(request).await {
        Ok(()) => in_flight.transport.receive().await,
        Err(e) => Err(e),
    };
    in_flight.done = true;
    let response = res?;

    // frames too short to carry an ID fail to decode later on
    if let (Some(expected), Some(actual)) = (
        correlation_id_at(request, REQUEST_CORRELATION_ID_OFFSET),
        correlation_id_at(&response, 0),
    ) {
        if expected != actual {
            return Err(connection::Error::CorrelationIdMismatch { expected, actual });
        }
    }

    Ok(response)
}
