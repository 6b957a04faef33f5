#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once};

use kafka_basic::protocol::{
    api_key::ApiKey,
    error::Error as ApiError,
    messages::{
        FetchRequest, FetchResponse, FetchResponsePartition, FetchResponseTopic,
        ListOffsetsRequest, ListOffsetsResponse, ListOffsetsResponsePartition,
        ListOffsetsResponseTopic, MetadataRequest, MetadataResponse, MetadataResponseBroker,
        MetadataResponsePartition, MetadataResponseTopic, ProduceRequest, ProduceResponse,
        ProduceResponsePartition, ProduceResponseTopic, RequestHeader, ResponseHeader,
        EARLIEST_TIMESTAMP, LATEST_TIMESTAMP, LENGTH_PREFIX_SIZE,
    },
    record::MessageSet,
    traits::{ReadError, ReadType, WriteError, WriteType},
};
use kafka_basic::record::RecordAndOffset;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Environment variable to configure if integration tests should be run.
///
/// Accepts a boolean.
pub const ENV_TEST_INTEGRATION: &str = "TEST_INTEGRATION";

/// Environment variable that contains the list of bootstrap brokers.
pub const ENV_KAFKA_CONNECT: &str = "KAFKA_CONNECT";

static LOG_SETUP: Once = Once::new();

/// Enables debug logging if the `RUST_LOG` environment variable is set.
///
/// Does nothing if `RUST_LOG` is not set.
pub fn maybe_start_logging() {
    if std::env::var("RUST_LOG").is_ok() {
        start_logging()
    }
}

/// Start logging.
pub fn start_logging() {
    use tracing_subscriber::{filter::EnvFilter, util::SubscriberInitExt, FmtSubscriber};

    // also forwards `log` records, so there is no separate `LogTracer` to install
    LOG_SETUP.call_once(|| {
        FmtSubscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .finish()
            .init();
    })
}

/// Bootstrap brokers of a real cluster.
#[derive(Debug)]
pub struct TestConfig {
    pub bootstrap_brokers: Vec<String>,
}

/// Returns the [`TestConfig`] of a real cluster, or skips the test if none is configured.
///
/// Both `TEST_INTEGRATION` and `KAFKA_CONNECT` must be set, a `.env` file is honored.
#[macro_export]
macro_rules! maybe_skip_kafka_integration {
    () => {{
        use std::env;
        dotenvy::dotenv().ok();

        match (
            env::var($crate::test_helpers::ENV_TEST_INTEGRATION).is_ok(),
            env::var($crate::test_helpers::ENV_KAFKA_CONNECT).ok(),
        ) {
            (true, Some(kafka_connection)) => {
                let bootstrap_brokers = kafka_connection
                    .split(',')
                    .map(|s| s.trim().to_owned())
                    .collect();
                $crate::test_helpers::TestConfig { bootstrap_brokers }
            }
            (true, None) => {
                panic!(
                    "TEST_INTEGRATION is set which requires running integration tests, but \
                    KAFKA_CONNECT is not set. Please run Kafka, perhaps by using the command \
                    `docker-compose up kafka`, then set KAFKA_CONNECT to the host and port where \
                    Kafka is accessible. If running the `docker-compose` command and the Rust \
                    tests on the host, the value for `KAFKA_CONNECT` should be `localhost:9092`."
                )
            }
            (false, Some(_)) => {
                eprintln!("skipping Kafka integration tests - set TEST_INTEGRATION to run");
                return;
            }
            (false, None) => {
                eprintln!(
                    "skipping Kafka integration tests - set TEST_INTEGRATION and KAFKA_CONNECT to \
                    run"
                );
                return;
            }
        }
    }};
}

/// Generates a random topic name for testing.
pub fn random_topic_name() -> String {
    format!("test_topic_{}", uuid::Uuid::new_v4())
}

/// Partition logs of every topic, shared by all brokers of a [`MockCluster`].
#[derive(Debug, Default)]
struct Logs {
    topics: BTreeMap<String, Vec<Vec<RecordAndOffset>>>,
}

#[derive(Debug)]
struct MockBroker {
    node_id: i32,
    port: u16,
    offline: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

/// In-process cluster speaking the version 0 protocol over loopback TCP.
///
/// Every broker serves the same logs. Partition `p` is led by broker `p % n_brokers`, so a request routed to any
/// other broker is answered with `NotLeaderForPartition`. An offline broker accepts connections but drops them as
/// soon as a request arrives.
#[derive(Debug)]
pub struct MockCluster {
    brokers: Vec<MockBroker>,
    logs: Arc<Mutex<Logs>>,
}

impl MockCluster {
    pub async fn new(n_brokers: usize) -> Self {
        let logs = Arc::new(Mutex::new(Logs::default()));

        let mut listeners = vec![];
        for _ in 0..n_brokers {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let port = listener.local_addr().unwrap().port();
            listeners.push((listener, port));
        }

        let ports = listeners.iter().map(|(_, port)| *port).collect::<Vec<_>>();
        let brokers = listeners
            .into_iter()
            .enumerate()
            .map(|(node_id, (listener, port))| {
                let node_id = node_id as i32;
                let offline = Arc::new(AtomicBool::new(false));
                let state = BrokerState {
                    node_id,
                    ports: ports.clone(),
                    logs: Arc::clone(&logs),
                    offline: Arc::clone(&offline),
                };
                let task = tokio::spawn(accept_loop(listener, Arc::new(state)));

                MockBroker {
                    node_id,
                    port,
                    offline,
                    task,
                }
            })
            .collect();

        Self { brokers, logs }
    }

    /// Bootstrap list of all brokers, in node ID order.
    pub fn bootstrap_brokers(&self) -> Vec<String> {
        self.brokers
            .iter()
            .map(|b| format!("127.0.0.1:{}", b.port))
            .collect()
    }

    pub fn port(&self, node_id: i32) -> u16 {
        self.brokers[node_id as usize].port
    }

    pub fn create_topic(&self, name: &str, n_partitions: usize) {
        self.logs
            .lock()
            .topics
            .insert(name.to_string(), vec![vec![]; n_partitions]);
    }

    /// Values stored in a partition, in offset order.
    pub fn partition_values(&self, topic: &str, partition: i32) -> Vec<Vec<u8>> {
        self.logs.lock().topics[topic][partition as usize]
            .iter()
            .map(|r| r.record.value.clone().unwrap_or_default())
            .collect()
    }

    pub fn set_offline(&self, node_id: i32, offline: bool) {
        self.brokers[node_id as usize]
            .offline
            .store(offline, Ordering::SeqCst);
    }
}

impl Drop for MockCluster {
    fn drop(&mut self) {
        for broker in &self.brokers {
            broker.task.abort();
        }
    }
}

#[derive(Debug)]
struct BrokerState {
    node_id: i32,
    ports: Vec<u16>,
    logs: Arc<Mutex<Logs>>,
    offline: Arc<AtomicBool>,
}

async fn accept_loop(listener: TcpListener, state: Arc<BrokerState>) {
    loop {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        tokio::spawn(serve(stream, Arc::clone(&state)));
    }
}

async fn serve(mut stream: TcpStream, state: Arc<BrokerState>) {
    loop {
        let mut len = [0u8; LENGTH_PREFIX_SIZE];
        if stream.read_exact(&mut len).await.is_err() {
            return;
        }
        let mut frame = vec![0u8; i32::from_be_bytes(len) as usize];
        if stream.read_exact(&mut frame).await.is_err() {
            return;
        }

        if state.offline.load(Ordering::SeqCst) {
            return;
        }

        let response = match state.handle(frame) {
            Ok(response) => response,
            Err(e) => panic!("mock broker cannot handle request: {e}"),
        };
        if stream.write_all(&response).await.is_err() {
            return;
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum MockError {
    #[error(transparent)]
    Read(#[from] ReadError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error("unsupported API {0:?}")]
    Unsupported(ApiKey),
}

impl BrokerState {
    fn handle(&self, frame: Vec<u8>) -> Result<Vec<u8>, MockError> {
        let mut reader = Cursor::new(frame);
        let header = RequestHeader::read(&mut reader)?;

        let mut buf = vec![0u8; LENGTH_PREFIX_SIZE];
        ResponseHeader {
            correlation_id: header.correlation_id,
        }
        .write(&mut buf)?;

        match header.request_api_key {
            ApiKey::Metadata => self
                .metadata(MetadataRequest::read(&mut reader)?)
                .write(&mut buf)?,
            ApiKey::Produce => self
                .produce(ProduceRequest::read(&mut reader)?)?
                .write(&mut buf)?,
            ApiKey::Fetch => self
                .fetch(FetchRequest::read(&mut reader)?)?
                .write(&mut buf)?,
            ApiKey::ListOffsets => self
                .list_offsets(ListOffsetsRequest::read(&mut reader)?)
                .write(&mut buf)?,
            other => return Err(MockError::Unsupported(other)),
        }

        let len = (buf.len() - LENGTH_PREFIX_SIZE) as i32;
        buf[..LENGTH_PREFIX_SIZE].copy_from_slice(&len.to_be_bytes());
        Ok(buf)
    }

    fn leader(&self, partition: i32) -> i32 {
        partition % self.ports.len() as i32
    }

    /// Error to answer a partition request with, `None` if this broker leads the partition.
    fn check_partition(&self, logs: &Logs, topic: &str, partition: i32) -> Option<ApiError> {
        let n_partitions = logs.topics.get(topic).map(|p| p.len()).unwrap_or_default();
        if partition < 0 || partition as usize >= n_partitions {
            Some(ApiError::UnknownTopicOrPartition)
        } else if self.leader(partition) != self.node_id {
            Some(ApiError::NotLeaderForPartition)
        } else {
            None
        }
    }

    fn metadata(&self, request: MetadataRequest) -> MetadataResponse {
        let logs = self.logs.lock();

        let brokers = self
            .ports
            .iter()
            .enumerate()
            .map(|(node_id, port)| MetadataResponseBroker {
                node_id: node_id as i32,
                host: "127.0.0.1".to_string(),
                port: *port as i32,
            })
            .collect();

        let names: Vec<String> = if request.topics.is_empty() {
            logs.topics.keys().cloned().collect()
        } else {
            request.topics
        };
        let topics = names
            .into_iter()
            .map(|name| match logs.topics.get(&name) {
                Some(partitions) => MetadataResponseTopic {
                    error: None,
                    name,
                    partitions: (0..partitions.len() as i32)
                        .map(|partition_index| {
                            let leader = self.leader(partition_index);
                            MetadataResponsePartition {
                                error: None,
                                partition_index,
                                leader_id: leader,
                                replica_nodes: vec![leader],
                                isr_nodes: vec![leader],
                            }
                        })
                        .collect(),
                },
                None => MetadataResponseTopic {
                    error: Some(ApiError::UnknownTopicOrPartition),
                    name,
                    partitions: vec![],
                },
            })
            .collect();

        MetadataResponse { brokers, topics }
    }

    fn produce(&self, request: ProduceRequest) -> Result<ProduceResponse, MockError> {
        let mut logs = self.logs.lock();

        let mut topics = vec![];
        for topic in request.topics {
            let mut partitions = vec![];
            for p in topic.partitions {
                let mut response = ProduceResponsePartition {
                    partition_index: p.partition_index,
                    error: self.check_partition(&logs, &topic.name, p.partition_index),
                    base_offset: -1,
                };

                if response.error.is_none() {
                    let records = p.records.iter().collect::<Result<Vec<_>, _>>()?;
                    let log = &mut logs
                        .topics
                        .get_mut(&topic.name)
                        .expect("checked above")[p.partition_index as usize];

                    response.base_offset = log.len() as i64;
                    for r in records {
                        let offset = log.len() as i64;
                        log.push(RecordAndOffset {
                            record: r.record,
                            offset,
                        });
                    }
                }

                partitions.push(response);
            }
            topics.push(ProduceResponseTopic {
                name: topic.name,
                partitions,
            });
        }

        Ok(ProduceResponse { topics })
    }

    fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, MockError> {
        let logs = self.logs.lock();

        let mut responses = vec![];
        for topic in request.topics {
            let mut partitions = vec![];
            for p in topic.partitions {
                let mut response = FetchResponsePartition {
                    partition_index: p.partition,
                    error_code: self.check_partition(&logs, &topic.topic, p.partition),
                    high_watermark: -1,
                    records: MessageSet::default(),
                };

                if response.error_code.is_none() {
                    let log = &logs.topics[&topic.topic][p.partition as usize];
                    response.high_watermark = log.len() as i64;

                    if p.fetch_offset < 0 || p.fetch_offset > log.len() as i64 {
                        response.error_code = Some(ApiError::OffsetOutOfRange);
                    } else {
                        let set = MessageSet::from_records(&log[p.fetch_offset as usize..])?;

                        // like a real broker, cut off at the byte limit even within a message
                        let mut bytes = set.as_bytes().to_vec();
                        bytes.truncate(p.partition_max_bytes.max(0) as usize);
                        response.records = MessageSet::from_bytes(bytes);
                    }
                }

                partitions.push(response);
            }
            responses.push(FetchResponseTopic {
                topic: topic.topic,
                partitions,
            });
        }

        Ok(FetchResponse { responses })
    }

    fn list_offsets(&self, request: ListOffsetsRequest) -> ListOffsetsResponse {
        let logs = self.logs.lock();

        let topics = request
            .topics
            .into_iter()
            .map(|topic| {
                let partitions = topic
                    .partitions
                    .into_iter()
                    .map(|p| {
                        let error_code = self.check_partition(&logs, &topic.name, p.partition_index);
                        let mut offsets = vec![];
                        if error_code.is_none() {
                            let len = logs.topics[&topic.name][p.partition_index as usize].len();
                            offsets = match p.timestamp {
                                LATEST_TIMESTAMP => vec![len as i64, 0],
                                EARLIEST_TIMESTAMP => vec![0],
                                _ => vec![0],
                            };
                            offsets.truncate(p.max_num_offsets.max(0) as usize);
                        }

                        ListOffsetsResponsePartition {
                            partition_index: p.partition_index,
                            error_code,
                            offsets,
                        }
                    })
                    .collect();

                ListOffsetsResponseTopic {
                    name: topic.name,
                    partitions,
                }
            })
            .collect();

        ListOffsetsResponse { topics }
    }
}
