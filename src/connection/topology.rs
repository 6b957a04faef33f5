use std::collections::{BTreeMap, HashMap};
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::connection::BrokerAddress;
use crate::protocol::messages::{MetadataResponse, MetadataResponseBroker};
use crate::topic::{Partition, Topic, TopicPartition};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Broker {
    /// broker ID from the topology metadata
    pub id: i32,
    pub host: String,
    pub port: i32,
}

impl Broker {
    pub fn address(&self) -> BrokerAddress {
        BrokerAddress::new(self.host.clone(), self.port)
    }
}

impl Display for Broker {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl<'a> From<&'a MetadataResponseBroker> for Broker {
    fn from(b: &'a MetadataResponseBroker) -> Self {
        Self {
            id: b.node_id,
            host: b.host.clone(),
            port: b.port,
        }
    }
}

/// Immutable snapshot of the cluster as seen by one metadata response.
///
/// A snapshot is never patched; every refresh builds a new one.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ClusterView {
    /// Brokers keyed by broker ID
    brokers: BTreeMap<i32, Broker>,

    /// Topics keyed by name
    topics: BTreeMap<String, Topic>,

    /// Current leader of every partition that has one
    leaders: HashMap<TopicPartition, Broker>,
}

impl ClusterView {
    pub fn from_metadata(response: &MetadataResponse) -> Self {
        let brokers: BTreeMap<i32, Broker> = response
            .brokers
            .iter()
            .map(|b| (b.node_id, Broker::from(b)))
            .collect();

        let mut topics = BTreeMap::new();
        let mut leaders = HashMap::new();

        for topic in &response.topics {
            if topic.partitions.is_empty() {
                debug!(topic=%topic.name, error=?topic.error, "Skipping topic without partitions");
                continue;
            }

            let mut partitions = BTreeMap::new();
            for p in &topic.partitions {
                // a leader the response does not describe is as good as none
                let leader = p.leader().and_then(|id| brokers.get(&id));
                if let Some(leader) = leader {
                    leaders.insert(
                        TopicPartition::new(topic.name.clone(), p.partition_index),
                        leader.clone(),
                    );
                }

                partitions.insert(
                    p.partition_index,
                    Partition {
                        leader_id: leader.map(|b| b.id),
                        replica_nodes: p.replica_nodes.clone(),
                        isr_nodes: p.isr_nodes.clone(),
                    },
                );
            }

            topics.insert(
                topic.name.clone(),
                Topic {
                    name: topic.name.clone(),
                    partitions,
                },
            );
        }

        Self {
            brokers,
            topics,
            leaders,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.brokers.is_empty() && self.topics.is_empty()
    }

    /// Returns the broker for the provided broker ID
    pub fn broker(&self, broker_id: i32) -> Option<&Broker> {
        self.brokers.get(&broker_id)
    }

    /// Returns all brokers ordered by ID
    pub fn brokers(&self) -> impl Iterator<Item = &Broker> {
        self.brokers.values()
    }

    pub fn topic(&self, name: &str) -> Option<&Topic> {
        self.topics.get(name)
    }

    /// Returns all topics ordered by name
    pub fn topics(&self) -> impl Iterator<Item = &Topic> {
        self.topics.values()
    }

    pub fn partition(&self, topic: &str, partition: i32) -> Option<&Partition> {
        self.topic(topic)?.partitions.get(&partition)
    }

    /// Returns the partition IDs of a topic in ascending order, empty if the topic is unknown.
    pub fn topic_partitions(&self, topic: &str) -> Vec<i32> {
        self.topic(topic)
            .map(|t| t.partitions.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Returns the current leader of a partition.
    pub fn leader(&self, tp: &TopicPartition) -> Option<&Broker> {
        self.leaders.get(tp)
    }

    fn log_changes(&self, previous: &Self) {
        for (id, broker) in &self.brokers {
            match previous.brokers.get(id) {
                Some(current) if current != broker => {
                    info!(
                        broker=id,
                        current=%current,
                        new=%broker,
                        "Broker update",
                    );
                }
                Some(_) => {}
                None => {
                    info!(
                        broker=id,
                        new=%broker,
                        "New broker",
                    );
                }
            }
        }

        for (id, broker) in &previous.brokers {
            if !self.brokers.contains_key(id) {
                info!(
                    broker=id,
                    current=%broker,
                    "Broker gone",
                );
            }
        }

        for (tp, leader) in &self.leaders {
            if let Some(current) = previous.leaders.get(tp) {
                if current.id != leader.id {
                    info!(
                        topic=%tp.topic,
                        partition=tp.partition,
                        current=current.id,
                        new=leader.id,
                        "Leader update",
                    );
                }
            }
        }
    }
}

/// Holder of the current [`ClusterView`].
///
/// Readers get a consistent snapshot; an update swaps the whole snapshot at once.
#[derive(Debug, Default)]
pub struct ClusterTopology {
    current: RwLock<Arc<ClusterView>>,
}

impl ClusterTopology {
    pub fn is_empty(&self) -> bool {
        self.current.read().is_empty()
    }

    /// Returns the current snapshot
    pub fn get(&self) -> Arc<ClusterView> {
        Arc::clone(&*self.current.read())
    }

    /// Replaces the current snapshot
    pub fn update(&self, view: ClusterView) {
        let mut current = self.current.write();
        view.log_changes(&current);
        *current = Arc::new(view);
    }
}
