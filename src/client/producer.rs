//! Round-robin producer for a single topic.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::error;

use crate::client::{
    error::{Error, ProtocolError, Result},
    Client,
};
use crate::record::Record;

/// Outcome of producing the records assigned to one partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducedBatch {
    pub partition: i32,

    /// Number of records in the batch.
    pub n_records: usize,

    /// Offset of the first record, or the error the broker answered with.
    pub result: Result<i64, ProtocolError>,
}

/// Spreads records over the partitions of a topic in round-robin order.
///
/// The partitions are fixed when the producer is created; the cursor carries over from one batch to the next.
#[derive(Debug)]
pub struct Producer {
    client: Arc<Client>,
    topic: String,
    partitions: Vec<i32>,
    cursor: usize,
}

impl Producer {
    /// Creates a producer for the partitions of `topic` in the client's current cluster view.
    pub fn new(client: Arc<Client>, topic: impl Into<String>) -> Result<Self> {
        let topic = topic.into();
        let partitions = client.topic_partitions(&topic);
        if partitions.is_empty() {
            return Err(Error::UnknownTopic(topic));
        }

        Ok(Self {
            client,
            topic,
            partitions,
            cursor: 0,
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn partitions(&self) -> &[i32] {
        &self.partitions
    }

    /// Assigns each value to the next partition, wrapped in an uncompressed record without key.
    ///
    /// Partitions that get no value are absent from the result.
    pub fn assign<I, V>(&mut self, values: I) -> BTreeMap<i32, Vec<Record>>
    where
        I: IntoIterator<Item = V>,
        V: Into<Vec<u8>>,
    {
        let mut assigned: BTreeMap<i32, Vec<Record>> = BTreeMap::new();
        for value in values {
            let partition = self.partitions[self.cursor];
            self.cursor = (self.cursor + 1) % self.partitions.len();
            assigned
                .entry(partition)
                .or_default()
                .push(Record::new(value));
        }
        assigned
    }

    /// Sends the values with one produce request per partition that got any.
    ///
    /// Errors reported by the broker for a partition are logged and returned in the batch result; transport and
    /// decoding errors abort the call.
    pub async fn send<I, V>(&mut self, values: I) -> Result<Vec<ProducedBatch>>
    where
        I: IntoIterator<Item = V>,
        V: Into<Vec<u8>>,
    {
        let assigned = self.assign(values);

        let mut batches = Vec::with_capacity(assigned.len());
        for (partition, records) in assigned {
            let n_records = records.len();
            let result = match self.client.produce(&self.topic, partition, records).await {
                Ok(base_offset) => Ok(base_offset),
                Err(Error::ServerError { protocol_error, .. }) => {
                    error!(
                        topic=%self.topic,
                        partition,
                        n_records,
                        e=%protocol_error,
                        "Broker rejected records",
                    );
                    Err(protocol_error)
                }
                Err(e) => return Err(e),
            };

            batches.push(ProducedBatch {
                partition,
                n_records,
                result,
            });
        }

        Ok(batches)
    }
}
