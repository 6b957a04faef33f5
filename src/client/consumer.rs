//! At-least-once consumption of a single topic.
//!
//! Offsets move in two steps. [`Consumer::fetch`] records where the next read would start as *pending*; only the
//! next call to [`Consumer::fetch`] (or an explicit [`Consumer::commit`]) promotes the pending offsets to
//! *committed*. A caller that could not process a batch calls [`Consumer::rollback`] and gets the same records
//! again. Committed offsets of a group survive restarts through a [checkpoint file](crate::client::checkpoint).
//!
//! # Usage
//! ```no_run
//! # async fn test() {
//! use std::sync::Arc;
//!
//! use kafka_basic::client::{consumer::ConsumerBuilder, ClientBuilder};
//!
//! let client = ClientBuilder::new(vec!["localhost:9092".to_string()])
//!     .build()
//!     .await
//!     .unwrap();
//!
//! let mut consumer = ConsumerBuilder::new(Arc::new(client), "my_topic")
//!     .group("my_group")
//!     .build();
//!
//! let records = consumer.fetch().await.unwrap();
//! for r in &records {
//!     println!("{}: {:?}", r.offset, r.record.value);
//! }
//!
//! consumer.close().await.unwrap();
//! # }
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::client::{
    checkpoint::{self, PartitionOffsets},
    error::{Error, Result},
    Client, OffsetAt,
};
use crate::record::RecordAndOffset;

/// File name of the default checkpoint file, located in the home directory.
pub const DEFAULT_CHECKPOINT_FILE: &str = ".kafka-consumer.offsets";

/// Default maximum number of bytes fetched per partition.
pub const DEFAULT_MAX_BYTES: i32 = 16 * 1024 * 1024; // 16MiB

/// Where a consumer starts reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SeekPolicy {
    /// Resume from the checkpoint of the consumer group, the beginning of every partition without one.
    #[default]
    Saved,

    /// Beginning of every partition.
    Head,

    /// Current end of every partition, i.e. only records produced from now on.
    Tail,
}

/// Builder for [`Consumer`].
#[derive(Debug)]
pub struct ConsumerBuilder {
    client: Arc<Client>,
    topic: String,
    group: Option<String>,
    fail_fast: bool,
    seek_policy: SeekPolicy,
    checkpoint_path: Option<PathBuf>,
    max_bytes: i32,
}

impl ConsumerBuilder {
    pub fn new(client: Arc<Client>, topic: impl Into<String>) -> Self {
        Self {
            client,
            topic: topic.into(),
            group: None,
            fail_fast: false,
            seek_policy: SeekPolicy::default(),
            checkpoint_path: None,
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }

    /// Consumer group, offsets are only persisted with a group.
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Abort [`Consumer::fetch`] on the first partition that fails, and treat an unreadable checkpoint as fatal.
    ///
    /// Otherwise failing partitions are logged and retried by the next fetch.
    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Where to start reading when the first fetch happens.
    pub fn seek_policy(mut self, seek_policy: SeekPolicy) -> Self {
        self.seek_policy = seek_policy;
        self
    }

    /// Checkpoint file, defaults to [`DEFAULT_CHECKPOINT_FILE`] in the home directory.
    pub fn checkpoint_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.checkpoint_path = Some(path.into());
        self
    }

    /// Maximum number of bytes fetched per partition and round.
    ///
    /// Must be larger than the largest record of the topic.
    pub fn max_bytes(mut self, max_bytes: i32) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn build(self) -> Consumer {
        let checkpoint_path = self.checkpoint_path.unwrap_or_else(default_checkpoint_path);

        Consumer {
            client: self.client,
            topic: self.topic,
            group: self.group,
            fail_fast: self.fail_fast,
            seek_policy: self.seek_policy,
            checkpoint_path,
            max_bytes: self.max_bytes,
            offsets: PartitionOffsets::new(),
            pending: PartitionOffsets::new(),
        }
    }
}

fn default_checkpoint_path() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_default()
        .join(DEFAULT_CHECKPOINT_FILE)
}

/// Consumer of one topic, see the [module docs](self).
#[derive(Debug)]
pub struct Consumer {
    client: Arc<Client>,
    topic: String,
    group: Option<String>,
    fail_fast: bool,
    seek_policy: SeekPolicy,
    checkpoint_path: PathBuf,
    max_bytes: i32,

    /// Next offset to read per partition
    offsets: PartitionOffsets,

    /// Offsets after the last fetch, not yet committed
    pending: PartitionOffsets,
}

impl Consumer {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    /// Committed offsets, i.e. the next offset to read per partition.
    pub fn offsets(&self) -> &PartitionOffsets {
        &self.offsets
    }

    /// Offsets of the last fetch that are not yet committed.
    pub fn pending_offsets(&self) -> &PartitionOffsets {
        &self.pending
    }

    /// Sets every known partition to offset 0 and drops pending offsets.
    pub async fn init_offsets(&mut self) -> Result<()> {
        if self.client.view().is_empty() {
            self.client.refresh_metadata().await?;
        }

        let partitions = self.client.topic_partitions(&self.topic);
        if partitions.is_empty() {
            return Err(Error::UnknownTopic(self.topic.clone()));
        }

        self.offsets = partitions.into_iter().map(|p| (p, 0)).collect();
        self.pending.clear();
        debug!(topic=%self.topic, offsets=?self.offsets, "Initialized offsets");

        Ok(())
    }

    /// Positions every partition according to `policy`, dropping pending offsets.
    pub async fn seek(&mut self, policy: SeekPolicy) -> Result<()> {
        self.init_offsets().await?;

        match policy {
            SeekPolicy::Head => {}
            SeekPolicy::Saved => self.load_offsets().await?,
            SeekPolicy::Tail => {
                let partitions = self.offsets.keys().copied().collect::<Vec<_>>();
                for partition in partitions {
                    let offset = self
                        .client
                        .get_offset(&self.topic, partition, OffsetAt::Latest, 1)
                        .await?
                        .first()
                        .copied()
                        .ok_or_else(|| {
                            Error::InvalidResponse(format!(
                                "no latest offset for {}/{partition}",
                                self.topic
                            ))
                        })?;
                    self.offsets.insert(partition, offset);
                }
            }
        }

        info!(
            topic=%self.topic,
            group=?self.group,
            ?policy,
            offsets=?self.offsets,
            "Seeked",
        );
        Ok(())
    }

    /// Fetches the next records of every partition.
    ///
    /// Offsets pending from the previous call are committed first. Records of one partition are in offset order,
    /// there is no order across partitions.
    pub async fn fetch(&mut self) -> Result<Vec<RecordAndOffset>> {
        if self.offsets.is_empty() {
            self.seek(self.seek_policy).await?;
        }

        self.commit();
        self.pending = self.offsets.clone();

        let mut records = vec![];
        let offsets = self.offsets.clone();
        for (partition, offset) in offsets {
            match self
                .client
                .fetch(&self.topic, partition, offset, self.max_bytes)
                .await
            {
                Ok((fetched, _high_watermark)) => {
                    if let Some(last) = fetched.iter().map(|r| r.offset).max() {
                        self.pending.insert(partition, last + 1);
                    }
                    records.extend(fetched);
                }
                Err(e) => {
                    warn!(
                        topic=%self.topic,
                        partition,
                        offset,
                        e=%e,
                        "Cannot fetch partition",
                    );
                    if self.fail_fast {
                        // nothing of this round reaches the caller
                        self.pending.clear();
                        return Err(e);
                    }
                }
            }
        }

        Ok(records)
    }

    /// Promotes the pending offsets of the last fetch to committed, all partitions at once.
    ///
    /// Does nothing if there are no pending offsets.
    pub fn commit(&mut self) {
        if self.pending.is_empty() {
            return;
        }

        self.offsets = std::mem::take(&mut self.pending);
        debug!(topic=%self.topic, offsets=?self.offsets, "Committed offsets");
    }

    /// Drops the pending offsets of the last fetch, so that the next fetch returns the same records again.
    pub fn rollback(&mut self) {
        self.pending.clear();
    }

    /// Writes the committed offsets to the checkpoint file. Does nothing without a group.
    pub async fn save_offsets(&self) -> Result<()> {
        let Some(group) = &self.group else {
            return Ok(());
        };

        checkpoint::save_offsets(&self.checkpoint_path, group, &self.topic, &self.offsets).await?;
        Ok(())
    }

    /// Saves the committed offsets. Pending offsets are not committed.
    pub async fn close(self) -> Result<()> {
        self.save_offsets().await
    }

    async fn load_offsets(&mut self) -> Result<()> {
        let Some(group) = &self.group else {
            return Ok(());
        };

        let saved =
            match checkpoint::load_offsets(&self.checkpoint_path, group, &self.topic).await {
                Ok(saved) => saved,
                Err(e) if self.fail_fast => return Err(e.into()),
                Err(e) => {
                    warn!(e=%e, "Cannot load offsets, starting from the beginning");
                    None
                }
            };

        for (partition, offset) in saved.unwrap_or_default() {
            match self.offsets.get_mut(&partition) {
                Some(current) => *current = offset,
                None => {
                    warn!(
                        topic=%self.topic,
                        partition,
                        offset,
                        "Ignoring saved offset of unknown partition",
                    );
                }
            }
        }

        Ok(())
    }
}
