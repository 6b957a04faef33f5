//! Consumer offsets persisted as JSON.
//!
//! The file holds the offsets of every group and topic that share it:
//!
//! ```json
//! {"my-group": {"my-topic": {"0": 42, "1": 17}}}
//! ```
//!
//! Partition keys are strings since JSON object keys cannot be numbers.
//!
//! Saving reads the whole file, replaces one group/topic entry and writes the whole file back. Two consumers saving
//! to the same file at the same time can lose each other's update.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};

/// Committed offset per partition.
pub type PartitionOffsets = BTreeMap<i32, i64>;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Cannot access checkpoint file {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("Malformed checkpoint file {}: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid partition {key:?} in checkpoint file")]
    InvalidPartition { key: String },
}

/// Contents of a checkpoint file: group, topic, partition, offset.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checkpoint {
    groups: BTreeMap<String, BTreeMap<String, BTreeMap<String, i64>>>,
}

impl Checkpoint {
    /// Reads a checkpoint file, `None` if it does not exist.
    pub async fn load(path: &Path) -> Result<Option<Self>, CheckpointError> {
        let content = match fs::read(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(CheckpointError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let checkpoint =
            serde_json::from_slice(&content).map_err(|source| CheckpointError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Some(checkpoint))
    }

    /// Writes the whole checkpoint, replacing the file via a temporary sibling.
    pub async fn store(&self, path: &Path) -> Result<(), CheckpointError> {
        let content = serde_json::to_vec(self).map_err(|source| CheckpointError::Json {
            path: path.to_path_buf(),
            source,
        })?;

        let tmp = path.with_extension("tmp");
        let io_err = |source| CheckpointError::Io {
            path: path.to_path_buf(),
            source,
        };
        fs::write(&tmp, content).await.map_err(io_err)?;
        fs::rename(&tmp, path).await.map_err(io_err)?;

        Ok(())
    }

    /// Offsets stored for a group and topic, `None` if there are none.
    pub fn offsets(
        &self,
        group: &str,
        topic: &str,
    ) -> Result<Option<PartitionOffsets>, CheckpointError> {
        let Some(stored) = self.groups.get(group).and_then(|topics| topics.get(topic)) else {
            return Ok(None);
        };

        stored
            .iter()
            .map(|(key, offset)| {
                let partition = key
                    .trim()
                    .parse::<i32>()
                    .map_err(|_| CheckpointError::InvalidPartition { key: key.clone() })?;
                Ok((partition, *offset))
            })
            .collect::<Result<PartitionOffsets, _>>()
            .map(Some)
    }

    /// Replaces the offsets of a group and topic, leaving all others untouched.
    pub fn set_offsets(&mut self, group: &str, topic: &str, offsets: &PartitionOffsets) {
        self.groups.entry(group.to_string()).or_default().insert(
            topic.to_string(),
            offsets
                .iter()
                .map(|(partition, offset)| (partition.to_string(), *offset))
                .collect(),
        );
    }
}

/// Loads the offsets of a group and topic, `None` if the file, group or topic does not exist.
pub async fn load_offsets(
    path: &Path,
    group: &str,
    topic: &str,
) -> Result<Option<PartitionOffsets>, CheckpointError> {
    let offsets = match Checkpoint::load(path).await? {
        Some(checkpoint) => checkpoint.offsets(group, topic)?,
        None => None,
    };

    debug!(path=%path.display(), group, topic, ?offsets, "Loaded offsets");
    Ok(offsets)
}

/// Stores the offsets of a group and topic, keeping every other entry of the file.
///
/// An unreadable or malformed file is replaced.
pub async fn save_offsets(
    path: &Path,
    group: &str,
    topic: &str,
    offsets: &PartitionOffsets,
) -> Result<(), CheckpointError> {
    let mut checkpoint = match Checkpoint::load(path).await {
        Ok(checkpoint) => checkpoint.unwrap_or_default(),
        Err(e) => {
            warn!(e=%e, "Cannot read existing checkpoint, starting from scratch");
            Checkpoint::default()
        }
    };

    checkpoint.set_offsets(group, topic, offsets);
    checkpoint.store(path).await?;

    debug!(path=%path.display(), group, topic, ?offsets, "Saved offsets");
    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn offsets(entries: &[(i32, i64)]) -> PartitionOffsets {
        entries.iter().copied().collect()
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offsets");

        assert_eq!(Checkpoint::load(&path).await.unwrap(), None);
        assert_eq!(load_offsets(&path, "g", "t").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offsets");

        save_offsets(&path, "g", "t", &offsets(&[(0, 5), (1, 7)]))
            .await
            .unwrap();
        assert_eq!(
            load_offsets(&path, "g", "t").await.unwrap(),
            Some(offsets(&[(0, 5), (1, 7)]))
        );
        assert_eq!(load_offsets(&path, "g", "other").await.unwrap(), None);
        assert_eq!(load_offsets(&path, "other", "t").await.unwrap(), None);

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw, serde_json::json!({"g": {"t": {"0": 5, "1": 7}}}));
    }

    #[tokio::test]
    async fn test_save_keeps_other_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offsets");
        std::fs::write(
            &path,
            r#"{"g": {"t": {"0": 1}, "u": {"3": 9}}, "h": {"t": {"0": 2}}}"#,
        )
        .unwrap();

        save_offsets(&path, "g", "t", &offsets(&[(0, 10)]))
            .await
            .unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(
            raw,
            serde_json::json!({"g": {"t": {"0": 10}, "u": {"3": 9}}, "h": {"t": {"0": 2}}})
        );
    }

    #[tokio::test]
    async fn test_save_replaces_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offsets");
        std::fs::write(&path, "not json").unwrap();

        assert_matches!(
            load_offsets(&path, "g", "t").await,
            Err(CheckpointError::Json { .. })
        );

        save_offsets(&path, "g", "t", &offsets(&[(2, 3)]))
            .await
            .unwrap();
        assert_eq!(
            load_offsets(&path, "g", "t").await.unwrap(),
            Some(offsets(&[(2, 3)]))
        );
    }

    #[test]
    fn test_invalid_partition_key() {
        let checkpoint: Checkpoint = serde_json::from_str(r#"{"g": {"t": {"zero": 1}}}"#).unwrap();
        assert_matches!(
            checkpoint.offsets("g", "t"),
            Err(CheckpointError::InvalidPartition { key }) if key == "zero"
        );
    }

    #[test]
    fn test_wrong_shape() {
        let err = serde_json::from_str::<Checkpoint>(r#"{"t": {"0": 1}}"#).unwrap_err();
        assert!(err.is_data());
    }
}
