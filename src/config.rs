//! Store configuration

use fjall::{CompressionType, PersistMode};
use std::path::PathBuf;

/// Tuning knobs for a revision-tree store
#[derive(Clone)]
pub struct StorageConfig {
    /// Where the keyspace lives on disk
    pub data_dir: PathBuf,

    /// Name of the partition holding all three record families
    pub partition_name: String,

    /// Compression applied to record blocks
    pub compression: CompressionType,

    /// Durability level applied after every committed batch
    pub persist_mode: PersistMode,
}

impl Default for StorageConfig {
    fn default() -> Self {
        // Scratch store under a throwaway directory, kept on disk so the
        // keyspace outlives the handle
        let data_dir = tempfile::tempdir()
            .expect("failed to create scratch directory")
            .keep();

        Self {
            data_dir,
            partition_name: "revtree".to_string(),
            compression: CompressionType::Lz4,
            persist_mode: PersistMode::Buffer,
        }
    }
}

impl StorageConfig {
    /// Config rooted at the given data directory
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            ..Default::default()
        }
    }

    /// Keep records under a differently named partition, e.g. to run
    /// several stores inside one directory tree
    pub fn with_partition_name(mut self, name: impl Into<String>) -> Self {
        self.partition_name = name.into();
        self
    }

    /// Trade write throughput for on-disk size
    pub fn with_compression(mut self, compression: CompressionType) -> Self {
        self.compression = compression;
        self
    }

    /// Fsync every committed batch before returning to the caller
    pub fn durable(mut self) -> Self {
        self.persist_mode = PersistMode::SyncAll;
        self
    }
}
