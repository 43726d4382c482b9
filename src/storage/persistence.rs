//! Registry persistence layer
//!
//! Provides save/load functionality for wallet registry snapshots and the
//! ledger journal.

use crate::ledger::LedgerEntry;
use crate::multisig::RegistrySnapshot;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub registry_file: String,
    pub ledger_file: String,
    pub backup_enabled: bool,
    pub max_backups: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".multisig_data"),
            registry_file: "registry.json".to_string(),
            ledger_file: "ledger.json".to_string(),
            backup_enabled: true,
            max_backups: 5,
        }
    }
}

/// Registry storage manager
pub struct Storage {
    config: StorageConfig,
}

impl Storage {
    /// Create a new storage manager
    pub fn new(config: StorageConfig) -> Result<Self, StorageError> {
        fs::create_dir_all(&config.data_dir)?;
        Ok(Self { config })
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    fn registry_path(&self) -> PathBuf {
        self.config.data_dir.join(&self.config.registry_file)
    }

    fn ledger_path(&self) -> PathBuf {
        self.config.data_dir.join(&self.config.ledger_file)
    }

    /// Get a backup file path
    fn backup_path(&self, index: usize) -> PathBuf {
        self.config
            .data_dir
            .join(format!("{}.backup.{}", self.config.registry_file, index))
    }

    /// Save a registry snapshot to disk, rotating backups
    pub fn save_registry(&self, snapshot: &RegistrySnapshot) -> Result<(), StorageError> {
        let path = self.registry_path();

        // Create backup if enabled
        if self.config.backup_enabled && self.config.max_backups > 0 && path.exists() {
            self.rotate_backups()?;
            fs::copy(&path, self.backup_path(0))?;
        }

        write_atomic(&path, snapshot)
    }

    /// Load the registry snapshot, or an empty one if none was saved yet
    pub fn load_registry(&self) -> Result<RegistrySnapshot, StorageError> {
        let path = self.registry_path();
        if !path.exists() {
            return Ok(RegistrySnapshot::default());
        }
        load_from_file(&path)
    }

    /// Check if a saved registry exists
    pub fn exists(&self) -> bool {
        self.registry_path().exists()
    }

    /// Save the ledger journal
    pub fn save_ledger(&self, entries: &[LedgerEntry]) -> Result<(), StorageError> {
        write_atomic(&self.ledger_path(), &entries)
    }

    /// Load the ledger journal, empty if none was saved yet
    pub fn load_ledger(&self) -> Result<Vec<LedgerEntry>, StorageError> {
        let path = self.ledger_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        load_from_file(&path)
    }

    /// Rotate backup files
    fn rotate_backups(&self) -> Result<(), StorageError> {
        // Delete oldest backup
        let oldest = self.backup_path(self.config.max_backups - 1);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }

        // Shift existing backups
        for i in (0..self.config.max_backups - 1).rev() {
            let current = self.backup_path(i);
            if current.exists() {
                fs::rename(&current, self.backup_path(i + 1))?;
            }
        }

        Ok(())
    }

    /// Load a registry snapshot from a backup
    pub fn restore_backup(&self, backup_index: usize) -> Result<RegistrySnapshot, StorageError> {
        let backup_path = self.backup_path(backup_index);

        if !backup_path.exists() {
            return Err(StorageError::InvalidData(format!(
                "Backup {} not found",
                backup_index
            )));
        }

        load_from_file(&backup_path)
    }

    /// List available backups
    pub fn list_backups(&self) -> Vec<usize> {
        (0..self.config.max_backups)
            .filter(|i| self.backup_path(*i).exists())
            .collect()
    }
}

/// Write JSON to a temporary file, then rename it into place
fn write_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StorageError> {
    let temp_path = path.with_extension("tmp");
    {
        let file = fs::File::create(&temp_path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, value)?;
    }
    fs::rename(&temp_path, path)?;
    Ok(())
}

/// Load JSON from a specific file path
fn load_from_file<T: DeserializeOwned>(path: &Path) -> Result<T, StorageError> {
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);
    Ok(serde_json::from_reader(reader)?)
}
