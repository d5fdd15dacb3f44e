//! Configuration for heaptable
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{Result, StoreError};
use crate::index::Algorithm;

/// Main configuration for a heaptable instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all tables
    /// Internal structure:
    ///   {tables_dir}/
    ///     └── {table}/
    ///           ├── data.bin        (heap file slots)
    ///           ├── metadata.bin    (fixed-size schema block)
    ///           └── {attr}.{algo}.idx (index snapshots)
    pub tables_dir: PathBuf,

    /// File name of the data file inside a table directory
    pub data_file_name: String,

    /// File name of the metadata block inside a table directory
    pub metadata_file_name: String,

    // -------------------------------------------------------------------------
    // Durability Configuration
    // -------------------------------------------------------------------------
    /// fsync the data file after every mutation
    pub sync_writes: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tables_dir: PathBuf::from("./tables"),
            data_file_name: "data.bin".to_string(),
            metadata_file_name: "metadata.bin".to_string(),
            sync_writes: true,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Directory holding every file of `table`
    pub fn table_dir(&self, table: &str) -> PathBuf {
        self.tables_dir.join(table)
    }

    /// Path of the data file of `table`
    pub fn data_path(&self, table: &str) -> PathBuf {
        self.table_dir(table).join(&self.data_file_name)
    }

    /// Path of the metadata block of `table`
    pub fn metadata_path(&self, table: &str) -> PathBuf {
        self.table_dir(table).join(&self.metadata_file_name)
    }

    /// Staging path the metadata block is written to before it is renamed
    /// over [`Config::metadata_path`]
    pub fn metadata_tmp_path(&self, table: &str) -> PathBuf {
        self.table_dir(table)
            .join(format!("{}{}", self.metadata_file_name, TMP_SUFFIX))
    }

    /// Path of the snapshot of an index over `table.attribute`
    pub fn index_path(&self, table: &str, attribute: &str, algorithm: Algorithm) -> PathBuf {
        self.table_dir(table)
            .join(format!("{}.{}{}", attribute, algorithm, INDEX_SUFFIX))
    }

    /// Reject names that would escape the tables directory or collide
    ///
    /// Data and metadata names may not end in a suffix the engine uses for
    /// its own files (`.tmp` staging files, `.idx` index snapshots).
    pub fn validate(&self) -> Result<()> {
        for name in [&self.data_file_name, &self.metadata_file_name] {
            check_file_name(name)?;
            if let Some(suffix) = RESERVED_SUFFIXES.iter().find(|s| name.ends_with(*s)) {
                return Err(StoreError::Config(format!(
                    "file name {:?} uses the reserved suffix {}",
                    name, suffix
                )));
            }
        }
        if self.data_file_name == self.metadata_file_name {
            return Err(StoreError::Config(format!(
                "data and metadata files share the name {}",
                self.data_file_name
            )));
        }
        Ok(())
    }

    /// Reject table names that are not a single path component
    pub fn validate_table_name(table: &str) -> Result<()> {
        check_file_name(table)
    }
}

/// Suffix of staging files renamed into place after an fsync
pub(crate) const TMP_SUFFIX: &str = ".tmp";

/// Suffix of index snapshot files
pub(crate) const INDEX_SUFFIX: &str = ".idx";

const RESERVED_SUFFIXES: [&str; 2] = [TMP_SUFFIX, INDEX_SUFFIX];

/// True if `name` is usable as a single path component
pub(crate) fn is_path_component(name: &str) -> bool {
    !(name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']))
}

fn check_file_name(name: &str) -> Result<()> {
    if !is_path_component(name) {
        return Err(StoreError::Config(format!("invalid file name: {:?}", name)));
    }
    Ok(())
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the tables directory (root for all storage)
    pub fn tables_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.tables_dir = path.into();
        self
    }

    /// Set the data file name
    pub fn data_file_name(mut self, name: impl Into<String>) -> Self {
        self.config.data_file_name = name.into();
        self
    }

    /// Set the metadata file name
    pub fn metadata_file_name(mut self, name: impl Into<String>) -> Self {
        self.config.metadata_file_name = name.into();
        self
    }

    /// Enable or disable fsync after each data mutation
    pub fn sync_writes(mut self, sync: bool) -> Self {
        self.config.sync_writes = sync;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
