//! Heap File
//!
//! Owns the data file and metadata block of one table and stores records in
//! fixed-width slots addressed by byte offset.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Result, StoreError};
use crate::record::Record;
use crate::types::{Attribute, TypeDescriptor};

use super::{
    decode_position, encode_position, Position, TableMetadata, FREE_POINTER_SIZE, SLOT_DELETED,
    SLOT_LIVE, SLOT_TAG_SIZE,
};

/// Positional record store for one table
///
/// ## Slot State Machine
/// - LIVE → DELETED on `remove` (slot becomes the free-list head)
/// - DELETED → LIVE on `add` while the free-list is non-empty
///   (head slot is overwritten, head advances to its next pointer)
///
/// Every change of the free-list head is written to the metadata block
/// before the call returns.
pub struct HeapFile {
    /// Storage configuration
    config: Config,

    /// Name of the table
    table_name: String,

    /// Path of the data file
    data_path: PathBuf,

    /// Path of the metadata block
    metadata_path: PathBuf,

    /// Data file handle, owned for the lifetime of the heap file
    data: File,

    /// Schema and free-list head
    metadata: TableMetadata,

    /// Sum of all attribute widths
    record_size: usize,

    /// Tag plus body width
    slot_size: u64,
}

impl HeapFile {
    /// Open a table, creating its files when absent
    ///
    /// On open:
    /// 1. Create the table directory and data file if needed
    /// 2. Read the metadata block
    /// 3. If it is absent or corrupted, persist fresh metadata for `types`,
    ///    relinking any slots the data file already marks DELETED
    /// 4. If it is valid but describes another schema, fail
    pub fn create(
        config: Config,
        table_name: impl Into<String>,
        types: Vec<TypeDescriptor>,
        attribute_names: Vec<String>,
        primary_key: impl Into<String>,
    ) -> Result<Self> {
        let table_name = table_name.into();
        config.validate()?;
        Config::validate_table_name(&table_name)?;

        let requested = TableMetadata::new(attribute_names, types, primary_key)?;

        fs::create_dir_all(config.table_dir(&table_name))?;
        let metadata_path = config.metadata_path(&table_name);

        let (metadata, fresh) = match fetch_metadata(&metadata_path, &table_name) {
            Ok(persisted) => {
                if !persisted.same_schema(&requested) {
                    return Err(StoreError::Schema(format!(
                        "table {} already exists with a different schema",
                        table_name
                    )));
                }
                info!(table = %table_name, "Opened existing table");
                (persisted, false)
            }
            Err(e @ (StoreError::MetadataCorrupted { .. } | StoreError::UnknownType(_))) => {
                warn!(table = %table_name, error = %e, "Initializing fresh metadata");
                (requested, true)
            }
            Err(e) => return Err(e),
        };

        let mut heap = Self::assemble(config, table_name, metadata)?;
        if fresh {
            heap.recover_free_list()?;
            heap.write_metadata()?;
        }
        Ok(heap)
    }

    /// Open an existing table from its persisted metadata
    ///
    /// A missing or corrupted metadata block is an error here.
    pub fn open(config: Config, table_name: impl Into<String>) -> Result<Self> {
        let table_name = table_name.into();
        config.validate()?;
        Config::validate_table_name(&table_name)?;

        let metadata = fetch_metadata(&config.metadata_path(&table_name), &table_name)?;
        info!(table = %table_name, "Opened table");
        Self::assemble(config, table_name, metadata)
    }

    fn assemble(config: Config, table_name: String, metadata: TableMetadata) -> Result<Self> {
        let data_path = config.data_path(&table_name);
        let metadata_path = config.metadata_path(&table_name);

        let data = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&data_path)?;

        let record_size = metadata.record_size();
        let slot_size = SLOT_TAG_SIZE + metadata.slot_body_size() as u64;

        let data_len = data.metadata()?.len();
        if data_len % slot_size != 0 {
            warn!(
                table = %table_name,
                data_len,
                slot_size,
                "Data file ends with a partial slot; it will be ignored"
            );
        }

        debug!(table = %table_name, record_size, slot_size, "Heap file ready");

        Ok(Self {
            config,
            table_name,
            data_path,
            metadata_path,
            data,
            metadata,
            record_size,
            slot_size,
        })
    }

    // =========================================================================
    // Record Operations
    // =========================================================================

    /// Store a record and return its position
    ///
    /// Recycles the free-list head when one exists, appends otherwise.
    pub fn add(&mut self, record: &Record) -> Result<Position> {
        record.validate(&self.metadata.attribute_types)?;

        let mut slot = Vec::with_capacity(self.slot_size as usize);
        slot.push(SLOT_LIVE);
        record.write(&mut slot)?;
        slot.resize(self.slot_size as usize, 0);

        match self.metadata.first_deleted {
            Some(head) => {
                let next = self.free_slot_next(head)?;
                self.write_slot(head, &slot)?;
                self.update_first_deleted(next)?;
                debug!(table = %self.table_name, position = head, "Recycled deleted slot");
                Ok(head)
            }
            None => {
                let position = self.record_count()? * self.slot_size;
                self.write_slot(position, &slot)?;
                debug!(table = %self.table_name, position, "Appended record");
                Ok(position)
            }
        }
    }

    /// Read the live record at `position`
    pub fn read(&self, position: Position) -> Result<Record> {
        if !self.is_slot(position)? {
            return Err(self.invalid_position(position));
        }

        let slot = self.read_slot(position)?;
        match slot[0] {
            SLOT_LIVE => {
                let mut record = Record::new();
                let mut body = &slot[SLOT_TAG_SIZE as usize..];
                if !record.read(&mut body, &self.metadata.attribute_types)? {
                    return Err(self.invalid_position(position));
                }
                Ok(record)
            }
            SLOT_DELETED => Err(self.invalid_position(position)),
            tag => Err(unknown_tag(tag, position)),
        }
    }

    /// Logically delete the record at `position`
    ///
    /// Returns whether a live record was there.
    pub fn remove(&mut self, position: Position) -> Result<bool> {
        if !self.is_slot(position)? {
            return Ok(false);
        }

        let tag = self.read_slot(position)?[0];
        match tag {
            SLOT_LIVE => {}
            SLOT_DELETED => return Ok(false),
            tag => return Err(unknown_tag(tag, position)),
        }

        let slot = self.deleted_slot(self.metadata.first_deleted);
        self.write_slot(position, &slot)?;
        self.update_first_deleted(Some(position))?;
        debug!(table = %self.table_name, position, "Removed record");
        Ok(true)
    }

    /// Every live record in physical order
    pub fn load(&self) -> Result<Vec<Record>> {
        Ok(self.scan()?.into_iter().map(|(_, record)| record).collect())
    }

    /// Every live record with its position, in physical order
    pub fn scan(&self) -> Result<Vec<(Position, Record)>> {
        let mut reader = BufReader::new(&self.data);
        reader.seek(SeekFrom::Start(0))?;

        let padding = (self.slot_size - SLOT_TAG_SIZE) as i64 - self.record_size as i64;
        let body = (self.slot_size - SLOT_TAG_SIZE) as i64;
        let mut records = Vec::new();
        let mut position: Position = 0;

        loop {
            let mut tag = [0u8; 1];
            match reader.read_exact(&mut tag) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }

            match tag[0] {
                SLOT_LIVE => {
                    let mut record = Record::new();
                    if !record.read(&mut reader, &self.metadata.attribute_types)? {
                        break;
                    }
                    reader.seek_relative(padding)?;
                    records.push((position, record));
                }
                SLOT_DELETED => reader.seek_relative(body)?,
                tag => return Err(unknown_tag(tag, position)),
            }

            position += self.slot_size;
        }

        Ok(records)
    }

    /// Number of slots in the data file, live and deleted
    pub fn record_count(&self) -> Result<u64> {
        Ok(self.metadata.record_count(self.data.metadata()?.len()))
    }

    // =========================================================================
    // Schema Accessors
    // =========================================================================

    /// Primary-key type and decoded value of `record`
    pub fn get_key(&self, record: &Record) -> Result<(TypeDescriptor, Attribute)> {
        let key_idx = self.metadata.get_attribute_idx(&self.metadata.primary_key)?;
        let key_type = self.metadata.attribute_types[key_idx];
        let value = record.field_text(key_idx, &self.metadata.attribute_types)?;

        let attribute = Attribute {
            name: self.metadata.attribute_names[key_idx].clone(),
            value,
        };
        Ok((key_type, attribute))
    }

    /// Declared type of `attribute_name`
    pub fn get_type(&self, attribute_name: &str) -> Result<TypeDescriptor> {
        let idx = self.metadata.get_attribute_idx(attribute_name)?;
        Ok(self.metadata.attribute_types[idx])
    }

    /// Declared type of the attribute a projection came from
    pub fn get_attribute_type(&self, attribute: &Attribute) -> Result<TypeDescriptor> {
        self.get_type(&attribute.name)
    }

    pub fn get_attribute_names(&self) -> &[String] {
        &self.metadata.attribute_names
    }

    pub fn get_attribute_types(&self) -> &[TypeDescriptor] {
        &self.metadata.attribute_types
    }

    /// Sum of all attribute widths
    pub fn get_record_size(&self) -> usize {
        self.record_size
    }

    /// Distance between consecutive positions
    pub fn slot_size(&self) -> u64 {
        self.slot_size
    }

    pub fn primary_key(&self) -> &str {
        &self.metadata.primary_key
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn metadata(&self) -> &TableMetadata {
        &self.metadata
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    pub fn metadata_path(&self) -> &Path {
        &self.metadata_path
    }

    // =========================================================================
    // Metadata Persistence
    // =========================================================================

    /// Persist the metadata block
    ///
    /// The block goes to a temporary sibling first and is renamed into place,
    /// so the metadata file is never left truncated.
    pub fn write_metadata(&self) -> Result<()> {
        let block = self.metadata.encode()?;
        let tmp_path = self.config.metadata_tmp_path(&self.table_name);

        {
            let mut tmp = File::create(&tmp_path)?;
            tmp.write_all(&block)?;
            tmp.sync_all()?;
        }
        fs::rename(&tmp_path, &self.metadata_path)?;

        info!(
            table = %self.table_name,
            first_deleted = encode_position(self.metadata.first_deleted),
            "Metadata written"
        );
        Ok(())
    }

    /// Re-read the metadata block from disk
    ///
    /// Corruption is reported, never repaired.
    pub fn read_metadata(&mut self) -> Result<()> {
        info!(table = %self.table_name, "Reading metadata");
        let persisted = fetch_metadata(&self.metadata_path, &self.table_name)?;

        if !persisted.same_schema(&self.metadata) {
            return Err(StoreError::MetadataCorrupted {
                table: self.table_name.clone(),
                reason: "schema on disk differs from the open table".to_string(),
            });
        }

        self.metadata.first_deleted = persisted.first_deleted;
        Ok(())
    }

    /// Sync the data file and persist the metadata, releasing both handles
    pub fn close(self) -> Result<()> {
        self.data.sync_all()?;
        self.write_metadata()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Thread every DELETED slot into a new free-list
    ///
    /// Used when the metadata block was reinitialized over an existing data
    /// file. Returns the number of relinked slots; nothing is relinked when a
    /// slot carries an unknown tag, since the data file then does not follow
    /// the current schema.
    fn recover_free_list(&mut self) -> Result<usize> {
        let mut deleted = Vec::new();
        for slot in 0..self.record_count()? {
            let position = slot * self.slot_size;
            match self.read_slot(position)?[0] {
                SLOT_LIVE => {}
                SLOT_DELETED => deleted.push(position),
                tag => {
                    warn!(
                        table = %self.table_name,
                        position,
                        tag,
                        "Data file does not match the schema, deleted slots left unlinked"
                    );
                    return Ok(0);
                }
            }
        }

        let mut head = None;
        for &position in &deleted {
            let slot = self.deleted_slot(head);
            self.write_slot(position, &slot)?;
            head = Some(position);
        }
        self.metadata.first_deleted = head;

        if !deleted.is_empty() {
            warn!(
                table = %self.table_name,
                relinked = deleted.len(),
                "Rebuilt free-list from slot tags"
            );
        }
        Ok(deleted.len())
    }

    /// Slot image of a DELETED slot pointing at `next`
    fn deleted_slot(&self, next: Option<Position>) -> Vec<u8> {
        let mut slot = Vec::with_capacity(self.slot_size as usize);
        slot.push(SLOT_DELETED);
        slot.extend_from_slice(&encode_position(next).to_le_bytes());
        slot.resize(self.slot_size as usize, 0);
        slot
    }

    fn update_first_deleted(&mut self, position: Option<Position>) -> Result<()> {
        self.metadata.first_deleted = position;
        self.write_metadata()
    }

    /// True if `position` starts a complete slot
    fn is_slot(&self, position: Position) -> Result<bool> {
        Ok(position % self.slot_size == 0 && position / self.slot_size < self.record_count()?)
    }

    fn read_slot(&self, position: Position) -> Result<Vec<u8>> {
        let mut slot = vec![0u8; self.slot_size as usize];
        let mut file = &self.data;
        file.seek(SeekFrom::Start(position))?;
        file.read_exact(&mut slot)?;
        Ok(slot)
    }

    fn write_slot(&self, position: Position, slot: &[u8]) -> Result<()> {
        let mut file = &self.data;
        file.seek(SeekFrom::Start(position))?;
        file.write_all(slot)?;
        if self.config.sync_writes {
            file.sync_data()?;
        }
        Ok(())
    }

    /// Next pointer stored in the deleted slot at `head`
    fn free_slot_next(&self, head: Position) -> Result<Option<Position>> {
        let corrupted = |reason: String| StoreError::MetadataCorrupted {
            table: self.table_name.clone(),
            reason,
        };

        if !self.is_slot(head)? {
            return Err(corrupted(format!("free-list head {} is not a slot", head)));
        }

        let slot = self.read_slot(head)?;
        if slot[0] != SLOT_DELETED {
            return Err(corrupted(format!("free-list head {} is not deleted", head)));
        }

        let start = SLOT_TAG_SIZE as usize;
        let mut raw = [0u8; FREE_POINTER_SIZE];
        raw.copy_from_slice(&slot[start..start + FREE_POINTER_SIZE]);
        decode_position(i64::from_le_bytes(raw))
            .ok_or_else(|| corrupted(format!("bad free-list pointer in slot {}", head)))
    }

    fn invalid_position(&self, position: Position) -> StoreError {
        StoreError::InvalidPosition {
            table: self.table_name.clone(),
            position,
        }
    }
}

fn unknown_tag(tag: u8, position: Position) -> StoreError {
    StoreError::InvalidRecordFormat(format!("unknown slot tag 0x{:02x} at {}", tag, position))
}

/// Read and decode the metadata block at `path`
fn fetch_metadata(path: &Path, table: &str) -> Result<TableMetadata> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(StoreError::MetadataCorrupted {
                table: table.to_string(),
                reason: format!("{} is missing", path.display()),
            })
        }
        Err(e) => return Err(e.into()),
    };
    TableMetadata::decode(table, &bytes)
}
