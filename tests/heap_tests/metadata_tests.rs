//! Tests for TableMetadata and its persistence
//!
//! These tests verify:
//! - Fixed block size and layout header
//! - Schema validation on construction
//! - Detection of truncated, damaged and foreign blocks
//! - Durability of the free-list head across reopen

use std::fs;

use heaptable::heap::{METADATA_MAGIC, METADATA_SIZE};
use heaptable::{Config, HeapFile, Record, StoreError, TableMetadata, TypeDescriptor, Value};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_config() -> (TempDir, Config) {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder().tables_dir(temp_dir.path()).build();
    (temp_dir, config)
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn sample_metadata() -> TableMetadata {
    TableMetadata::new(
        names(&["id", "name", "salary"]),
        vec![
            TypeDescriptor::int(),
            TypeDescriptor::varchar(20),
            TypeDescriptor::float(),
        ],
        "id",
    )
    .unwrap()
}

fn create_table(config: &Config) -> HeapFile {
    HeapFile::create(
        config.clone(),
        "t",
        vec![TypeDescriptor::int(), TypeDescriptor::varchar(4)],
        names(&["id", "tag"]),
        "id",
    )
    .unwrap()
}

fn row(id: i32) -> Record {
    Record::from_values(
        &[Value::Int(id), Value::Varchar("x".to_string())],
        &[TypeDescriptor::int(), TypeDescriptor::varchar(4)],
    )
    .unwrap()
}

// =============================================================================
// Construction Tests
// =============================================================================

#[test]
fn test_new_metadata() {
    let metadata = sample_metadata();

    assert_eq!(metadata.record_size(), 28);
    assert_eq!(metadata.slot_body_size(), 28);
    assert_eq!(metadata.first_deleted, None);
    assert_eq!(metadata.get_attribute_idx("salary").unwrap(), 2);
}

#[test]
fn test_small_record_slot_holds_pointer() {
    let metadata = TableMetadata::new(names(&["flag"]), vec![TypeDescriptor::bool()], "flag").unwrap();

    assert_eq!(metadata.record_size(), 1);
    assert_eq!(metadata.slot_body_size(), 8);
}

#[test]
fn test_invalid_schemas() {
    let empty = TableMetadata::new(Vec::new(), Vec::new(), "id");
    assert!(matches!(empty, Err(StoreError::Schema(_))));

    let mismatched = TableMetadata::new(names(&["id", "x"]), vec![TypeDescriptor::int()], "id");
    assert!(matches!(mismatched, Err(StoreError::Schema(_))));

    let duplicate = TableMetadata::new(
        names(&["id", "id"]),
        vec![TypeDescriptor::int(), TypeDescriptor::int()],
        "id",
    );
    assert!(matches!(duplicate, Err(StoreError::Schema(_))));

    let missing_key = TableMetadata::new(names(&["id"]), vec![TypeDescriptor::int()], "pk");
    assert!(matches!(missing_key, Err(StoreError::AttributeNotFound(_))));

    let bad_width = TableMetadata::new(
        names(&["id"]),
        vec![TypeDescriptor {
            kind: heaptable::TypeKind::Int,
            size: 8,
        }],
        "id",
    );
    assert!(matches!(bad_width, Err(StoreError::Schema(_))));
}

#[test]
fn test_too_many_attributes() {
    let count = 33;
    let attribute_names: Vec<String> = (0..count).map(|i| format!("a{}", i)).collect();
    let types = vec![TypeDescriptor::int(); count];

    let result = TableMetadata::new(attribute_names, types, "a0");
    assert!(matches!(result, Err(StoreError::Schema(_))));
}

// =============================================================================
// Encoding Tests
// =============================================================================

#[test]
fn test_encode_fixed_size() {
    let block = sample_metadata().encode().unwrap();

    assert_eq!(block.len(), METADATA_SIZE);
    assert_eq!(&block[..4], METADATA_MAGIC);
}

#[test]
fn test_decode_encoded_block() {
    let mut metadata = sample_metadata();
    metadata.first_deleted = Some(58);

    let decoded = TableMetadata::decode("t", &metadata.encode().unwrap()).unwrap();
    assert_eq!(decoded, metadata);
}

#[test]
fn test_decode_truncated() {
    let block = sample_metadata().encode().unwrap();
    let result = TableMetadata::decode("t", &block[..block.len() - 10]);

    assert!(matches!(result, Err(StoreError::MetadataCorrupted { .. })));
}

#[test]
fn test_decode_bit_flip() {
    let mut block = sample_metadata().encode().unwrap();
    block[30] ^= 0x40;

    let result = TableMetadata::decode("t", &block);
    assert!(matches!(result, Err(StoreError::MetadataCorrupted { .. })));
}

// =============================================================================
// Persistence Tests
// =============================================================================

#[test]
fn test_create_writes_block() {
    let (_temp, config) = setup_config();
    let heap = create_table(&config);

    let on_disk = fs::read(heap.metadata_path()).unwrap();
    assert_eq!(on_disk.len(), METADATA_SIZE);
}

#[test]
fn test_free_list_head_survives_reopen() {
    let (_temp, config) = setup_config();
    let slot_size;
    {
        let mut heap = create_table(&config);
        slot_size = heap.slot_size();
        for id in 0..3 {
            heap.add(&row(id)).unwrap();
        }
        assert!(heap.remove(slot_size).unwrap());
        // dropped without close
    }

    let heap = HeapFile::open(config.clone(), "t").unwrap();
    assert_eq!(heap.metadata().first_deleted, Some(slot_size));
}

#[test]
fn test_open_reports_corruption() {
    let (_temp, config) = setup_config();
    let path = create_table(&config).metadata_path().to_path_buf();

    let block = fs::read(&path).unwrap();
    fs::write(&path, &block[..100]).unwrap();

    let result = HeapFile::open(config.clone(), "t");
    assert!(matches!(result, Err(StoreError::MetadataCorrupted { .. })));
}

#[test]
fn test_open_missing_table() {
    let (_temp, config) = setup_config();
    let result = HeapFile::open(config, "absent");
    assert!(matches!(result, Err(StoreError::MetadataCorrupted { .. })));
}

#[test]
fn test_create_reinitializes_corrupted_metadata() {
    let (_temp, config) = setup_config();
    let path = create_table(&config).metadata_path().to_path_buf();
    fs::write(&path, b"garbage").unwrap();

    let heap = create_table(&config);
    assert_eq!(heap.metadata().first_deleted, None);
    assert_eq!(fs::read(&path).unwrap().len(), METADATA_SIZE);
}

#[test]
fn test_create_rejects_different_schema() {
    let (_temp, config) = setup_config();
    create_table(&config);

    let result = HeapFile::create(
        config.clone(),
        "t",
        vec![TypeDescriptor::float()],
        names(&["id"]),
        "id",
    );
    assert!(matches!(result, Err(StoreError::Schema(_))));
}

#[test]
fn test_read_metadata_refreshes_head() {
    let (_temp, config) = setup_config();
    let mut heap = create_table(&config);
    heap.add(&row(1)).unwrap();
    heap.remove(0).unwrap();

    heap.read_metadata().unwrap();
    assert_eq!(heap.metadata().first_deleted, Some(0));
}

#[test]
fn test_names_must_be_plain_file_names() {
    for bad in ["../x", "a/b", "a\\b", ".", ".."] {
        let result = TableMetadata::new(
            names(&["id", bad]),
            vec![TypeDescriptor::int(), TypeDescriptor::int()],
            "id",
        );
        assert!(
            matches!(result, Err(StoreError::Schema(_))),
            "{:?} should be rejected",
            bad
        );
    }

    let dotted = TableMetadata::new(names(&["first.name"]), vec![TypeDescriptor::int()], "first.name");
    assert!(dotted.is_ok());
}

#[test]
fn test_create_rejects_path_like_attribute() {
    let (temp, config) = setup_config();
    let result = HeapFile::create(
        config,
        "t",
        vec![TypeDescriptor::int(), TypeDescriptor::int()],
        names(&["id", "../escape"]),
        "id",
    );

    assert!(matches!(result, Err(StoreError::Schema(_))));
    assert!(!temp.path().join("t").exists());
}
