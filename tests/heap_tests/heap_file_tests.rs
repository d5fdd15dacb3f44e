//! Tests for HeapFile
//!
//! These tests verify:
//! - Append positions and slot arithmetic
//! - Reads of live, deleted and out-of-range positions
//! - Free-list reuse in LIFO order
//! - Scans in physical order that skip deleted slots
//! - Persistence of records across reopen

use std::fs::OpenOptions;
use std::io::Write;

use heaptable::{
    Attribute, Config, HeapFile, Record, StoreError, TypeDescriptor, TypeKind, Value,
};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

/// Employees: id INT, name VARCHAR(20), salary FLOAT (record size 28)
const EMPLOYEE_SLOT: u64 = 29;

fn setup_config() -> (TempDir, Config) {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .tables_dir(temp_dir.path())
        .sync_writes(false)
        .build();
    (temp_dir, config)
}

fn employee_types() -> Vec<TypeDescriptor> {
    vec![
        TypeDescriptor::int(),
        TypeDescriptor::varchar(20),
        TypeDescriptor::float(),
    ]
}

fn create_employees(config: &Config) -> HeapFile {
    HeapFile::create(
        config.clone(),
        "employees",
        employee_types(),
        vec!["id".to_string(), "name".to_string(), "salary".to_string()],
        "id",
    )
    .unwrap()
}

fn employee(id: i32, name: &str, salary: f32) -> Record {
    Record::from_values(
        &[
            Value::Int(id),
            Value::Varchar(name.to_string()),
            Value::Float(salary),
        ],
        &employee_types(),
    )
    .unwrap()
}

fn ids(records: &[Record]) -> Vec<i32> {
    records
        .iter()
        .map(|r| match r.field_value(0, &employee_types()).unwrap() {
            Value::Int(id) => id,
            other => panic!("unexpected id {:?}", other),
        })
        .collect()
}

// =============================================================================
// Create/Open Tests
// =============================================================================

#[test]
fn test_create_empty_table() {
    let (_temp, config) = setup_config();
    let heap = create_employees(&config);

    assert_eq!(heap.get_record_size(), 28);
    assert_eq!(heap.slot_size(), EMPLOYEE_SLOT);
    assert_eq!(heap.record_count().unwrap(), 0);
    assert!(heap.load().unwrap().is_empty());
    assert!(heap.data_path().exists());
}

#[test]
fn test_create_invalid_table_name() {
    let (_temp, config) = setup_config();
    let result = HeapFile::create(
        config,
        "../escape",
        vec![TypeDescriptor::int()],
        vec!["id".to_string()],
        "id",
    );
    assert!(matches!(result, Err(StoreError::Config(_))));
}

#[test]
fn test_reopen_keeps_records() {
    let (_temp, config) = setup_config();
    {
        let mut heap = create_employees(&config);
        heap.add(&employee(1, "Ann", 10.0)).unwrap();
        heap.add(&employee(2, "Bob", 20.0)).unwrap();
        heap.close().unwrap();
    }

    let heap = HeapFile::open(config.clone(), "employees").unwrap();
    assert_eq!(ids(&heap.load().unwrap()), vec![1, 2]);

    // create with the same schema reopens as well
    let heap = create_employees(&config);
    assert_eq!(heap.record_count().unwrap(), 2);
}

// =============================================================================
// Add/Read Tests
// =============================================================================

#[test]
fn test_add_returns_slot_offsets() {
    let (_temp, config) = setup_config();
    let mut heap = create_employees(&config);

    assert_eq!(heap.add(&employee(1, "Ann", 10.0)).unwrap(), 0);
    assert_eq!(heap.add(&employee(2, "Bob", 20.0)).unwrap(), EMPLOYEE_SLOT);
    assert_eq!(heap.add(&employee(3, "Cy", 30.0)).unwrap(), 2 * EMPLOYEE_SLOT);
    assert_eq!(heap.record_count().unwrap(), 3);
}

#[test]
fn test_read_back() {
    let (_temp, config) = setup_config();
    let mut heap = create_employees(&config);
    let record = employee(9, "Dee", 99.5);
    let pos = heap.add(&record).unwrap();

    assert_eq!(heap.read(pos).unwrap(), record);
}

#[test]
fn test_add_rejects_malformed_record() {
    let (_temp, config) = setup_config();
    let mut heap = create_employees(&config);
    let record = Record::from_values(&[Value::Int(1)], &[TypeDescriptor::int()]).unwrap();

    assert!(matches!(
        heap.add(&record),
        Err(StoreError::InvalidRecordFormat(_))
    ));
    assert_eq!(heap.record_count().unwrap(), 0);
}

#[test]
fn test_read_invalid_positions() {
    let (_temp, config) = setup_config();
    let mut heap = create_employees(&config);
    heap.add(&employee(1, "Ann", 10.0)).unwrap();

    for pos in [EMPLOYEE_SLOT, 5, 10 * EMPLOYEE_SLOT] {
        assert!(matches!(
            heap.read(pos),
            Err(StoreError::InvalidPosition { position, .. }) if position == pos
        ));
    }
}

#[test]
fn test_read_deleted_slot() {
    let (_temp, config) = setup_config();
    let mut heap = create_employees(&config);
    let pos = heap.add(&employee(1, "Ann", 10.0)).unwrap();
    heap.remove(pos).unwrap();

    assert!(matches!(
        heap.read(pos),
        Err(StoreError::InvalidPosition { .. })
    ));
}

// =============================================================================
// Remove/Reuse Tests
// =============================================================================

#[test]
fn test_remove_twice() {
    let (_temp, config) = setup_config();
    let mut heap = create_employees(&config);
    let pos = heap.add(&employee(1, "Ann", 10.0)).unwrap();

    assert!(heap.remove(pos).unwrap());
    assert!(!heap.remove(pos).unwrap());
}

#[test]
fn test_remove_invalid_positions() {
    let (_temp, config) = setup_config();
    let mut heap = create_employees(&config);
    heap.add(&employee(1, "Ann", 10.0)).unwrap();

    assert!(!heap.remove(3).unwrap());
    assert!(!heap.remove(4 * EMPLOYEE_SLOT).unwrap());
    assert_eq!(heap.metadata().first_deleted, None);
}

#[test]
fn test_free_list_is_lifo() {
    let (_temp, config) = setup_config();
    let mut heap = create_employees(&config);
    for id in 0..4 {
        heap.add(&employee(id, "x", 0.0)).unwrap();
    }

    heap.remove(0).unwrap();
    heap.remove(2 * EMPLOYEE_SLOT).unwrap();
    assert_eq!(heap.metadata().first_deleted, Some(2 * EMPLOYEE_SLOT));

    assert_eq!(heap.add(&employee(10, "y", 0.0)).unwrap(), 2 * EMPLOYEE_SLOT);
    assert_eq!(heap.add(&employee(11, "z", 0.0)).unwrap(), 0);
    assert_eq!(heap.metadata().first_deleted, None);

    // free-list exhausted, back to appending
    assert_eq!(heap.add(&employee(12, "w", 0.0)).unwrap(), 4 * EMPLOYEE_SLOT);
    assert_eq!(heap.record_count().unwrap(), 5);
}

#[test]
fn test_free_list_survives_reopen() {
    let (_temp, config) = setup_config();
    {
        let mut heap = create_employees(&config);
        for id in 0..3 {
            heap.add(&employee(id, "x", 0.0)).unwrap();
        }
        heap.remove(EMPLOYEE_SLOT).unwrap();
        heap.remove(0).unwrap();
        heap.close().unwrap();
    }

    let mut heap = HeapFile::open(config.clone(), "employees").unwrap();
    assert_eq!(heap.add(&employee(20, "a", 0.0)).unwrap(), 0);
    assert_eq!(heap.add(&employee(21, "b", 0.0)).unwrap(), EMPLOYEE_SLOT);
    assert_eq!(heap.add(&employee(22, "c", 0.0)).unwrap(), 3 * EMPLOYEE_SLOT);
}

#[test]
fn test_small_records_use_pointer_sized_slots() {
    let (_temp, config) = setup_config();
    let mut heap = HeapFile::create(
        config,
        "flags",
        vec![TypeDescriptor::bool()],
        vec!["on".to_string()],
        "on",
    )
    .unwrap();
    assert_eq!(heap.slot_size(), 9);

    let types = [TypeDescriptor::bool()];
    let yes = Record::from_values(&[Value::Bool(true)], &types).unwrap();
    let no = Record::from_values(&[Value::Bool(false)], &types).unwrap();

    assert_eq!(heap.add(&yes).unwrap(), 0);
    assert_eq!(heap.add(&no).unwrap(), 9);
    heap.remove(0).unwrap();
    heap.remove(9).unwrap();
    assert_eq!(heap.add(&no).unwrap(), 9);
    assert_eq!(heap.add(&yes).unwrap(), 0);
    assert_eq!(heap.read(0).unwrap(), yes);
}

// =============================================================================
// Scan Tests
// =============================================================================

#[test]
fn test_scan_skips_deleted() {
    let (_temp, config) = setup_config();
    let mut heap = create_employees(&config);
    for id in 1..=4 {
        heap.add(&employee(id, "x", 0.0)).unwrap();
    }
    heap.remove(EMPLOYEE_SLOT).unwrap();

    let rows = heap.scan().unwrap();
    let positions: Vec<u64> = rows.iter().map(|(pos, _)| *pos).collect();
    assert_eq!(positions, vec![0, 2 * EMPLOYEE_SLOT, 3 * EMPLOYEE_SLOT]);
    assert_eq!(ids(&heap.load().unwrap()), vec![1, 3, 4]);
}

#[test]
fn test_scan_ignores_partial_trailing_slot() {
    let (_temp, config) = setup_config();
    let path;
    {
        let mut heap = create_employees(&config);
        heap.add(&employee(1, "Ann", 10.0)).unwrap();
        path = heap.data_path().to_path_buf();
        heap.close().unwrap();
    }

    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(&[0x01, 0xAA, 0xBB]).unwrap();
    drop(file);

    let heap = HeapFile::open(config.clone(), "employees").unwrap();
    assert_eq!(heap.record_count().unwrap(), 1);
    assert_eq!(ids(&heap.load().unwrap()), vec![1]);
}

// =============================================================================
// Schema Accessor Tests
// =============================================================================

#[test]
fn test_get_key() {
    let (_temp, config) = setup_config();
    let heap = create_employees(&config);

    let (ty, attribute) = heap.get_key(&employee(42, "Ann", 1.0)).unwrap();
    assert_eq!(ty, TypeDescriptor::int());
    assert_eq!(
        attribute,
        Attribute {
            name: "id".to_string(),
            value: "42".to_string(),
        }
    );
}

#[test]
fn test_get_type() {
    let (_temp, config) = setup_config();
    let heap = create_employees(&config);

    assert_eq!(heap.get_type("name").unwrap(), TypeDescriptor::varchar(20));
    assert_eq!(
        heap.get_attribute_type(&Attribute {
            name: "salary".to_string(),
            value: String::new(),
        })
        .unwrap()
        .kind,
        TypeKind::Float
    );
    assert!(matches!(
        heap.get_type("missing"),
        Err(StoreError::AttributeNotFound(_))
    ));
    assert_eq!(heap.get_attribute_names(), ["id", "name", "salary"]);
    assert_eq!(heap.primary_key(), "id");
}

// =============================================================================
// File Naming Tests
// =============================================================================

#[test]
fn test_data_file_cannot_shadow_metadata_staging_file() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .tables_dir(temp_dir.path())
        .data_file_name("meta.bin.tmp")
        .metadata_file_name("meta.bin")
        .build();

    assert!(matches!(config.validate(), Err(StoreError::Config(_))));
    let result = HeapFile::create(
        config,
        "t",
        vec![TypeDescriptor::int()],
        vec!["id".to_string()],
        "id",
    );
    assert!(matches!(result, Err(StoreError::Config(_))));
}

#[test]
fn test_reserved_suffixes_rejected() {
    for (data, metadata) in [
        ("meta.tmp", "meta.bin"),
        ("id.avl.idx", "metadata.bin"),
        ("data.bin", "metadata.tmp"),
    ] {
        let config = Config::builder()
            .data_file_name(data)
            .metadata_file_name(metadata)
            .build();
        assert!(
            matches!(config.validate(), Err(StoreError::Config(_))),
            "{} / {} should be rejected",
            data,
            metadata
        );
    }
}

#[test]
fn test_custom_file_names_keep_records() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .tables_dir(temp_dir.path())
        .data_file_name("rows")
        .metadata_file_name("meta")
        .sync_writes(false)
        .build();

    let mut heap = HeapFile::create(
        config.clone(),
        "t",
        vec![TypeDescriptor::int()],
        vec!["id".to_string()],
        "id",
    )
    .unwrap();
    let types = [TypeDescriptor::int()];
    for id in [7, 8] {
        heap.add(&Record::from_values(&[Value::Int(id)], &types).unwrap())
            .unwrap();
    }
    assert!(heap.remove(0).unwrap());

    assert!(heap.data_path().exists());
    assert!(!config.metadata_tmp_path("t").exists());
    assert_eq!(heap.scan().unwrap().len(), 1);

    heap.close().unwrap();
    let heap = HeapFile::open(config, "t").unwrap();
    assert_eq!(heap.metadata().first_deleted, Some(0));
    assert_eq!(heap.load().unwrap().len(), 1);
}

// =============================================================================
// Metadata Recovery Tests
// =============================================================================

#[test]
fn test_reinitialized_metadata_relinks_deleted_slots() {
    let (_temp, config) = setup_config();
    let metadata_path;
    {
        let mut heap = create_employees(&config);
        for id in 1..=4 {
            heap.add(&employee(id, "x", 0.0)).unwrap();
        }
        heap.remove(EMPLOYEE_SLOT).unwrap();
        heap.remove(3 * EMPLOYEE_SLOT).unwrap();
        metadata_path = heap.metadata_path().to_path_buf();
        heap.close().unwrap();
    }
    std::fs::write(&metadata_path, b"not a metadata block").unwrap();

    let mut heap = create_employees(&config);
    assert_eq!(heap.metadata().first_deleted, Some(3 * EMPLOYEE_SLOT));
    assert_eq!(ids(&heap.load().unwrap()), vec![1, 3]);

    assert_eq!(heap.add(&employee(5, "a", 0.0)).unwrap(), 3 * EMPLOYEE_SLOT);
    assert_eq!(heap.add(&employee(6, "b", 0.0)).unwrap(), EMPLOYEE_SLOT);
    assert_eq!(heap.add(&employee(7, "c", 0.0)).unwrap(), 4 * EMPLOYEE_SLOT);

    // the rebuilt head was persisted
    let heap = HeapFile::open(config.clone(), "employees").unwrap();
    assert_eq!(heap.metadata().first_deleted, None);
    assert_eq!(ids(&heap.load().unwrap()), vec![1, 6, 3, 5, 7]);
}

#[test]
fn test_reinitialized_metadata_without_deleted_slots() {
    let (_temp, config) = setup_config();
    let metadata_path;
    {
        let mut heap = create_employees(&config);
        heap.add(&employee(1, "x", 0.0)).unwrap();
        metadata_path = heap.metadata_path().to_path_buf();
        heap.close().unwrap();
    }
    std::fs::remove_file(&metadata_path).unwrap();

    let mut heap = create_employees(&config);
    assert_eq!(heap.metadata().first_deleted, None);
    assert_eq!(heap.add(&employee(2, "y", 0.0)).unwrap(), EMPLOYEE_SLOT);
}
