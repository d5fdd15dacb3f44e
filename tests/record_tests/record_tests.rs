//! Tests for Record
//!
//! These tests verify:
//! - Building records from typed values
//! - Reading records from byte sources, including short sources
//! - Schema validation of field counts and widths
//! - Field projection to values and text

use std::io::Cursor;

use bytes::Bytes;
use heaptable::{Record, StoreError, TypeDescriptor, Value};

// =============================================================================
// Helper Functions
// =============================================================================

fn employee_types() -> Vec<TypeDescriptor> {
    vec![
        TypeDescriptor::int(),
        TypeDescriptor::varchar(20),
        TypeDescriptor::float(),
    ]
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

// =============================================================================
// Construction Tests
// =============================================================================

#[test]
fn test_from_values() {
    let record = employee(1, "Ann", 10.0);

    assert_eq!(record.fields.len(), 3);
    assert_eq!(record.encoded_len(), 28);
    assert!(record.validate(&employee_types()).is_ok());
}

#[test]
fn test_from_values_count_mismatch() {
    let result = Record::from_values(&[Value::Int(1)], &employee_types());
    assert!(matches!(result, Err(StoreError::InvalidRecordFormat(_))));
}

#[test]
fn test_from_values_propagates_too_long() {
    let long = "x".repeat(21);
    let result = Record::from_values(
        &[Value::Int(1), Value::Varchar(long), Value::Float(0.0)],
        &employee_types(),
    );
    assert!(matches!(result, Err(StoreError::ValueTooLong { .. })));
}

// =============================================================================
// Read/Write Tests
// =============================================================================

#[test]
fn test_write_then_read() {
    let record = employee(7, "Bob", 20.5);
    let mut buf = Vec::new();
    record.write(&mut buf).unwrap();
    assert_eq!(buf.len(), 28);

    let mut cursor = Cursor::new(buf);
    let mut read_back = Record::new();
    assert!(read_back.read(&mut cursor, &employee_types()).unwrap());
    assert_eq!(read_back, record);
}

#[test]
fn test_read_short_source() {
    let mut cursor = Cursor::new(vec![0u8; 10]);
    let mut record = Record::new();

    assert!(!record.read(&mut cursor, &employee_types()).unwrap());
}

#[test]
fn test_read_consecutive_records() {
    let mut buf = Vec::new();
    employee(1, "Ann", 1.0).write(&mut buf).unwrap();
    employee(2, "Bob", 2.0).write(&mut buf).unwrap();

    let mut cursor = Cursor::new(buf);
    let types = employee_types();

    let mut first = Record::new();
    assert!(first.read(&mut cursor, &types).unwrap());
    let mut second = Record::new();
    assert!(second.read(&mut cursor, &types).unwrap());
    let mut third = Record::new();
    assert!(!third.read(&mut cursor, &types).unwrap());

    assert_eq!(first.field_value(0, &types).unwrap(), Value::Int(1));
    assert_eq!(second.field_value(0, &types).unwrap(), Value::Int(2));
}

// =============================================================================
// Validation Tests
// =============================================================================

#[test]
fn test_validate_wrong_width() {
    let record = Record {
        fields: vec![
            Bytes::from_static(&[0, 0, 0, 0]),
            Bytes::from_static(b"short"),
            Bytes::from_static(&[0, 0, 0, 0]),
        ],
    };
    let result = record.validate(&employee_types());
    assert!(matches!(result, Err(StoreError::InvalidRecordFormat(_))));
}

#[test]
fn test_validate_wrong_count() {
    let record = Record {
        fields: vec![Bytes::from_static(&[0, 0, 0, 0])],
    };
    assert!(record.validate(&employee_types()).is_err());
}

// =============================================================================
// Projection Tests
// =============================================================================

#[test]
fn test_values() {
    let record = employee(3, "Cy", 30.25);
    let values = record.values(&employee_types()).unwrap();

    assert_eq!(
        values,
        vec![
            Value::Int(3),
            Value::Varchar("Cy".to_string()),
            Value::Float(30.25),
        ]
    );
}

#[test]
fn test_field_text() {
    let record = employee(3, "Cy", 30.25);
    let types = employee_types();

    assert_eq!(record.field_text(0, &types).unwrap(), "3");
    assert_eq!(record.field_text(2, &types).unwrap(), "30.25");
    assert_eq!(
        record.field_text(1, &types).unwrap().trim_end_matches('\0'),
        "Cy"
    );
}

#[test]
fn test_field_out_of_range() {
    let record = employee(3, "Cy", 30.25);
    let result = record.field_value(5, &employee_types());
    assert!(matches!(result, Err(StoreError::InvalidRecordFormat(_))));
}
