//! Field codec
//!
//! Converts single attribute values to and from their fixed-width on-disk form.
//!
//! ## Field Encodings
//! ```text
//! BOOL        1 byte   0x00 = false, 0x01 = true
//! INT         4 bytes  i32 little-endian
//! FLOAT       4 bytes  f32 little-endian (IEEE 754)
//! VARCHAR(N)  N bytes  UTF-8 text, zero-padded to N
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Result, StoreError};
use crate::types::{TypeDescriptor, TypeKind, Value};

/// Padding byte appended to short VARCHAR values
pub const VARCHAR_PADDING: u8 = 0x00;

/// Encode `value` into exactly `ty.size` bytes
///
/// Text longer than the declared width is rejected, never truncated.
pub fn encode(value: &Value, ty: &TypeDescriptor) -> Result<Bytes> {
    let mut buf = BytesMut::with_capacity(ty.width());

    match (value, ty.kind) {
        (Value::Bool(b), TypeKind::Bool) => buf.put_u8(u8::from(*b)),
        (Value::Int(n), TypeKind::Int) => buf.put_i32_le(*n),
        (Value::Float(x), TypeKind::Float) => buf.put_f32_le(*x),
        (Value::Varchar(s), TypeKind::Varchar) => {
            let text = s.as_bytes();
            if text.len() > ty.width() {
                return Err(StoreError::ValueTooLong {
                    length: text.len(),
                    max: ty.width(),
                });
            }
            buf.put_slice(text);
            buf.put_bytes(VARCHAR_PADDING, ty.width() - text.len());
        }
        (value, kind) => {
            return Err(StoreError::InvalidRecordFormat(format!(
                "cannot encode {:?} as {}",
                value, kind
            )))
        }
    }

    debug_assert_eq!(buf.len(), ty.width());
    Ok(buf.freeze())
}

/// Decode a field into a typed value
///
/// VARCHAR values come back without their trailing padding.
pub fn decode(ty: &TypeDescriptor, bytes: &[u8]) -> Result<Value> {
    check_width(ty, bytes)?;
    let mut buf = bytes;

    let value = match ty.kind {
        TypeKind::Bool => match buf.get_u8() {
            0x00 => Value::Bool(false),
            0x01 => Value::Bool(true),
            other => {
                return Err(StoreError::InvalidRecordFormat(format!(
                    "invalid bool byte 0x{:02x}",
                    other
                )))
            }
        },
        TypeKind::Int => Value::Int(buf.get_i32_le()),
        TypeKind::Float => Value::Float(buf.get_f32_le()),
        TypeKind::Varchar => {
            let text = utf8(bytes)?;
            Value::Varchar(text.trim_end_matches(char::from(VARCHAR_PADDING)).to_string())
        }
    };

    Ok(value)
}

/// Decode a field into its canonical text form
///
/// BOOL becomes `"true"`/`"false"`, numbers use their default formatting and
/// VARCHAR is returned verbatim, padding included.
pub fn decode_to_text(ty: &TypeDescriptor, bytes: &[u8]) -> Result<String> {
    match ty.kind {
        TypeKind::Varchar => {
            check_width(ty, bytes)?;
            Ok(utf8(bytes)?.to_string())
        }
        _ => decode(ty, bytes).map(|value| value.to_string()),
    }
}

fn check_width(ty: &TypeDescriptor, bytes: &[u8]) -> Result<()> {
    if bytes.len() != ty.width() {
        return Err(StoreError::InvalidRecordFormat(format!(
            "{} field must be {} bytes, got {}",
            ty,
            ty.width(),
            bytes.len()
        )));
    }
    Ok(())
}

fn utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes)
        .map_err(|e| StoreError::InvalidRecordFormat(format!("varchar is not UTF-8: {}", e)))
}
