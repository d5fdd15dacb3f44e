//! Record Module
//!
//! One row of a table as an ordered sequence of encoded fields.
//!
//! ## Responsibilities
//! - Encode typed values into fixed-width fields (see [`codec`])
//! - Read one record's worth of fields from a byte source
//! - Project fields back to typed values or text
//!
//! A record carries no type information of its own: interpreting its fields
//! always requires the schema it was encoded with.
//!
//! ## Layout
//! ```text
//! ┌──────────────┬──────────────┬─────┬──────────────┐
//! │ Field 0      │ Field 1      │ ... │ Field n-1    │
//! │ (types[0])   │ (types[1])   │     │ (types[n-1]) │
//! └──────────────┴──────────────┴─────┴──────────────┘
//! ```

pub mod codec;

use std::io::{self, Read, Write};

use bytes::Bytes;

use crate::error::{Result, StoreError};
use crate::types::{TypeDescriptor, Value};

/// A row as raw field buffers, one per attribute in schema order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    pub fields: Vec<Bytes>,
}

impl Record {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode `values` against `types`
    pub fn from_values(values: &[Value], types: &[TypeDescriptor]) -> Result<Self> {
        if values.len() != types.len() {
            return Err(StoreError::InvalidRecordFormat(format!(
                "expected {} values, got {}",
                types.len(),
                values.len()
            )));
        }

        let fields = values
            .iter()
            .zip(types)
            .map(|(value, ty)| codec::encode(value, ty))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { fields })
    }

    /// Read one field per entry of `types` from `source`
    ///
    /// Returns `Ok(false)` when the source runs out before every field was
    /// read; whatever was appended in that case is not a valid record.
    pub fn read<R: Read>(&mut self, source: &mut R, types: &[TypeDescriptor]) -> Result<bool> {
        for ty in types {
            let mut field = vec![0u8; ty.width()];
            match source.read_exact(&mut field) {
                Ok(()) => self.fields.push(Bytes::from(field)),
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(false),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(true)
    }

    /// Write the packed fields to `sink`
    pub fn write<W: Write>(&self, sink: &mut W) -> Result<()> {
        for field in &self.fields {
            sink.write_all(field)?;
        }
        Ok(())
    }

    /// Total encoded width
    pub fn encoded_len(&self) -> usize {
        self.fields.iter().map(|f| f.len()).sum()
    }

    /// Check field count and widths against the schema
    pub fn validate(&self, types: &[TypeDescriptor]) -> Result<()> {
        if self.fields.len() != types.len() {
            return Err(StoreError::InvalidRecordFormat(format!(
                "record has {} fields, schema has {}",
                self.fields.len(),
                types.len()
            )));
        }

        for (idx, (field, ty)) in self.fields.iter().zip(types).enumerate() {
            if field.len() != ty.width() {
                return Err(StoreError::InvalidRecordFormat(format!(
                    "field {} is {} bytes, {} needs {}",
                    idx,
                    field.len(),
                    ty,
                    ty.width()
                )));
            }
        }
        Ok(())
    }

    /// Decode every field
    pub fn values(&self, types: &[TypeDescriptor]) -> Result<Vec<Value>> {
        self.validate(types)?;
        self.fields
            .iter()
            .zip(types)
            .map(|(field, ty)| codec::decode(ty, field))
            .collect()
    }

    /// Decode field `idx` to text
    pub fn field_text(&self, idx: usize, types: &[TypeDescriptor]) -> Result<String> {
        let (field, ty) = self.field(idx, types)?;
        codec::decode_to_text(ty, field)
    }

    /// Decode field `idx` to a typed value
    pub fn field_value(&self, idx: usize, types: &[TypeDescriptor]) -> Result<Value> {
        let (field, ty) = self.field(idx, types)?;
        codec::decode(ty, field)
    }

    fn field<'a>(
        &'a self,
        idx: usize,
        types: &'a [TypeDescriptor],
    ) -> Result<(&'a Bytes, &'a TypeDescriptor)> {
        match (self.fields.get(idx), types.get(idx)) {
            (Some(field), Some(ty)) => Ok((field, ty)),
            _ => Err(StoreError::InvalidRecordFormat(format!(
                "field {} out of range ({} fields)",
                idx,
                self.fields.len()
            ))),
        }
    }
}
