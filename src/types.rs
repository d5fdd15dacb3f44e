//! Type descriptors and typed values
//!
//! Every attribute of a table is declared with a [`TypeDescriptor`]: a kind and
//! the fixed number of bytes each value occupies on disk.

use std::fmt;
use std::str::FromStr;

use crate::error::{Result, StoreError};

/// Kind tag of an attribute type (persisted as one byte in the metadata block)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TypeKind {
    Bool = 0x00,
    Int = 0x01,
    Float = 0x02,
    Varchar = 0x03,
}

impl TypeKind {
    /// Width of the kind when it is fixed, `None` for VARCHAR
    pub fn fixed_size(self) -> Option<u16> {
        match self {
            TypeKind::Bool => Some(1),
            TypeKind::Int => Some(4),
            TypeKind::Float => Some(4),
            TypeKind::Varchar => None,
        }
    }
}

impl TryFrom<u8> for TypeKind {
    type Error = StoreError;

    fn try_from(tag: u8) -> Result<Self> {
        match tag {
            0x00 => Ok(TypeKind::Bool),
            0x01 => Ok(TypeKind::Int),
            0x02 => Ok(TypeKind::Float),
            0x03 => Ok(TypeKind::Varchar),
            other => Err(StoreError::UnknownType(other)),
        }
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeKind::Bool => "bool",
            TypeKind::Int => "int",
            TypeKind::Float => "float",
            TypeKind::Varchar => "varchar",
        };
        f.write_str(name)
    }
}

/// Declared type of an attribute
///
/// `size` is 1, 4 and 4 bytes for BOOL, INT and FLOAT. For VARCHAR it is the
/// declared maximum byte length and never changes for the lifetime of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeDescriptor {
    pub kind: TypeKind,
    pub size: u16,
}

impl TypeDescriptor {
    pub fn bool() -> Self {
        Self { kind: TypeKind::Bool, size: 1 }
    }

    pub fn int() -> Self {
        Self { kind: TypeKind::Int, size: 4 }
    }

    pub fn float() -> Self {
        Self { kind: TypeKind::Float, size: 4 }
    }

    /// Text of at most `size` bytes
    pub fn varchar(size: u16) -> Self {
        Self { kind: TypeKind::Varchar, size }
    }

    /// Build a descriptor from persisted parts, checking the size rules
    pub fn from_parts(kind: TypeKind, size: u16) -> Result<Self> {
        let descriptor = Self { kind, size };
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Check that the size agrees with the kind
    pub fn validate(&self) -> Result<()> {
        match self.kind.fixed_size() {
            Some(fixed) if fixed != self.size => Err(StoreError::Schema(format!(
                "{} must be {} bytes wide, got {}",
                self.kind, fixed, self.size
            ))),
            None if self.size == 0 => {
                Err(StoreError::Schema("varchar width must be at least 1".to_string()))
            }
            _ => Ok(()),
        }
    }

    /// Byte width as usize
    pub fn width(&self) -> usize {
        self.size as usize
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TypeKind::Varchar => write!(f, "varchar({})", self.size),
            kind => write!(f, "{}", kind),
        }
    }
}

impl FromStr for TypeDescriptor {
    type Err = StoreError;

    /// Parses `bool`, `int`, `float` or `varchar(N)` (case-insensitive)
    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.trim().to_ascii_lowercase();
        match lowered.as_str() {
            "bool" | "boolean" => return Ok(Self::bool()),
            "int" | "integer" => return Ok(Self::int()),
            "float" => return Ok(Self::float()),
            _ => {}
        }

        let width = lowered
            .strip_prefix("varchar(")
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(|| StoreError::Schema(format!("unknown type '{}'", s)))?;
        let size: u16 = width
            .trim()
            .parse()
            .map_err(|_| StoreError::Schema(format!("invalid varchar width in '{}'", s)))?;

        let descriptor = Self::varchar(size);
        descriptor.validate()?;
        Ok(descriptor)
    }
}

/// Human-facing projection of one decoded field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

/// A typed attribute value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i32),
    Float(f32),
    Varchar(String),
}

impl Value {
    /// Kind of this value
    pub fn kind(&self) -> TypeKind {
        match self {
            Value::Bool(_) => TypeKind::Bool,
            Value::Int(_) => TypeKind::Int,
            Value::Float(_) => TypeKind::Float,
            Value::Varchar(_) => TypeKind::Varchar,
        }
    }

    /// Parse user text as a value of type `ty`
    pub fn parse(ty: &TypeDescriptor, text: &str) -> Result<Self> {
        let invalid = || {
            StoreError::InvalidRecordFormat(format!("expected {} but got '{}'", ty, text))
        };

        match ty.kind {
            TypeKind::Bool => match text.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(Value::Bool(true)),
                "false" | "0" => Ok(Value::Bool(false)),
                _ => Err(invalid()),
            },
            TypeKind::Int => text.trim().parse().map(Value::Int).map_err(|_| invalid()),
            TypeKind::Float => text.trim().parse().map(Value::Float).map_err(|_| invalid()),
            TypeKind::Varchar => {
                if text.len() > ty.width() {
                    return Err(StoreError::ValueTooLong {
                        length: text.len(),
                        max: ty.width(),
                    });
                }
                Ok(Value::Varchar(text.to_string()))
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{}", x),
            Value::Varchar(s) => f.write_str(s),
        }
    }
}
