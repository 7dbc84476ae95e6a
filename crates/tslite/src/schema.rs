//! The per-database schema record and database name validation.
//!
//! Every database stores one metadata record under the reserved key
//! [`SCHEMA_KEY`] (the one-octet all-zero string, which sorts before every
//! real timestamp). Layout on disk:
//!
//! ```text
//! [version: 1 octet][data type: 1 octet][description: 0.. octets, UTF-8]
//! ```
//!
//! The record is written on creation and read on every open. The timestamp
//! version and data type are immutable afterwards; only the description may
//! be overwritten.

use crate::codec::{DataType, TimeType};
use crate::error::{Error, Result};

/// The reserved key holding the schema record. Never returned by queries.
pub const SCHEMA_KEY: &[u8] = &[0];

/// Characters that are not allowed in database or filter names.
const FORBIDDEN: &[char] = &['.', ':', '+', '|', '/', ' ', '\t', '\n'];

/// Checks a database or filter name. All names must be checked, including
/// names that are only moved or deleted.
pub fn check_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains(FORBIDDEN) {
        return Err(Error::BadName(name.to_string()));
    }
    Ok(())
}

/// The per-database metadata tuple: timestamp version, data type and a
/// free-form description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    /// Timestamp encoding version.
    pub ttype: TimeType,
    /// Data format of the value columns.
    pub dtype: DataType,
    /// Free-form description, possibly empty.
    pub descr: String,
}

impl Default for Schema {
    fn default() -> Self {
        Schema {
            ttype: TimeType::V2,
            dtype: DataType::Double,
            descr: String::new(),
        }
    }
}

impl Schema {
    /// A schema with the current timestamp version and the given format.
    pub fn new(dtype: DataType, descr: impl Into<String>) -> Self {
        Schema {
            ttype: TimeType::V2,
            dtype,
            descr: descr.into(),
        }
    }

    /// Serializes the record for storage under [`SCHEMA_KEY`].
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(2 + self.descr.len());
        buf.push(self.ttype.index());
        buf.push(self.dtype.index());
        buf.extend_from_slice(self.descr.as_bytes());
        buf
    }

    /// Reads the record back, using its length to bound the description.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 2 {
            return Err(Error::Corruption(
                "Broken database: broken schema record".to_string(),
            ));
        }
        let ttype = TimeType::from_index(bytes[0]).ok_or_else(|| {
            Error::Corruption(format!(
                "Broken database: unknown timestamp version: {}",
                bytes[0]
            ))
        })?;
        let dtype = DataType::from_index(bytes[1]).ok_or_else(|| {
            Error::Corruption(format!("Broken database: unknown data format: {}", bytes[1]))
        })?;
        Ok(Schema {
            ttype,
            dtype,
            descr: String::from_utf8_lossy(&bytes[2..]).into_owned(),
        })
    }
}
