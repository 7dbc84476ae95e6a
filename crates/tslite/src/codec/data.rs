//! Data-tuple codec: pack, unpack, parse and print the eleven value formats,
//! and linearly interpolate float series.
//!
//! A packed value is the concatenation of fixed-width little-endian scalars
//! (a whole number of type-sized columns), except TEXT which is stored as
//! opaque bytes. A value whose length is not a multiple of the element size
//! is a corruption error.

use crate::error::{Error, Result};
use crate::schema::Schema;

/// The typed data format of a database, fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    /// Opaque text, variable width.
    Text,
    /// Signed 8-bit integer.
    Int8,
    /// Unsigned 8-bit integer.
    Uint8,
    /// Signed 16-bit integer.
    Int16,
    /// Unsigned 16-bit integer.
    Uint16,
    /// Signed 32-bit integer.
    Int32,
    /// Unsigned 32-bit integer.
    Uint32,
    /// Signed 64-bit integer.
    Int64,
    /// Unsigned 64-bit integer.
    Uint64,
    /// IEEE-754 single precision.
    Float,
    /// IEEE-754 double precision.
    Double,
}

/// All data types in schema-index order.
pub const ALL_DATA_TYPES: [DataType; 11] = [
    DataType::Text,
    DataType::Int8,
    DataType::Uint8,
    DataType::Int16,
    DataType::Uint16,
    DataType::Int32,
    DataType::Uint32,
    DataType::Int64,
    DataType::Uint64,
    DataType::Float,
    DataType::Double,
];

impl DataType {
    /// Decodes the data-type octet of a schema record.
    pub fn from_index(i: u8) -> Option<Self> {
        ALL_DATA_TYPES.get(i as usize).copied()
    }

    /// The data-type octet stored in the schema record.
    pub fn index(self) -> u8 {
        ALL_DATA_TYPES.iter().position(|&t| t == self).unwrap_or(0) as u8
    }

    /// The format name, as used by `create` and printed by `info`.
    pub fn name(self) -> &'static str {
        match self {
            DataType::Text => "TEXT",
            DataType::Int8 => "INT8",
            DataType::Uint8 => "UINT8",
            DataType::Int16 => "INT16",
            DataType::Uint16 => "UINT16",
            DataType::Int32 => "INT32",
            DataType::Uint32 => "UINT32",
            DataType::Int64 => "INT64",
            DataType::Uint64 => "UINT64",
            DataType::Float => "FLOAT",
            DataType::Double => "DOUBLE",
        }
    }

    /// Looks a format up by name, case-insensitively.
    pub fn from_name(s: &str) -> Result<Self> {
        ALL_DATA_TYPES
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::BadSchema(format!("Unknown data format: {s}")))
    }

    /// Element size in octets. TEXT elements are single octets.
    pub fn elem_size(self) -> usize {
        match self {
            DataType::Text | DataType::Int8 | DataType::Uint8 => 1,
            DataType::Int16 | DataType::Uint16 => 2,
            DataType::Int32 | DataType::Uint32 | DataType::Float => 4,
            DataType::Int64 | DataType::Uint64 | DataType::Double => 8,
        }
    }

    /// Packs a vector of text tokens into the on-disk value form.
    ///
    /// TEXT joins the tokens with single spaces; numeric formats parse each
    /// token as one scalar column.
    pub fn parse(self, tokens: &[String]) -> Result<Vec<u8>> {
        if tokens.is_empty() {
            return Err(Error::BadData("Some data expected".to_string()));
        }
        if self == DataType::Text {
            return Ok(tokens.join(" ").into_bytes());
        }
        let mut packed = Vec::with_capacity(self.elem_size() * tokens.len());
        for tok in tokens {
            self.pack_scalar(tok, &mut packed)?;
        }
        Ok(packed)
    }

    fn bad_value(self, tok: &str) -> Error {
        Error::BadData(format!(
            "Can't put value into {} database: {}",
            self.name(),
            tok
        ))
    }

    fn pack_scalar(self, tok: &str, out: &mut Vec<u8>) -> Result<()> {
        match self {
            DataType::Text => unreachable!("TEXT has no scalar columns"),
            DataType::Int8 => out.extend_from_slice(
                &tok.parse::<i8>().map_err(|_| self.bad_value(tok))?.to_le_bytes(),
            ),
            DataType::Uint8 => out.extend_from_slice(
                &tok.parse::<u8>().map_err(|_| self.bad_value(tok))?.to_le_bytes(),
            ),
            DataType::Int16 => out.extend_from_slice(
                &tok.parse::<i16>().map_err(|_| self.bad_value(tok))?.to_le_bytes(),
            ),
            DataType::Uint16 => out.extend_from_slice(
                &tok.parse::<u16>().map_err(|_| self.bad_value(tok))?.to_le_bytes(),
            ),
            DataType::Int32 => out.extend_from_slice(
                &tok.parse::<i32>().map_err(|_| self.bad_value(tok))?.to_le_bytes(),
            ),
            DataType::Uint32 => out.extend_from_slice(
                &tok.parse::<u32>().map_err(|_| self.bad_value(tok))?.to_le_bytes(),
            ),
            DataType::Int64 => out.extend_from_slice(
                &tok.parse::<i64>().map_err(|_| self.bad_value(tok))?.to_le_bytes(),
            ),
            DataType::Uint64 => out.extend_from_slice(
                &tok.parse::<u64>().map_err(|_| self.bad_value(tok))?.to_le_bytes(),
            ),
            DataType::Float => out.extend_from_slice(
                &tok.parse::<f32>().map_err(|_| self.bad_value(tok))?.to_le_bytes(),
            ),
            DataType::Double => out.extend_from_slice(
                &tok.parse::<f64>().map_err(|_| self.bad_value(tok))?.to_le_bytes(),
            ),
        }
        Ok(())
    }

    fn print_scalar(self, elem: &[u8]) -> String {
        match self {
            DataType::Text => unreachable!("TEXT has no scalar columns"),
            DataType::Int8 => i8::from_le_bytes([elem[0]]).to_string(),
            DataType::Uint8 => elem[0].to_string(),
            DataType::Int16 => i16::from_le_bytes([elem[0], elem[1]]).to_string(),
            DataType::Uint16 => u16::from_le_bytes([elem[0], elem[1]]).to_string(),
            DataType::Int32 => {
                i32::from_le_bytes([elem[0], elem[1], elem[2], elem[3]]).to_string()
            }
            DataType::Uint32 => {
                u32::from_le_bytes([elem[0], elem[1], elem[2], elem[3]]).to_string()
            }
            DataType::Int64 => {
                let mut b = [0u8; 8];
                b.copy_from_slice(elem);
                i64::from_le_bytes(b).to_string()
            }
            DataType::Uint64 => {
                let mut b = [0u8; 8];
                b.copy_from_slice(elem);
                u64::from_le_bytes(b).to_string()
            }
            DataType::Float => {
                f32::from_le_bytes([elem[0], elem[1], elem[2], elem[3]]).to_string()
            }
            DataType::Double => {
                let mut b = [0u8; 8];
                b.copy_from_slice(elem);
                f64::from_le_bytes(b).to_string()
            }
        }
    }

    /// Unpacks a value into one printable string per column.
    ///
    /// With a column index set, only that column is returned, or the single
    /// string `NaN` when the record is too narrow. TEXT ignores the column
    /// index and prints verbatim with newlines collapsed to spaces.
    pub fn print_vec(self, value: &[u8], col: Option<usize>) -> Result<Vec<String>> {
        if self == DataType::Text {
            let text = String::from_utf8_lossy(value).replace('\n', " ");
            return Ok(vec![text]);
        }
        let size = self.elem_size();
        if value.len() % size != 0 {
            return Err(Error::Corruption(
                "Broken database: wrong data length".to_string(),
            ));
        }
        let columns = value.len() / size;
        let (first, last) = match col {
            Some(c) if c >= columns => return Ok(vec!["NaN".to_string()]),
            Some(c) => (c, c + 1),
            None => (0, columns),
        };
        Ok((first..last)
            .map(|i| self.print_scalar(&value[i * size..(i + 1) * size]))
            .collect())
    }

    /// Unpacks a value into a single space-separated line.
    pub fn print(self, value: &[u8], col: Option<usize>) -> Result<String> {
        Ok(self.print_vec(value, col)?.join(" "))
    }
}

/// Linearly interpolates between two packed neighbor records.
///
/// Defined only for FLOAT and DOUBLE schemas. `k0` is the query time,
/// `k1 <= k0 <= k2` the bracketing keys, `v1`/`v2` their packed values. The
/// weight of the earlier point is `w = (t2-t0)/(t2-t1)`; the result has
/// `min(columns(v1), columns(v2))` columns.
///
/// Returns an empty vector when either neighbor key has an unexpected
/// length, which callers treat as "no interpolation available". An ordering
/// violation between the keys is reported as corruption rather than
/// silently blended over.
pub fn interpolate(
    schema: &Schema,
    k0: &[u8],
    k1: &[u8],
    k2: &[u8],
    v1: &[u8],
    v2: &[u8],
) -> Result<Vec<u8>> {
    let dtype = schema.dtype;
    if dtype != DataType::Float && dtype != DataType::Double {
        return Err(Error::BadSchema(
            "interpolation is only defined for FLOAT and DOUBLE databases".to_string(),
        ));
    }
    let ttype = schema.ttype;
    if !ttype.key_len_ok(k1.len()) || !ttype.key_len_ok(k2.len()) {
        return Ok(Vec::new());
    }
    if k1 > k0 || k0 > k2 {
        return Err(Error::Corruption(
            "interpolation: bracketing points are out of order".to_string(),
        ));
    }

    let dt1 = ttype.diff(k0, k1)?;
    let dt2 = ttype.diff(k2, k0)?;
    let w = if dt1 + dt2 == 0.0 { 1.0 } else { dt2 / (dt1 + dt2) };

    let size = dtype.elem_size();
    if v1.len() % size != 0 || v2.len() % size != 0 {
        return Err(Error::Corruption(
            "Broken database: wrong data length".to_string(),
        ));
    }
    let columns = (v1.len() / size).min(v2.len() / size);

    let mut out = Vec::with_capacity(columns * size);
    for i in 0..columns {
        let a = &v1[i * size..(i + 1) * size];
        let b = &v2[i * size..(i + 1) * size];
        match dtype {
            DataType::Float => {
                let x = f32::from_le_bytes([a[0], a[1], a[2], a[3]]) as f64;
                let y = f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64;
                out.extend_from_slice(&(((x * w) + y * (1.0 - w)) as f32).to_le_bytes());
            }
            DataType::Double => {
                let mut ba = [0u8; 8];
                let mut bb = [0u8; 8];
                ba.copy_from_slice(a);
                bb.copy_from_slice(b);
                let x = f64::from_le_bytes(ba);
                let y = f64::from_le_bytes(bb);
                out.extend_from_slice(&(x * w + y * (1.0 - w)).to_le_bytes());
            }
            _ => unreachable!("checked above"),
        }
    }
    Ok(out)
}
