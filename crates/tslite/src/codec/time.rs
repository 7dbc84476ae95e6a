//! Timestamp codec: parse, print, pack, compare and do arithmetic on the
//! packed timestamp encodings.
//!
//! # Encodings
//!
//! - **V1** (legacy): one unsigned 64-bit big-endian integer holding
//!   milliseconds. Keys are always 8 octets; precision is 1 ms.
//! - **V2** (current): a 32-bit big-endian unsigned seconds field, followed
//!   by a 32-bit big-endian unsigned nanoseconds field only when the
//!   nanoseconds are non-zero. Keys are 4 or 8 octets.
//!
//! Big-endian packing makes byte-wise lexicographic order over keys equal to
//! numeric order, including across the 4/8-octet V2 forms (the shorter key
//! is a strict prefix of its zero-nanosecond extension).
//!
//! # Text syntax
//!
//! A timestamp string is a decimal with an optional fractional part,
//! optionally followed by a single `+` or `-` suffix which advances or
//! rewinds the value by one tick (1 ns for V2, 1 ms for V1), wrapping over
//! the legal range. The tokens `now`, `now_s` and `inf` denote the current
//! real-time clock, the current clock truncated to seconds, and the largest
//! representable timestamp. Extra fractional digits are dropped without
//! rounding.

use crate::codec::Key;
use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::time::{SystemTime, UNIX_EPOCH};

/// Largest legal nanoseconds field for a V2 timestamp.
pub const MAX_NS: u32 = 999_999_999;

/// Versioned timestamp encoding carried in the schema record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeType {
    /// Legacy encoding: u64 milliseconds, 8-octet keys.
    V1,
    /// Current encoding: u32 seconds plus optional u32 nanoseconds.
    V2,
}

impl TimeType {
    /// Decodes the version octet of a schema record.
    pub fn from_index(v: u8) -> Option<Self> {
        match v {
            1 => Some(TimeType::V1),
            2 => Some(TimeType::V2),
            _ => None,
        }
    }

    /// The version octet stored in the schema record.
    pub fn index(self) -> u8 {
        match self {
            TimeType::V1 => 1,
            TimeType::V2 => 2,
        }
    }

    /// Human-readable name, as printed by the `info` command.
    pub fn name(self) -> &'static str {
        match self {
            TimeType::V1 => "TIME_V1",
            TimeType::V2 => "TIME_V2",
        }
    }

    /// Parses a timestamp string into its packed form.
    pub fn parse(self, input: &str) -> Result<Key> {
        match self {
            TimeType::V1 => parse_v1(input),
            TimeType::V2 => parse_v2(input),
        }
    }

    /// Prints a packed timestamp with nine fractional digits.
    pub fn print(self, key: &[u8]) -> Result<String> {
        match self {
            TimeType::V1 => {
                let ms = unpack_v1(key)?;
                Ok(format!("{}.{:03}000000", ms / 1000, ms % 1000))
            }
            TimeType::V2 => {
                let (sec, ns) = unpack_v2(key)?;
                Ok(format!("{}.{:09}", sec, ns))
            }
        }
    }

    /// Compares two packed timestamps numerically.
    ///
    /// Equals byte-wise lexicographic order on the packed forms; the
    /// numeric implementation exists so the law is testable.
    pub fn cmp(self, a: &[u8], b: &[u8]) -> Result<Ordering> {
        match self {
            TimeType::V1 => Ok(unpack_v1(a)?.cmp(&unpack_v1(b)?)),
            TimeType::V2 => Ok(unpack_v2(a)?.cmp(&unpack_v2(b)?)),
        }
    }

    /// Adds two packed timestamps, wrapping modulo the legal range.
    pub fn add(self, a: &[u8], b: &[u8]) -> Result<Key> {
        match self {
            TimeType::V1 => {
                let sum = unpack_v1(a)?.wrapping_add(unpack_v1(b)?);
                Ok(pack_v1(sum))
            }
            TimeType::V2 => {
                let (sa, na) = unpack_v2(a)?;
                let (sb, nb) = unpack_v2(b)?;
                let mut ns = na + nb;
                let mut carry = 0;
                if ns > MAX_NS {
                    ns -= 1_000_000_000;
                    carry = 1;
                }
                Ok(pack_v2(sa.wrapping_add(sb).wrapping_add(carry), ns))
            }
        }
    }

    /// Subtracts `b` from `a`, returning signed seconds.
    pub fn diff(self, a: &[u8], b: &[u8]) -> Result<f64> {
        match self {
            TimeType::V1 => {
                let d = unpack_v1(a)? as i128 - unpack_v1(b)? as i128;
                Ok(d as f64 / 1000.0)
            }
            TimeType::V2 => {
                let (sa, na) = unpack_v2(a)?;
                let (sb, nb) = unpack_v2(b)?;
                Ok((sa as i64 - sb as i64) as f64 + (na as i64 - nb as i64) as f64 * 1e-9)
            }
        }
    }

    /// True when the packed timestamp denotes time zero.
    pub fn is_zero(self, key: &[u8]) -> bool {
        key.iter().all(|&b| b == 0)
    }

    /// The largest representable timestamp (`inf`).
    pub fn max_key(self) -> Key {
        match self {
            TimeType::V1 => pack_v1(u64::MAX),
            TimeType::V2 => pack_v2(u32::MAX, MAX_NS),
        }
    }

    /// A packed one-second interval, for the `sshift` duplicate policy.
    pub fn one_second(self) -> Key {
        match self {
            TimeType::V1 => pack_v1(1000),
            TimeType::V2 => pack_v2(1, 0),
        }
    }

    /// The smallest representable interval: 1 ns for V2, 1 ms for V1.
    pub fn one_tick(self) -> Key {
        match self {
            TimeType::V1 => pack_v1(1),
            TimeType::V2 => pack_v2(0, 1),
        }
    }

    /// Expected packed key widths for this encoding.
    pub fn key_len_ok(self, len: usize) -> bool {
        match self {
            TimeType::V1 => len == 8,
            TimeType::V2 => len == 4 || len == 8,
        }
    }
}

/// Packs a V1 timestamp (milliseconds).
pub fn pack_v1(ms: u64) -> Key {
    Key::from_vec(ms.to_be_bytes().to_vec())
}

/// Unpacks a V1 timestamp (milliseconds).
pub fn unpack_v1(key: &[u8]) -> Result<u64> {
    let octets: [u8; 8] = key
        .try_into()
        .map_err(|_| Error::Corruption("Broken database: wrong timestamp size".to_string()))?;
    Ok(u64::from_be_bytes(octets))
}

/// Packs a V2 timestamp. The nanoseconds field is omitted when zero.
pub fn pack_v2(sec: u32, ns: u32) -> Key {
    let mut buf = Vec::with_capacity(8);
    buf.extend_from_slice(&sec.to_be_bytes());
    if ns != 0 {
        buf.extend_from_slice(&ns.to_be_bytes());
    }
    Key::from_vec(buf)
}

/// Unpacks a V2 timestamp into (seconds, nanoseconds).
pub fn unpack_v2(key: &[u8]) -> Result<(u32, u32)> {
    match key.len() {
        4 => Ok((u32::from_be_bytes([key[0], key[1], key[2], key[3]]), 0)),
        8 => Ok((
            u32::from_be_bytes([key[0], key[1], key[2], key[3]]),
            u32::from_be_bytes([key[4], key[5], key[6], key[7]]),
        )),
        _ => Err(Error::Corruption(
            "Broken database: wrong timestamp size".to_string(),
        )),
    }
}

// One tick forward/backward with wrap over [0 .. (u32::MAX, MAX_NS)].
fn tick_up_v2(sec: u32, ns: u32) -> (u32, u32) {
    if ns >= MAX_NS {
        (sec.wrapping_add(1), 0)
    } else {
        (sec, ns + 1)
    }
}

fn tick_down_v2(sec: u32, ns: u32) -> (u32, u32) {
    if ns == 0 {
        (sec.wrapping_sub(1), MAX_NS)
    } else {
        (sec, ns - 1)
    }
}

/// Splits a leading run of ASCII digits from the rest of the string.
fn split_digits(s: &str) -> (&str, &str) {
    let end = s
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(s.len());
    s.split_at(end)
}

/// Folds the first `width` fractional digits, right-padding with zeros.
/// Extra digits are dropped without rounding.
fn fold_frac(frac: &str, width: u32) -> u64 {
    let mut val: u64 = 0;
    let bytes = frac.as_bytes();
    for i in 0..width as usize {
        let d = bytes.get(i).map_or(0, |b| (b - b'0') as u64);
        val = val * 10 + d;
    }
    val
}

fn now_v2() -> Result<(u32, u32)> {
    let d = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    if d.as_secs() > u32::MAX as u64 {
        return Err(Error::BadTimestamp(
            "Bad timestamp: system clock is beyond the V2 range".to_string(),
        ));
    }
    Ok((d.as_secs() as u32, d.subsec_nanos()))
}

fn now_ms() -> u64 {
    let d = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    d.as_secs()
        .saturating_mul(1000)
        .saturating_add(d.subsec_millis() as u64)
}

fn parse_v2(input: &str) -> Result<Key> {
    let mut s = input;
    let mut shift = 0i8;
    if let Some(rest) = s.strip_suffix('+') {
        s = rest;
        shift = 1;
    } else if let Some(rest) = s.strip_suffix('-') {
        s = rest;
        shift = -1;
    }

    let (mut sec, mut ns) = if s.eq_ignore_ascii_case("inf") {
        (u32::MAX, MAX_NS)
    } else if s.eq_ignore_ascii_case("now") {
        now_v2()?
    } else if s.eq_ignore_ascii_case("now_s") {
        (now_v2()?.0, 0)
    } else {
        let (int_part, rest) = split_digits(s);
        let sec = int_part
            .parse::<u64>()
            .ok()
            .filter(|&v| v <= u32::MAX as u64)
            .ok_or_else(|| {
                Error::BadTimestamp(format!("Bad timestamp: can't read seconds: {input}"))
            })?;
        let ns = if rest.is_empty() {
            0
        } else {
            let frac = rest.strip_prefix('.').ok_or_else(|| {
                Error::BadTimestamp(format!("Bad timestamp: can't read decimal dot: {input}"))
            })?;
            if !frac.bytes().all(|b| b.is_ascii_digit()) {
                return Err(Error::BadTimestamp(format!(
                    "Bad timestamp: can't read nanoseconds: {input}"
                )));
            }
            fold_frac(frac, 9) as u32
        };
        (sec as u32, ns)
    };

    match shift {
        1 => (sec, ns) = tick_up_v2(sec, ns),
        -1 => (sec, ns) = tick_down_v2(sec, ns),
        _ => {}
    }
    Ok(pack_v2(sec, ns))
}

fn parse_v1(input: &str) -> Result<Key> {
    let mut s = input;
    let mut shift = 0i8;
    if let Some(rest) = s.strip_suffix('+') {
        s = rest;
        shift = 1;
    } else if let Some(rest) = s.strip_suffix('-') {
        s = rest;
        shift = -1;
    }

    let mut ms = if s.eq_ignore_ascii_case("inf") {
        u64::MAX
    } else if s.eq_ignore_ascii_case("now") {
        now_ms()
    } else if s.eq_ignore_ascii_case("now_s") {
        (now_ms() / 1000) * 1000
    } else {
        if s.starts_with('-') {
            return Err(Error::BadTimestamp(format!(
                "Bad V1 timestamp: positive value expected: {input}"
            )));
        }
        let (int_part, rest) = split_digits(s);
        if int_part.is_empty() {
            return Err(Error::BadTimestamp(format!(
                "Bad V1 timestamp: can't read seconds: {input}"
            )));
        }
        let sec = int_part.parse::<u64>().map_err(|_| {
            Error::BadTimestamp(format!("Bad V1 timestamp: too large value: {input}"))
        })?;
        let frac_ms = if rest.is_empty() {
            0
        } else {
            let frac = rest.strip_prefix('.').ok_or_else(|| {
                Error::BadTimestamp(format!("Bad V1 timestamp: can't read decimal dot: {input}"))
            })?;
            if !frac.bytes().all(|b| b.is_ascii_digit()) {
                return Err(Error::BadTimestamp(format!(
                    "Bad V1 timestamp: can't read milliseconds: {input}"
                )));
            }
            fold_frac(frac, 3)
        };
        sec.checked_mul(1000)
            .and_then(|v| v.checked_add(frac_ms))
            .ok_or_else(|| {
                Error::BadTimestamp(format!("Bad V1 timestamp: too large value: {input}"))
            })?
    };

    match shift {
        1 => ms = ms.wrapping_add(1),
        -1 => ms = ms.wrapping_sub(1),
        _ => {}
    }
    Ok(pack_v1(ms))
}
