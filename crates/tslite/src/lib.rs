//! TSLite - a lightweight time series database.
//!
//! This crate stores ordered (timestamp -> value vector) records in
//! independent, named, on-disk B-tree files under a shared environment
//! directory. Each database carries a typed schema (eleven numeric/text
//! formats) and a versioned timestamp encoding.
//!
//! # Components
//!
//! - [`codec`]: bit-exact binary encoding of timestamps and data tuples,
//!   plus parsing, printing, arithmetic and interpolation over the packed
//!   forms
//! - [`Schema`]: the per-database metadata record
//! - [`Db`]: an open database handle with put/get/nearest-neighbor/range
//!   operations over the ordered store
//! - [`DbPool`]: the process-local registry of open handles
//! - [`DbOut`]: the output sink formatting retrieved points
//! - [`Filter`]: the pluggable per-point predicate interface
//!
//! # Example
//!
//! ```rust,ignore
//! use tslite::{DataType, DbOut, DbPool, DupPolicy, OpenMode, Schema};
//!
//! let mut pool = DbPool::open("/var/lib/tslite")?;
//! pool.create("temperature", Schema::new(DataType::Double, "mK"))?;
//!
//! let db = pool.get("temperature", OpenMode::ReadWrite)?;
//! db.put("now", &["297.15".to_string()], DupPolicy::Replace)?;
//!
//! let mut out = DbOut::new(std::io::stdout());
//! db.get_range("0", "inf", "0", &mut out)?;
//! ```

#![deny(missing_docs)]

pub mod cli;
pub mod codec;
pub mod error;
pub mod filter;
pub mod output;
pub mod schema;
pub mod store;

pub use codec::{DataType, Key, TimeType};
pub use error::{Error, Result};
pub use filter::{Filter, FnFilter};
pub use output::{DbOut, PointOutput};
pub use schema::{check_name, Schema};
pub use store::{Db, DbPool, DupPolicy, Env, OpenMode};
