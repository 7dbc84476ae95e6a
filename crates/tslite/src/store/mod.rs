//! The storage engine: one ordered B-tree file per database.
//!
//! # Architecture
//!
//! ```text
//! DbPool -> Db handle -> redb file (<name>.db) in the environment directory
//! ```
//!
//! An [`Env`] is a directory holding one `redb` file per named database. A
//! [`Db`] owns one open file plus its cached [`Schema`]; it encodes
//! arguments through the codec, drives the store via range cursors, and
//! hands every emitted point to a [`PointOutput`] sink.
//!
//! Records live in a single ordered table keyed by packed timestamps; the
//! schema record sits under the reserved all-zero key, which sorts before
//! every real timestamp and is never emitted by queries.
//!
//! A handle is single-threaded; handles for different databases may run on
//! different threads. The pool itself is not thread-safe; callers that
//! share one wrap it in a mutex.

pub mod pool;

use crate::codec::{data, DataType, Key};
use crate::error::{Error, Result};
use crate::output::PointOutput;
use crate::schema::{check_name, Schema, SCHEMA_KEY};
use redb::{Database, ReadableTable, TableDefinition};
use std::fs;
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

pub use pool::DbPool;

/// The single ordered table inside every database file.
const POINTS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("points");

/// How a handle may access its file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Queries only; `put`, `del` and `write_info` are rejected.
    ReadOnly,
    /// Full access.
    ReadWrite,
}

/// What `put` does when a record already exists at the exact key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DupPolicy {
    /// Overwrite the existing record.
    #[default]
    Replace,
    /// Leave the existing record in place; the put becomes a no-op.
    Skip,
    /// Fail with `Timestamp exists`.
    Error,
    /// Advance the timestamp by one second until the key is free.
    Sshift,
    /// Advance by the smallest step (1 ns, or 1 ms for V1 databases).
    Nsshift,
}

impl FromStr for DupPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "replace" => Ok(DupPolicy::Replace),
            "skip" => Ok(DupPolicy::Skip),
            "error" => Ok(DupPolicy::Error),
            "sshift" => Ok(DupPolicy::Sshift),
            "nsshift" => Ok(DupPolicy::Nsshift),
            _ => Err(Error::Usage(format!(
                "unknown duplicate timestamp policy: {s}"
            ))),
        }
    }
}

/// The shared environment: a directory of database files.
#[derive(Debug, Clone)]
pub struct Env {
    dir: PathBuf,
}

impl Env {
    /// Opens the environment, creating the directory if needed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Env> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Env { dir })
    }

    /// The environment directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The file path backing a database name.
    pub fn db_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.db"))
    }

    /// Lists the databases in the environment, sorted by name.
    pub fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let file = entry?.file_name();
            let file = file.to_string_lossy();
            if let Some(name) = file.strip_suffix(".db") {
                if !name.is_empty() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Removes a database file.
    pub fn remove(&self, name: &str) -> Result<()> {
        check_name(name)?;
        let path = self.db_path(name);
        if !path.exists() {
            return Err(Error::NotFound(format!("{name}.db: no such database")));
        }
        fs::remove_file(path)?;
        debug!(db = name, "removed database file");
        Ok(())
    }

    /// Renames a database file, refusing to clobber an existing destination.
    pub fn rename(&self, old: &str, new: &str) -> Result<()> {
        check_name(old)?;
        check_name(new)?;
        let from = self.db_path(old);
        let to = self.db_path(new);
        if to.exists() {
            return Err(Error::Conflict(format!(
                "can't rename database, destination exists: {new}.db"
            )));
        }
        if !from.exists() {
            return Err(Error::NotFound(format!("{old}.db: no such database")));
        }
        fs::rename(from, to)?;
        debug!(from = old, to = new, "renamed database file");
        Ok(())
    }
}

/// An open database: one ordered file plus its cached schema.
#[derive(Debug)]
pub struct Db {
    name: String,
    mode: OpenMode,
    schema: Schema,
    db: Database,
}

impl Db {
    /// Creates a new database file (create-exclusive) and writes its schema
    /// record.
    pub fn create(env: &Env, name: &str, schema: Schema) -> Result<Db> {
        check_name(name)?;
        let path = env.db_path(name);
        if path.exists() {
            return Err(Error::Conflict(format!(
                "can't create database, file exists: {name}.db"
            )));
        }
        let db = Database::create(&path)?;
        let txn = db.begin_write()?;
        {
            let mut table = txn.open_table(POINTS)?;
            table.insert(SCHEMA_KEY, schema.to_bytes().as_slice())?;
        }
        txn.commit()?;
        debug!(db = name, "created database");
        Ok(Db {
            name: name.to_string(),
            mode: OpenMode::ReadWrite,
            schema,
            db,
        })
    }

    /// Opens an existing database and reads its schema record.
    pub fn open(env: &Env, name: &str, mode: OpenMode) -> Result<Db> {
        check_name(name)?;
        let path = env.db_path(name);
        if !path.exists() {
            return Err(Error::NotFound(format!("{name}.db: no such database")));
        }
        let db = Database::open(&path)?;
        let schema = {
            let txn = db.begin_read()?;
            let table = txn.open_table(POINTS)?;
            let record = table.get(SCHEMA_KEY)?.ok_or_else(|| {
                Error::Corruption("Broken database: no schema record".to_string())
            })?;
            Schema::from_bytes(record.value())?
        };
        debug!(db = name, ?mode, "opened database");
        Ok(Db {
            name: name.to_string(),
            mode,
            schema,
            db,
        })
    }

    /// The database name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The access mode this handle was opened with.
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// The schema record, as cached at open time.
    pub fn read_info(&self) -> &Schema {
        &self.schema
    }

    fn require_writable(&self) -> Result<()> {
        if self.mode == OpenMode::ReadOnly {
            return Err(Error::Io(format!(
                "{}.db: database is opened read-only",
                self.name
            )));
        }
        Ok(())
    }

    /// Rewrites the schema record. Only the description may change; the
    /// timestamp version and data type are fixed at creation.
    pub fn write_info(&mut self, schema: Schema) -> Result<()> {
        self.require_writable()?;
        if schema.ttype != self.schema.ttype || schema.dtype != self.schema.dtype {
            return Err(Error::BadSchema(
                "can't change the time format or data format of an existing database".to_string(),
            ));
        }
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(POINTS)?;
            table.insert(SCHEMA_KEY, schema.to_bytes().as_slice())?;
        }
        txn.commit()?;
        self.schema = schema;
        Ok(())
    }

    /// Writes one point, resolving timestamp collisions per `policy`.
    pub fn put(&mut self, time: &str, values: &[String], policy: DupPolicy) -> Result<()> {
        self.require_writable()?;
        let parsed = self.schema.ttype.parse(time)?;
        let value = self.schema.dtype.parse(values)?;
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(POINTS)?;
            let mut key = parsed;
            match policy {
                DupPolicy::Replace => {}
                DupPolicy::Skip => {
                    if table.get(key.as_bytes())?.is_some() {
                        return Ok(());
                    }
                }
                DupPolicy::Error => {
                    if table.get(key.as_bytes())?.is_some() {
                        return Err(Error::Conflict("Timestamp exists".to_string()));
                    }
                }
                DupPolicy::Sshift | DupPolicy::Nsshift => {
                    let step = match policy {
                        DupPolicy::Sshift => self.schema.ttype.one_second(),
                        _ => self.schema.ttype.one_tick(),
                    };
                    while table.get(key.as_bytes())?.is_some() {
                        let shifted = self.schema.ttype.add(key.as_bytes(), step.as_bytes())?;
                        if shifted.as_bytes() <= key.as_bytes() {
                            return Err(Error::Conflict(
                                "can't shift the timestamp past the end of the time range"
                                    .to_string(),
                            ));
                        }
                        key = shifted;
                    }
                }
            }
            table.insert(key.as_bytes(), value.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Emits the first point at or after `t1`.
    pub fn get_next(&self, t1: &str, out: &mut dyn PointOutput) -> Result<()> {
        let key = self.schema.ttype.parse(t1)?;
        let txn = self.db.begin_read()?;
        let table = txn.open_table(POINTS)?;
        let mut range = table.range::<&[u8]>(key.as_bytes()..)?;
        while let Some(item) = range.next() {
            let (k, v) = item?;
            if k.value() == SCHEMA_KEY {
                continue;
            }
            out.proc_point(k.value(), v.value(), &self.schema)?;
            break;
        }
        Ok(())
    }

    /// Emits the last point at or before `t2`.
    pub fn get_prev(&self, t2: &str, out: &mut dyn PointOutput) -> Result<()> {
        let key = self.schema.ttype.parse(t2)?;
        let txn = self.db.begin_read()?;
        let table = txn.open_table(POINTS)?;
        let mut range = table.range::<&[u8]>(..=key.as_bytes())?;
        while let Some(item) = range.next_back() {
            let (k, v) = item?;
            if k.value() == SCHEMA_KEY {
                break;
            }
            out.proc_point(k.value(), v.value(), &self.schema)?;
            break;
        }
        Ok(())
    }

    /// Emits the point for `t`: the exact match when one exists, the
    /// interpolated point for FLOAT/DOUBLE databases when `t` falls between
    /// two records, and the previous point otherwise.
    pub fn get(&self, t: &str, out: &mut dyn PointOutput) -> Result<()> {
        let key = self.schema.ttype.parse(t)?;
        let txn = self.db.begin_read()?;
        let table = txn.open_table(POINTS)?;

        let mut prev: Option<(Vec<u8>, Vec<u8>)> = None;
        {
            let mut range = table.range::<&[u8]>(..=key.as_bytes())?;
            while let Some(item) = range.next_back() {
                let (k, v) = item?;
                if k.value() == SCHEMA_KEY {
                    break;
                }
                prev = Some((k.value().to_vec(), v.value().to_vec()));
                break;
            }
        }
        let Some((pk, pv)) = prev else {
            return Ok(());
        };
        if pk.as_slice() == key.as_bytes() {
            out.proc_point(&pk, &pv, &self.schema)?;
            return Ok(());
        }
        if matches!(self.schema.dtype, DataType::Float | DataType::Double) {
            let mut range =
                table.range::<&[u8]>((Bound::Excluded(pk.as_slice()), Bound::Unbounded))?;
            if let Some(item) = range.next() {
                let (nk, nv) = item?;
                let blended = data::interpolate(
                    &self.schema,
                    key.as_bytes(),
                    &pk,
                    nk.value(),
                    &pv,
                    nv.value(),
                )?;
                if !blended.is_empty() {
                    out.proc_point(key.as_bytes(), &blended, &self.schema)?;
                    return Ok(());
                }
            }
        }
        out.proc_point(&pk, &pv, &self.schema)?;
        Ok(())
    }

    /// Emits every point in `[t1, t2]` in ascending order.
    ///
    /// With a non-zero `dt`, after a point at key `k` the cursor seeks the
    /// first key at or after `k + dt` instead of scanning linearly.
    pub fn get_range(
        &self,
        t1: &str,
        t2: &str,
        dt: &str,
        out: &mut dyn PointOutput,
    ) -> Result<()> {
        let k1 = self.schema.ttype.parse(t1)?;
        let k2 = self.schema.ttype.parse(t2)?;
        let step = self.schema.ttype.parse(dt)?;
        let txn = self.db.begin_read()?;
        let table = txn.open_table(POINTS)?;

        if self.schema.ttype.is_zero(step.as_bytes()) {
            let mut range = table.range::<&[u8]>(k1.as_bytes()..=k2.as_bytes())?;
            while let Some(item) = range.next() {
                let (k, v) = item?;
                if k.value() == SCHEMA_KEY {
                    continue;
                }
                if !out.proc_point(k.value(), v.value(), &self.schema)? {
                    break;
                }
            }
            return Ok(());
        }

        let mut lower = k1;
        loop {
            let mut found: Option<(Vec<u8>, Vec<u8>)> = None;
            {
                let mut range = table.range::<&[u8]>(lower.as_bytes()..)?;
                while let Some(item) = range.next() {
                    let (k, v) = item?;
                    if k.value() == SCHEMA_KEY {
                        continue;
                    }
                    found = Some((k.value().to_vec(), v.value().to_vec()));
                    break;
                }
            }
            let Some((k, v)) = found else {
                break;
            };
            if k.as_slice() > k2.as_bytes() {
                break;
            }
            if !out.proc_point(&k, &v, &self.schema)? {
                break;
            }
            let next = self.schema.ttype.add(&k, step.as_bytes())?;
            if next.as_bytes() <= k.as_slice() {
                // the step wrapped past the end of the time range
                break;
            }
            lower = next;
        }
        Ok(())
    }

    /// Removes the record at the exact key. A missing record is a no-op.
    pub fn del(&mut self, t: &str) -> Result<()> {
        self.require_writable()?;
        let key = self.schema.ttype.parse(t)?;
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(POINTS)?;
            table.remove(key.as_bytes())?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Removes every record with a key in `[t1, t2]`.
    pub fn del_range(&mut self, t1: &str, t2: &str) -> Result<()> {
        self.require_writable()?;
        let k1 = self.schema.ttype.parse(t1)?;
        let k2 = self.schema.ttype.parse(t2)?;
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(POINTS)?;
            let mut doomed: Vec<Vec<u8>> = Vec::new();
            {
                let mut range = table.range::<&[u8]>(k1.as_bytes()..=k2.as_bytes())?;
                while let Some(item) = range.next() {
                    let (k, _) = item?;
                    if k.value() == SCHEMA_KEY {
                        continue;
                    }
                    doomed.push(k.value().to_vec());
                }
            }
            for key in &doomed {
                table.remove(key.as_slice())?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    /// Flushes dirty pages of this handle to disk.
    pub fn sync(&self) -> Result<()> {
        if self.mode == OpenMode::ReadOnly {
            return Ok(());
        }
        let txn = self.db.begin_write()?;
        txn.commit()?;
        debug!(db = %self.name, "synced database");
        Ok(())
    }

    /// Collects the packed keys currently in the database, in order.
    /// Intended for tests and diagnostics.
    pub fn keys(&self) -> Result<Vec<Key>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(POINTS)?;
        let mut keys = Vec::new();
        let mut range = table.range::<&[u8]>(..)?;
        while let Some(item) = range.next() {
            let (k, _) = item?;
            if k.value() == SCHEMA_KEY {
                continue;
            }
            keys.push(Key::from_bytes(k.value()));
        }
        Ok(keys)
    }
}
