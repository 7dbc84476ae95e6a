//! The handle pool: a process-local registry of open database handles.
//!
//! The pool owns the [`Env`] and maps database names to open [`Db`]
//! handles. Callers receive borrowed references whose lifetime is bounded
//! by the pool. A cached read-only handle is evicted and reopened when a
//! caller requires write access; a cached writable handle satisfies both.
//! Remove and rename evict the affected handles before touching files, so
//! the store never sees an operation on an open file.

use crate::error::{Error, Result};
use crate::schema::{check_name, Schema};
use crate::store::{Db, Env, OpenMode};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Process-local mapping from database name to open handle.
pub struct DbPool {
    env: Env,
    pool: BTreeMap<String, Db>,
}

impl DbPool {
    /// Opens the pool over an environment directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<DbPool> {
        Ok(DbPool {
            env: Env::open(dir)?,
            pool: BTreeMap::new(),
        })
    }

    /// The environment this pool owns.
    pub fn env(&self) -> &Env {
        &self.env
    }

    /// Returns the handle for `name`, opening or reopening as needed.
    ///
    /// An existing read-only handle is closed and reopened when the caller
    /// asks for write access.
    pub fn get(&mut self, name: &str, mode: OpenMode) -> Result<&mut Db> {
        check_name(name)?;
        if mode == OpenMode::ReadWrite
            && self
                .pool
                .get(name)
                .is_some_and(|db| db.mode() == OpenMode::ReadOnly)
        {
            debug!(db = name, "reopening read-only handle for write access");
            self.pool.remove(name);
        }
        match self.pool.entry(name.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => Ok(entry.insert(Db::open(&self.env, name, mode)?)),
        }
    }

    /// Creates a database (create-exclusive) and caches its handle.
    pub fn create(&mut self, name: &str, schema: Schema) -> Result<&mut Db> {
        check_name(name)?;
        if self.pool.contains_key(name) {
            return Err(Error::Conflict(format!(
                "{name}: database exists in the pool"
            )));
        }
        let db = Db::create(&self.env, name, schema)?;
        match self.pool.entry(name.to_string()) {
            Entry::Occupied(_) => unreachable!("checked above"),
            Entry::Vacant(entry) => Ok(entry.insert(db)),
        }
    }

    /// Removes a database, evicting its handle first.
    pub fn remove(&mut self, name: &str) -> Result<()> {
        check_name(name)?;
        self.pool.remove(name);
        self.env.remove(name)
    }

    /// Renames a database, evicting the handles for both names first.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<()> {
        check_name(old)?;
        check_name(new)?;
        self.pool.remove(old);
        self.pool.remove(new);
        self.env.rename(old, new)
    }

    /// Lists the databases in the environment directory.
    pub fn list(&self) -> Result<Vec<String>> {
        self.env.list()
    }

    /// Flushes one cached handle; a handle that is not cached is a no-op.
    pub fn sync_one(&self, name: &str) -> Result<()> {
        check_name(name)?;
        match self.pool.get(name) {
            Some(db) => db.sync(),
            None => Ok(()),
        }
    }

    /// Flushes every cached handle.
    pub fn sync_all(&self) -> Result<()> {
        for db in self.pool.values() {
            db.sync()?;
        }
        Ok(())
    }

    /// Closes one cached handle, flushing it on the way out.
    pub fn close_one(&mut self, name: &str) -> Result<()> {
        check_name(name)?;
        self.pool.remove(name);
        Ok(())
    }

    /// Closes every cached handle.
    pub fn close_all(&mut self) {
        self.pool.clear();
    }

    /// Number of cached handles.
    pub fn cached(&self) -> usize {
        self.pool.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::DataType;
    use crate::store::DupPolicy;
    use tempfile::TempDir;

    fn strs(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_get_upgrades_read_only_handles() {
        let dir = TempDir::new().unwrap();
        let mut pool = DbPool::open(dir.path()).unwrap();
        pool.create("x", Schema::default()).unwrap();
        pool.close_all();

        let db = pool.get("x", OpenMode::ReadOnly).unwrap();
        assert_eq!(db.mode(), OpenMode::ReadOnly);

        // a writer arrives: the cached read-only handle must be replaced
        let db = pool.get("x", OpenMode::ReadWrite).unwrap();
        assert_eq!(db.mode(), OpenMode::ReadWrite);
        db.put("1", &strs(&["1"]), DupPolicy::Replace).unwrap();

        // a writable handle satisfies later read-only requests
        let db = pool.get("x", OpenMode::ReadOnly).unwrap();
        assert_eq!(db.mode(), OpenMode::ReadWrite);
        assert_eq!(pool.cached(), 1);
    }

    #[test]
    fn test_create_conflicts_with_cached_handle() {
        let dir = TempDir::new().unwrap();
        let mut pool = DbPool::open(dir.path()).unwrap();
        pool.create("x", Schema::default()).unwrap();
        let err = pool.create("x", Schema::default()).unwrap_err();
        assert_eq!(err.to_string(), "x: database exists in the pool");
    }

    #[test]
    fn test_remove_evicts_and_fails_on_unknown() {
        let dir = TempDir::new().unwrap();
        let mut pool = DbPool::open(dir.path()).unwrap();
        pool.create("x", Schema::new(DataType::Double, "")).unwrap();
        assert_eq!(pool.cached(), 1);
        pool.remove("x").unwrap();
        assert_eq!(pool.cached(), 0);
        assert!(pool.list().unwrap().is_empty());

        let err = pool.remove("ghost").unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_rename_evicts_both_names() {
        let dir = TempDir::new().unwrap();
        let mut pool = DbPool::open(dir.path()).unwrap();
        pool.create("a", Schema::default()).unwrap();
        pool.create("b", Schema::default()).unwrap();

        // the destination file exists: refuse
        let err = pool.rename("a", "b").unwrap_err();
        assert_eq!(
            err.to_string(),
            "can't rename database, destination exists: b.db"
        );

        // a handle stays cached under "b" while its file disappears behind
        // the pool's back; rename must evict it along with the source handle
        std::fs::remove_file(dir.path().join("b.db")).unwrap();
        assert_eq!(pool.cached(), 2);
        pool.rename("a", "b").unwrap();
        assert_eq!(pool.cached(), 0);
        assert_eq!(pool.list().unwrap(), vec!["b"]);
        pool.get("b", OpenMode::ReadOnly).unwrap();
    }

    #[test]
    fn test_names_are_validated_everywhere() {
        let dir = TempDir::new().unwrap();
        let mut pool = DbPool::open(dir.path()).unwrap();
        for name in ["a.b", "a:1", "a+b", "a|b", "a/b", "a b", "a\tb", "a\nb"] {
            assert!(matches!(pool.get(name, OpenMode::ReadOnly), Err(Error::BadName(_))));
            assert!(matches!(pool.create(name, Schema::default()), Err(Error::BadName(_))));
            assert!(matches!(pool.remove(name), Err(Error::BadName(_))));
            assert!(matches!(pool.rename(name, "ok"), Err(Error::BadName(_))));
            assert!(matches!(pool.rename("ok", name), Err(Error::BadName(_))));
            assert!(matches!(pool.sync_one(name), Err(Error::BadName(_))));
        }
    }

    #[test]
    fn test_sync_and_close() {
        let dir = TempDir::new().unwrap();
        let mut pool = DbPool::open(dir.path()).unwrap();
        pool.create("a", Schema::default()).unwrap();
        pool.create("b", Schema::default()).unwrap();
        pool.sync_one("a").unwrap();
        pool.sync_one("missing").unwrap(); // not cached: no-op
        pool.sync_all().unwrap();
        pool.close_one("a").unwrap();
        assert_eq!(pool.cached(), 1);
        pool.close_all();
        assert_eq!(pool.cached(), 0);
    }
}
