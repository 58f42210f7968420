use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition};
use tracing::{debug, trace};

use crate::cache::Cache;
use crate::error::{IrDataError, Result};

const RESPONSES: TableDefinition<&str, &[u8]> = TableDefinition::new("responses");

/// Cache persisted in a redb database; every operation is its own transaction.
#[derive(Clone)]
pub struct RedbCache {
    db: Arc<Database>,
}

impl RedbCache {
    /// Open the database at `path`, creating it when missing.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| IrDataError::Persistence(e.to_string()))?;
        }
        let db = Database::create(path).map_err(redb::Error::from)?;
        debug!(cache_file = %path.display(), "response cache opened");
        Ok(Self::new(Arc::new(db)))
    }

    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    fn read(&self, key: &str) -> std::result::Result<Option<Vec<u8>>, redb::Error> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(RESPONSES)?;
        let value = table.get(key)?.map(|guard| guard.value().to_vec());
        Ok(value)
    }
}

impl Cache for RedbCache {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        match self.read(key) {
            Ok(value) => value,
            Err(e) => {
                // a fresh database has no table yet
                trace!(key, error = %e, "cache read treated as miss");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let txn = self.db.begin_write().map_err(redb::Error::from)?;
        {
            let mut table = txn.open_table(RESPONSES).map_err(redb::Error::from)?;
            table.insert(key, value).map_err(redb::Error::from)?;
        }
        txn.commit().map_err(redb::Error::from)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let txn = self.db.begin_write().map_err(redb::Error::from)?;
        {
            let mut table = txn.open_table(RESPONSES).map_err(redb::Error::from)?;
            table.remove(key).map_err(redb::Error::from)?;
        }
        txn.commit().map_err(redb::Error::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open() -> (tempfile::TempDir, RedbCache) {
        let dir = tempfile::tempdir().unwrap();
        let cache = RedbCache::open(&dir.path().join("cache.redb")).unwrap();
        (dir, cache)
    }

    #[test]
    fn fresh_database_misses() {
        let (_dir, cache) = open();
        assert!(cache.get("/data/member/info").is_none());
    }

    #[test]
    fn set_get_delete() {
        let (_dir, cache) = open();
        let key = "/data/results/get?subsession_id=1";

        cache.set(key, br#"{"ok":true}"#).unwrap();
        assert_eq!(cache.get(key).as_deref(), Some(&br#"{"ok":true}"#[..]));

        cache.set(key, b"second").unwrap();
        assert_eq!(cache.get(key).as_deref(), Some(&b"second"[..]));

        cache.delete(key).unwrap();
        assert!(cache.get(key).is_none());
        // deleting an absent key is fine
        cache.delete(key).unwrap();
    }

    #[test]
    fn entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.redb");
        {
            let cache = RedbCache::open(&path).unwrap();
            cache.set("/data/series/get", b"[1,2,3]").unwrap();
        }
        let cache = RedbCache::open(&path).unwrap();
        assert_eq!(cache.get("/data/series/get").as_deref(), Some(&b"[1,2,3]"[..]));
    }
}
