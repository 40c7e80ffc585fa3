use std::path::Path;

use rocksdb::{Options, WriteBatch, DB};

use crate::{BatchOp, KvStore};

/// RocksDB-backed KV store. Batches map onto RocksDB write batches, which
/// gives the atomicity [`KvStore::write_batch`] requires.
pub struct RocksKv {
    db: DB,
}

impl RocksKv {
    /// Opens (or creates) a database at `{path}/laminar`.
    pub fn open(path: impl AsRef<Path>, max_open_files: Option<i32>) -> anyhow::Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        if let Some(max) = max_open_files {
            opts.set_max_open_files(max);
        }
        let db = DB::open(&opts, path.as_ref().join("laminar"))?;
        Ok(Self { db })
    }
}

impl KvStore for RocksKv {
    fn get(&self, key: &[u8]) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.db.get(key)?)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> anyhow::Result<()> {
        Ok(self.db.put(key, value)?)
    }

    fn delete(&self, key: &[u8]) -> anyhow::Result<()> {
        Ok(self.db.delete(key)?)
    }

    fn write_batch(&self, ops: Vec<BatchOp>) -> anyhow::Result<()> {
        let mut batch = WriteBatch::default();
        for op in ops {
            match op {
                BatchOp::Put { key, value } => batch.put(key, value),
                BatchOp::Delete { key } => batch.delete(key),
            }
        }
        Ok(self.db.write(batch)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let kv = RocksKv::open(dir.path(), None).unwrap();
            kv.put(b"height", b"42").unwrap();
        }
        let kv = RocksKv::open(dir.path(), None).unwrap();
        assert_eq!(kv.get(b"height").unwrap(), Some(b"42".to_vec()));
    }
}
