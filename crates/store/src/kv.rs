use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

/// A single operation inside an atomic write batch.
#[derive(Debug, Clone)]
pub enum BatchOp {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

/// Minimal key-value capability the block store is built on.
///
/// `write_batch` must be atomic: either every operation in the batch becomes
/// visible or none does.
pub trait KvStore: Send + Sync + 'static {
    fn get(&self, key: &[u8]) -> anyhow::Result<Option<Vec<u8>>>;

    fn put(&self, key: &[u8], value: &[u8]) -> anyhow::Result<()>;

    fn delete(&self, key: &[u8]) -> anyhow::Result<()>;

    fn write_batch(&self, ops: Vec<BatchOp>) -> anyhow::Result<()>;
}

/// In-memory KV backend. Used for tests and for nodes run without a
/// storage path configured.
#[derive(Debug, Default)]
pub struct InMemoryKv {
    map: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl InMemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for InMemoryKv {
    fn get(&self, key: &[u8]) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.map.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> anyhow::Result<()> {
        self.map.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> anyhow::Result<()> {
        self.map.write().remove(key);
        Ok(())
    }

    fn write_batch(&self, ops: Vec<BatchOp>) -> anyhow::Result<()> {
        let mut map = self.map.write();
        for op in ops {
            match op {
                BatchOp::Put { key, value } => {
                    map.insert(key, value);
                }
                BatchOp::Delete { key } => {
                    map.remove(&key);
                }
            }
        }
        Ok(())
    }
}

/// Namespacing wrapper: every key is transparently prefixed with
/// `{prefix}/`, isolating writers sharing one backing store.
#[derive(Debug)]
pub struct PrefixKv<K> {
    inner: Arc<K>,
    prefix: Vec<u8>,
}

impl<K> Clone for PrefixKv<K> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            prefix: self.prefix.clone(),
        }
    }
}

impl<K: KvStore> PrefixKv<K> {
    pub fn new(inner: Arc<K>, prefix: &str) -> Self {
        let mut p = prefix.as_bytes().to_vec();
        p.push(b'/');
        Self { inner, prefix: p }
    }

    fn prefixed(&self, key: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.prefix.len() + key.len());
        out.extend_from_slice(&self.prefix);
        out.extend_from_slice(key);
        out
    }
}

impl<K: KvStore> KvStore for PrefixKv<K> {
    fn get(&self, key: &[u8]) -> anyhow::Result<Option<Vec<u8>>> {
        self.inner.get(&self.prefixed(key))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> anyhow::Result<()> {
        self.inner.put(&self.prefixed(key), value)
    }

    fn delete(&self, key: &[u8]) -> anyhow::Result<()> {
        self.inner.delete(&self.prefixed(key))
    }

    fn write_batch(&self, ops: Vec<BatchOp>) -> anyhow::Result<()> {
        let ops = ops
            .into_iter()
            .map(|op| match op {
                BatchOp::Put { key, value } => BatchOp::Put {
                    key: self.prefixed(&key),
                    value,
                },
                BatchOp::Delete { key } => BatchOp::Delete {
                    key: self.prefixed(&key),
                },
            })
            .collect();
        self.inner.write_batch(ops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_do_not_collide() {
        let base = Arc::new(InMemoryKv::new());
        let main = PrefixKv::new(base.clone(), "0");
        let dalc = PrefixKv::new(base.clone(), "1");

        main.put(b"k", b"main").unwrap();
        dalc.put(b"k", b"dalc").unwrap();

        assert_eq!(main.get(b"k").unwrap(), Some(b"main".to_vec()));
        assert_eq!(dalc.get(b"k").unwrap(), Some(b"dalc".to_vec()));

        main.delete(b"k").unwrap();
        assert_eq!(main.get(b"k").unwrap(), None);
        assert_eq!(dalc.get(b"k").unwrap(), Some(b"dalc".to_vec()));
    }

    #[test]
    fn batch_is_applied_in_order() {
        let kv = InMemoryKv::new();
        kv.write_batch(vec![
            BatchOp::Put {
                key: b"a".to_vec(),
                value: b"1".to_vec(),
            },
            BatchOp::Delete { key: b"a".to_vec() },
            BatchOp::Put {
                key: b"b".to_vec(),
                value: b"2".to_vec(),
            },
        ])
        .unwrap();

        assert_eq!(kv.get(b"a").unwrap(), None);
        assert_eq!(kv.get(b"b").unwrap(), Some(b"2".to_vec()));
    }
}
