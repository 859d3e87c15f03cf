//! A file-backed `KvStore` so the CLI's workflow and reaper state survive
//! across separate invocations (`propose` in one process, `approve` in the
//! next), without pulling in a full embedded database for a reference CLI.

use aec_core::{CoreError, KvStore, Result as CoreResult};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub struct FileKvStore {
    path: PathBuf,
    inner: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl FileKvStore {
    pub fn open(path: impl Into<PathBuf>) -> CoreResult<Self> {
        let path = path.into();
        let inner = if path.exists() {
            let bytes = std::fs::read(&path)
                .map_err(|e| CoreError::Persistence(format!("reading {}: {e}", path.display())))?;
            serde_json::from_slice(&bytes)
                .map_err(|e| CoreError::Persistence(format!("decoding {}: {e}", path.display())))?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path,
            inner: RwLock::new(inner),
        })
    }

    fn flush(&self, snapshot: &BTreeMap<String, Vec<u8>>) -> CoreResult<()> {
        let bytes = serde_json::to_vec(snapshot)
            .map_err(|e| CoreError::Persistence(format!("encoding state: {e}")))?;
        write_atomic(&self.path, &bytes)
            .map_err(|e| CoreError::Persistence(format!("writing {}: {e}", self.path.display())))
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)
}

impl KvStore for FileKvStore {
    fn put(&self, key: &str, value: Vec<u8>) -> CoreResult<()> {
        let mut guard = self.inner.write();
        guard.insert(key.to_string(), value);
        self.flush(&guard)
    }

    fn get(&self, key: &str) -> CoreResult<Option<Vec<u8>>> {
        Ok(self.inner.read().get(key).cloned())
    }

    fn scan(&self, prefix: &str) -> CoreResult<Vec<(String, Vec<u8>)>> {
        Ok(self
            .inner
            .read()
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn delete(&self, key: &str) -> CoreResult<()> {
        let mut guard = self.inner.write();
        guard.remove(key);
        self.flush(&guard)
    }
}
