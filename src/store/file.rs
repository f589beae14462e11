use std::fs;
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Serialize, de::DeserializeOwned};
use sha2::{Digest, Sha256};
use tracing::warn;

use super::Store;
use crate::error::StoreError;

/// Durable [`Store`]: one JSON file per key under `base_dir`.
///
/// Keys are base64url-encoded into file names, so request URIs with `/`
/// and `?` map to flat, filesystem-safe names. Keys whose encoding would
/// exceed common file-name limits are named by their SHA-256 digest instead. Writes go through a
/// temporary file and a rename so a concurrent reader never sees a torn
/// record.
///
/// The `ttl` passed to [`set`](Store::set) is ignored: nothing in-process
/// remembers when a file was written, and expiry on disk is the caller's
/// job.
#[derive(Debug, Clone)]
pub struct FileStore<V> {
    base_dir: PathBuf,
    _value: PhantomData<fn() -> V>,
}

// Leaves room for the temporary-file suffix under a 255-byte name limit.
const MAX_ENCODED_NAME: usize = 200;

impl<V> FileStore<V> {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into(), _value: PhantomData }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let encoded = URL_SAFE_NO_PAD.encode(key);
        if encoded.len() <= MAX_ENCODED_NAME {
            return self.base_dir.join(encoded);
        }
        // `.` never occurs in base64url, so digest names cannot collide with
        // encoded ones.
        let digest = URL_SAFE_NO_PAD.encode(Sha256::digest(key.as_bytes()));
        self.base_dir.join(format!("sha256.{digest}"))
    }
}

impl<V> Store<V> for FileStore<V>
where
    V: Serialize + DeserializeOwned,
{
    fn set(&self, key: &str, value: V, _ttl: Duration) -> Result<(), StoreError> {
        fs::create_dir_all(&self.base_dir)?;

        let data = serde_json::to_vec(&value)?;
        let path = self.path_for(key);
        let mut tmp = path.clone().into_os_string();
        tmp.push(format!(".{}.tmp", uuid::Uuid::new_v4().simple()));
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, data)?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    fn get(&self, key: &str) -> Option<V> {
        let path = self.path_for(key);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(key, path = %path.display(), "file store read failed: {e}");
                return None;
            }
        };

        match serde_json::from_slice(&data) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, path = %path.display(), "file store record unreadable: {e}");
                None
            }
        }
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_dir_all(&self.base_dir) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}
