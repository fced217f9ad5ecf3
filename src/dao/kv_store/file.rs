use std::{io::ErrorKind, path::PathBuf, sync::Arc};

use futures::future::BoxFuture;
use tokio::fs;
use tracing::debug;

use super::KeyValueStore;
use crate::dao::storage::{StorageError, StorageResult};

/// Stores each document as `<root>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: Arc<PathBuf>,
}

impl FileStore {
    /// Keep documents under `root`; the directory is created on first save.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Arc::new(root.into()),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn load(&self, key: &str) -> BoxFuture<'static, StorageResult<Option<Vec<u8>>>> {
        let path = self.path_for(key);
        Box::pin(async move {
            match fs::read(&path).await {
                Ok(bytes) => Ok(Some(bytes)),
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    debug!(path = %path.display(), "document not found");
                    Ok(None)
                }
                Err(err) => Err(StorageError::unavailable(
                    format!("failed to read {}", path.display()),
                    err,
                )),
            }
        })
    }

    fn save(&self, key: &str, bytes: Vec<u8>) -> BoxFuture<'static, StorageResult<()>> {
        let root = self.root.clone();
        let path = self.path_for(key);
        Box::pin(async move {
            fs::create_dir_all(root.as_path()).await.map_err(|err| {
                StorageError::unavailable(format!("failed to create {}", root.display()), err)
            })?;

            // Staged write, then an atomic rename.
            let staging = path.with_extension("json.tmp");
            fs::write(&staging, &bytes).await.map_err(|err| {
                StorageError::unavailable(format!("failed to write {}", staging.display()), err)
            })?;
            fs::rename(&staging, &path).await.map_err(|err| {
                StorageError::unavailable(format!("failed to replace {}", path.display()), err)
            })
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let root = self.root.clone();
        Box::pin(async move {
            match fs::metadata(root.as_path()).await {
                Ok(_) => Ok(()),
                Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
                Err(err) => Err(StorageError::unavailable(
                    format!("cannot stat {}", root.display()),
                    err,
                )),
            }
        })
    }
}
