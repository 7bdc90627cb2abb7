use std::fs;
use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Failed to create cache directory {dir:?}: {source}")]
    CreateDir {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cache I/O failed for key {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },
}

/// Directory-backed store for downloaded workbooks, one file per cache key.
/// Entries are permanent download artifacts; nothing evicts them.
pub struct DownloadCache {
    dir: PathBuf,
}

impl DownloadCache {
    /// Open the cache rooted at `dir`, creating the directory if absent
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| CacheError::CreateDir {
            dir: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        match fs::read(self.entry_path(key)) {
            Ok(bytes) => {
                debug!("Cache hit for {key} ({} bytes)", bytes.len());
                Ok(Some(bytes))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CacheError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    pub fn put(&self, key: &str, bytes: &[u8]) -> Result<(), CacheError> {
        fs::write(self.entry_path(key), bytes).map_err(|source| CacheError::Io {
            key: key.to_string(),
            source,
        })?;
        debug!("Cached {key} ({} bytes)", bytes.len());
        Ok(())
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}
