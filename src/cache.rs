//! On-disk response cache.
//!
//! Every successful response is stored verbatim in its own file, named after
//! the SHA-256 fingerprint of the request URL. Entries never expire: BDL data
//! is published yearly, so the operator clears the cache by hand when fresher
//! data is wanted.
//!
//! # Example
//!
//! ```rust,no_run
//! use bdl_api_client::cache::ResponseCache;
//!
//! # async fn run() -> bdl_api_client::Result<()> {
//! let cache = ResponseCache::open("api_cache").await?;
//! let url = "https://bdl.stat.gov.pl/api/v1/units?level=0&format=json";
//!
//! if cache.get(url).await.is_none() {
//!     cache.set(url, r#"{"results":[]}"#).await?;
//! }
//! # Ok(())
//! # }
//! ```

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::fs;

use crate::error::BdlError;

/// Extension of cache entry files.
const ENTRY_EXTENSION: &str = "json";

/// Extension of in-flight writes, named `<digest>.<random>.tmp`.
const TEMP_EXTENSION: &str = "tmp";

/// Length of a hex-encoded SHA-256 digest.
const FINGERPRINT_LEN: usize = 64;

/// Lowercase hex SHA-256 of a request key.
pub fn fingerprint(key: &str) -> String {
    format!("{:x}", Sha256::digest(key.as_bytes()))
}

/// Content-addressed store of response bodies.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    dir: PathBuf,
}

impl ResponseCache {
    /// Open the cache at `dir`, creating the directory if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, BdlError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    /// Cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File that holds (or would hold) the entry for `key`.
    pub fn entry_path(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", fingerprint(key), ENTRY_EXTENSION))
    }

    /// Stored response for `key`, if any.
    ///
    /// An entry that cannot be read is reported as absent.
    pub async fn get(&self, key: &str) -> Option<String> {
        let path = self.entry_path(key);
        match fs::read_to_string(&path).await {
            Ok(payload) => Some(payload),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!("Ignoring unreadable cache entry {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Store `payload` for `key`, replacing any previous entry.
    ///
    /// Each call writes its own uniquely named temporary file and renames it
    /// into place, so readers never see a partial payload and concurrent
    /// writers of the same key do not collide.
    pub async fn set(&self, key: &str, payload: &str) -> Result<(), BdlError> {
        let dir = self.dir.clone();
        let path = self.entry_path(key);
        let prefix = format!("{}.", fingerprint(key));
        let payload = payload.to_owned();

        tokio::task::spawn_blocking(move || -> io::Result<()> {
            let mut tmp = tempfile::Builder::new()
                .prefix(&prefix)
                .suffix(&format!(".{}", TEMP_EXTENSION))
                .tempfile_in(&dir)?;
            tmp.write_all(payload.as_bytes())?;
            tmp.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(io::Error::other)??;
        Ok(())
    }

    /// Check if `key` has an entry.
    pub async fn contains(&self, key: &str) -> bool {
        fs::try_exists(self.entry_path(key)).await.unwrap_or(false)
    }

    /// Delete every entry, returning how many were removed.
    ///
    /// Leftover temporary files from interrupted writes are removed too but
    /// not counted. Other files sharing the directory (such as a quota state
    /// file) survive.
    pub async fn clear(&self) -> Result<usize, BdlError> {
        let mut removed = 0;
        let mut leftovers = 0;
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if is_entry_file(&path) {
                fs::remove_file(&path).await?;
                removed += 1;
            } else if is_temp_file(&path) {
                fs::remove_file(&path).await?;
                leftovers += 1;
            }
        }
        if leftovers > 0 {
            tracing::debug!("Removed {} unfinished cache writes", leftovers);
        }
        tracing::info!("Cleared {} cached responses from {}", removed, self.dir.display());
        Ok(removed)
    }
}

fn is_digest(name: &str) -> bool {
    name.len() == FINGERPRINT_LEN && name.bytes().all(|b| b.is_ascii_hexdigit())
}

fn is_entry_file(path: &Path) -> bool {
    let has_extension = path.extension().is_some_and(|ext| ext == ENTRY_EXTENSION);
    let stem = path.file_stem().and_then(|stem| stem.to_str());
    has_extension && stem.is_some_and(is_digest)
}

fn is_temp_file(path: &Path) -> bool {
    let has_extension = path.extension().is_some_and(|ext| ext == TEMP_EXTENSION);
    let digest = path
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.split_once('.'))
        .map(|(digest, _)| digest);
    has_extension && digest.is_some_and(is_digest)
}
