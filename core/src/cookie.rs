//! JSON-file-backed cookie jar.
//!
//! # Design
//! Opening a jar guarantees a well-formed file on disk afterwards. Content
//! that is empty, not JSON, or not in the jar schema is replaced with a fresh
//! empty jar; that data loss is the recovery policy and is logged, not
//! returned as an error. Only failing to open the file read/write is an
//! error.
//!
//! The file is held under an exclusive advisory lock while it is validated
//! and repaired, so two jars opened on the same path in parallel do not
//! interleave their writes. Repair rewrites the locked file in place, so
//! its inode, and the lock on it, never change.
//!
//! The jar is a container only. Nothing reads `Set-Cookie` into it and
//! nothing injects its records into requests.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use serde_json::Number;

use crate::types::{CookieJarFile, CookieRecord};

/// A cookie store persisted as one JSON document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieJar {
    path: PathBuf,
    data: CookieJarFile,
}

impl CookieJar {
    /// Open the jar at `path`, creating or repairing the file as needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let access = |source: io::Error| Error::CookieFileAccess {
            path: path.clone(),
            source,
        };

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(access)?;
        file.lock().map_err(access)?;

        let mut contents = Vec::new();
        file.read_to_end(&mut contents).map_err(access)?;

        let data = match serde_json::from_slice::<CookieJarFile>(&contents) {
            Ok(data) => {
                debug!(path = %path.display(), cookies = data.cookies.len(), "cookie jar loaded");
                data
            }
            Err(e) => {
                if !contents.is_empty() {
                    warn!(path = %path.display(), error = %e, "cookie jar unreadable, resetting");
                }
                let fresh = CookieJarFile::empty(chrono::Utc::now().timestamp());
                rewrite(&mut file, &fresh).map_err(access)?;
                fresh
            }
        };

        Ok(Self { path, data })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Unix timestamp of creation, integer or fractional as stored.
    pub fn created(&self) -> &Number {
        &self.data.created
    }

    /// Unix timestamp of the last modification.
    pub fn modified(&self) -> &Number {
        &self.data.modified
    }

    pub fn cookies(&self) -> &[CookieRecord] {
        &self.data.cookies
    }
}

fn rewrite(file: &mut File, data: &CookieJarFile) -> io::Result<()> {
    let json = serde_json::to_vec(data)?;
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(&json)?;
    file.sync_all()
}
