//! A file to be uploaded as part of a multipart request.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::mime::MimeTable;

/// A single file upload.
///
/// The content type and display name are resolved once, at construction.
/// The file contents are read later, when the request body is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    path: PathBuf,
    content_type: String,
    filename: String,
}

impl Attachment {
    /// Open `path`, resolving its type through the shared MIME table.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_table(path, MimeTable::shared())
    }

    /// Open `path`, resolving its type through `table`.
    pub fn with_table(path: impl AsRef<Path>, table: &MimeTable) -> Result<Self> {
        let path = path.as_ref();
        let readable = fs::metadata(path).is_ok_and(|m| m.is_file()) && File::open(path).is_ok();
        if !readable {
            return Err(Error::FileUnreadable {
                path: path.to_path_buf(),
            });
        }

        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            path: path.to_path_buf(),
            content_type: table.resolve(path),
            filename,
        })
    }

    /// Override the resolved content type.
    pub fn set_type(&mut self, content_type: impl Into<String>) -> &mut Self {
        self.content_type = content_type.into();
        self
    }

    /// Override the name the server sees.
    pub fn set_filename(&mut self, filename: impl Into<String>) -> &mut Self {
        self.filename = filename.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Raw file bytes.
    pub fn read_contents(&self) -> Result<Vec<u8>> {
        fs::read(&self.path).map_err(|_| Error::FileUnreadable {
            path: self.path.clone(),
        })
    }
}
