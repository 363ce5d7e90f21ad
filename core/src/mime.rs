//! Extension to MIME type resolution for attachments.
//!
//! # Design
//! The table is an explicit value, not hidden static state. A `MimeTable`
//! owns a `RegistrySource` and fills itself from it at most once, on first
//! lookup, behind a `OnceCell`. Concurrent attachments therefore share a
//! single fetch. A failed or empty fetch leaves the table empty for good and
//! resolution falls through to content sniffing.
//!
//! `MimeTable::shared()` is a process-wide instance backed by the Apache
//! `mime.types` registry, for callers that do not want to manage their own.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use mime::Mime;
use once_cell::sync::{Lazy, OnceCell};
use tracing::{debug, warn};

use crate::request::Request;

/// Location of the Apache httpd media type registry.
pub const MIME_REGISTRY_URI: &str =
    "http://svn.apache.org/repos/asf/httpd/httpd/trunk/docs/conf/mime.types";

/// Content type used when nothing else matches.
pub const FALLBACK_TYPE: &str = "application/octet-stream";

const REGISTRY_TIMEOUT: Duration = Duration::from_secs(10);
const SNIFF_LEN: usize = 512;

static SHARED: Lazy<MimeTable> = Lazy::new(|| MimeTable::new(RemoteRegistry::default()));

/// Supplies the raw text of a `mime.types` style registry.
pub trait RegistrySource: Send + Sync {
    /// Returns `None` when the registry cannot be obtained.
    fn fetch(&self) -> Option<String>;
}

/// Registry text held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry(pub String);

impl StaticRegistry {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }
}

impl RegistrySource for StaticRegistry {
    fn fetch(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

/// Registry fetched over HTTP with this crate's own client.
#[derive(Debug, Clone)]
pub struct RemoteRegistry {
    uri: String,
    timeout: Duration,
}

impl RemoteRegistry {
    pub fn new(uri: &str) -> Self {
        Self {
            uri: uri.to_string(),
            timeout: REGISTRY_TIMEOUT,
        }
    }
}

impl Default for RemoteRegistry {
    fn default() -> Self {
        Self::new(MIME_REGISTRY_URI)
    }
}

impl RegistrySource for RemoteRegistry {
    fn fetch(&self) -> Option<String> {
        let mut request = match Request::new(&self.uri) {
            Ok(r) => r,
            Err(e) => {
                warn!(uri = %self.uri, error = %e, "bad mime registry uri");
                return None;
            }
        };
        // The exchange reads to end of stream; ask the server not to keep
        // the connection alive.
        request
            .set_timeout(self.timeout)
            .set_header("Connection", "close", true);
        match request.send() {
            Ok(response) if response.status_code() == 200 => Some(response.text()),
            Ok(response) => {
                warn!(
                    uri = %self.uri,
                    status = response.status_code(),
                    location = response.header("location").unwrap_or("-"),
                    "mime registry fetch refused, redirects are not followed"
                );
                None
            }
            Err(e) => {
                warn!(error = %e, "mime registry fetch failed");
                None
            }
        }
    }
}

/// Lazily populated extension to MIME type table.
pub struct MimeTable {
    source: Box<dyn RegistrySource>,
    types: OnceCell<HashMap<String, String>>,
}

impl std::fmt::Debug for MimeTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MimeTable")
            .field("loaded", &self.types.get().map(HashMap::len))
            .finish()
    }
}

impl MimeTable {
    pub fn new(source: impl RegistrySource + 'static) -> Self {
        Self {
            source: Box::new(source),
            types: OnceCell::new(),
        }
    }

    /// A table that never resolves anything, leaving sniffing to decide.
    pub fn empty() -> Self {
        Self::new(StaticRegistry::default())
    }

    /// The process-wide table backed by the Apache registry.
    pub fn shared() -> &'static MimeTable {
        &SHARED
    }

    fn types(&self) -> &HashMap<String, String> {
        self.types.get_or_init(|| {
            let types = self
                .source
                .fetch()
                .map(|text| parse_registry(&text))
                .unwrap_or_default();
            debug!(extensions = types.len(), "mime table loaded");
            types
        })
    }

    /// MIME type registered for an extension (without the leading dot).
    pub fn lookup(&self, extension: &str) -> Option<&str> {
        self.types()
            .get(&extension.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Resolve a file's type: registry by extension, then content sniffing,
    /// then `FALLBACK_TYPE`.
    pub fn resolve(&self, path: &Path) -> String {
        let by_extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty())
            .and_then(|ext| self.lookup(ext));
        if let Some(found) = by_extension {
            return found.to_string();
        }
        sniff_path(path).unwrap_or_else(|| FALLBACK_TYPE.to_string())
    }
}

/// Parse `mime.types` text into an extension map. Comment lines and lines
/// without extensions are skipped, as are lines whose first token is not a
/// valid media type. Later lines win on collisions.
pub fn parse_registry(text: &str) -> HashMap<String, String> {
    let mut types = HashMap::new();
    for line in text.lines() {
        if line.starts_with('#') {
            continue;
        }
        let mut tokens = line.split_whitespace();
        let Some(media) = tokens.next() else {
            continue;
        };
        if media.parse::<Mime>().is_err() {
            continue;
        }
        for ext in tokens {
            types.insert(ext.to_ascii_lowercase(), media.to_string());
        }
    }
    types
}

/// Guess a file's type from its leading bytes.
pub fn sniff_path(path: &Path) -> Option<String> {
    let mut head = Vec::with_capacity(SNIFF_LEN);
    File::open(path)
        .ok()?
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut head)
        .ok()?;
    sniff_bytes(&head).map(str::to_string)
}

/// Guess a type from a content prefix.
pub fn sniff_bytes(head: &[u8]) -> Option<&'static str> {
    if head.is_empty() {
        return Some("application/x-empty");
    }

    const SIGNATURES: &[(&[u8], &str)] = &[
        (b"\x89PNG\r\n\x1a\n", "image/png"),
        (b"\xff\xd8\xff", "image/jpeg"),
        (b"GIF87a", "image/gif"),
        (b"GIF89a", "image/gif"),
        (b"%PDF-", "application/pdf"),
        (b"PK\x03\x04", "application/zip"),
        (b"\x1f\x8b", "application/gzip"),
        (b"BM", "image/bmp"),
    ];
    if let Some((_, media)) = SIGNATURES.iter().find(|(sig, _)| head.starts_with(sig)) {
        return Some(*media);
    }
    if head.len() >= 12 && &head[..4] == b"RIFF" && &head[8..12] == b"WEBP" {
        return Some("image/webp");
    }

    if head.contains(&0) {
        return None;
    }
    let text = match std::str::from_utf8(head) {
        Ok(t) => t,
        // the prefix may cut a multi-byte character in half
        Err(e) if e.error_len().is_none() => std::str::from_utf8(&head[..e.valid_up_to()]).ok()?,
        Err(_) => return None,
    };
    let trimmed = text.trim_start().to_ascii_lowercase();
    if trimmed.starts_with("<?xml") {
        Some("text/xml")
    } else if trimmed.starts_with("<!doctype html") || trimmed.starts_with("<html") {
        Some("text/html")
    } else {
        Some("text/plain")
    }
}
