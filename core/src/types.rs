//! On-disk DTOs for the cookie jar file.
//!
//! # Design
//! Deserialization doubles as schema validation. A record must carry all nine
//! attributes and none may be `null`; their JSON types are not constrained,
//! so `"Max-Age": "3600"` and `"Max-Age": 3600` are both kept verbatim.
//! Timestamps accept any JSON number, integer or float. Attribute names keep
//! the `Set-Cookie` spelling on disk (`Max-Age`, `HttpOnly`, ...).

use serde::de::{Deserializer, Error as _};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// One stored cookie.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CookieRecord {
    #[serde(deserialize_with = "present")]
    pub name: Value,
    #[serde(deserialize_with = "present")]
    pub value: Value,
    #[serde(rename = "Expires", deserialize_with = "present")]
    pub expires: Value,
    #[serde(rename = "Max-Age", deserialize_with = "present")]
    pub max_age: Value,
    #[serde(rename = "Domain", deserialize_with = "present")]
    pub domain: Value,
    #[serde(rename = "Path", deserialize_with = "present")]
    pub path: Value,
    #[serde(rename = "Secure", deserialize_with = "present")]
    pub secure: Value,
    #[serde(rename = "HttpOnly", deserialize_with = "present")]
    pub http_only: Value,
    #[serde(rename = "SameSite", deserialize_with = "present")]
    pub same_site: Value,
}

/// The whole jar document. Timestamps are Unix seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CookieJarFile {
    pub created: Number,
    pub modified: Number,
    pub cookies: Vec<CookieRecord>,
}

impl CookieJarFile {
    /// An empty jar stamped with `now`.
    pub fn empty(now: i64) -> Self {
        Self {
            created: now.into(),
            modified: now.into(),
            cookies: Vec::new(),
        }
    }
}

fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Value, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Err(D::Error::custom("cookie attribute is null")),
        value => Ok(value),
    }
}
