//! Minimal HTTP/1.1 client over a raw byte stream.
//!
//! # Overview
//! Builds request text (urlencoded forms and multipart file uploads),
//! writes it to a bidirectional stream, reads until the peer closes and
//! parses the bytes back into a status line, ordered headers and a body.
//!
//! ```no_run
//! use wirehttp::{Attachment, Request};
//!
//! let mut request = Request::new("http://example.com/upload?kind=report")?;
//! request.set_param("file", Attachment::new("report.csv")?)?;
//! let response = request.send()?;
//! println!("{} {}", response.status_code(), response.text());
//! # Ok::<(), wirehttp::Error>(())
//! ```
//!
//! # Design
//! - `Request::build` produces the wire bytes without touching the network;
//!   `send` / `send_with` add the I/O through a `Connector`.
//! - Parameters are a closed variant (`Param`), flattened to `a[b]` keys by
//!   one shared walk.
//! - Attachment types resolve through an explicit, once-initialised
//!   `MimeTable`.
//! - `CookieJar` is a standalone durable store; requests can hold one but
//!   never read or write cookies through it.
//! - Not supported: redirects, chunked decoding, connection reuse, TLS,
//!   retries.

pub mod attachment;
pub mod cookie;
pub mod error;
pub mod http;
pub mod mime;
pub mod multipart;
pub mod params;
pub mod request;
pub mod response;
pub mod transport;
pub mod types;

pub use attachment::Attachment;
pub use cookie::CookieJar;
pub use error::{Error, Result};
pub use http::{HeaderMap, HeaderValue, Method};
pub use mime::MimeTable;
pub use params::{flatten, FlatValue, Param, Params};
pub use request::{Request, Scheme, DEFAULT_TIMEOUT, USER_AGENT};
pub use response::Response;
pub use transport::{Connector, TcpConnector};
pub use types::{CookieJarFile, CookieRecord};
