//! Request construction, serialization and sending.
//!
//! # Design
//! A `Request` is configured through separate accessors and mutators, then
//! `build()` runs a fixed pipeline over its state:
//!
//! 1. flatten params; any file forces a body-carrying method (POST),
//! 2. sniff the content type for POST/PUT,
//! 3. build the body (multipart when files are present, urlencoded
//!    otherwise) and set `Content-Length`,
//! 4. serialize the request line and headers.
//!
//! `build()` leaves its decisions (method, `Content-Type`,
//! `Content-Length`) in the request, so accessors reflect what was sent.
//! `send()` adds the transport step: connect, write, read to end of stream,
//! parse.

use std::path::Path;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use percent_encoding::percent_decode_str;
use tracing::{debug, trace};
use url::Url;

use crate::cookie::CookieJar;
use crate::error::{Error, Result};
use crate::http::{HeaderMap, HeaderValue, Method};
use crate::multipart;
use crate::params::{self, Param, Params};
use crate::response::Response;
use crate::transport::{self, Connector, TcpConnector};

/// Connection timeout used unless `set_timeout` is called.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Value of the default `User-Agent` header.
pub const USER_AGENT: &str = concat!("wirehttp/", env!("CARGO_PKG_VERSION"));

const MULTIPART: &str = "multipart/form-data";
const URLENCODED: &str = "application/x-www-form-urlencoded";

/// URI scheme accepted by `Request::new`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }
}

/// A single HTTP/1.1 request over a raw byte stream.
#[derive(Debug)]
pub struct Request {
    method: Method,
    scheme: Scheme,
    host: String,
    port: u16,
    path: String,
    params: Params,
    headers: HeaderMap,
    omitted: Vec<String>,
    timeout: Duration,
    cookiejar: Option<CookieJar>,
    credentials: Option<(String, String)>,
    /// `Content-Type` currently in `headers` was chosen by `build`.
    sniffed_type: bool,
}

impl Request {
    /// Parse `uri` into a GET request with default headers.
    ///
    /// The query string becomes the initial parameters.
    pub fn new(uri: &str) -> Result<Self> {
        let parsed = Url::parse(uri).map_err(|e| Error::invalid_uri(uri, e))?;
        let scheme = match parsed.scheme() {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            other => return Err(Error::invalid_uri(uri, format!("unsupported scheme `{other}`"))),
        };
        let host = match parsed.host_str() {
            Some(h) if !h.is_empty() => h.to_string(),
            _ => return Err(Error::invalid_uri(uri, "missing host")),
        };

        let credentials = (!parsed.username().is_empty()).then(|| {
            (
                decode(parsed.username()),
                parsed.password().map(decode).unwrap_or_default(),
            )
        });

        let mut headers = HeaderMap::new();
        headers.insert("Accept", "*/*");
        headers.insert("User-Agent", USER_AGENT);

        Ok(Self {
            method: Method::Get,
            scheme,
            port: parsed.port().unwrap_or_else(|| scheme.default_port()),
            host,
            path: parsed.path().to_string(),
            params: parsed.query().map(Params::from_query).unwrap_or_default(),
            headers,
            omitted: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            cookiejar: None,
            credentials,
            sniffed_type: false,
        })
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// Set the method by name, case-insensitively.
    pub fn set_method(&mut self, name: &str) -> Result<&mut Self> {
        self.method = name.parse()?;
        Ok(self)
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn param(&self, key: &str) -> Option<&Param> {
        self.params.get(key)
    }

    /// Set one parameter. Only scalars and files are accepted here; use
    /// `set_params` for nested maps.
    pub fn set_param(&mut self, key: &str, value: impl Into<Param>) -> Result<&mut Self> {
        let value = value.into();
        if matches!(value, Param::Map(_)) {
            return Err(Error::invalid_parameter(key));
        }
        self.params.insert(key, value);
        Ok(self)
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Replace all parameters.
    pub fn set_params(&mut self, params: Params) -> &mut Self {
        self.params = params;
        self
    }

    /// Replace all parameters from a JSON object.
    pub fn set_params_json(&mut self, value: serde_json::Value) -> Result<&mut Self> {
        self.params = Params::try_from(value)?;
        Ok(self)
    }

    pub fn header(&self, name: &str) -> Option<&HeaderValue> {
        self.headers.get(name)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Set a header. Without `overwrite` an existing value is kept and the
    /// new one appended after it.
    pub fn set_header(&mut self, name: &str, value: &str, overwrite: bool) -> &mut Self {
        if name.eq_ignore_ascii_case("Content-Type") {
            self.sniffed_type = false;
        }
        if overwrite {
            self.headers.insert(name, value);
        } else {
            self.headers.append(name, value);
        }
        self
    }

    /// Skip `name` when serializing. The stored value is kept.
    pub fn rm_header(&mut self, name: &str) -> &mut Self {
        if !self.omitted.iter().any(|n| n == name) {
            self.omitted.push(name.to_string());
        }
        self
    }

    /// Undo `rm_header`.
    pub fn restore_header(&mut self, name: &str) -> &mut Self {
        self.omitted.retain(|n| n != name);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Bound on connection establishment.
    pub fn set_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = timeout;
        self
    }

    /// Open (or initialise) a cookie jar for this request.
    ///
    /// The jar is not consulted or updated by `send()`.
    pub fn set_cookiejar(&mut self, path: impl AsRef<Path>) -> Result<&mut Self> {
        self.cookiejar = Some(CookieJar::open(path)?);
        Ok(self)
    }

    pub fn cookiejar(&self) -> Option<&CookieJar> {
        self.cookiejar.as_ref()
    }

    /// Credentials for `Authorization: Basic`. Overrides any userinfo from
    /// the URI.
    pub fn set_basic_auth(&mut self, username: &str, password: &str) -> &mut Self {
        self.credentials = Some((username.to_string(), password.to_string()));
        self
    }

    /// Run the build pipeline and return the bytes to put on the wire.
    ///
    /// Headers derived by a previous build (`Content-Length` and a sniffed
    /// `Content-Type`) are dropped first, so the output depends only on the
    /// current state.
    pub fn build(&mut self) -> Result<Vec<u8>> {
        self.headers.remove("Content-Length");
        if std::mem::take(&mut self.sniffed_type) {
            self.headers.remove("Content-Type");
        }
        let has_files = self.validate_method();
        self.sniff_content_type(has_files);
        let body = self.build_body(has_files)?;
        let head = self.build_headers();

        let mut request = Vec::with_capacity(head.len() + body.len() + 8);
        request.extend_from_slice(head.as_bytes());
        request.extend_from_slice(b"\r\n\r\n");
        request.extend_from_slice(&body);
        request.extend_from_slice(b"\r\n\r\n");
        Ok(request)
    }

    /// Send over plain TCP.
    pub fn send(&mut self) -> Result<Response> {
        self.send_with(&TcpConnector)
    }

    /// Send over a stream opened by `connector`.
    pub fn send_with<C: Connector>(&mut self, connector: &C) -> Result<Response> {
        let request = self.build()?;
        debug!(
            method = %self.method,
            host = %self.host,
            port = self.port,
            path = %self.path,
            bytes = request.len(),
            "sending request"
        );

        let host = self.host.trim_start_matches('[').trim_end_matches(']');
        let mut stream = connector.connect(host, self.port, self.timeout)?;
        let raw = transport::exchange(&mut stream, &request)?;
        let response = Response::parse(&raw)?;
        debug!(status = response.status_code(), bytes = raw.len(), "response received");
        Ok(response)
    }

    /// Returns whether any parameter is a file; files force POST unless the
    /// method already carries a body.
    fn validate_method(&mut self) -> bool {
        let has_files = self.params.has_files();
        if has_files && !self.method.allows_body() {
            trace!(from = %self.method, "file upload forces POST");
            self.method = Method::Post;
        }
        has_files
    }

    fn sniff_content_type(&mut self, has_files: bool) {
        if !self.method.allows_body() {
            return;
        }
        let content_type = if has_files {
            Some(MULTIPART)
        } else if !self.params.is_empty() {
            Some(URLENCODED)
        } else {
            None
        };
        if let Some(ct) = content_type {
            self.headers.insert("Content-Type", ct);
            self.sniffed_type = true;
        }
    }

    fn build_body(&mut self, has_files: bool) -> Result<Vec<u8>> {
        let body = if has_files {
            let boundary = multipart::boundary();
            self.headers
                .insert("Content-Type", format!("{MULTIPART}; boundary={boundary}"));
            multipart::encode(&self.params, &boundary)?
        } else {
            params::urlencode(&self.params)?.into_bytes()
        };
        self.headers.insert("Content-Length", body.len().to_string());
        Ok(body)
    }

    fn build_headers(&self) -> String {
        let host = self
            .headers
            .get_ignore_case("Host")
            .unwrap_or(&self.host);
        let mut lines = vec![
            format!("{} {} HTTP/1.1", self.method, self.path),
            format!("Host: {host}"),
        ];

        for (name, value) in self.headers.iter() {
            if name.eq_ignore_ascii_case("Host") || self.is_omitted(name) {
                continue;
            }
            lines.extend(value.iter().map(|v| format!("{name}: {v}")));
        }

        if let Some((user, password)) = &self.credentials {
            let explicit = self.headers.get_ignore_case("Authorization").is_some();
            if !explicit && !self.is_omitted("Authorization") {
                let token = STANDARD.encode(format!("{user}:{password}"));
                lines.push(format!("Authorization: Basic {token}"));
            }
        }
        lines.join("\r\n")
    }

    fn is_omitted(&self, name: &str) -> bool {
        self.omitted.iter().any(|n| n == name)
    }
}

fn decode(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}
