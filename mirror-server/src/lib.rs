//! Echo server for exercising the client end to end.
//!
//! Every request, whatever its method or path, is answered with a JSON
//! description of what arrived: method, path, raw query, headers in wire
//! order, the raw body, urlencoded form fields and multipart parts. Each
//! response carries `Connection: close`, so clients that read until end of
//! stream terminate.

use axum::{
    body::to_bytes,
    extract::{FromRequest, Multipart, Request},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{debug, warn};

const BODY_LIMIT: usize = 16 * 1024 * 1024;

/// One multipart part that carried a filename.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct EchoFile {
    pub name: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub size: usize,
    pub contents: Vec<u8>,
}

/// What the server saw.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Echo {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub form: Vec<(String, String)>,
    pub files: Vec<EchoFile>,
}

impl Echo {
    /// First value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value sent under `name`, in order.
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

pub fn app() -> Router {
    Router::new().fallback(mirror)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn mirror(request: Request) -> Response {
    let close = [(header::CONNECTION, "close")];
    match describe(request).await {
        Ok(echo) => (close, Json(echo)).into_response(),
        Err(message) => {
            warn!(%message, "could not mirror request");
            (StatusCode::BAD_REQUEST, close, message).into_response()
        }
    }
}

async fn describe(request: Request) -> Result<Echo, String> {
    let mut echo = Echo {
        method: request.method().to_string(),
        path: request.uri().path().to_string(),
        query: request.uri().query().map(str::to_string),
        headers: request
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), String::from_utf8_lossy(v.as_bytes()).into_owned()))
            .collect(),
        ..Echo::default()
    };
    debug!(method = %echo.method, path = %echo.path, "mirroring request");

    let content_type = echo.header("content-type").unwrap_or_default().to_string();
    if content_type.starts_with("multipart/form-data") {
        let mut multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| e.body_text())?;
        while let Some(field) = multipart.next_field().await.map_err(|e| e.body_text())? {
            let name = field.name().unwrap_or_default().to_string();
            let filename = field.file_name().map(str::to_string);
            let part_type = field.content_type().map(str::to_string);
            let data = field.bytes().await.map_err(|e| e.body_text())?;
            match filename {
                Some(filename) => echo.files.push(EchoFile {
                    name,
                    filename,
                    content_type: part_type,
                    size: data.len(),
                    contents: data.to_vec(),
                }),
                None => echo
                    .form
                    .push((name, String::from_utf8_lossy(&data).into_owned())),
            }
        }
        return Ok(echo);
    }

    let bytes = to_bytes(request.into_body(), BODY_LIMIT)
        .await
        .map_err(|e| e.to_string())?;
    echo.body = String::from_utf8_lossy(&bytes).into_owned();
    if content_type.starts_with("application/x-www-form-urlencoded") {
        echo.form = serde_urlencoded::from_bytes(&bytes).map_err(|e| e.to_string())?;
    }
    Ok(echo)
}
