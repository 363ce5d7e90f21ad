//! `multipart/form-data` body construction.

use rand::Rng;

use crate::error::Result;
use crate::params::{FlatValue, Params};

const BOUNDARY_DIGITS: usize = 29;
const BOUNDARY_DASHES: &str = "-----------------------------";
const EOL: &[u8] = b"\r\n";

/// A fresh boundary: a run of dashes followed by random decimal digits.
pub fn boundary() -> String {
    let mut rng = rand::thread_rng();
    let mut token = String::with_capacity(BOUNDARY_DASHES.len() + BOUNDARY_DIGITS);
    token.push_str(BOUNDARY_DASHES);
    for _ in 0..BOUNDARY_DIGITS {
        token.push(char::from(b'0' + rng.gen_range(0..10u8)));
    }
    token
}

/// Encode every flattened parameter as one part, in flattening order.
///
/// Each part line ends with CRLF; file contents are copied verbatim.
pub fn encode(params: &Params, boundary: &str) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    for (name, value) in params.flatten() {
        body.extend_from_slice(b"--");
        body.extend_from_slice(boundary.as_bytes());
        body.extend_from_slice(EOL);
        match value {
            FlatValue::File(file) => {
                let head = format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                    file.filename(),
                    file.content_type()
                );
                body.extend_from_slice(head.as_bytes());
                body.extend_from_slice(&file.read_contents()?);
            }
            FlatValue::Scalar(text) => {
                let head = format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n");
                body.extend_from_slice(head.as_bytes());
                body.extend_from_slice(text.as_bytes());
            }
        }
        body.extend_from_slice(EOL);
    }
    body.extend_from_slice(b"--");
    body.extend_from_slice(boundary.as_bytes());
    body.extend_from_slice(b"--");
    body.extend_from_slice(EOL);
    Ok(body)
}
