//! Raw byte-stream transport.
//!
//! # Design
//! The request builder never opens sockets itself. It asks a `Connector` for
//! a bidirectional stream, writes the serialized request and reads until the
//! peer closes. `TcpConnector` is the default; tests and callers that already
//! own a stream (a TLS session, an in-memory pipe) supply their own.
//!
//! The timeout bounds connection establishment only.

use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, trace};

use crate::error::{Error, Result};

const READ_CHUNK: usize = 4096;

/// Opens a byte stream to a remote host.
pub trait Connector {
    type Stream: Read + Write;

    fn connect(&self, host: &str, port: u16, timeout: Duration) -> Result<Self::Stream>;
}

/// Plain TCP connector.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Stream = TcpStream;

    fn connect(&self, host: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
        let addrs = (host, port)
            .to_socket_addrs()
            .map_err(|e| Error::connection_failed(&e))?;

        let mut last_err = io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses");
        for addr in addrs {
            let attempt = if timeout.is_zero() {
                TcpStream::connect(addr)
            } else {
                TcpStream::connect_timeout(&addr, timeout)
            };
            match attempt {
                Ok(stream) => {
                    debug!(%addr, "connected");
                    return Ok(stream);
                }
                Err(e) => {
                    trace!(%addr, error = %e, "connect attempt failed");
                    last_err = e;
                }
            }
        }
        Err(Error::connection_failed(&last_err))
    }
}

/// Write `request` in full, then read until end of stream.
///
/// A connection reset after some bytes have arrived is treated as the end of
/// the response; a reset before any byte is an error.
pub fn exchange<S: Read + Write>(stream: &mut S, request: &[u8]) -> Result<Vec<u8>> {
    stream.write_all(request)?;
    stream.flush()?;

    let mut response = Vec::new();
    let mut buf = [0u8; READ_CHUNK];
    loop {
        match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => response.extend_from_slice(&buf[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if e.kind() == io::ErrorKind::ConnectionReset && !response.is_empty() => {
                debug!(received = response.len(), "peer reset after response");
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }
    trace!(sent = request.len(), received = response.len(), "exchange complete");
    Ok(response)
}
