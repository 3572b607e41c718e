//! Blocking TCP front end for the control surface.
//!
//! Connections are served one at a time: read the request head, hand it to
//! the runtime, write the reply and close.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::time::Duration;

use tracing::{info, info_span, warn};

use crate::error::EmulatorError;
use crate::runtime::Runtime;
use crate::sim::SimInstant;

/// Largest request head accepted from a client.
pub const MAX_REQUEST_BYTES: usize = 2048;

const READ_TIMEOUT: Duration = Duration::from_secs(2);
const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

fn head_end(buffer: &[u8], from: usize) -> Option<usize> {
    buffer[from..]
        .windows(HEAD_TERMINATOR.len())
        .position(|window| window == HEAD_TERMINATOR)
        .map(|offset| from + offset + HEAD_TERMINATOR.len())
}

/// Reads until the blank line ending the request head or until the peer
/// closes its side. Bytes after the blank line are discarded; only the head
/// counts toward the size limit.
pub fn read_request<R: Read>(reader: &mut R) -> Result<String, EmulatorError> {
    let mut head = Vec::with_capacity(256);
    let mut chunk = [0_u8; 256];
    loop {
        let read = reader.read(&mut chunk)?;
        if read == 0 {
            break;
        }
        let scan_from = head.len().saturating_sub(HEAD_TERMINATOR.len() - 1);
        head.extend_from_slice(&chunk[..read]);
        if let Some(end) = head_end(&head, scan_from) {
            head.truncate(end);
            break;
        }
        if head.len() > MAX_REQUEST_BYTES {
            return Err(EmulatorError::RequestTooLarge {
                limit: MAX_REQUEST_BYTES,
            });
        }
    }
    if head.len() > MAX_REQUEST_BYTES {
        return Err(EmulatorError::RequestTooLarge {
            limit: MAX_REQUEST_BYTES,
        });
    }

    if head.is_empty() {
        return Err(EmulatorError::EmptyRequest);
    }
    Ok(std::str::from_utf8(&head)?.to_owned())
}

fn handle_connection(stream: &mut TcpStream, runtime: &Runtime) -> Result<(), EmulatorError> {
    stream.set_read_timeout(Some(READ_TIMEOUT))?;
    let raw = read_request(stream)?;
    let response = runtime.handle_request(&raw, SimInstant::now())?;
    stream.write_all(response.as_bytes())?;
    stream.flush()?;
    Ok(())
}

/// Accepts connections forever; a failed connection is logged and dropped.
pub fn serve(listener: &TcpListener, runtime: &Runtime) {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "control surface listening");
    }

    for stream in listener.incoming() {
        let mut stream = match stream {
            Ok(stream) => stream,
            Err(err) => {
                warn!(%err, "failed to accept connection");
                continue;
            }
        };

        let peer = stream
            .peer_addr()
            .map_or_else(|_| "unknown".to_owned(), |addr| addr.to_string());
        let span = info_span!("connection", %peer);
        let _entered = span.enter();
        if let Err(err) = handle_connection(&mut stream, runtime) {
            warn!(%err, "connection failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn head_ends_at_blank_line() {
        let mut input = Cursor::new(b"GET /sensors HTTP/1.1\r\nHost: rover\r\n\r\n".to_vec());
        let raw = read_request(&mut input).unwrap();
        assert!(raw.starts_with("GET /sensors HTTP/1.1\r\n"));
    }

    #[test]
    fn closed_connection_yields_partial_head() {
        let mut input = Cursor::new(b"GET /?action=stop HTTP/1.1".to_vec());
        assert_eq!(read_request(&mut input).unwrap(), "GET /?action=stop HTTP/1.1");
    }

    #[test]
    fn empty_connection_is_an_error() {
        let mut input = Cursor::new(Vec::new());
        assert!(matches!(
            read_request(&mut input),
            Err(EmulatorError::EmptyRequest)
        ));
    }

    #[test]
    fn oversized_head_is_rejected() {
        let mut input = Cursor::new(vec![b'a'; MAX_REQUEST_BYTES + 1]);
        assert!(matches!(
            read_request(&mut input),
            Err(EmulatorError::RequestTooLarge { limit: MAX_REQUEST_BYTES })
        ));
    }

    #[test]
    fn head_ending_in_the_last_chunk_at_the_limit_is_accepted() {
        let prefix = b"GET /sensors HTTP/1.1\r\nX-Pad: ";
        let mut bytes = prefix.to_vec();
        bytes.resize(MAX_REQUEST_BYTES - HEAD_TERMINATOR.len(), b'p');
        bytes.extend_from_slice(HEAD_TERMINATOR);
        assert_eq!(bytes.len(), MAX_REQUEST_BYTES);
        bytes.extend_from_slice(&[b'b'; 100]);

        let raw = read_request(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(raw.len(), MAX_REQUEST_BYTES);
        assert!(raw.ends_with("pp\r\n\r\n"));
    }

    #[test]
    fn terminator_split_across_chunks_is_found() {
        struct Trickle(Vec<&'static [u8]>);
        impl Read for Trickle {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                if self.0.is_empty() {
                    return Ok(0);
                }
                let part = self.0.remove(0);
                buf[..part.len()].copy_from_slice(part);
                Ok(part.len())
            }
        }

        let mut input = Trickle(vec![b"GET / HTTP/1.1\r\n\r", b"\nbody", b"never read"]);
        assert_eq!(read_request(&mut input).unwrap(), "GET / HTTP/1.1\r\n\r\n");
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let mut input = Cursor::new(vec![b'G', 0xff, b'\r', b'\n', b'\r', b'\n']);
        assert!(matches!(
            read_request(&mut input),
            Err(EmulatorError::NotUtf8(_))
        ));
    }
}
