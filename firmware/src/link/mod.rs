//! Request framing for the serial link to the network co-processor.
//!
//! The co-processor terminates HTTP and forwards each request head verbatim
//! over the UART, back to back. Heads end at the first blank line and bodies
//! are never forwarded, so bytes following one head start the next. The
//! firmware answers with the complete response text followed by a single
//! [`REPLY_TERMINATOR`] byte so the co-processor knows when to close the
//! client connection.

use core::fmt;

use heapless::String;
use rover_core::control::Reply;

use crate::assets::FirmwareAssets;

pub const LINK_BAUD: u32 = 115_200;
/// End-of-transmission marker appended after every response.
pub const REPLY_TERMINATOR: u8 = 0x04;
/// Longest request head accepted; longer heads are answered with 400.
pub const MAX_REQUEST_BYTES: usize = 512;
/// Largest response the control task renders in one piece.
pub const RESPONSE_CAPACITY: usize = 4_096;
/// Sent when a reply does not fit in [`RESPONSE_CAPACITY`].
pub const FALLBACK_RESPONSE: &str = "HTTP/1.1 500 Internal Server Error\r\n\
Content-Type: text/plain\r\nConnection: close\r\n\r\nResponse too large";

const HEAD_END: [u8; 4] = *b"\r\n\r\n";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum LinkError {
    /// The head outgrew the request buffer.
    Overflow,
    NotUtf8,
    /// The UART reported a framing, noise or overrun error.
    Uart,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkError::Overflow => write!(f, "request head exceeds {MAX_REQUEST_BYTES} bytes"),
            LinkError::NotUtf8 => f.write_str("request head is not valid UTF-8"),
            LinkError::Uart => f.write_str("UART receive error"),
        }
    }
}

/// Accumulates link bytes until a complete request head has arrived.
///
/// Bytes past the buffer capacity are counted toward the terminator search
/// but discarded, so an oversized head is still delimited correctly and
/// reported as [`LinkError::Overflow`].
pub struct RequestAssembler<const N: usize> {
    buffer: heapless::Vec<u8, N>,
    tail: [u8; 4],
    overflowed: bool,
}

impl<const N: usize> RequestAssembler<N> {
    pub const fn new() -> Self {
        Self {
            buffer: heapless::Vec::new(),
            tail: [0; 4],
            overflowed: false,
        }
    }

    /// Feeds one byte; yields once a head is complete.
    pub fn feed(&mut self, byte: u8) -> Option<Result<(), LinkError>> {
        self.tail = [self.tail[1], self.tail[2], self.tail[3], byte];
        if self.buffer.push(byte).is_err() {
            self.overflowed = true;
        }

        if self.tail != HEAD_END {
            return None;
        }
        if self.overflowed {
            Some(Err(LinkError::Overflow))
        } else {
            Some(Ok(()))
        }
    }

    /// Feeds bytes until a head completes.
    ///
    /// Returns how many bytes were consumed; the rest belong to the next head
    /// and must be fed again after [`reset`](Self::reset).
    pub fn feed_slice(&mut self, bytes: &[u8]) -> (usize, Option<Result<(), LinkError>>) {
        for (index, &byte) in bytes.iter().enumerate() {
            if let Some(framed) = self.feed(byte) {
                return (index + 1, Some(framed));
            }
        }
        (bytes.len(), None)
    }

    /// The completed head. Only meaningful after [`feed`](Self::feed) returned `Ok`.
    pub fn request(&self) -> Result<&str, LinkError> {
        if self.overflowed {
            return Err(LinkError::Overflow);
        }
        core::str::from_utf8(&self.buffer).map_err(|_| LinkError::NotUtf8)
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.tail = [0; 4];
        self.overflowed = false;
    }
}

impl<const N: usize> Default for RequestAssembler<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Renders `reply` into `out`, replacing it with [`FALLBACK_RESPONSE`] when
/// the rendered text does not fit.
///
/// Returns `false` if the fallback was used.
pub fn render_response<const N: usize>(reply: &Reply, out: &mut String<N>) -> bool {
    out.clear();
    if reply.write_to(&FirmwareAssets, out).is_ok() {
        return true;
    }
    out.clear();
    // The fallback is far shorter than any configured capacity.
    let _ = out.push_str(FALLBACK_RESPONSE);
    false
}
