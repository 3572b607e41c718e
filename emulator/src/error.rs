use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::str::Utf8Error;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmulatorError {
    #[error("failed to bind control listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("connection I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("request exceeded {limit} bytes")]
    RequestTooLarge { limit: usize },
    #[error("request is not valid UTF-8: {0}")]
    NotUtf8(#[from] Utf8Error),
    #[error("connection closed before a request arrived")]
    EmptyRequest,
    #[error("failed to render reply")]
    Render(#[from] fmt::Error),
    #[error("failed to start {task} thread: {source}")]
    Spawn {
        task: &'static str,
        #[source]
        source: io::Error,
    },
}
