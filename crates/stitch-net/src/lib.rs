//! stitch Networking
//!
//! The dev server's wire layer: HTTP/1.1 request/response framing over
//! smol streams, server-sent event framing, and the reload client hub.

mod http1;
mod reload;
mod sse;

pub use http1::{reason_phrase, HttpVersion, Request, Response};
pub use reload::{ClientId, ReloadHub};
pub use sse::{parse_sse_line, SseEvent};

/// Upper bound on request line + headers
pub const MAX_HEAD_BYTES: usize = 16 * 1024;

/// Result type for wire operations
pub type NetResult<T> = Result<T, NetError>;

/// Network error
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Peer closed the connection before sending a request
    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Malformed request: {0}")]
    Malformed(String),

    #[error("Request head exceeds {MAX_HEAD_BYTES} bytes")]
    HeadTooLarge,
}
