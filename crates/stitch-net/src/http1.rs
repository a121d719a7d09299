//! HTTP/1.1 Framing
//!
//! Request parsing and response serialization for the dev server.
//! Every response is sent with `Connection: close` except event streams,
//! which stay open until the client goes away.

use percent_encoding::percent_decode_str;
use smol::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{NetError, NetResult, MAX_HEAD_BYTES};

/// HTTP version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HttpVersion {
    Http10,
    #[default]
    Http11,
}

impl std::fmt::Display for HttpVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpVersion::Http10 => write!(f, "HTTP/1.0"),
            HttpVersion::Http11 => write!(f, "HTTP/1.1"),
        }
    }
}

/// Parsed HTTP/1.1 request head
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP method, uppercase
    pub method: String,
    /// Request target exactly as sent
    pub target: String,
    /// Percent-decoded path component of the target
    pub path: String,
    /// Raw query string, without the `?`
    pub query: Option<String>,
    pub version: HttpVersion,
    pub headers: Vec<(String, String)>,
}

impl Request {
    /// Read a request head from a buffered stream.
    ///
    /// Bodies are never read; the dev server only answers GET.
    pub async fn read_from<R: AsyncBufRead + Unpin>(reader: &mut R) -> NetResult<Self> {
        // Reading the extra byte marks the head as too large
        let mut limited = (&mut *reader).take(MAX_HEAD_BYTES as u64 + 1);
        let mut line = String::new();
        let mut consumed = limited.read_line(&mut line).await?;
        if consumed == 0 {
            return Err(NetError::ConnectionClosed);
        }
        if consumed > MAX_HEAD_BYTES {
            return Err(NetError::HeadTooLarge);
        }
        let mut request = Self::parse_request_line(&line)?;

        loop {
            line.clear();
            let n = limited.read_line(&mut line).await?;
            consumed += n;
            if consumed > MAX_HEAD_BYTES {
                return Err(NetError::HeadTooLarge);
            }
            if n == 0 || line == "\r\n" || line == "\n" {
                break;
            }
            if let Some((name, value)) = line.trim_end().split_once(':') {
                request.headers.push((name.trim().to_string(), value.trim().to_string()));
            }
        }

        Ok(request)
    }

    fn parse_request_line(line: &str) -> NetResult<Self> {
        let mut parts = line.trim_end().split(' ').filter(|p| !p.is_empty());
        let (Some(method), Some(target), Some(version)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(NetError::Malformed(format!("bad request line {:?}", line.trim_end())));
        };

        let version = match version {
            "HTTP/1.0" => HttpVersion::Http10,
            "HTTP/1.1" => HttpVersion::Http11,
            other => return Err(NetError::Malformed(format!("unsupported version {other}"))),
        };

        let (raw_path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (target, None),
        };
        let path = percent_decode_str(raw_path)
            .decode_utf8()
            .map_err(|_| NetError::Malformed(format!("path is not UTF-8: {raw_path}")))?
            .into_owned();

        Ok(Self {
            method: method.to_ascii_uppercase(),
            target: target.to_string(),
            path,
            query,
            version,
            headers: Vec::new(),
        })
    }

    /// Get header value (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// HTTP/1.1 response
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Response {
    /// Create an empty response
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: vec![("Cache-Control".to_string(), "no-cache".to_string())],
            body: Vec::new(),
        }
    }

    /// Plain-text response
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::new(status)
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(body.into().into_bytes())
    }

    /// Head of a `text/event-stream` response; the body is written by the caller
    pub fn event_stream() -> Self {
        Self::new(200)
            .header("Content-Type", "text/event-stream")
            .header("Connection", "keep-alive")
    }

    /// Add a header
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Set body
    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Get header value (case-insensitive)
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn is_stream(&self) -> bool {
        self.get_header("content-type")
            .is_some_and(|v| v.starts_with("text/event-stream"))
    }

    /// Serialize status line and headers
    pub fn serialize_head(&self) -> Vec<u8> {
        let mut head = format!(
            "{} {} {}\r\n",
            HttpVersion::Http11,
            self.status,
            reason_phrase(self.status)
        );
        for (name, value) in &self.headers {
            head.push_str(&format!("{name}: {value}\r\n"));
        }
        if !self.is_stream() {
            if self.get_header("content-length").is_none() {
                head.push_str(&format!("Content-Length: {}\r\n", self.body.len()));
            }
            if self.get_header("connection").is_none() {
                head.push_str("Connection: close\r\n");
            }
        }
        head.push_str("\r\n");
        head.into_bytes()
    }

    /// Serialize head and body
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = self.serialize_head();
        buf.extend_from_slice(&self.body);
        buf
    }

    /// Write to a stream and flush
    pub async fn write_to<W: AsyncWrite + Unpin>(&self, writer: &mut W) -> NetResult<()> {
        writer.write_all(&self.serialize()).await?;
        writer.flush().await?;
        Ok(())
    }
}

/// Reason phrase for the status codes the dev server emits
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        304 => "Not Modified",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        431 => "Request Header Fields Too Large",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smol::io::BufReader;

    fn read(raw: &str) -> NetResult<Request> {
        smol::block_on(async {
            let mut reader = BufReader::new(raw.as_bytes());
            Request::read_from(&mut reader).await
        })
    }

    #[test]
    fn test_parse_get() {
        let req = read("GET /docs/index.html?x=1 HTTP/1.1\r\nHost: localhost\r\nAccept: */*\r\n\r\n").unwrap();
        assert_eq!(req.method, "GET");
        assert_eq!(req.path, "/docs/index.html");
        assert_eq!(req.query.as_deref(), Some("x=1"));
        assert_eq!(req.header("host"), Some("localhost"));
        assert_eq!(req.version, HttpVersion::Http11);
    }

    #[test]
    fn test_percent_decoded_path() {
        let req = read("GET /my%20page.html HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(req.path, "/my page.html");
        assert_eq!(req.target, "/my%20page.html");
    }

    #[test]
    fn test_empty_stream_is_closed() {
        assert!(matches!(read(""), Err(NetError::ConnectionClosed)));
    }

    #[test]
    fn test_bad_request_line() {
        assert!(matches!(read("GARBAGE\r\n\r\n"), Err(NetError::Malformed(_))));
        assert!(matches!(read("GET / HTTP/2\r\n\r\n"), Err(NetError::Malformed(_))));
    }

    #[test]
    fn test_response_serialize() {
        let resp = Response::text(404, "Not Found");
        let text = String::from_utf8(resp.serialize()).unwrap();
        assert!(text.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(text.contains("Cache-Control: no-cache\r\n"));
        assert!(text.contains("Content-Length: 9\r\n"));
        assert!(text.contains("Connection: close\r\n"));
        assert!(text.ends_with("\r\n\r\nNot Found"));
    }

    #[test]
    fn test_event_stream_head_has_no_length() {
        let head = String::from_utf8(Response::event_stream().serialize_head()).unwrap();
        assert!(head.contains("Content-Type: text/event-stream\r\n"));
        assert!(!head.contains("Content-Length"));
        assert!(!head.contains("Connection: close"));
    }
}
