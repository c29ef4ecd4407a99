//! HTTP/1.1 request serialization and response head parsing.

use std::sync::Arc;

use bytes::BytesMut;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, CONNECTION, CONTENT_LENGTH, HOST, TRANSFER_ENCODING,
    USER_AGENT,
};
use reqwest::{Method, StatusCode, Version};
use tokio::io::{AsyncRead, AsyncReadExt};
use url::Url;

use crate::error_handling::{Error, HttpError, Result};
use crate::transport::{ClientTrace, Request};
use crate::utils::join_host_port;

/// Where a request goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Target {
    pub(crate) tls: bool,
    /// `host:port` handed to the dialer
    pub(crate) address: String,
    /// Pool key
    pub(crate) key: String,
}

impl Target {
    pub(crate) fn from_url(url: &Url) -> Result<Self> {
        let tls = match url.scheme() {
            "http" => false,
            "https" => true,
            other => return Err(HttpError::UnsupportedScheme(other.to_string()).into()),
        };
        let host = url
            .host_str()
            .ok_or_else(|| HttpError::MissingHost(url.to_string()))?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        let port = url
            .port_or_known_default()
            .ok_or_else(|| HttpError::MissingHost(url.to_string()))?;
        let address = join_host_port(host, &port.to_string());
        Ok(Self {
            tls,
            key: format!("{}://{address}", url.scheme()),
            address,
        })
    }
}

/// Serializes the request line and headers.
///
/// `Host` comes first; `User-Agent` falls back to `default_user_agent`
/// unless the request opted out; `Content-Length` is added for non-empty
/// bodies and for methods that expect one.
pub(crate) fn encode_request_head(req: &Request, default_user_agent: Option<&str>) -> Vec<u8> {
    let mut head = Vec::with_capacity(256);
    let mut target = req.url.path().to_string();
    if let Some(query) = req.url.query() {
        target.push('?');
        target.push_str(query);
    }
    head.extend_from_slice(format!("{} {target} HTTP/1.1\r\n", req.method).as_bytes());

    if let Some(host) = req.effective_host() {
        write_header(&mut head, HOST.as_str(), host.as_bytes());
    }
    for (name, value) in req.headers.iter() {
        if name != HOST {
            write_header(&mut head, name.as_str(), value.as_bytes());
        }
    }
    if !req.headers.contains_key(USER_AGENT) && req.sends_default_user_agent() {
        if let Some(user_agent) = default_user_agent {
            write_header(&mut head, USER_AGENT.as_str(), user_agent.as_bytes());
        }
    }
    let expects_body = matches!(req.method, Method::POST | Method::PUT | Method::PATCH);
    if (!req.body.is_empty() || expects_body) && !req.headers.contains_key(CONTENT_LENGTH) {
        write_header(
            &mut head,
            CONTENT_LENGTH.as_str(),
            req.body.len().to_string().as_bytes(),
        );
    }
    head.extend_from_slice(b"\r\n");
    head
}

fn write_header(head: &mut Vec<u8>, name: &str, value: &[u8]) {
    head.extend_from_slice(name.as_bytes());
    head.extend_from_slice(b": ");
    head.extend_from_slice(value);
    head.extend_from_slice(b"\r\n");
}

/// Status line and headers of a response.
#[derive(Debug)]
pub(crate) struct ResponseHead {
    pub(crate) version: Version,
    pub(crate) status: StatusCode,
    pub(crate) headers: HeaderMap,
}

impl ResponseHead {
    /// Whether the connection may carry another request afterwards.
    pub(crate) fn keep_alive(&self) -> bool {
        // After 101 the connection speaks another protocol.
        if self.status == StatusCode::SWITCHING_PROTOCOLS {
            return false;
        }
        let tokens: Vec<String> = self
            .headers
            .get_all(CONNECTION)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .map(|t| t.trim().to_ascii_lowercase())
            .collect();
        if tokens.iter().any(|t| t == "close") {
            return false;
        }
        self.version == Version::HTTP_11 || tokens.iter().any(|t| t == "keep-alive")
    }
}

/// Find the position of `\r\n\r\n` in data, returns index of the first `\r`.
pub(crate) fn find_header_end(data: &[u8]) -> Option<usize> {
    data.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Parses everything before the blank line ending the head.
pub(crate) fn parse_response_head(data: &[u8]) -> Result<ResponseHead, HttpError> {
    let malformed = |what: &str| HttpError::MalformedResponse(what.to_string());
    let mut lines = data.split(|&b| b == b'\n').map(|line| line.strip_suffix(b"\r").unwrap_or(line));

    // Status line: HTTP/1.1 200 OK
    let status_line = lines.next().ok_or_else(|| malformed("empty response"))?;
    let status_line =
        std::str::from_utf8(status_line).map_err(|_| malformed("non-UTF-8 status line"))?;
    let mut parts = status_line.splitn(3, ' ');
    let version = match parts.next() {
        Some("HTTP/1.1") => Version::HTTP_11,
        Some("HTTP/1.0") => Version::HTTP_10,
        _ => return Err(malformed(&format!("bad status line {status_line:?}"))),
    };
    let status = parts
        .next()
        .filter(|code| code.len() == 3)
        .and_then(|code| code.parse::<u16>().ok())
        .and_then(|code| StatusCode::from_u16(code).ok())
        .ok_or_else(|| malformed(&format!("bad status code in {status_line:?}")))?;

    let mut headers = HeaderMap::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        if line[0] == b' ' || line[0] == b'\t' {
            return Err(malformed("obsolete header line folding"));
        }
        let colon = line
            .iter()
            .position(|&b| b == b':')
            .ok_or_else(|| malformed("header line without colon"))?;
        let name = HeaderName::from_bytes(line[..colon].trim_ascii())
            .map_err(|_| malformed("invalid header name"))?;
        let value = HeaderValue::from_bytes(line[colon + 1..].trim_ascii())
            .map_err(|_| malformed("invalid header value"))?;
        headers.append(name, value);
    }

    Ok(ResponseHead {
        version,
        status,
        headers,
    })
}

/// How the response body is delimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Framing {
    Empty,
    Length(u64),
    Chunked,
    UntilClose,
}

pub(crate) fn body_framing(method: &Method, head: &ResponseHead) -> Result<Framing, HttpError> {
    let status = head.status;
    if method == Method::HEAD
        || status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
    {
        return Ok(Framing::Empty);
    }
    if let Some(encoding) = head.headers.get_all(TRANSFER_ENCODING).iter().last() {
        let chunked = encoding
            .to_str()
            .ok()
            .and_then(|v| v.split(',').last())
            .is_some_and(|last| last.trim().eq_ignore_ascii_case("chunked"));
        return Ok(if chunked {
            Framing::Chunked
        } else {
            Framing::UntilClose
        });
    }
    if let Some(length) = head.headers.get(CONTENT_LENGTH) {
        let length = length
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .ok_or_else(|| HttpError::MalformedResponse("invalid Content-Length".to_string()))?;
        return Ok(if length == 0 {
            Framing::Empty
        } else {
            Framing::Length(length)
        });
    }
    Ok(Framing::UntilClose)
}

/// Reads until a final (non-1xx) response head is complete.
///
/// Bytes following the head stay in `buf`.
pub(crate) async fn read_response_head<C>(
    conn: &mut C,
    buf: &mut BytesMut,
    max_head_size: usize,
    trace: Option<&Arc<dyn ClientTrace>>,
) -> Result<ResponseHead>
where
    C: AsyncRead + Unpin + ?Sized,
{
    let mut seen_bytes = !buf.is_empty();
    loop {
        if let Some(end) = find_header_end(buf) {
            let head_bytes = buf.split_to(end + 4);
            let head = parse_response_head(&head_bytes[..end])?;
            if head.status.is_informational() && head.status != StatusCode::SWITCHING_PROTOCOLS {
                continue;
            }
            return Ok(head);
        }
        if buf.len() > max_head_size {
            return Err(HttpError::HeadTooLarge(max_head_size).into());
        }
        buf.reserve(4096);
        let n = conn.read_buf(buf).await?;
        if n == 0 {
            return Err(if seen_bytes {
                Error::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "unexpected EOF reading response head",
                ))
            } else {
                HttpError::ConnectionClosed.into()
            });
        }
        if !seen_bytes {
            seen_bytes = true;
            if let Some(trace) = trace {
                trace.got_first_response_byte();
            }
        }
    }
}
