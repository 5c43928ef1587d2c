//! Wire-level HTTP rewriting (spec.md §4.2).
//!
//! Parses just enough of a request/response to perform the proxy's two
//! mandatory rewrites — `Proxy-Connection:` → `Connection:`, and an
//! absolute-form request target (`GET http://host/path HTTP/1.1`) down to
//! origin-form (`GET /path HTTP/1.1`) before the request is forwarded
//! upstream — and to detect `CONNECT` for the entry guard (spec.md §4.5,
//! invariant 7).
//!
//! Byte-pattern matching and the method/version parse functions follow
//! `http/types.rs`'s `Method::from_bytes`/`Version::from_bytes` (match on
//! literal byte prefixes, return `Result<(T, usize), ErrorKind>`), but the
//! teacher's `Method` excludes `CONNECT` and `TRACE` ("disabled for
//! security reasons" / "no longer needed") — this proxy's entry guard
//! depends on recognizing `CONNECT` explicitly, so `Method` here adds it
//! back as a first-class variant rather than falling through to an
//! "unrecognized method" error.

use memchr::memchr;

use crate::engine::errors::ProxyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Put,
    Post,
    Head,
    Patch,
    Delete,
    Options,
    Connect,
}

impl Method {
    /// Parses the method token at the start of a request line. Returns the
    /// method and the byte offset of the space following it.
    pub fn parse(bytes: &[u8]) -> Result<(Method, usize), ProxyError> {
        if bytes.starts_with(b"GET ") {
            Ok((Method::Get, 3))
        } else if bytes.starts_with(b"PUT ") {
            Ok((Method::Put, 3))
        } else if bytes.starts_with(b"POST ") {
            Ok((Method::Post, 4))
        } else if bytes.starts_with(b"HEAD ") {
            Ok((Method::Head, 4))
        } else if bytes.starts_with(b"PATCH ") {
            Ok((Method::Patch, 5))
        } else if bytes.starts_with(b"DELETE ") {
            Ok((Method::Delete, 6))
        } else if bytes.starts_with(b"OPTIONS ") {
            Ok((Method::Options, 7))
        } else if bytes.starts_with(b"CONNECT ") {
            Ok((Method::Connect, 7))
        } else {
            Err(ProxyError::Malformed("unrecognized request method"))
        }
    }

    pub const fn is_connect(self) -> bool {
        matches!(self, Method::Connect)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Http10,
    Http11,
}

impl Version {
    fn parse(bytes: &[u8]) -> Result<Version, ProxyError> {
        match bytes {
            b"HTTP/1.1" => Ok(Version::Http11),
            b"HTTP/1.0" => Ok(Version::Http10),
            _ => Err(ProxyError::Malformed("unsupported or unrecognized HTTP version")),
        }
    }
}

/// The parsed request line, before any rewriting.
pub struct RequestLine {
    pub method: Method,
    pub target: Vec<u8>,
    pub version: Version,
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    let mut offset = 0;
    while let Some(pos) = memchr(b'\n', &buf[offset..]) {
        let abs = offset + pos;
        if buf[abs.saturating_sub(3)..=abs] == *b"\r\n\r\n" {
            return Some(abs + 1);
        }
        offset = abs + 1;
    }
    None
}

fn split_first_line(buf: &[u8]) -> Option<(&[u8], usize)> {
    let pos = memchr(b'\n', buf)?;
    let line_end = if pos > 0 && buf[pos - 1] == b'\r' { pos - 1 } else { pos };
    Some((&buf[..line_end], pos + 1))
}

fn parse_request_line(line: &[u8]) -> Result<RequestLine, ProxyError> {
    let (method, sp) = Method::parse(line)?;
    let rest = &line[sp + 1..];
    let version_pos = memchr(b' ', rest).ok_or(ProxyError::Malformed("missing HTTP version"))?;
    let target = rest[..version_pos].to_vec();
    let version = Version::parse(&rest[version_pos + 1..])?;
    Ok(RequestLine { method, target, version })
}

/// Rewrites an absolute-form target (`http://host[:port]/path?query`) to
/// origin-form (`/path?query`). Targets already in origin-form (starting
/// with `/`) or in authority-form (CONNECT's `host:port`) pass through
/// unchanged.
fn to_origin_form(target: &[u8]) -> Vec<u8> {
    let schemes: [&[u8]; 2] = [b"http://", b"https://"];
    for scheme in schemes {
        if let Some(rest) = target.strip_prefix(scheme) {
            return match memchr(b'/', rest) {
                Some(pos) => rest[pos..].to_vec(),
                None => b"/".to_vec(),
            };
        }
    }
    target.to_vec()
}

fn is_proxy_connection_header(line: &[u8]) -> bool {
    match memchr(b':', line) {
        Some(colon) => line[..colon].eq_ignore_ascii_case(b"Proxy-Connection"),
        None => false,
    }
}

/// Result of rewriting a client request before it's dialed upstream.
pub struct RewrittenRequest {
    pub bytes: Vec<u8>,
    pub method: Method,
    pub version: Version,
    /// The request-line target after the absolute-form rewrite, kept around
    /// so callers can persist it without re-parsing the rewritten bytes.
    pub target: Vec<u8>,
}

/// Applies both mandatory request-side rewrites and returns the new buffer
/// along with the parsed method/version (the caller uses `method` to apply
/// the CONNECT entry guard before this function is ever reached, per
/// spec.md §4.5 — `CONNECT` is rejected earlier and never rewritten).
pub fn rewrite_request(input: &[u8]) -> Result<RewrittenRequest, ProxyError> {
    let header_end = find_header_end(input).ok_or(ProxyError::Malformed("no end of headers"))?;
    let (first_line, after_first) = split_first_line(&input[..header_end])
        .ok_or(ProxyError::Malformed("missing request line"))?;
    let request_line = parse_request_line(first_line)?;
    let origin_target = to_origin_form(&request_line.target);

    let mut out = Vec::with_capacity(input.len());
    out.extend_from_slice(method_token(request_line.method));
    out.push(b' ');
    out.extend_from_slice(&origin_target);
    out.push(b' ');
    out.extend_from_slice(version_token(request_line.version));
    out.extend_from_slice(b"\r\n");

    let mut cursor = after_first;
    let headers = &input[..header_end];
    while cursor < headers.len() {
        let Some((line, next)) = split_first_line(&headers[cursor..]) else {
            break;
        };
        if line.is_empty() {
            cursor += next;
            break;
        }
        if is_proxy_connection_header(line) {
            let colon = memchr(b':', line).expect("checked by is_proxy_connection_header");
            out.extend_from_slice(b"Connection");
            out.extend_from_slice(&line[colon..]);
        } else {
            out.extend_from_slice(line);
        }
        out.extend_from_slice(b"\r\n");
        cursor += next;
    }
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(&input[header_end..]);

    Ok(RewrittenRequest {
        bytes: out,
        method: request_line.method,
        version: request_line.version,
        target: origin_target,
    })
}

fn method_token(method: Method) -> &'static [u8] {
    match method {
        Method::Get => b"GET",
        Method::Put => b"PUT",
        Method::Post => b"POST",
        Method::Head => b"HEAD",
        Method::Patch => b"PATCH",
        Method::Delete => b"DELETE",
        Method::Options => b"OPTIONS",
        Method::Connect => b"CONNECT",
    }
}

/// String form of `method_token`, for persistence (spec.md §3's `method` column).
pub fn method_name(method: Method) -> &'static str {
    match method {
        Method::Get => "GET",
        Method::Put => "PUT",
        Method::Post => "POST",
        Method::Head => "HEAD",
        Method::Patch => "PATCH",
        Method::Delete => "DELETE",
        Method::Options => "OPTIONS",
        Method::Connect => "CONNECT",
    }
}

fn version_token(version: Version) -> &'static [u8] {
    match version {
        Version::Http10 => b"HTTP/1.0",
        Version::Http11 => b"HTTP/1.1",
    }
}

/// Just enough of a request to decide the entry guard (spec.md §4.5) before
/// committing to a full rewrite — used so a `CONNECT` is rejected without
/// ever allocating a rewritten buffer.
pub fn peek_method(input: &[u8]) -> Result<Method, ProxyError> {
    let (line, _) = split_first_line(input).ok_or(ProxyError::Malformed("missing request line"))?;
    Method::parse(line).map(|(m, _)| m)
}

/// The parsed response status line (spec.md §4.2's `parse_response`).
pub struct ResponseMeta {
    pub version: Version,
    pub status: u16,
    pub reason: Vec<u8>,
}

/// Parses a response's status line and reports its content length, if any
/// (spec.md §9 notes the original never actually parsed status — this does).
pub fn parse_response(input: &[u8]) -> Result<ResponseMeta, ProxyError> {
    let (line, _) = split_first_line(input).ok_or(ProxyError::Malformed("missing status line"))?;
    let version_end = memchr(b' ', line).ok_or(ProxyError::Malformed("missing status code"))?;
    let version = Version::parse(&line[..version_end])?;
    let rest = &line[version_end + 1..];
    let status_end = memchr(b' ', rest).unwrap_or(rest.len());
    let status: u16 = std::str::from_utf8(&rest[..status_end])
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(ProxyError::Malformed("non-numeric status code"))?;
    let reason = if status_end < rest.len() {
        rest[status_end + 1..].to_vec()
    } else {
        Vec::new()
    };
    Ok(ResponseMeta { version, status, reason })
}

/// Scans a complete header block (bytes up to and including the blank line)
/// for the first header matching `name`, returning its trimmed value.
fn header_value<'a>(headers: &'a [u8], name: &[u8]) -> Option<&'a [u8]> {
    let mut cursor = 0;
    while cursor < headers.len() {
        let (line, next) = split_first_line(&headers[cursor..])?;
        if line.is_empty() {
            break;
        }
        if let Some(colon) = memchr(b':', line) {
            if line[..colon].eq_ignore_ascii_case(name) {
                let mut value = &line[colon + 1..];
                while value.first() == Some(&b' ') {
                    value = &value[1..];
                }
                return Some(value);
            }
        }
        cursor += next;
    }
    None
}

/// Reads the `Content-Length` header, if present, from a complete header
/// block.
pub fn content_length(headers: &[u8]) -> Option<usize> {
    std::str::from_utf8(header_value(headers, b"Content-Length")?)
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Reads the `Content-Type` header, if present, from a complete header block.
pub fn content_type(headers: &[u8]) -> Option<String> {
    Some(
        std::str::from_utf8(header_value(headers, b"Content-Type")?)
            .ok()?
            .trim()
            .to_string(),
    )
}

/// Reads the `Host` header from a complete header block, appending the
/// default `:80` when the request line carried no explicit port
/// (spec.md §4.5's entry guard: "If the parsed `url.port` is empty, the host
/// is normalized by appending `:80`").
pub fn host_and_port(headers: &[u8]) -> Result<String, ProxyError> {
    let raw = header_value(headers, b"Host").ok_or(ProxyError::Malformed("missing Host header"))?;
    let host = std::str::from_utf8(raw).map_err(|_| ProxyError::Malformed("non-UTF8 Host header"))?;
    Ok(if host.rsplit_once(':').is_some_and(|(_, port)| port.chars().all(|c| c.is_ascii_digit()) && !port.is_empty()) {
        host.to_string()
    } else {
        format!("{host}:80")
    })
}

/// True once `buf` contains a full message: a complete header block, plus a
/// body at least `Content-Length` bytes long once one is declared.
pub fn message_complete(buf: &[u8]) -> bool {
    match find_header_end(buf) {
        Some(header_end) => match content_length(&buf[..header_end]) {
            Some(len) => buf.len() >= header_end + len,
            None => true,
        },
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_connect_without_rewriting() {
        let req = b"CONNECT example.com:443 HTTP/1.1\r\nHost: example.com:443\r\n\r\n";
        assert_eq!(peek_method(req).unwrap(), Method::Connect);
    }

    #[test]
    fn rewrites_absolute_form_to_origin_form() {
        let req = b"GET http://example.com/foo?x=1 HTTP/1.1\r\nHost: example.com\r\n\r\n";
        let out = rewrite_request(req).unwrap();
        assert!(out.bytes.starts_with(b"GET /foo?x=1 HTTP/1.1\r\n"));
    }

    #[test]
    fn absolute_form_with_no_path_becomes_slash() {
        let req = b"GET http://example.com HTTP/1.1\r\nHost: example.com\r\n\r\n";
        let out = rewrite_request(req).unwrap();
        assert!(out.bytes.starts_with(b"GET / HTTP/1.1\r\n"));
    }

    #[test]
    fn origin_form_target_is_untouched() {
        let req = b"GET /foo HTTP/1.1\r\nHost: example.com\r\n\r\n";
        let out = rewrite_request(req).unwrap();
        assert!(out.bytes.starts_with(b"GET /foo HTTP/1.1\r\n"));
    }

    #[test]
    fn rewrites_proxy_connection_header_name() {
        let req = b"GET /foo HTTP/1.1\r\nHost: example.com\r\nProxy-Connection: keep-alive\r\n\r\n";
        let out = rewrite_request(req).unwrap();
        let text = String::from_utf8_lossy(&out.bytes);
        assert!(text.contains("Connection: keep-alive"));
        assert!(!text.contains("Proxy-Connection"));
    }

    #[test]
    fn preserves_body_bytes_verbatim() {
        let req = b"POST /foo HTTP/1.1\r\nHost: example.com\r\nContent-Length: 5\r\n\r\nhello";
        let out = rewrite_request(req).unwrap();
        assert!(out.bytes.ends_with(b"hello"));
    }

    #[test]
    fn parses_response_status_line() {
        let resp = b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n";
        let meta = parse_response(resp).unwrap();
        assert_eq!(meta.status, 404);
        assert_eq!(meta.reason, b"Not Found");
        assert_eq!(meta.version, Version::Http11);
    }

    #[test]
    fn message_complete_respects_content_length() {
        let partial = b"POST /x HTTP/1.1\r\nContent-Length: 5\r\n\r\nhel";
        assert!(!message_complete(partial));
        let full = b"POST /x HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello";
        assert!(message_complete(full));
    }

    #[test]
    fn message_complete_without_content_length_is_headers_only() {
        let req = b"GET /x HTTP/1.1\r\nHost: example.com\r\n\r\n";
        assert!(message_complete(req));
    }
}
