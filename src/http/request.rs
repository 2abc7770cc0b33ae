use crate::{
    errors::ErrorKind,
    http::{path, types},
    limits::ReqLimits,
    Method,
};
use memchr::{memchr, memmem};

/// One header line, borrowed from the connection buffer.
///
/// Keys keep their original spelling; compare them with
/// [`eq_ignore_ascii_case`](slice::eq_ignore_ascii_case).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header<'a> {
    pub key: &'a [u8],
    pub value: &'a [u8],
}

/// A parsed HTTP/1.1 request.
///
/// Every `&'a [u8]` field is a view into the connection buffer the request
/// was parsed from. The buffer cannot be grown, shifted or refilled while a
/// `RequestInfo` borrowing it is alive, so a view taken before a resize can
/// never be read after it. Whatever must outlive the request (the resolved
/// path, the echoed body) is copied into owned storage.
///
/// # Input data requirements
///
/// #### General designations
/// - `SP`: ASCII space (0x20)
/// - `CRLF`: Carriage return + line feed (`"\r\n"`)
///
/// ## First line
/// ```text
/// [METHOD] SP+ [PATH] SP+ "HTTP/1.1" CRLF
/// ```
/// Runs of spaces between the three parts are skipped. Any version other
/// than exactly `HTTP/1.1` is answered with `505`.
///
/// ## Header
/// ```text
/// [NAME] ":" SP* [VALUE] CRLF
/// ```
/// The value must not be empty after the leading spaces are stripped.
/// At least one header line is required.
///
/// | Header              | Purpose              | Values                                   |
/// |---------------------|----------------------|------------------------------------------|
/// | `Content-Type`      | Stored as a view     | Anything                                 |
/// | `Content-Length`    | Body size            | Decimal digits, at most once per request |
/// | `Connection`        | Keep-alive flag      | Contains `close` (any case) to close     |
/// | `Transfer-Encoding` | Rejected with `501`  | -                                        |
///
/// ## Body
/// Exactly `Content-Length` bytes. `GET` and `HEAD` must not carry one.
///
/// ## API prefix
/// A path starting with `/api/` loses its `/api` prefix, and `/api` itself
/// becomes `/`. Both mark the request as an API request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestInfo<'a> {
    pub(crate) method: &'a [u8],
    pub(crate) path: &'a [u8],
    pub(crate) version: &'a [u8],

    pub(crate) headers: Vec<Header<'a>>,
    pub(crate) content_type: Option<&'a [u8]>,
    pub(crate) content_length: usize,
    pub(crate) content_length_seen: bool,
    pub(crate) keep_alive: bool,
    pub(crate) is_api: bool,

    pub(crate) decoded_path: Vec<u8>,
    pub(crate) normalized_path: Vec<u8>,

    pub(crate) body: &'a [u8],
}

impl<'a> RequestInfo<'a> {
    #[inline(always)]
    fn empty(limits: &ReqLimits) -> Self {
        Self {
            method: b"",
            path: b"",
            version: b"",

            headers: Vec::with_capacity(limits.header_count.min(16)),
            content_type: None,
            content_length: 0,
            content_length_seen: false,
            keep_alive: true,
            is_api: false,

            decoded_path: Vec::new(),
            normalized_path: Vec::new(),

            body: b"",
        }
    }
}

// Public API
impl<'a> RequestInfo<'a> {
    /// Raw method token as sent by the client.
    #[inline(always)]
    pub const fn method_bytes(&self) -> &'a [u8] {
        self.method
    }

    #[inline(always)]
    pub fn method(&self) -> Option<Method> {
        Method::from_bytes(self.method)
    }

    /// Path as routed: without the `/api` prefix, still percent-encoded.
    #[inline(always)]
    pub const fn path(&self) -> &'a [u8] {
        self.path
    }

    #[inline(always)]
    pub const fn version(&self) -> &'a [u8] {
        self.version
    }

    /// All header lines in order of appearance.
    #[inline(always)]
    pub fn headers(&self) -> &[Header<'a>] {
        &self.headers
    }

    /// Returns the first header value with case-insensitive name matching.
    /// Uses linear search.
    #[inline]
    pub fn header(&self, name: &[u8]) -> Option<&'a [u8]> {
        self.headers
            .iter()
            .find(|h| h.key.eq_ignore_ascii_case(name))
            .map(|h| h.value)
    }

    #[inline(always)]
    pub const fn content_type(&self) -> Option<&'a [u8]> {
        self.content_type
    }

    /// Declared body size, `0` when `Content-Length` is absent.
    #[inline(always)]
    pub const fn content_length(&self) -> usize {
        self.content_length
    }

    #[inline(always)]
    pub const fn is_keep_alive(&self) -> bool {
        self.keep_alive
    }

    #[inline(always)]
    pub const fn is_api(&self) -> bool {
        self.is_api
    }

    #[inline(always)]
    pub const fn body(&self) -> &'a [u8] {
        self.body
    }

    /// Percent-decoded path, filled by [`resolve_path`](Self::resolve_path).
    #[inline(always)]
    pub fn decoded_path(&self) -> &[u8] {
        &self.decoded_path
    }

    /// Rooted, collapsed path, filled by [`resolve_path`](Self::resolve_path).
    #[inline(always)]
    pub fn normalized_path(&self) -> &[u8] {
        &self.normalized_path
    }
}

// Parse request line and headers
impl<'a> RequestInfo<'a> {
    /// Parses a request line and header block.
    ///
    /// `block` runs from the first byte of the request up to and including
    /// the CRLF of the last header line; the blank line is not part of it.
    /// On success every view in the result points inside `block`.
    pub fn parse(block: &'a [u8], limits: &ReqLimits) -> Result<Self, ErrorKind> {
        let mut request = Self::empty(limits);

        let first_line_end = memmem::find(block, b"\r\n").ok_or(ErrorKind::BadRequestLine)?;
        request.parse_request_line(&block[..first_line_end])?;

        let mut line_start = first_line_end + 2;
        if line_start >= block.len() {
            return Err(ErrorKind::MissingRequiredHeaders);
        }

        while line_start < block.len() {
            let Some(line_len) = memmem::find(&block[line_start..], b"\r\n") else {
                break;
            };
            if line_len == 0 {
                break;
            }

            if request.headers.len() >= limits.header_count {
                return Err(ErrorKind::TooManyHeaders);
            }

            request.parse_header(&block[line_start..line_start + line_len])?;
            line_start += line_len + 2;
        }

        let forbids_body = request.method().is_some_and(Method::forbids_body);
        if forbids_body && request.content_length != 0 {
            return Err(ErrorKind::BodyNotAllowed);
        }

        request.classify_api();

        Ok(request)
    }

    #[inline]
    fn parse_request_line(&mut self, line: &'a [u8]) -> Result<(), ErrorKind> {
        let method_end = memchr(b' ', line).ok_or(ErrorKind::BadRequestLine)?;
        if method_end == 0 {
            return Err(ErrorKind::BadRequestLine);
        }
        self.method = &line[..method_end];

        let rest = skip_spaces(&line[method_end..]);
        let path_end = memchr(b' ', rest).ok_or(ErrorKind::BadRequestLine)?;
        self.path = &rest[..path_end];

        self.version = skip_spaces(&rest[path_end..]);
        if self.version != b"HTTP/1.1" {
            return Err(ErrorKind::InvalidVersion);
        }

        Ok(())
    }

    #[inline]
    fn parse_header(&mut self, line: &'a [u8]) -> Result<(), ErrorKind> {
        let colon = memchr(b':', line).ok_or(ErrorKind::BadHeaderSyntax)?;

        let key = &line[..colon];
        let value = skip_spaces(&line[colon + 1..]);
        if key.is_empty() || value.is_empty() {
            return Err(ErrorKind::BadHeaderSyntax);
        }

        if key.eq_ignore_ascii_case(b"content-type") {
            self.content_type = Some(value);
        } else if key.eq_ignore_ascii_case(b"content-length") {
            self.parse_content_length(value)?;
        } else if key.eq_ignore_ascii_case(b"connection") {
            if types::contains_ignore_case(value, b"close") {
                self.keep_alive = false;
            }
        } else if key.eq_ignore_ascii_case(b"transfer-encoding") {
            return Err(ErrorKind::UnsupportedTransferEncoding);
        }

        self.headers.push(Header { key, value });
        Ok(())
    }

    #[inline]
    fn parse_content_length(&mut self, value: &[u8]) -> Result<(), ErrorKind> {
        if self.content_length_seen {
            return Err(ErrorKind::InvalidContentLength);
        }

        // A stray carriage return ends the number.
        let digits = match memchr(b'\r', value) {
            Some(end) => &value[..end],
            None => value,
        };

        self.content_length =
            types::slice_to_usize(digits).ok_or(ErrorKind::InvalidContentLength)?;
        self.content_length_seen = true;
        Ok(())
    }

    #[inline]
    fn classify_api(&mut self) {
        match self.path {
            [b'/', b'a', b'p', b'i', b'/', ..] => {
                self.path = &self.path[4..];
                self.is_api = true;
            }
            b"/api" => {
                self.path = &self.path[..1];
                self.is_api = true;
            }
            _ => {}
        }
    }
}

// Body and path
impl<'a> RequestInfo<'a> {
    /// Points the body at the first `content_length` bytes of `rest`.
    ///
    /// `rest` starts right after the blank line. The caller must have made
    /// sure the whole body is buffered.
    #[inline]
    pub fn extract_body(&mut self, rest: &'a [u8]) {
        debug_assert!(rest.len() >= self.content_length, "body not fully buffered");
        self.body = &rest[..self.content_length.min(rest.len())];
    }

    /// Decodes and normalizes the path into owned buffers.
    #[inline]
    pub fn resolve_path(&mut self) -> Result<(), ErrorKind> {
        path::percent_decode(self.path, &mut self.decoded_path)?;
        path::normalize(&self.decoded_path, &mut self.normalized_path)
    }
}

#[inline(always)]
fn skip_spaces(src: &[u8]) -> &[u8] {
    let start = src.iter().position(|&b| b != b' ').unwrap_or(src.len());
    &src[start..]
}

#[cfg(test)]
mod request_self {
    use super::*;
    use crate::tools::*;

    /// Parses a complete head (`...\r\n\r\n`) the way the connection loop does.
    fn parse(head: &str) -> Result<RequestInfo<'_>, ErrorKind> {
        parse_with(head, &ReqLimits::default())
    }

    fn parse_with<'a>(head: &'a str, limits: &ReqLimits) -> Result<RequestInfo<'a>, ErrorKind> {
        let bytes = head.as_bytes();
        let end = memmem::find(bytes, b"\r\n\r\n").expect("test head without terminator");
        RequestInfo::parse(&bytes[..end + 2], limits)
    }

    #[test]
    fn parse_request_line() {
        #[rustfmt::skip]
        let cases = [
            ("GET / HTTP/1.1",              Ok(("GET", "/"))),
            ("POST /api/echo HTTP/1.1",     Ok(("POST", "/echo"))),
            ("GET    /spaced    HTTP/1.1",  Ok(("GET", "/spaced"))),
            ("BREW /pot HTTP/1.1",          Ok(("BREW", "/pot"))),

            ("GET",                         Err(ErrorKind::BadRequestLine)),
            ("GET /",                       Err(ErrorKind::BadRequestLine)),
            ("GET  HTTP/1.1",               Err(ErrorKind::BadRequestLine)),
            (" GET / HTTP/1.1",             Err(ErrorKind::BadRequestLine)),
            ("GET / HTTP/1.0",              Err(ErrorKind::InvalidVersion)),
            ("GET / HTTP/2.0",              Err(ErrorKind::InvalidVersion)),
            ("GET / http/1.1",              Err(ErrorKind::InvalidVersion)),
            ("GET / HTTP/",                 Err(ErrorKind::InvalidVersion)),
            ("GET / HTTP/1.11",             Err(ErrorKind::InvalidVersion)),
            ("GET / HTTP/1.1 ",             Err(ErrorKind::InvalidVersion)),
            ("GET / ",                      Err(ErrorKind::InvalidVersion)),
        ];

        for (line, expected) in cases {
            let head = format!("{line}\r\nHost: x\r\n\r\n");
            let result = parse(&head);

            match expected {
                Ok((method, path)) => {
                    let req = result.unwrap();
                    assert_eq!(str_op(req.method_bytes()), method);
                    assert_eq!(str_op(req.path()), path);
                    assert_eq!(str_op(req.version()), "HTTP/1.1");
                }
                Err(e) => assert_eq!(result, Err(e), "{line}"),
            }
        }
    }

    #[test]
    fn parse_header() {
        #[rustfmt::skip]
        let cases = [
            ("Host: value",         Some(("host", "value"))),
            ("HOST: value",         Some(("Host", "value"))),
            ("Host:value",          Some(("host", "value"))),
            ("Host:    value",      Some(("host", "value"))),
            ("Host: value  ",       Some(("host", "value  "))),
            ("X-Colon: a:b",        Some(("x-colon", "a:b"))),

            ("Host value",          None),
            ("Host:",               None),
            ("Host:    ",           None),
            (": value",             None),
        ];

        for (header, expected) in cases {
            let head = format!("GET / HTTP/1.1\r\n{header}\r\n\r\n");
            let result = parse(&head);

            if let Some((name, value)) = expected {
                let req = result.unwrap();
                assert_eq!(str(req.header(name.as_bytes())), Some(value), "{header}");
            } else {
                assert_eq!(result, Err(ErrorKind::BadHeaderSyntax), "{header}");
            }
        }
    }

    #[test]
    fn headers_keep_order() {
        let head = "GET / HTTP/1.1\r\nA: 1\r\nb: 2\r\nA: 3\r\nContent-Type: text/html\r\n\r\n";
        let req = parse(head).unwrap();

        let collected: Vec<_> = req.headers().iter().map(|h| str_2((h.key, h.value))).collect();
        assert_eq!(
            collected,
            [("A", "1"), ("b", "2"), ("A", "3"), ("Content-Type", "text/html")]
        );
        assert_eq!(str(req.header(b"a")), Some("1"));
        assert_eq!(str(req.content_type()), Some("text/html"));
    }

    #[test]
    fn missing_headers() {
        assert_eq!(
            parse("GET / HTTP/1.1\r\n\r\n"),
            Err(ErrorKind::MissingRequiredHeaders)
        );
    }

    #[test]
    fn parse_special_header() {
        #[rustfmt::skip]
        let cases = [
            ("POST", "Content-Length: 6",                       Ok((6, true))),
            ("POST", "content-length: 0",                       Ok((0, true))),
            ("POST", "CONTENT-LENGTH: 17",                      Ok((17, true))),
            ("GET",  "Content-Length: 0",                       Ok((0, true))),
            ("GET",  "Connection: close",                       Ok((0, false))),
            ("GET",  "connection: CLOSE",                       Ok((0, false))),
            ("GET",  "Connection: keep-alive, close",           Ok((0, false))),
            ("GET",  "Connection: keep-alive",                  Ok((0, true))),
            ("GET",  "Connection: upgrade",                     Ok((0, true))),

            ("POST", "Content-Length: 12a",                     Err(ErrorKind::InvalidContentLength)),
            ("POST", "Content-Length: -1",                      Err(ErrorKind::InvalidContentLength)),
            ("POST", "Content-Length: 1 2",                     Err(ErrorKind::InvalidContentLength)),
            ("POST", "Content-Length: 999999999999999999999",   Err(ErrorKind::InvalidContentLength)),
            ("POST", "Content-Length: 3\r\nContent-Length: 3",  Err(ErrorKind::InvalidContentLength)),
            ("POST", "Content-Length: 0\r\ncontent-length: 0",  Err(ErrorKind::InvalidContentLength)),
            ("GET",  "Content-Length: 3",                       Err(ErrorKind::BodyNotAllowed)),
            ("HEAD", "Content-Length: 1",                       Err(ErrorKind::BodyNotAllowed)),
            ("POST", "Transfer-Encoding: chunked",              Err(ErrorKind::UnsupportedTransferEncoding)),
        ];

        for (method, headers, expected) in cases {
            let head = format!("{method} /x HTTP/1.1\r\n{headers}\r\n\r\n");
            let result = parse(&head);

            match expected {
                Ok((len, keep_alive)) => {
                    let req = result.unwrap();
                    assert_eq!(req.content_length(), len, "{headers}");
                    assert_eq!(req.is_keep_alive(), keep_alive, "{headers}");
                }
                Err(e) => assert_eq!(result, Err(e), "{headers}"),
            }
        }
    }

    #[test]
    fn keep_alive_by_default() {
        let req = parse("GET / HTTP/1.1\r\nHost: x\r\n\r\n").unwrap();
        assert!(req.is_keep_alive());
        assert_eq!(req.content_length(), 0);
        assert!(!req.content_length_seen);
    }

    #[test]
    fn classify_api() {
        #[rustfmt::skip]
        let cases = [
            ("/api",         "/",          true),
            ("/api/",        "/",          true),
            ("/api/echo",    "/echo",      true),
            ("/api/a/b",     "/a/b",       true),
            ("/apix",        "/apix",      false),
            ("/api2/echo",   "/api2/echo", false),
            ("/static/api/", "/static/api/", false),
            ("/",            "/",          false),
        ];

        for (path, routed, is_api) in cases {
            let head = format!("GET {path} HTTP/1.1\r\nHost: x\r\n\r\n");
            let req = parse(&head).unwrap();

            assert_eq!(str_op(req.path()), routed, "{path}");
            assert_eq!(req.is_api(), is_api, "{path}");
        }
    }

    #[test]
    fn too_many_headers() {
        let limits = ReqLimits {
            header_count: 3,
            ..ReqLimits::default()
        };

        let ok = "GET / HTTP/1.1\r\nA: 1\r\nB: 2\r\nC: 3\r\n\r\n";
        assert_eq!(parse_with(ok, &limits).map(|r| r.headers().len()), Ok(3));

        let over = "GET / HTTP/1.1\r\nA: 1\r\nB: 2\r\nC: 3\r\nD: 4\r\n\r\n";
        assert_eq!(parse_with(over, &limits), Err(ErrorKind::TooManyHeaders));

        let default_limit = format!(
            "GET / HTTP/1.1\r\n{}\r\n",
            "X: y\r\n".repeat(ReqLimits::default().header_count + 1)
        );
        assert_eq!(parse(&default_limit), Err(ErrorKind::TooManyHeaders));
    }

    #[test]
    fn views_stay_inside_block() {
        let head = "POST /api/echo HTTP/1.1\r\nContent-Type: text/plain\r\nContent-Length: 5\r\n\r\nhello";
        let bytes = head.as_bytes();
        let end = memmem::find(bytes, b"\r\n\r\n").unwrap() + 2;
        let block = &bytes[..end];
        let range = block.as_ptr_range();

        let req = RequestInfo::parse(block, &ReqLimits::default()).unwrap();
        let inside = |view: &[u8]| {
            let r = view.as_ptr_range();
            range.start <= r.start && r.end <= range.end
        };

        assert!(inside(req.method_bytes()));
        assert!(inside(req.path()));
        assert!(inside(req.version()));
        assert!(req.headers().iter().all(|h| inside(h.key) && inside(h.value)));
    }

    #[test]
    fn extract_body() {
        let raw = "POST /api/echo HTTP/1.1\r\nContent-Length: 5\r\n\r\nhelloGET / HTTP/1.1\r\n";
        let bytes = raw.as_bytes();
        let terminator = memmem::find(bytes, b"\r\n\r\n").unwrap();

        let mut req = RequestInfo::parse(&bytes[..terminator + 2], &ReqLimits::default()).unwrap();
        req.extract_body(&bytes[terminator + 4..]);

        assert_eq!(str_op(req.body()), "hello");
        assert_eq!(req.method(), Some(Method::Post));
    }

    #[test]
    fn resolve_path() {
        #[rustfmt::skip]
        let cases = [
            ("/",                        Ok(("/", "/"))),
            ("/a%20b/./c",               Ok(("/a b/./c", "/a b/c"))),
            ("/api/x/../y",              Ok(("/x/../y", "/y"))),
            ("/%2e%2e%2fsecret",         Err(ErrorKind::BadRequestPath)),
            ("/docs/../../etc/passwd",   Err(ErrorKind::BadRequestPath)),
            ("/bad%2",                   Err(ErrorKind::BadRequestPath)),
            ("http://host/index.html",   Err(ErrorKind::BadRequestPath)),
        ];

        for (path, expected) in cases {
            let head = format!("GET {path} HTTP/1.1\r\nHost: x\r\n\r\n");
            let mut req = parse(&head).unwrap();
            let result = req.resolve_path();

            match expected {
                Ok((decoded, normalized)) => {
                    assert_eq!(result, Ok(()));
                    assert_eq!(str_op(req.decoded_path()), decoded);
                    assert_eq!(str_op(req.normalized_path()), normalized);
                }
                Err(e) => assert_eq!(result, Err(e), "{path}"),
            }
        }
    }
}
