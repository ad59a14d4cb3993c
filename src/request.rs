use std::convert::TryFrom;
use std::fmt;

use ascii::{AsciiChar, AsciiStr};

use crate::common::limits::{
    ESCAPE_REPLACE_MAX, FROM_MAX, HOST_MAX, PARAM_MAX, REFERER_MAX, USER_AGENT_MAX,
};
use crate::common::{HttpVersion, HttpVersionError, Method};

/// Escape sequences decoded in a request target, applied in this order
const ESCAPE_CODES: &[(&str, &str)] = &[
    ("%20", " "),
    ("%3C", "<"),
    ("%3E", ">"),
    ("%23", "#"),
    ("%25", "%"),
    ("%7B", "{"),
    ("%7D", "}"),
    ("%7C", "|"),
    ("%5C", "\\"),
    ("%5E", "^"),
    ("%7E", "~"),
    ("%5B", "["),
    ("%5D", "]"),
    ("%60", "`"),
    ("%3B", ";"),
    ("%2F", "/"),
    ("%3F", "?"),
    ("%3A", ":"),
    ("%40", "@"),
    ("%3D", "="),
    ("%26", "&"),
    ("%24", "$"),
];

/// Port assumed when `Host` carries none
const DEFAULT_PORT: u16 = 80;

/// One `key=value` pair of the query string
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Param {
    /// Text before the first `=`
    pub key: String,
    /// Text after the first `=`
    pub value: String,
}

impl Param {
    /// Creates a parameter from `key` and `value`
    pub fn new<K: Into<String>, V: Into<String>>(key: K, value: V) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A parsed client request.
///
/// Built from exactly one read of the socket; a request is never continued
/// across reads.
#[derive(Clone, Debug)]
pub struct Request {
    method: Method,
    version: HttpVersion,
    path: String,
    params: Vec<Param>,
    user_agent: Option<String>,
    referer: Option<String>,
    from: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    close: bool,
}

impl Request {
    /// Request method, always [`Method::Get`] for a parsed request
    #[must_use]
    #[inline]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Version of the request line
    #[must_use]
    #[inline]
    pub fn version(&self) -> HttpVersion {
        self.version
    }

    /// Decoded path without the query string
    #[must_use]
    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Query parameters in order of appearance
    #[must_use]
    #[inline]
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Value of `User-Agent`
    #[must_use]
    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    /// Value of `Referer`
    #[must_use]
    pub fn referer(&self) -> Option<&str> {
        self.referer.as_deref()
    }

    /// Value of `From`
    #[must_use]
    pub fn from_header(&self) -> Option<&str> {
        self.from.as_deref()
    }

    /// Host part of `Host`
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Port part of `Host`, 80 when the header names no port.
    /// `None` without a `Host` header.
    #[must_use]
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// `true` when the client sent `Connection: close`
    #[must_use]
    pub fn close(&self) -> bool {
        self.close
    }
}

/// Reasons a buffer is rejected as a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// no request line in the buffer
    EmptyRequest,
    /// the request line contains non-ASCII bytes
    NotAscii,
    /// the request line is not `<method> <target> <version>`
    MalformedRequestLine,
    /// any method other than `GET`
    UnsupportedMethod(Method),
    /// anything other than `HTTP/1.0` or `HTTP/1.1`
    UnsupportedVersion(HttpVersionError),
}

impl std::error::Error for RequestError {}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyRequest => f.write_str("empty request"),
            Self::NotAscii => f.write_str("request line is not ascii"),
            Self::MalformedRequestLine => f.write_str("malformed request line"),
            Self::UnsupportedMethod(method) => write!(f, "unsupported method {method}"),
            Self::UnsupportedVersion(err) => err.fmt(f),
        }
    }
}

impl From<HttpVersionError> for RequestError {
    fn from(err: HttpVersionError) -> Self {
        Self::UnsupportedVersion(err)
    }
}

/// Parses a raw request buffer.
///
/// # Errors
///
/// - [`RequestError::EmptyRequest`] when no request line is present
/// - [`RequestError::UnsupportedMethod`] for anything but `GET`
/// - [`RequestError::MalformedRequestLine`], [`RequestError::NotAscii`] and
///   [`RequestError::UnsupportedVersion`] for a broken request line
pub fn parse(raw: &[u8]) -> Result<Request, RequestError> {
    let mut lines = raw
        .split(|b| *b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line));

    let first = lines
        .next()
        .filter(|line| !line.is_empty())
        .ok_or(RequestError::EmptyRequest)?;
    let first = AsciiStr::from_ascii(first).map_err(|_| RequestError::NotAscii)?;
    let (method, target, version) = parse_request_line(first)?;

    let decoded = percent_decode(target);
    let (path, params) = match decoded.split_once('?') {
        Some((path, query)) => (path.to_owned(), parse_query(query)),
        None => (decoded, Vec::new()),
    };

    let mut request = Request {
        method,
        version,
        path,
        params,
        user_agent: None,
        referer: None,
        from: None,
        host: None,
        port: None,
        close: false,
    };

    for line in lines.filter(|line| !line.is_empty()) {
        let line = String::from_utf8_lossy(line);
        if let Some((name, value)) = line.split_once(':') {
            request.capture_header(name.trim(), value.trim());
        }
    }

    Ok(request)
}

impl Request {
    fn capture_header(&mut self, name: &str, value: &str) {
        if name.eq_ignore_ascii_case("User-Agent") {
            self.user_agent = Some(capped(value, USER_AGENT_MAX));
        } else if name.eq_ignore_ascii_case("Referer") {
            self.referer = Some(capped(value, REFERER_MAX));
        } else if name.eq_ignore_ascii_case("From") {
            self.from = Some(capped(value, FROM_MAX));
        } else if name.eq_ignore_ascii_case("Connection") {
            self.close = value
                .split(',')
                .any(|token| token.trim().eq_ignore_ascii_case("close"));
        } else if name.eq_ignore_ascii_case("Host") {
            let (host, port) = match value.split_once(':') {
                Some((host, port)) => (host, port.trim().parse().unwrap_or(DEFAULT_PORT)),
                None => (value, DEFAULT_PORT),
            };
            self.host = Some(capped(host, HOST_MAX));
            self.port = Some(port);
        }
    }
}

/// Parses the request line of the request.
/// eg. GET / HTTP/1.1
fn parse_request_line(line: &AsciiStr) -> Result<(Method, &str, HttpVersion), RequestError> {
    let mut parts = line
        .split(AsciiChar::Space)
        .filter(|part| !part.is_empty());

    let method = parts
        .next()
        .map(Method::from)
        .ok_or(RequestError::EmptyRequest)?;
    if !method.is_supported() {
        return Err(RequestError::UnsupportedMethod(method));
    }

    let target = parts.next().ok_or(RequestError::MalformedRequestLine)?;
    let version = parts.next().ok_or(RequestError::MalformedRequestLine)?;
    if parts.next().is_some() {
        return Err(RequestError::MalformedRequestLine);
    }
    let version = HttpVersion::try_from(version)?;

    Ok((method, target.as_str(), version))
}

/// Decodes the reserved-character escapes of a request target.
///
/// Each code is substituted across the whole input, at most
/// [`ESCAPE_REPLACE_MAX`] times, before the next code is applied.
/// Only the uppercase spelling of a code is recognized.
#[must_use]
pub fn percent_decode(input: &str) -> String {
    if !input.contains('%') {
        return input.to_owned();
    }

    ESCAPE_CODES
        .iter()
        .fold(input.to_owned(), |acc, (code, replacement)| {
            if acc.contains(code) {
                acc.replacen(code, replacement, ESCAPE_REPLACE_MAX)
            } else {
                acc
            }
        })
}

/// Splits a query string into parameters.
///
/// Segments without `=` and segments with an empty key or value are
/// dropped; at most [`PARAM_MAX`] parameters are kept.
#[must_use]
pub fn parse_query(query: &str) -> Vec<Param> {
    query
        .split('&')
        .filter_map(|segment| segment.split_once('='))
        .filter(|(key, value)| !key.is_empty() && !value.is_empty())
        .take(PARAM_MAX)
        .map(|(key, value)| Param::new(key, value))
        .collect()
}

fn capped(value: &str, max: usize) -> String {
    if value.len() <= max {
        return value.to_owned();
    }
    let mut end = max;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    value[..end].to_owned()
}

#[cfg(test)]
mod tests {
    use super::{parse, parse_query, percent_decode, Param, RequestError};
    use crate::common::{HttpVersion, Method};
    use crate::common::limits::{PARAM_MAX, USER_AGENT_MAX};

    #[test]
    fn parse_simple_get_test() {
        let rq = parse(b"GET /hello HTTP/1.1\r\nHost: localhost\r\n\r\n").unwrap();

        assert_eq!(*rq.method(), Method::Get);
        assert_eq!(rq.version(), HttpVersion::Version1_1);
        assert!(rq.version().is_1_1());
        assert_eq!(rq.path(), "/hello");
        assert!(rq.params().is_empty());
        assert_eq!(rq.host(), Some("localhost"));
        assert_eq!(rq.port(), Some(80));
        assert!(!rq.close());
    }

    #[test]
    fn parse_rejects_test() {
        let table: &[(&[u8], RequestError)] = &[
            (b"", RequestError::EmptyRequest),
            (b"\r\nGET / HTTP/1.0\r\n", RequestError::EmptyRequest),
            (
                b"POST / HTTP/1.0\r\n\r\n",
                RequestError::UnsupportedMethod(Method::Post),
            ),
            (
                b"HEAD / HTTP/1.1\r\n\r\n",
                RequestError::UnsupportedMethod(Method::Head),
            ),
            (b"GET /\r\n\r\n", RequestError::MalformedRequestLine),
            (b"GET / HTTP/1.0 extra\r\n", RequestError::MalformedRequestLine),
            (b"GET /\xc3\xa4 HTTP/1.0\r\n", RequestError::NotAscii),
        ];

        for (raw, expected) in table {
            let err = parse(raw).unwrap_err();
            assert_eq!(&err, expected, "{}", String::from_utf8_lossy(raw));
        }

        assert!(matches!(
            parse(b"GET / HTTP/2.0\r\n\r\n"),
            Err(RequestError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn parse_http_1_0_without_headers_test() {
        let rq = parse(b"GET / HTTP/1.0\r\n\r\n").unwrap();
        assert_eq!(rq.version(), HttpVersion::Version1_0);
        assert_eq!(rq.path(), "/");
        assert_eq!(rq.host(), None);
        assert_eq!(rq.port(), None);
    }

    #[test]
    fn percent_decode_test() {
        assert_eq!(percent_decode("%20"), " ");
        assert_eq!(percent_decode("a%3Fb"), "a?b");
        assert_eq!(percent_decode("/a%20b%2Fc"), "/a b/c");
        assert_eq!(percent_decode("/plain"), "/plain");
        // lowercase escapes are left alone
        assert_eq!(percent_decode("a%3fb"), "a%3fb");
        // decoded input stays decoded
        assert_eq!(percent_decode(&percent_decode("a%20b")), "a b");
        // %25 is applied after %20, so a double escape yields one level
        assert_eq!(percent_decode("%2520"), "%20");
    }

    #[test]
    fn percent_decode_is_bounded_test() {
        let input = "%20".repeat(200);
        let out = percent_decode(&input);
        assert_eq!(out.matches(' ').count(), 128);
        assert_eq!(out.matches("%20").count(), 72);
    }

    #[test]
    fn query_test() {
        assert_eq!(
            parse_query("a=1&b=2"),
            vec![Param::new("a", "1"), Param::new("b", "2")]
        );
        assert_eq!(parse_query("a=&b=2"), vec![Param::new("b", "2")]);
        assert_eq!(parse_query("&&novalue&=x&k=v=w"), vec![Param::new("k", "v=w")]);
        assert!(parse_query("").is_empty());
    }

    #[test]
    fn query_is_capped_test() {
        let query = (0..100)
            .map(|n| format!("k{n}=v{n}"))
            .collect::<Vec<_>>()
            .join("&");
        let params = parse_query(&query);
        assert_eq!(params.len(), PARAM_MAX);
        assert_eq!(params[PARAM_MAX - 1], Param::new("k63", "v63"));
    }

    #[test]
    fn path_is_truncated_at_query_test() {
        let rq = parse(b"GET /mod?a=1&b=2 HTTP/1.0\r\n\r\n").unwrap();
        assert_eq!(rq.path(), "/mod");
        assert_eq!(rq.params(), &[Param::new("a", "1"), Param::new("b", "2")]);

        // escapes are decoded before the query is split off
        let rq = parse(b"GET /a%3Fk=v HTTP/1.0\r\n\r\n").unwrap();
        assert_eq!(rq.path(), "/a");
        assert_eq!(rq.params(), &[Param::new("k", "v")]);
    }

    #[test]
    fn headers_test() {
        let raw = b"GET / HTTP/1.1\r\n\
            User-Agent: test-agent/1.0\r\n\
            Referer: http://example.com/\r\n\
            From: me@example.com\r\n\
            X-Unknown: ignored\r\n\
            Host: example.com:8080\r\n\
            Connection: close\r\n\r\n";
        let rq = parse(raw).unwrap();

        assert_eq!(rq.user_agent(), Some("test-agent/1.0"));
        assert_eq!(rq.referer(), Some("http://example.com/"));
        assert_eq!(rq.from_header(), Some("me@example.com"));
        assert_eq!(rq.host(), Some("example.com"));
        assert_eq!(rq.port(), Some(8080));
        assert!(rq.close());

        let rq = parse(b"GET / HTTP/1.1\nconnection: Keep-Alive\n\n").unwrap();
        assert!(!rq.close());
    }

    #[test]
    fn header_values_are_capped_test() {
        let raw = format!("GET / HTTP/1.0\r\nUser-Agent: {}\r\n\r\n", "x".repeat(300));
        let rq = parse(raw.as_bytes()).unwrap();
        assert_eq!(rq.user_agent().map(str::len), Some(USER_AGENT_MAX));
    }
}
