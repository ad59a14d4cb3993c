use std::fmt;

use ascii::{AsciiStr, AsciiString};

/// HTTP request methods
///
/// Only [`Method::Get`] is served; the other variants exist so a rejected
/// request can report what it asked for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    /// `GET`
    Get,
    /// `HEAD`
    Head,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `DELETE`
    Delete,
    /// `CONNECT`
    Connect,
    /// `OPTIONS`
    Options,
    /// `TRACE`
    Trace,
    /// `PATCH`
    Patch,
    /// Request methods not standardized by the IETF
    NonStandard(AsciiString),
}

impl Method {
    /// enum [Method] names as `&str`
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Connect => "CONNECT",
            Method::Options => "OPTIONS",
            Method::Trace => "TRACE",
            Method::Patch => "PATCH",
            Method::NonStandard(s) => s.as_str(),
        }
    }

    /// `true` for the methods this server answers
    #[must_use]
    #[inline]
    pub fn is_supported(&self) -> bool {
        *self == Method::Get
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&AsciiStr> for Method {
    fn from(s: &AsciiStr) -> Self {
        match s.as_bytes() {
            b"GET" => Method::Get,
            b"HEAD" => Method::Head,
            b"POST" => Method::Post,
            b"PUT" => Method::Put,
            b"DELETE" => Method::Delete,
            b"CONNECT" => Method::Connect,
            b"OPTIONS" => Method::Options,
            b"TRACE" => Method::Trace,
            b"PATCH" => Method::Patch,
            _ => Method::NonStandard(s.to_ascii_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use ascii::AsciiStr;

    use super::Method;

    #[test]
    fn method_from_ascii_test() {
        let table = [
            ("GET", Method::Get),
            ("HEAD", Method::Head),
            ("POST", Method::Post),
            ("PATCH", Method::Patch),
        ];

        for (text, method) in table {
            let parsed = Method::from(AsciiStr::from_ascii(text).unwrap());
            assert_eq!(parsed, method);
            assert_eq!(parsed.as_str(), text);
        }

        let other = Method::from(AsciiStr::from_ascii("get").unwrap());
        assert!(matches!(other, Method::NonStandard(ref s) if s.as_str() == "get"));
        assert!(!other.is_supported());
    }

    #[test]
    fn only_get_is_supported_test() {
        assert!(Method::Get.is_supported());
        assert!(!Method::Head.is_supported());
        assert!(!Method::Post.is_supported());
    }
}
