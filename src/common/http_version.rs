use std::{convert::TryFrom, fmt};

use ascii::AsciiStr;

/// Version token of an accepted request line
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum HttpVersion {
    /// HTTP/1.0
    Version1_0,
    /// HTTP/1.1
    Version1_1,
}

impl HttpVersion {
    /// Http version in header format (e.g. HTTP/1.1)
    #[must_use]
    #[inline]
    pub const fn header(&self) -> &'static str {
        match self {
            Self::Version1_0 => "HTTP/1.0",
            Self::Version1_1 => "HTTP/1.1",
        }
    }

    /// `true` for HTTP/1.1
    #[must_use]
    #[inline]
    pub const fn is_1_1(&self) -> bool {
        matches!(self, Self::Version1_1)
    }
}

impl fmt::Display for HttpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Version1_0 => "1.0",
            Self::Version1_1 => "1.1",
        })
    }
}

impl TryFrom<&AsciiStr> for HttpVersion {
    type Error = HttpVersionError;

    fn try_from(value: &AsciiStr) -> Result<Self, Self::Error> {
        Self::try_from(value.as_bytes())
    }
}

impl TryFrom<&[u8]> for HttpVersion {
    type Error = HttpVersionError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        match value {
            b"HTTP/1.1" => Ok(Self::Version1_1),
            b"HTTP/1.0" => Ok(Self::Version1_0),
            [b'H', b'T', b'T', b'P', b'/', major, b'.', minor]
                if major.is_ascii_digit() && minor.is_ascii_digit() =>
            {
                Err(HttpVersionError(Some((major - b'0', minor - b'0'))))
            }
            _ => Err(HttpVersionError(None)),
        }
    }
}

/// Error for unsupported or unparseable [`HttpVersion`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpVersionError(Option<(u8, u8)>);

impl std::error::Error for HttpVersionError {}

impl fmt::Display for HttpVersionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some((major, minor)) => write!(f, "unsupported HTTP/{major}.{minor}"),
            None => f.write_str("unparseable HTTP version"),
        }
    }
}
