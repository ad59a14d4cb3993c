//! `response` module
//!
//! A [`Response`] is built completely before any byte is sent: the header
//! block is rendered up front and the body is either kept in memory or
//! referenced by path and streamed later by the connection.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::common::{ContentType, StatusCode};

pub use self::generate::generate;
pub use self::listing::{format_size, DirEntry};

pub(crate) mod date_header;
mod generate;
mod listing;
pub(crate) mod pages;

/// Value of the `Server` header
pub const SERVER_TOKEN: &str = concat!("srv/", env!("CARGO_PKG_VERSION"));

/// Server name as shown in generated pages
pub(crate) const SERVER_SIGNATURE: &str = concat!("srv ", env!("CARGO_PKG_VERSION"));

/// Source of the bytes following the header block
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Body {
    /// Fully materialized in memory
    Pregenerated(Vec<u8>),
    /// Streamed from this file after the header has been sent
    File(PathBuf),
}

/// A response ready to be sent.
#[derive(Clone, Debug)]
pub struct Response {
    status: StatusCode,
    content_type: ContentType,
    content_length: u64,
    header: Vec<u8>,
    body: Body,
}

impl Response {
    /// Response with an in-memory body; `Content-Length` is the length of `data`
    #[must_use]
    pub fn pregenerated(status: StatusCode, content_type: ContentType, data: Vec<u8>) -> Self {
        let content_length = data.len() as u64;
        Self::new(status, content_type, content_length, Body::Pregenerated(data))
    }

    /// `200` response streaming `len` bytes of the file at `path`
    #[must_use]
    pub fn file(path: PathBuf, len: u64, content_type: ContentType) -> Self {
        Self::new(StatusCode::OK, content_type, len, Body::File(path))
    }

    fn new(status: StatusCode, content_type: ContentType, content_length: u64, body: Body) -> Self {
        let header = build_header(status, content_length, content_type);
        Self {
            status,
            content_type,
            content_length,
            header,
            body,
        }
    }

    /// Status code of the status line
    #[must_use]
    #[inline]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Classification sent as `Content-Type`
    #[must_use]
    #[inline]
    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    /// Exact number of body bytes, sent as `Content-Length`
    #[must_use]
    #[inline]
    pub fn content_length(&self) -> u64 {
        self.content_length
    }

    /// Rendered status line and headers, terminated by an empty line
    #[must_use]
    #[inline]
    pub fn header(&self) -> &[u8] {
        &self.header
    }

    /// Body source
    #[must_use]
    #[inline]
    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Path of a file body
    #[must_use]
    pub fn file_path(&self) -> Option<&Path> {
        match &self.body {
            Body::File(path) => Some(path),
            Body::Pregenerated(_) => None,
        }
    }

    /// In-memory body
    #[must_use]
    pub fn data(&self) -> Option<&[u8]> {
        match &self.body {
            Body::Pregenerated(data) => Some(data),
            Body::File(_) => None,
        }
    }
}

fn build_header(status: StatusCode, content_length: u64, content_type: ContentType) -> Vec<u8> {
    let mut header = String::with_capacity(192);
    let _ = write!(
        header,
        "{}\r\n\
         Connection: close\r\n\
         Date: {}\r\n\
         Server: {}\r\n\
         Content-Length: {}\r\n\
         Content-Type: {}\r\n\
         \r\n",
        status.status_line(),
        date_header::current(),
        SERVER_TOKEN,
        content_length,
        content_type.mime(),
    );
    header.into_bytes()
}
