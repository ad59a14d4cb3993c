use std::convert::TryFrom;
use std::fmt;

macro_rules! create_content_types {
    ($(($ct:ident, $ext:expr, $text:expr)),+) => {
        #[doc = "Content type classification of a response body"]
        #[doc = ""]
        #[doc = "Every variant is one row of the extension table, so the numeric"]
        #[doc = "code a module reports is the row index."]
        #[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
        #[allow(missing_docs)]
        pub enum ContentType {
            $($ct),+
        }

        const EXTENSIONS: &[&str] = &[$($ext),+];
        const CONTENT_TYPES: &[&str] = &[$($text),+];

        impl TryFrom<usize> for ContentType {
            type Error = ();

            fn try_from(idx: usize) -> Result<Self, Self::Error> {
                Ok(match idx {
                   $(_ if (Self::$ct as usize) == idx => Self::$ct,)+
                    _ => return Err(()),
                })
            }
        }
    };
}

// first row is the fallback and has no extension
create_content_types!(
    (OctetStream, "", "application/octet-stream"),
    (Avi, "avi", "video/x-msvideo"),
    (C, "c", "text/plain"),
    (Conf, "conf", "text/plain"),
    (Cpp, "cpp", "text/plain"),
    (Css, "css", "text/css"),
    (Gif, "gif", "image/gif"),
    (Gz, "gz", "application/x-gzip"),
    (H, "h", "text/plain"),
    (Html, "html", "text/html"),
    (Htm, "htm", "text/html"),
    (Jpeg, "jpeg", "image/jpeg"),
    (Jpg, "jpg", "image/jpeg"),
    (Js, "js", "application/javascript"),
    (M4a, "m4a", "audio/mp4"),
    (Midi, "midi", "audio/midi"),
    (Mp3, "mp3", "audio/mpeg"),
    (Mpeg, "mpeg", "video/mpeg"),
    (Mpg, "mpg", "video/mpeg"),
    (Ogg, "ogg", "application/ogg"),
    (Pdf, "pdf", "application/pdf"),
    (Php, "php", "text/plain"),
    (Pl, "pl", "text/plain"),
    (Png, "png", "image/png"),
    (Sd, "sd", "text/plain"),
    (Swf, "swf", "application/x-shockwave-flash"),
    (Tiff, "tiff", "image/tiff"),
    (Txt, "txt", "text/plain"),
    (Wav, "wav", "audio/x-wav"),
    (Wmv, "wmv", "video/x-ms-wmv"),
    (Xml, "xml", "text/xml")
);

impl ContentType {
    /// MIME string sent in the `Content-Type` header
    #[must_use]
    #[inline]
    pub fn mime(self) -> &'static str {
        CONTENT_TYPES[self as usize]
    }

    /// Lookup by exact (case-sensitive) extension without the dot
    #[must_use]
    pub fn from_extension(ext: &str) -> Self {
        EXTENSIONS
            .iter()
            .skip(1)
            .position(|e| *e == ext)
            .and_then(|idx| Self::try_from(idx + 1).ok())
            .unwrap_or(Self::OctetStream)
    }

    /// Lookup by the text after the last `.` of `name`
    #[must_use]
    pub fn from_file_name(name: &str) -> Self {
        name.rsplit_once('.')
            .map_or(Self::OctetStream, |(_, ext)| Self::from_extension(ext))
    }

    /// Classification for a numeric module code, unknown codes fall back to
    /// [`ContentType::OctetStream`]
    #[must_use]
    pub fn from_code(code: usize) -> Self {
        Self::try_from(code).unwrap_or(Self::OctetStream)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}
