pub use content_type::ContentType;
pub use http_version::{HttpVersion, HttpVersionError};
pub use method::Method;
pub use status_code::StatusCode;

mod content_type;
mod http_version;
pub mod limits;
mod method;
mod status_code;
