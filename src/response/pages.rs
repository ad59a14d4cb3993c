//! Fixed error pages

use lazy_static::lazy_static;

use super::{Response, SERVER_SIGNATURE};
use crate::common::{ContentType, StatusCode};

lazy_static! {
    static ref FORBIDDEN_PAGE: Vec<u8> = render_page(
        "error 403: forbidden",
        "http error 403",
        "access is forbidden to the requested file!",
    );
    static ref NOT_FOUND_PAGE: Vec<u8> = render_page(
        "error 404: not found",
        "http error 404",
        "the requested file was not found!",
    );
}

fn render_page(title: &str, heading: &str, message: &str) -> Vec<u8> {
    format!(
        "<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.0 Strict//EN\" \
         \"http://www.w3.org/TR/xhtml1/DTD/xhtml1-strict.dtd\">\n\
         <html>\n \
         <head>\n  \
         <title>{title}</title>\n  \
         <style>\n   \
         body{{font-family:courier new;font-size:12;}}\n   \
         p{{font-family:courier;font-size:12;}}\n  \
         </style>\n \
         </head>\n \
         <body>\n  \
         <h2>{heading}</h2>\n  \
         <p>{message}</p>\n  \
         <hr/>\n  \
         <address>server powered by {SERVER_SIGNATURE}</address>\n \
         </body>\n\
         </html>\n"
    )
    .into_bytes()
}

/// Body of the 403 page
#[must_use]
pub(crate) fn forbidden_body() -> &'static [u8] {
    &FORBIDDEN_PAGE
}

/// Body of the 404 page
#[must_use]
pub(crate) fn not_found_body() -> &'static [u8] {
    &NOT_FOUND_PAGE
}

/// `403 Forbidden` with the fixed page
pub(crate) fn forbidden() -> Response {
    Response::pregenerated(
        StatusCode::FORBIDDEN,
        ContentType::Html,
        forbidden_body().to_vec(),
    )
}

/// `404 Not Found` with the fixed page
pub(crate) fn not_found() -> Response {
    Response::pregenerated(
        StatusCode::NOT_FOUND,
        ContentType::Html,
        not_found_body().to_vec(),
    )
}

#[cfg(test)]
mod tests {
    use super::{forbidden, not_found, not_found_body};

    #[test]
    fn error_pages_test() {
        let response = not_found();
        assert_eq!(response.status(), 404);
        assert_eq!(response.content_type().mime(), "text/html");
        assert_eq!(response.data(), Some(not_found_body()));
        assert_eq!(response.content_length(), not_found_body().len() as u64);

        let page = String::from_utf8(response.data().unwrap().to_vec()).unwrap();
        assert!(page.contains("<h2>http error 404</h2>"), "{page}");
        assert!(page.contains("server powered by srv "), "{page}");

        let response = forbidden();
        assert_eq!(response.status(), 403);
        let page = String::from_utf8(response.data().unwrap().to_vec()).unwrap();
        assert!(page.contains("access is forbidden"), "{page}");
    }
}
