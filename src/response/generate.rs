use std::fs;
use std::io::{self, ErrorKind};
use std::path::Path;

use super::{listing, pages, Response};
use crate::common::{ContentType, StatusCode};
use crate::module::{ModuleTable, Transaction};
use crate::path::{fix_path, normalize_path, PathPolicy};
use crate::request::Param;
use crate::log;

/// Resolves the decoded `request_path` to a [`Response`].
///
/// A module mounted for the path answers first. Otherwise the path is
/// joined onto `root` and looked up on the file system: files and directory
/// indexes are served by reference, other directories get a listing, and a
/// missing or forbidden path gets the 404 or 403 page.
///
/// # Errors
///
/// Only a directory listing that can't be read for other reasons than
/// missing permission is an error.
pub fn generate(
    root: &Path,
    request_path: &str,
    index: &str,
    params: &[Param],
    modules: &ModuleTable,
    policy: PathPolicy,
) -> io::Result<Response> {
    let path = fix_path(root, request_path, policy);
    let route = normalize_path(request_path, policy);

    if let Some(entry) = modules.lookup(&route) {
        log::debug!("module {} handles {route}", entry.name());

        let mut transaction = Transaction::default();
        return Ok(
            match entry.module().handle(&path, &mut transaction, params) {
                Some(mut data) => {
                    let len = transaction.len.map_or(data.len(), |len| len.min(data.len()));
                    data.truncate(len);

                    let status = if transaction.status {
                        StatusCode::OK
                    } else {
                        StatusCode::NOT_FOUND
                    };
                    Response::pregenerated(status, transaction.content_type, data)
                }
                None => pages::not_found(),
            },
        );
    }

    let meta = match fs::metadata(&path) {
        Ok(meta) => meta,
        Err(err) => return Ok(error_page(&err)),
    };

    if meta.is_file() {
        let content_type = content_type_of(&path);
        return Ok(Response::file(path, meta.len(), content_type));
    }
    if !meta.is_dir() {
        // fifos, sockets and devices can block on open
        log::debug!("refusing special file {}", path.display());
        return Ok(pages::forbidden());
    }

    let index_path = path.join(index);
    if let Ok(index_meta) = fs::metadata(&index_path) {
        if index_meta.is_file() {
            let content_type = content_type_of(&index_path);
            return Ok(Response::file(index_path, index_meta.len(), content_type));
        }
    }

    match listing::list_dir(&path) {
        Ok(entries) => Ok(Response::pregenerated(
            StatusCode::OK,
            ContentType::Html,
            listing::render(request_path, &entries),
        )),
        Err(err) if err.kind() == ErrorKind::PermissionDenied => Ok(pages::forbidden()),
        Err(err) => Err(err),
    }
}

/// Error page for a failed lookup of the requested path
fn error_page(err: &io::Error) -> Response {
    if err.kind() == ErrorKind::PermissionDenied {
        pages::forbidden()
    } else {
        pages::not_found()
    }
}

fn content_type_of(path: &Path) -> ContentType {
    path.file_name()
        .map_or(ContentType::OctetStream, |name| {
            ContentType::from_file_name(&name.to_string_lossy())
        })
}
