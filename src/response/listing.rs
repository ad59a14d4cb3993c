use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, Local};

use super::SERVER_SIGNATURE;
use crate::log;

/// One row of a directory listing
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DirEntry {
    /// File name
    pub name: String,
    /// Local modification time, `MM/DD/YYYY HH:MM:SS`
    pub modified: String,
    /// Size in bytes, `None` for directories
    pub size: Option<u64>,
}

/// Formats a byte count the way listings show it.
///
/// Below 1024 bytes the exact count with a `b` suffix, below 1 MiB kibibytes
/// with one decimal and a `k` suffix, else mebibytes with an `m` suffix.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_size(size: u64) -> String {
    if size < 1024 {
        format!("{size}b")
    } else if size < 1_048_576 {
        format!("{:.1}k", size as f64 / 1024.0)
    } else {
        format!("{:.1}m", size as f64 / 1_048_576.0)
    }
}

/// Reads the entries of `dir`, hidden files excluded, ordered by name.
///
/// Entries whose metadata can't be read are left out.
pub(crate) fn list_dir(dir: &Path) -> io::Result<Vec<DirEntry>> {
    let mut entries = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }

        let meta = match fs::metadata(entry.path()) {
            Ok(meta) => meta,
            Err(err) => {
                log::debug!("skip listing entry {name}: {err}");
                let _ = err;
                continue;
            }
        };

        let modified = meta
            .modified()
            .map(|time| {
                DateTime::<Local>::from(time)
                    .format("%m/%d/%Y %H:%M:%S")
                    .to_string()
            })
            .unwrap_or_default();

        entries.push(DirEntry {
            name,
            modified,
            size: if meta.is_dir() { None } else { Some(meta.len()) },
        });
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

/// Renders the listing page of request path `dir`
pub(crate) fn render(dir: &str, entries: &[DirEntry]) -> Vec<u8> {
    let title = escape(dir);
    let prefix = escape(dir.trim_end_matches('/'));

    let mut page = format!(
        "<!DOCTYPE HTML PUBLIC \"-//W3C//DTD HTML 3.2 Final//EN\">\n\
         <html>\n \
         <head>\n  \
         <title>index of {title}</title>\n  \
         <style>\n   \
         body {{\n    font-family: courier new;\n    font-size: 12;\n   }}\n   \
         table {{\n    font-family: courier;\n    font-size: 12;\n   }}\n  \
         </style>\n \
         </head>\n \
         <body>\n  \
         <h2>index of {title}</h2>\n  \
         <table>\n   \
         <tr>\n    \
         <th align=\"left\" width=\"200\">name</th>\n    \
         <th align=\"left\" width=\"150\">last modified</th>\n    \
         <th align=\"left\" width=\"35\">size</th>\n   \
         </tr>\n   \
         <tr><th colspan=\"5\"><hr></th></tr>\n"
    );

    for entry in entries {
        let name = escape(&entry.name);
        let size = entry.size.map_or_else(|| "dir".to_owned(), format_size);
        let _ = write!(
            page,
            "   <tr>\n    \
             <td><a href=\"{prefix}/{name}\">{name}</a></td>\n    \
             <td>{}</td>\n    \
             <td>{size}</td>\n   \
             </tr>\n",
            entry.modified,
        );
    }

    let _ = write!(
        page,
        "   <tr>\n    \
         <th colspan=\"5\"><hr></th>\n   \
         </tr>\n  \
         </table>\n  \
         <address>server powered by {SERVER_SIGNATURE}</address>\n \
         </body>\n\
         </html>\n"
    );

    page.into_bytes()
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            ch => out.push(ch),
        }
    }
    out
}
