//! Mapping of request paths onto the document root

use std::path::{Path, PathBuf};

/// How `.` and `..` segments of a request path are treated
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum PathPolicy {
    /// Character-wise rewrite: `./` and `../` are dropped together with
    /// their slash, `//` collapses to `/`, `%20` becomes a space.
    /// The component before a `..` is kept, so a trailing `/..` still
    /// points above the document root.
    Compatible,
    /// Segment-wise resolution where `..` removes the previous segment and
    /// never climbs above the document root.
    #[default]
    Contained,
}

/// Joins `requested` onto `root` according to `policy`.
#[must_use]
pub fn fix_path(root: &Path, requested: &str, policy: PathPolicy) -> PathBuf {
    match policy {
        PathPolicy::Compatible => fix_path_compatible(root, requested),
        PathPolicy::Contained => fix_path_contained(root, requested),
    }
}

/// Request path as `fix_path` sees it, without the document root.
///
/// Module routes are matched against this form, so a route and the file
/// system always agree on which path a request names.
#[must_use]
pub fn normalize_path(requested: &str, policy: PathPolicy) -> String {
    match policy {
        PathPolicy::Compatible => rewrite_compatible(String::new(), requested),
        PathPolicy::Contained => {
            let segments = contained_segments(requested);
            let mut out = format!("/{}", segments.join("/"));
            if !segments.is_empty() && requested.ends_with('/') {
                out.push('/');
            }
            out
        }
    }
}

fn fix_path_compatible(root: &Path, requested: &str) -> PathBuf {
    PathBuf::from(rewrite_compatible(
        root.to_string_lossy().into_owned(),
        requested,
    ))
}

fn rewrite_compatible(mut out: String, requested: &str) -> String {
    let mut rest = requested;

    while let Some(ch) = rest.chars().next() {
        if rest.starts_with("./") {
            rest = &rest[2..];
        } else if rest.starts_with("../") {
            rest = &rest[3..];
        } else if rest.starts_with("%20") {
            out.push(' ');
            rest = &rest[3..];
        } else if rest.starts_with("//") {
            out.push('/');
            rest = &rest[2..];
        } else {
            out.push(ch);
            rest = &rest[ch.len_utf8()..];
        }
    }

    out
}

fn fix_path_contained(root: &Path, requested: &str) -> PathBuf {
    let mut out = root.to_path_buf();
    out.extend(contained_segments(requested));
    out
}

fn contained_segments(requested: &str) -> Vec<&str> {
    let mut segments: Vec<&str> = Vec::new();

    for segment in requested.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                let _ = segments.pop();
            }
            segment => segments.push(segment),
        }
    }
    segments
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use super::{fix_path, normalize_path, PathPolicy};

    const ROOT: &str = "/srv/www";

    fn fixed(requested: &str, policy: PathPolicy) -> PathBuf {
        fix_path(Path::new(ROOT), requested, policy)
    }

    #[test]
    fn plain_paths_test() {
        for policy in [PathPolicy::Compatible, PathPolicy::Contained] {
            assert_eq!(fixed("/index.html", policy), Path::new("/srv/www/index.html"));
            assert_eq!(fixed("/a/b/c.txt", policy), Path::new("/srv/www/a/b/c.txt"));
            assert_eq!(fixed("/a//b", policy), Path::new("/srv/www/a/b"));
            assert_eq!(fixed("/a/./b", policy), Path::new("/srv/www/a/b"));
        }
    }

    #[test]
    fn compatible_rewrite_test() {
        let table = [
            ("/", "/srv/www/"),
            ("/a/../b", "/srv/www/a/b"),
            ("/../etc/passwd", "/srv/www/etc/passwd"),
            ("/my%20file", "/srv/www/my file"),
            ("///x", "/srv/www//x"),
        ];

        for (requested, expected) in table {
            assert_eq!(
                fixed(requested, PathPolicy::Compatible),
                PathBuf::from(expected),
                "{requested}"
            );
        }
    }

    #[test]
    fn compatible_trailing_dotdot_escapes_root_test() {
        let path = fixed("/..", PathPolicy::Compatible);
        assert_eq!(path, Path::new("/srv/www/.."));
        assert!(path.ends_with(".."));

        let path = fixed("/sub/../..", PathPolicy::Compatible);
        assert_eq!(path, Path::new("/srv/www/sub/.."));
    }

    #[test]
    fn contained_never_leaves_root_test() {
        let table = [
            ("/..", "/srv/www"),
            ("/../../../etc/passwd", "/srv/www/etc/passwd"),
            ("/a/b/../../../c", "/srv/www/c"),
            ("/a/../b", "/srv/www/b"),
            ("/", "/srv/www"),
        ];

        for (requested, expected) in table {
            let path = fixed(requested, PathPolicy::Contained);
            assert_eq!(path, PathBuf::from(expected), "{requested}");
            assert!(path.starts_with(ROOT));
            assert!(!path.components().any(|c| c.as_os_str() == ".."));
        }
    }

    #[test]
    fn normalize_matches_fix_path_test() {
        let table = [
            ("/count/../plain.txt", "/plain.txt", "/count/plain.txt"),
            ("/a/./b/", "/a/b/", "/a/b/"),
            ("/..", "/", "/.."),
            ("/", "/", "/"),
            ("/my%20file", "/my%20file", "/my file"),
        ];

        for (requested, contained, compatible) in table {
            assert_eq!(normalize_path(requested, PathPolicy::Contained), contained, "{requested}");
            assert_eq!(normalize_path(requested, PathPolicy::Compatible), compatible, "{requested}");
            assert_eq!(
                fixed(requested, PathPolicy::Compatible),
                PathBuf::from(format!("{ROOT}{compatible}")),
                "{requested}"
            );
        }
    }

    #[test]
    fn default_policy_is_contained_test() {
        assert_eq!(PathPolicy::default(), PathPolicy::Contained);
    }
}
