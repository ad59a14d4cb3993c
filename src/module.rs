//! [`Module`] handlers and the routing table that binds them to request paths
//!
//! A module receives the sanitized file system path and the query
//! parameters, and answers with an owned body buffer or `None`.
//! How the module code got into the process is not this crate's concern;
//! anything implementing [`Module`] can be registered.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::common::ContentType;
use crate::request::Param;

/// Values a module reports back next to its body
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Transaction {
    /// `true` answers `200 OK`, `false` answers `404 Not Found` with the module body
    pub status: bool,
    /// Number of body bytes to send, `None` sends the whole buffer.
    /// Larger values are clamped to the buffer length.
    pub len: Option<usize>,
    /// Classification sent as `Content-Type`
    pub content_type: ContentType,
}

impl Default for Transaction {
    fn default() -> Self {
        Self {
            status: true,
            len: None,
            content_type: ContentType::OctetStream,
        }
    }
}

impl Transaction {
    /// Sets the content type from a numeric classification code,
    /// unknown codes select `application/octet-stream`
    pub fn set_content_code(&mut self, code: usize) {
        self.content_type = ContentType::from_code(code);
    }
}

/// A `Module` needs to implement the trait method [`handle`](Module::handle)
///
/// Returning `None` signals failure and is answered with the 404 page.
/// A returned buffer is owned by the server from then on.
///
/// # Example
///
/// ```
/// # use std::path::Path;
/// # use srv::{Module, Param, Transaction, ContentType};
/// struct Hello;
///
/// impl Module for Hello {
///     fn handle(&self, _path: &Path, tx: &mut Transaction, _params: &[Param]) -> Option<Vec<u8>> {
///         tx.content_type = ContentType::Txt;
///         Some(b"hello".to_vec())
///     }
/// }
/// ```
pub trait Module: Send + Sync {
    /// Produces the body for a request routed to this module
    fn handle(&self, path: &Path, transaction: &mut Transaction, params: &[Param])
        -> Option<Vec<u8>>;
}

/// `FnModule` implements [`Module`]
///
/// It can be used to make a [`Module`] out of a function or closure.
///
/// # Example
///
/// ```
/// # use srv::{FnModule, Param, Transaction};
/// # use std::path::Path;
/// let echo = FnModule(|_: &Path, _: &mut Transaction, params: &[Param]| {
///     Some(params.iter().map(|p| format!("{}:{}", p.key, p.value)).collect::<String>().into_bytes())
/// });
/// ```
#[allow(missing_debug_implementations)]
pub struct FnModule<T>(pub T)
where
    T: Fn(&Path, &mut Transaction, &[Param]) -> Option<Vec<u8>>;

impl<T> Module for FnModule<T>
where
    T: Fn(&Path, &mut Transaction, &[Param]) -> Option<Vec<u8>> + Send + Sync,
{
    #[inline]
    fn handle(
        &self,
        path: &Path,
        transaction: &mut Transaction,
        params: &[Param],
    ) -> Option<Vec<u8>> {
        (self.0)(path, transaction, params)
    }
}

/// Where a module is mounted
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Route {
    /// Exactly this request path, e.g. `/mod`
    Path(String),
    /// Every request path below this directory, e.g. `/cgi/`
    Dir(String),
    /// Every request path whose last segment has this extension, e.g. `php`
    Extension(String),
}

/// A registered module with its name and route
#[derive(Clone)]
pub struct ModuleEntry {
    name: String,
    route: Route,
    module: Arc<dyn Module>,
}

impl ModuleEntry {
    /// Name given at registration
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Route given at registration
    #[must_use]
    pub fn route(&self) -> &Route {
        &self.route
    }

    /// The handler
    #[must_use]
    pub fn module(&self) -> &dyn Module {
        self.module.as_ref()
    }
}

impl fmt::Debug for ModuleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleEntry")
            .field("name", &self.name)
            .field("route", &self.route)
            .finish_non_exhaustive()
    }
}

/// Routing table from request paths to modules.
///
/// Built before the server starts and only read while serving.
/// Lookup order is exact path, longest directory prefix, extension.
#[derive(Clone, Debug, Default)]
pub struct ModuleTable {
    paths: HashMap<String, ModuleEntry>,
    dirs: Vec<(String, ModuleEntry)>,
    extensions: HashMap<String, ModuleEntry>,
}

impl ModuleTable {
    /// Creates an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mounts `module` under `route`, replacing an earlier module on the same route
    pub fn register<N, M>(&mut self, name: N, route: Route, module: M)
    where
        N: Into<String>,
        M: Module + 'static,
    {
        self.register_arc(name, route, Arc::new(module));
    }

    /// Same as [`register`](ModuleTable::register) for a shared module
    pub fn register_arc<N: Into<String>>(&mut self, name: N, route: Route, module: Arc<dyn Module>) {
        let entry = ModuleEntry {
            name: name.into(),
            route: route.clone(),
            module,
        };

        match route {
            Route::Path(path) => {
                let _ = self.paths.insert(path, entry);
            }
            Route::Dir(dir) => {
                let dir = if dir.ends_with('/') { dir } else { format!("{dir}/") };
                self.dirs.retain(|(prefix, _)| *prefix != dir);
                self.dirs.push((dir, entry));
                self.dirs.sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()));
            }
            Route::Extension(ext) => {
                let ext = ext.trim_start_matches('.').to_owned();
                let _ = self.extensions.insert(ext, entry);
            }
        }
    }

    /// Module responsible for the decoded request path
    #[must_use]
    pub fn lookup(&self, path: &str) -> Option<&ModuleEntry> {
        if let Some(entry) = self.paths.get(path) {
            return Some(entry);
        }

        if let Some((_, entry)) = self.dirs.iter().find(|(prefix, _)| path.starts_with(prefix.as_str())) {
            return Some(entry);
        }

        let file_name = path.rsplit('/').next().unwrap_or(path);
        file_name
            .rsplit_once('.')
            .and_then(|(_, ext)| self.extensions.get(ext))
    }

    /// Number of registered modules
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len() + self.dirs.len() + self.extensions.len()
    }

    /// `true` without any registered module
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
