//! # Small GET-only HTTP/1.x server
//!
//! `srv` serves the files below a document root and hands selected request
//! paths to [`Module`]s that compute the body in memory.
//!
//! Every connection answers exactly one request and is closed afterwards.
//! Only `GET` is served; anything else closes the connection without a
//! response.
//!
//! ## Creating the server
//!
//! [`Server::new`] binds all configured addresses and starts serving right away.
//! It returns an `io::Result<Server>` which will be an error when the
//! configuration is invalid or a port is already occupied.
//!
//! ```no_run
//! let config = srv::ServerConfig {
//!     document_root: "/srv/www".into(),
//!     ..srv::ServerConfig::with_port(8080)
//! };
//! let server = srv::Server::new(config).unwrap();
//! println!("listening on {:?}", server.local_addrs());
//!
//! // blocks for as long as the server runs
//! server.join();
//! ```
//!
//! ## Modules
//!
//! A module is registered in the [`ModuleTable`] of the config, mounted on a
//! [`Route`]. It gets the resolved file system path, a [`Transaction`] to set
//! status, length and content type, and the query parameters.
//!
//! ```no_run
//! # use std::path::Path;
//! use srv::{ContentType, FnModule, Param, Route, ServerConfig, Transaction};
//!
//! let mut config = ServerConfig::with_port(8080);
//! config.modules.register(
//!     "hello",
//!     Route::Path("/hello".into()),
//!     FnModule(|_: &Path, tx: &mut Transaction, params: &[Param]| {
//!         tx.content_type = ContentType::Txt;
//!         let who = params.iter().find(|p| p.key == "name").map_or("world", |p| &p.value);
//!         Some(format!("hello {who}").into_bytes())
//!     }),
//! );
//! let server = srv::Server::new(config).unwrap();
//! # drop(server);
//! ```
//!
//! Dropping the [`Server`] stops the event loop and the workers and closes
//! every open connection.

pub use common::{limits, ContentType, HttpVersion, HttpVersionError, Method, StatusCode};
pub use module::{FnModule, Module, ModuleEntry, ModuleTable, Route, Transaction};
pub use path::{fix_path, normalize_path, PathPolicy};
pub use request::{parse, parse_query, percent_decode, Param, Request, RequestError};
pub use response::{format_size, generate, Body, DirEntry, Response, SERVER_TOKEN};
pub use server::Server;
pub use server_config::{ServerConfig, DOCUMENT_ROOT_DEFAULT, INDEX_DEFAULT};
pub use socket_config::SocketConfig;

mod common;
mod connection;
mod log;
mod module;
mod path;
mod request;
pub mod response;
mod server;
mod server_config;
mod socket_config;
mod socket_listener;
mod util;

#[cfg(test)]
mod tests {
    use fdlimit as _;
    use num_cpus as _;
}
