//! Limits used by the request parser, the response generator and the server
//!

/// Size of the receive buffer; a request must fit into one read of it
pub const REQUEST_BUFFER_SIZE: usize = 1024;
/// Maximum number of query parameters kept per request
pub const PARAM_MAX: usize = 64;
/// Maximum substitutions per escape code while percent-decoding a path
pub const ESCAPE_REPLACE_MAX: usize = 128;
/// Size of the chunks a file body is streamed in
pub const FILE_CHUNK_SIZE: usize = 4096;

/// Maximum captured length of the `User-Agent` value
pub const USER_AGENT_MAX: usize = 128;
/// Maximum captured length of the `Referer` value
pub const REFERER_MAX: usize = 128;
/// Maximum captured length of the `From` value
pub const FROM_MAX: usize = 64;
/// Maximum captured length of the `Host` value (without port)
pub const HOST_MAX: usize = 64;

/// Default number of worker threads
pub const WORKERS_DEFAULT: usize = 16;
/// Default maximum of concurrently open client connections
pub const CONNECTION_LIMIT_DEFAULT: usize = 128;
