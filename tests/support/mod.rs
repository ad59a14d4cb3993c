use std::fs;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::path::{Path, PathBuf};
use std::time::Duration;

use srv::{ModuleTable, PathPolicy, Server, ServerConfig};

/// Fresh, empty document root in the temp dir
pub(crate) fn document_root(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("srv-it-{name}-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

/// Server on an ephemeral localhost port with 4 workers
pub(crate) fn new_server(root: &Path) -> Server {
    new_server_with(root, ModuleTable::new(), PathPolicy::Contained)
}

pub(crate) fn new_server_with(root: &Path, modules: ModuleTable, path_policy: PathPolicy) -> Server {
    Server::new(ServerConfig {
        document_root: root.to_path_buf(),
        workers: 4,
        modules,
        path_policy,
        ..ServerConfig::default()
    })
    .unwrap()
}

/// Creates a [`TcpStream`] Client for `addr`
pub(crate) fn create_client(addr: SocketAddr) -> TcpStream {
    let stream = TcpStream::connect(addr).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(10)))
        .unwrap();
    stream
        .set_write_timeout(Some(Duration::from_secs(10)))
        .unwrap();
    stream
}

/// Sends `raw` and reads until the server closes
pub(crate) fn request_bytes(addr: SocketAddr, raw: &str) -> Vec<u8> {
    let mut stream = create_client(addr);
    stream.write_all(raw.as_bytes()).unwrap();
    let mut content = Vec::new();
    let _ = stream.read_to_end(&mut content).unwrap();
    content
}

pub(crate) fn request(addr: SocketAddr, raw: &str) -> String {
    String::from_utf8(request_bytes(addr, raw)).unwrap()
}

/// `GET path` over HTTP/1.0
pub(crate) fn get(server: &Server, path: &str) -> String {
    request(server.local_addrs()[0], &format!("GET {path} HTTP/1.0\r\n\r\n"))
}

/// Splits a raw response at the blank line
pub(crate) fn split_response(content: &str) -> (&str, &str) {
    content.split_once("\r\n\r\n").unwrap()
}

/// Value of header `name` in a raw header block
pub(crate) fn header_value<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.lines().find_map(|line| {
        let (field, value) = line.split_once(':')?;
        field.eq_ignore_ascii_case(name).then(|| value.trim())
    })
}
