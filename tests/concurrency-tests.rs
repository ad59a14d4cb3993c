#![allow(unused_crate_dependencies)]

use std::fs;
use std::io::{Read, Write};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use srv::{Server, ServerConfig};

#[allow(dead_code)]
mod support;

use support::split_response;

#[test]
fn concurrent_clients_get_their_own_file_test() {
    let _ = fdlimit::raise_fd_limit();
    let clients = num_cpus::get().clamp(2, 8) * 4;

    let root = support::document_root("concurrent");
    for n in 0..clients {
        let body = format!("file {n} ").repeat(1000 + n * 37);
        fs::write(root.join(format!("f{n}.txt")), body).unwrap();
    }
    let server = support::new_server(&root);
    let addr = server.local_addrs()[0];

    let barrier = Arc::new(Barrier::new(clients));
    let handles: Vec<_> = (0..clients)
        .map(|n| {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut stream = support::create_client(addr);
                let _ = barrier.wait();
                write!(stream, "GET /f{n}.txt HTTP/1.0\r\n\r\n").unwrap();
                let mut content = String::new();
                let _ = stream.read_to_string(&mut content).unwrap();
                (n, content)
            })
        })
        .collect();

    for handle in handles {
        let (n, content) = handle.join().unwrap();
        let (header, body) = split_response(&content);
        let expected = format!("file {n} ").repeat(1000 + n * 37);
        assert!(header.starts_with("HTTP/1.1 200 OK\r\n"), "{header}");
        assert!(header.contains(&format!("Content-Length: {}\r\n", expected.len())), "{header}");
        assert_eq!(body, expected, "client {n}");
    }

    drop(server);
    fs::remove_dir_all(root).unwrap();
}

#[test]
fn idle_clients_do_not_block_others_test() {
    let root = support::document_root("idle");
    fs::write(root.join("ok.txt"), b"ok").unwrap();
    let server = Server::new(ServerConfig {
        document_root: root.clone(),
        workers: 1,
        ..ServerConfig::default()
    })
    .unwrap();
    let addr = server.local_addrs()[0];

    // connected but silent: parked in the event loop, not holding the worker
    let idle: Vec<_> = (0..4).map(|_| support::create_client(addr)).collect();
    thread::sleep(Duration::from_millis(50));

    let content = support::request(addr, "GET /ok.txt HTTP/1.0\r\n\r\n");
    assert!(content.ends_with("\r\n\r\nok"), "{content}");
    assert!(server.num_connections() >= idle.len(), "{}", server.num_connections());

    drop(idle);
    drop(server);
    fs::remove_dir_all(root).unwrap();
}

#[cfg(unix)]
#[test]
fn special_file_does_not_stall_worker_test() {
    let root = support::document_root("fifo");
    fs::write(root.join("ok.txt"), b"ok").unwrap();
    let made = std::process::Command::new("mkfifo")
        .arg(root.join("pipe"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false);
    if !made {
        eprintln!("special_file_does_not_stall_worker_test skipped: mkfifo unavailable");
        fs::remove_dir_all(root).unwrap();
        return;
    }
    let server = Server::new(ServerConfig {
        document_root: root.clone(),
        workers: 1,
        ..ServerConfig::default()
    })
    .unwrap();
    let addr = server.local_addrs()[0];

    let content = support::request(addr, "GET /pipe HTTP/1.0\r\n\r\n");
    assert!(content.starts_with("HTTP/1.1 403 Forbidden\r\n"), "{content}");

    // the only worker is still free
    let content = support::request(addr, "GET /ok.txt HTTP/1.0\r\n\r\n");
    assert!(content.ends_with("\r\n\r\nok"), "{content}");

    drop(server);
    fs::remove_dir_all(root).unwrap();
}

#[test]
fn connection_limit_closes_extra_clients_test() {
    let root = support::document_root("limit");
    fs::write(root.join("ok.txt"), b"ok").unwrap();
    let server = Server::new(ServerConfig {
        document_root: root.clone(),
        connection_limit: 2,
        ..ServerConfig::default()
    })
    .unwrap();
    let addr = server.local_addrs()[0];

    let held: Vec<_> = (0..2).map(|_| support::create_client(addr)).collect();
    thread::sleep(Duration::from_millis(50));

    // accepted, then closed for lack of a slot
    let mut extra = support::create_client(addr);
    let mut content = Vec::new();
    let _ = extra.read_to_end(&mut content);
    assert!(content.is_empty());

    drop(held);
    thread::sleep(Duration::from_millis(50));
    let content = support::request(addr, "GET /ok.txt HTTP/1.0\r\n\r\n");
    assert!(content.ends_with("\r\n\r\nok"), "{content}");

    drop(server);
    fs::remove_dir_all(root).unwrap();
}

#[test]
fn multiple_listeners_and_shutdown_test() {
    let root = support::document_root("listeners");
    fs::write(root.join("index.html"), b"home").unwrap();
    let server = Server::new(ServerConfig {
        addr: vec!["127.0.0.1:0".parse().unwrap(), "127.0.0.1:0".parse().unwrap()],
        document_root: root.clone(),
        workers: 2,
        ..ServerConfig::default()
    })
    .unwrap();
    assert_eq!(server.local_addrs().len(), 2);
    assert_ne!(server.local_addrs()[0], server.local_addrs()[1]);

    for addr in server.local_addrs() {
        let content = support::request(*addr, "GET / HTTP/1.0\r\n\r\n");
        assert!(content.ends_with("\r\n\r\nhome"), "{content}");
    }

    let mut idle = support::create_client(server.local_addrs()[0]);
    thread::sleep(Duration::from_millis(50));
    server.shutdown();
    server.join();

    // open connections are closed on shutdown
    let mut content = Vec::new();
    let _ = idle.read_to_end(&mut content);
    assert!(content.is_empty());

    fs::remove_dir_all(root).unwrap();
}
