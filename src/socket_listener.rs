//! Listening socket setup

use std::net::SocketAddr;

use mio::net::TcpListener;

use crate::log;
use crate::SocketConfig;

/// Binds a non-blocking listener on `address` with address reuse enabled.
///
/// # Errors
///
/// Socket creation, bind and listen failures
pub(crate) fn bind(address: SocketAddr, config: &SocketConfig) -> std::io::Result<TcpListener> {
    let socket = socket2::Socket::new(
        socket2::Domain::for_address(address),
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;

    if let Err(err) = socket.bind(&address.into()) {
        log::error!("socket bind {address} fail: {err:?}");
        return Err(err);
    }
    socket.listen(config.backlog)?;

    if config.no_delay {
        // inherited by accepted sockets on some platforms, set again on accept
        if let Err(err) = socket.set_nodelay(true) {
            log::debug!("listener nodelay: {err}");
            let _ = err;
        }
    }

    Ok(TcpListener::from_std(socket.into()))
}

#[cfg(test)]
mod tests {
    use std::net::{SocketAddr, TcpStream};

    use super::bind;
    use crate::SocketConfig;

    #[test]
    fn bind_ephemeral_test() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let listener = bind(addr, &SocketConfig::default()).unwrap();
        let local = listener.local_addr().unwrap();
        assert_ne!(local.port(), 0);

        let _client = TcpStream::connect(local).unwrap();
    }

    #[test]
    fn bind_in_use_fails_test() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let first = bind(addr, &SocketConfig::default()).unwrap();
        let local = first.local_addr().unwrap();

        assert!(bind(local, &SocketConfig::default()).is_err());
    }
}
