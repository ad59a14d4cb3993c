/// Config for listening TCP sockets
///
/// # Defaults
///
/// `backlog`: `i32::MAX`, clamped by the OS to its maximum  
/// `no_delay`: true  
///
#[derive(Clone, Debug)]
pub struct SocketConfig {
    /// Length of the pending connection queue
    pub backlog: i32,
    /// `TCP_NODELAY` on accepted sockets, applied when it can be set
    pub no_delay: bool,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            backlog: i32::MAX,
            no_delay: true,
        }
    }
}
