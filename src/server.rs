//! Readiness loop dispatching accepts and connection steps to the worker pool

use std::io::{self, ErrorKind};
use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token, Waker};

use crate::connection::{Connection, Site, Step};
use crate::log;
use crate::server_config::ServerConfig;
use crate::socket_listener;
use crate::util::{JobFn, SlotId, Slots, WorkerPool};

/// Token of the waker, listeners count down from below it
const WAKER: Token = Token(usize::MAX);
const EVENTS_CAPACITY: usize = 1024;

fn listener_token(index: usize) -> Token {
    Token(usize::MAX - 1 - index)
}

fn listener_index(token: Token, listeners: usize) -> Option<usize> {
    let index = (usize::MAX - 1).checked_sub(token.0)?;
    (index < listeners).then_some(index)
}

/// Pause before accepting again after a failure like descriptor exhaustion
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(10);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum AcceptFailure {
    /// nothing left to accept
    Drained,
    /// this one connection failed, keep accepting
    Skip,
    /// the listener can't accept right now, accept again after a pause
    Retry,
}

fn accept_failure(err: &io::Error) -> AcceptFailure {
    match err.kind() {
        ErrorKind::WouldBlock => AcceptFailure::Drained,
        ErrorKind::Interrupted | ErrorKind::ConnectionAborted | ErrorKind::ConnectionReset => {
            AcceptFailure::Skip
        }
        _ => AcceptFailure::Retry,
    }
}

/// Job run on a worker thread
enum Work {
    /// accept everything pending on a listener
    Accept(usize),
    /// advance a connection by one readiness event
    Step(Box<Connection>),
}

/// Result of a job, handed back to the event loop
enum Completion {
    Accepted(TcpStream, SocketAddr),
    AcceptAgain(usize),
    Stepped(Box<Connection>, Interest),
    Closed(SlotId),
}

/// The server serving files and modules below the document root.
///
/// Listening starts in [`Server::new`]. Dropping the server stops the event
/// loop and the workers and closes every open connection.
#[derive(Debug)]
pub struct Server {
    // result of TcpListener::local_addr() per listener
    local_addrs: Vec<SocketAddr>,

    // when set to true, the event loop exits on its next wake up
    close: Arc<AtomicBool>,

    waker: Arc<Waker>,

    // number of currently open connections
    num_connections: Arc<AtomicUsize>,

    // event loop thread join handle
    thread_jh: Option<JoinHandle<()>>,
}

impl Server {
    /// Binds every configured address and starts the workers and the event loop.
    ///
    /// # Errors
    ///
    /// - invalid `config`, see [`ServerConfig::validate`]
    /// - socket binding, poll setup or thread spawn failed
    pub fn new(config: ServerConfig) -> io::Result<Self> {
        config.validate()?;

        let poll = Poll::new()?;
        let waker = Arc::new(Waker::new(poll.registry(), WAKER)?);

        let mut listeners = Vec::with_capacity(config.addr.len());
        let mut local_addrs = Vec::with_capacity(config.addr.len());
        for (index, addr) in config.addr.iter().enumerate() {
            let mut listener = socket_listener::bind(*addr, &config.socket_config)?;
            poll.registry()
                .register(&mut listener, listener_token(index), Interest::READABLE)?;

            let local_addr = listener.local_addr()?;
            log::info!("listening on {local_addr}");
            local_addrs.push(local_addr);
            listeners.push(listener);
        }

        let (sender, receiver) = mpsc::channel();
        let jobs = Arc::new(Jobs {
            site: Site {
                root: config.document_root,
                index: config.index,
                policy: config.path_policy,
                modules: config.modules,
            },
            listeners,
            sender,
            waker: Arc::clone(&waker),
            no_delay: config.socket_config.no_delay,
        });
        let job_fn: JobFn<Work> = Arc::new(move |work| jobs.run(work));
        let pool = WorkerPool::new(config.workers, job_fn)?;

        let close = Arc::new(AtomicBool::new(false));
        let num_connections = Arc::new(AtomicUsize::new(0));
        let event_loop = EventLoop {
            poll,
            slots: Slots::with_capacity(config.connection_limit),
            pool,
            receiver,
            listeners: local_addrs.len(),
            close: Arc::clone(&close),
            num_connections: Arc::clone(&num_connections),
        };

        let thread_jh = thread::Builder::new()
            .name("srv-events".into())
            .spawn(move || event_loop.run())?;

        Ok(Self {
            local_addrs,
            close,
            waker,
            num_connections,
            thread_jh: Some(thread_jh),
        })
    }

    /// Address of every listening socket, in configuration order
    #[must_use]
    pub fn local_addrs(&self) -> &[SocketAddr] {
        &self.local_addrs
    }

    /// Returns the number of clients currently connected to the server.
    #[must_use]
    pub fn num_connections(&self) -> usize {
        self.num_connections.load(Ordering::Acquire)
    }

    /// Tells the event loop to stop. Returns without waiting for it.
    pub fn shutdown(&self) {
        self.close.store(true, Ordering::Release);
        if let Err(err) = self.waker.wake() {
            log::error!("waking event loop failed: {err}");
            let _ = err;
        }
    }

    /// Blocks until the event loop stopped
    pub fn join(mut self) {
        self.join_thread();
    }

    fn join_thread(&mut self) {
        if let Some(handle) = self.thread_jh.take() {
            if handle.join().is_err() {
                log::error!("event loop thread panicked");
            }
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.shutdown();
        self.join_thread();
    }
}

/// Everything a worker needs to run a [`Work`] item
struct Jobs {
    site: Site,
    listeners: Vec<TcpListener>,
    sender: Sender<Completion>,
    waker: Arc<Waker>,
    no_delay: bool,
}

impl Jobs {
    fn run(&self, work: Work) {
        match work {
            Work::Accept(index) => self.accept(index),
            Work::Step(conn) => self.step(conn),
        }
    }

    /// Accepts until the listener would block, the listener is edge-triggered
    fn accept(&self, index: usize) {
        let Some(listener) = self.listeners.get(index) else {
            return;
        };

        loop {
            match listener.accept() {
                Ok((stream, peer)) => {
                    if self.no_delay {
                        if let Err(err) = stream.set_nodelay(true) {
                            log::debug!("nodelay for {peer}: {err}");
                            let _ = err;
                        }
                    }
                    self.complete(Completion::Accepted(stream, peer));
                }
                Err(err) => match accept_failure(&err) {
                    AcceptFailure::Drained => break,
                    AcceptFailure::Skip => {
                        log::debug!("accept skipped: {err}");
                    }
                    AcceptFailure::Retry => {
                        // queued connections raise no new edge, so come back later
                        log::warn!("error on connection accept, retrying: {err:?}");
                        thread::sleep(ACCEPT_RETRY_DELAY);
                        self.complete(Completion::AcceptAgain(index));
                        break;
                    }
                },
            }
        }
    }

    fn step(&self, mut conn: Box<Connection>) {
        let id = conn.id();
        let step = panic::catch_unwind(AssertUnwindSafe(|| conn.step(&self.site)));

        match step {
            Ok(Step::Wait(interest)) => self.complete(Completion::Stepped(conn, interest)),
            Ok(Step::Done) => self.complete(Completion::Closed(id)),
            Err(_) => {
                log::error!("[{id}] handler panicked, closing connection");
                conn.close();
                self.complete(Completion::Closed(id));
            }
        }
    }

    fn complete(&self, completion: Completion) {
        if self.sender.send(completion).is_err() {
            log::debug!("event loop gone, dropping completion");
            return;
        }
        if let Err(err) = self.waker.wake() {
            log::error!("waking event loop failed: {err}");
            let _ = err;
        }
    }
}

/// Owner of the poll instance and every idle connection
struct EventLoop {
    poll: Poll,
    slots: Slots<Box<Connection>>,
    pool: WorkerPool<Work>,
    receiver: Receiver<Completion>,
    listeners: usize,
    close: Arc<AtomicBool>,
    num_connections: Arc<AtomicUsize>,
}

impl EventLoop {
    fn run(mut self) {
        log::debug!("running event loop");
        let mut events = Events::with_capacity(EVENTS_CAPACITY);

        while !self.close.load(Ordering::Acquire) {
            if let Err(err) = self.poll.poll(&mut events, None) {
                if err.kind() == ErrorKind::Interrupted {
                    continue;
                }
                log::error!("poll failed: {err}");
                break;
            }

            for event in &events {
                let token = event.token();
                if token == WAKER {
                    continue;
                }
                if let Some(index) = listener_index(token, self.listeners) {
                    self.pool.submit(Work::Accept(index));
                } else if let Some(id) = SlotId::from_token(token) {
                    self.dispatch(id);
                }
            }

            self.drain_completions();
            self.num_connections
                .store(self.slots.len(), Ordering::Release);
        }

        self.stop();
    }

    /// Lends a ready connection to the pool
    fn dispatch(&mut self, id: SlotId) {
        // a connection already in flight ignores further events
        let Some(mut conn) = self.slots.take(id) else {
            return;
        };
        if let Some(stream) = conn.stream_mut() {
            if let Err(err) = self.poll.registry().deregister(stream) {
                log::debug!("[{id}] deregister: {err}");
                let _ = err;
            }
        }
        self.pool.submit(Work::Step(conn));
    }

    fn drain_completions(&mut self) {
        while let Ok(completion) = self.receiver.try_recv() {
            match completion {
                Completion::Accepted(stream, peer) => self.admit(stream, peer),
                Completion::AcceptAgain(index) => self.pool.submit(Work::Accept(index)),
                Completion::Stepped(conn, interest) => {
                    let id = conn.id();
                    self.watch(id, conn, interest);
                }
                Completion::Closed(id) => {
                    let _ = self.slots.release(id);
                }
            }
        }
    }

    fn admit(&mut self, stream: TcpStream, peer: SocketAddr) {
        let Some(id) = self
            .slots
            .insert_with(|id| Box::new(Connection::new(id, stream, peer)))
        else {
            log::warn!("connection limit reached, closing {peer}");
            return;
        };
        log::debug!("[{id}] accepted {peer}");

        if let Some(conn) = self.slots.take(id) {
            self.watch(id, conn, Interest::READABLE);
        }
    }

    /// Registers the connection with `interest` and parks it until its next event
    fn watch(&mut self, id: SlotId, mut conn: Box<Connection>, interest: Interest) {
        let registered = match conn.stream_mut() {
            Some(stream) => self.poll.registry().register(stream, id.token(), interest),
            None => Err(io::Error::from(ErrorKind::NotConnected)),
        };

        match registered {
            Ok(()) => {
                if let Err(mut conn) = self.slots.park(id, conn) {
                    log::debug!("[{id}] stale slot");
                    conn.close();
                }
            }
            Err(err) => {
                log::warn!("[{id}] register failed: {err}");
                let _ = err;
                conn.close();
                let _ = self.slots.release(id);
            }
        }
    }

    fn stop(mut self) {
        log::info!("stopping server");
        self.pool.shutdown();

        // steps finished during shutdown
        while let Ok(completion) = self.receiver.try_recv() {
            if let Completion::Stepped(mut conn, _) = completion {
                conn.close();
            }
        }
        for mut conn in self.slots.drain() {
            conn.close();
        }
        self.num_connections.store(0, Ordering::Release);
        log::debug!("event loop stopped");
    }
}
