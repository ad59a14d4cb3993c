//! Per-connection state machine
//!
//! A [`Connection`] is advanced by [`Connection::step`] on a worker thread,
//! one readiness event at a time. The step reports the interest the socket
//! has to be registered with next, or that the connection is finished.

use std::fmt;
use std::fs::File;
use std::io::{self, ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr};
use std::path::{Path, PathBuf};

use mio::net::TcpStream;
use mio::Interest;

use crate::common::limits::{FILE_CHUNK_SIZE, REQUEST_BUFFER_SIZE};
use crate::log;
use crate::module::ModuleTable;
use crate::path::PathPolicy;
use crate::request::{self, Request};
use crate::response::{self, Body, Response};
use crate::util::SlotId;

/// What a request is served from, shared by all connections
#[derive(Debug)]
pub(crate) struct Site {
    pub(crate) root: PathBuf,
    pub(crate) index: String,
    pub(crate) policy: PathPolicy,
    pub(crate) modules: ModuleTable,
}

/// Connection states in protocol order
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum State {
    /// accepted, waiting for the request
    New,
    /// request received and parsed
    RequestReady,
    /// response generated, header not sent yet
    ResponseReady,
    /// header sent, body in progress
    Sending,
    /// closed
    Terminated,
}

/// Outcome of one [`Connection::step`]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Step {
    /// register again with this interest
    Wait(Interest),
    /// finished or failed, the connection is closed
    Done,
}

/// One accepted client socket and its in-progress exchange
#[derive(Debug)]
pub(crate) struct Connection {
    id: SlotId,
    stream: Option<TcpStream>,
    peer: SocketAddr,
    state: State,
    request: Option<Request>,
    response: Option<Response>,
    // header bytes written
    header_sent: usize,
    // bytes of an in-memory body written
    data_sent: usize,
    file: Option<FileBody>,
}

impl Connection {
    pub(crate) fn new(id: SlotId, stream: TcpStream, peer: SocketAddr) -> Self {
        Self {
            id,
            stream: Some(stream),
            peer,
            state: State::New,
            request: None,
            response: None,
            header_sent: 0,
            data_sent: 0,
            file: None,
        }
    }

    pub(crate) fn id(&self) -> SlotId {
        self.id
    }

    /// Socket, `None` once closed
    pub(crate) fn stream_mut(&mut self) -> Option<&mut TcpStream> {
        self.stream.as_mut()
    }

    /// Advances the connection on a readiness event
    pub(crate) fn step(&mut self, site: &Site) -> Step {
        match self.state {
            State::New => self.receive(site),
            State::RequestReady => self.respond(site),
            State::ResponseReady => self.send_header(),
            State::Sending => self.send_body(),
            State::Terminated => Step::Done,
        }
    }

    fn receive(&mut self, site: &Site) -> Step {
        let mut buf = [0_u8; REQUEST_BUFFER_SIZE];
        let Some(read) = self.stream.as_mut().map(|stream| stream.read(&mut buf)) else {
            return self.terminate("socket closed");
        };

        let len = match read {
            Ok(0) => return self.terminate("peer closed before request"),
            Ok(len) if len == buf.len() => return self.terminate("request exceeds buffer"),
            Ok(len) => len,
            Err(err) if is_transient(&err) => return Step::Wait(Interest::READABLE),
            Err(err) => return self.fail("receive", &err),
        };

        match request::parse(&buf[..len]) {
            Ok(request) => {
                log::debug!(
                    "[{}] {} {} {} from {}",
                    self.id,
                    request.method(),
                    request.path(),
                    request.version().header(),
                    self.peer
                );
                self.request = Some(request);
                self.state = State::RequestReady;
                self.respond(site)
            }
            Err(err) => {
                log::warn!("[{}] rejected request from {}: {err}", self.id, self.peer);
                let _ = err;
                self.close();
                Step::Done
            }
        }
    }

    fn respond(&mut self, site: &Site) -> Step {
        let generated = self.request.as_ref().map(|request| {
            response::generate(
                &site.root,
                request.path(),
                &site.index,
                request.params(),
                &site.modules,
                site.policy,
            )
        });
        let Some(generated) = generated else {
            return self.terminate("no request");
        };

        match generated {
            Ok(response) => {
                log::debug!(
                    "[{}] {} with {} body bytes",
                    self.id,
                    response.status(),
                    response.content_length()
                );
                self.response = Some(response);
                self.state = State::ResponseReady;
                Step::Wait(Interest::WRITABLE)
            }
            Err(err) => self.fail("generate", &err),
        }
    }

    fn send_header(&mut self) -> Step {
        let written = match (self.stream.as_mut(), self.response.as_ref()) {
            (Some(stream), Some(response)) => {
                Some(write_from(stream, response.header(), &mut self.header_sent))
            }
            _ => None,
        };
        let Some(written) = written else {
            return self.terminate("nothing to send");
        };

        match written {
            Ok(true) => {}
            Ok(false) => return Step::Wait(Interest::WRITABLE),
            Err(err) => return self.fail("send header", &err),
        }

        let opened = match self.response.as_ref().and_then(Response::file_path) {
            Some(path) => FileBody::open(path).map(Some),
            None => Ok(None),
        };
        match opened {
            Ok(file) => self.file = file,
            Err(err) => return self.fail("open body file", &err),
        }

        self.state = State::Sending;
        self.send_body()
    }

    fn send_body(&mut self) -> Step {
        let written = match (self.stream.as_mut(), self.response.as_ref()) {
            (Some(stream), Some(response)) => Some(match (response.body(), self.file.as_mut()) {
                (Body::Pregenerated(data), _) => write_from(stream, data, &mut self.data_sent),
                (Body::File(_), Some(file)) => file.send(stream, response.content_length()),
                (Body::File(_), None) => Err(io::Error::new(
                    ErrorKind::NotFound,
                    "body file not open",
                )),
            }),
            _ => None,
        };
        let Some(written) = written else {
            return self.terminate("nothing to send");
        };

        match written {
            Ok(true) => {
                log::debug!("[{}] response sent to {}", self.id, self.peer);
                self.close();
                Step::Done
            }
            Ok(false) => Step::Wait(Interest::WRITABLE),
            Err(err) => self.fail("send body", &err),
        }
    }

    fn terminate(&mut self, reason: &str) -> Step {
        log::debug!("[{}] terminated: {reason}", self.id);
        let _ = reason;
        self.close();
        Step::Done
    }

    fn fail(&mut self, what: &str, err: &io::Error) -> Step {
        log::warn!("[{}] {what} failed for {}: {err}", self.id, self.peer);
        let _ = (what, err);
        self.close();
        Step::Done
    }

    /// Closes socket and body file. Closing twice is a no-op.
    pub(crate) fn close(&mut self) {
        self.state = State::Terminated;
        self.file = None;
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

/// File body streamed in fixed-size chunks
struct FileBody {
    file: File,
    chunk: Vec<u8>,
    // next byte of `chunk` to write
    pos: usize,
    // bytes of `chunk` holding file data
    filled: usize,
    // bytes read from the file so far
    read: u64,
}

impl FileBody {
    fn open(path: &Path) -> io::Result<Self> {
        Ok(Self {
            file: File::open(path)?,
            chunk: vec![0; FILE_CHUNK_SIZE],
            pos: 0,
            filled: 0,
            read: 0,
        })
    }

    /// Streams until `content_length` bytes are written.
    /// `Ok(false)` when the socket would block.
    fn send(&mut self, stream: &mut TcpStream, content_length: u64) -> io::Result<bool> {
        loop {
            if self.pos == self.filled {
                if self.read >= content_length {
                    return Ok(true);
                }

                let want = usize::try_from(content_length - self.read)
                    .map_or(self.chunk.len(), |rest| rest.min(self.chunk.len()));
                let n = match self.file.read(&mut self.chunk[..want]) {
                    Ok(0) => {
                        return Err(io::Error::new(
                            ErrorKind::UnexpectedEof,
                            "file shorter than Content-Length",
                        ))
                    }
                    Ok(n) => n,
                    Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                    Err(err) => return Err(err),
                };
                self.pos = 0;
                self.filled = n;
                self.read += n as u64;
            }

            let mut pos = self.pos;
            let written = write_from(stream, &self.chunk[..self.filled], &mut pos);
            self.pos = pos;
            if !written? {
                return Ok(false);
            }
        }
    }
}

impl fmt::Debug for FileBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileBody")
            .field("file", &self.file)
            .field("read", &self.read)
            .finish_non_exhaustive()
    }
}

/// Writes `data[*offset..]`, advancing `offset`.
/// `Ok(true)` once everything is written, `Ok(false)` when the socket would block.
fn write_from<W: Write>(stream: &mut W, data: &[u8], offset: &mut usize) -> io::Result<bool> {
    while *offset < data.len() {
        match stream.write(&data[*offset..]) {
            Ok(0) => return Err(io::Error::new(ErrorKind::WriteZero, "peer stopped reading")),
            Ok(n) => *offset += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => {}
            Err(err) if err.kind() == ErrorKind::WouldBlock => return Ok(false),
            Err(err) => return Err(err),
        }
    }
    Ok(true)
}

fn is_transient(err: &io::Error) -> bool {
    matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted)
}
