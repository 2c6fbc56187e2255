//! Iterative counting server
//!
//! One connection at a time: read `N`, read `N` bytes, reply with the
//! printable count, then fold that connection's histogram into the
//! process-wide totals. Anything else waiting sits in the listen backlog.

use crate::counter::{Tally, Totals};
use crate::error::{classify, LocalReason, ServerError, TransferError};
use crate::framing::{recv_exact, recv_u32, send_u32};
use crate::logger::{ConnectionLogger, NoopLogger};
use crate::protocol::DEFAULT_BACKLOG;
use crate::shutdown::ShutdownSignal;
use std::fmt;
use std::io::{self, ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::time::Duration;

/// Most payload bytes held in memory at once
const PAYLOAD_CHUNK: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub backlog: i32,
    /// Per-call read/write timeout on accepted sockets; `None` blocks forever
    pub io_timeout: Option<Duration>,
}

impl ServerConfig {
    pub fn new(bind: SocketAddr) -> Self {
        Self {
            bind,
            backlog: DEFAULT_BACKLOG,
            io_timeout: None,
        }
    }
}

/// Where in the exchange a connection was when it was given up on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    AwaitLength,
    AwaitPayload,
    ReplyLength,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::AwaitLength => "await_length",
            Stage::AwaitPayload => "await_payload",
            Stage::ReplyLength => "reply_length",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal state of one connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed { length: u32, count: u32, tally: Tally },
    Abandoned { stage: Stage, reason: LocalReason },
}

/// Run one request/response exchange.
///
/// Connection-local failures come back as `Ok(Outcome::Abandoned)`; an `Err`
/// is fatal for the whole server. The returned tally has not been folded
/// anywhere yet.
pub fn handle_connection<S: Read + Write + ?Sized>(stream: &mut S) -> io::Result<Outcome> {
    let length = match recv_u32(stream) {
        Ok(n) => n,
        Err(e) => return abandon(Stage::AwaitLength, e),
    };

    // Count chunk by chunk; memory stays bounded whatever N the peer declares
    let expected = length as usize;
    let mut chunk = vec![0u8; expected.min(PAYLOAD_CHUNK)];
    let mut tally = Tally::new();
    let mut count = 0u32;
    let mut received = 0usize;
    while received < expected {
        let n = (expected - received).min(chunk.len());
        if let Err(e) = recv_exact(stream, &mut chunk[..n]) {
            return abandon(Stage::AwaitPayload, offset_by(e, received, expected));
        }
        count += tally.record(&chunk[..n]);
        received += n;
    }

    if let Err(e) = send_u32(stream, count) {
        return abandon(Stage::ReplyLength, e);
    }
    Ok(Outcome::Completed {
        length,
        count,
        tally,
    })
}

fn abandon(stage: Stage, err: TransferError) -> io::Result<Outcome> {
    match err {
        TransferError::ConnectionLocal(reason) => Ok(Outcome::Abandoned { stage, reason }),
        TransferError::Fatal(e) => Err(e),
    }
}

// A short read inside one chunk reports progress relative to the chunk
fn offset_by(err: TransferError, already: usize, expected: usize) -> TransferError {
    match err {
        TransferError::ConnectionLocal(LocalReason::PeerClosed { transferred, .. }) => {
            TransferError::ConnectionLocal(LocalReason::PeerClosed {
                transferred: already + transferred,
                expected,
            })
        }
        other => other,
    }
}

/// Create the listening socket with SO_REUSEADDR and an explicit backlog
fn create_listener(addr: SocketAddr, backlog: i32) -> io::Result<TcpListener> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog)?;

    Ok(socket.into())
}

pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    config: ServerConfig,
    totals: Totals,
    signal: ShutdownSignal,
    logger: Box<dyn ConnectionLogger>,
}

impl Server {
    pub fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let addr = config.bind;
        let setup = move |source: io::Error| ServerError::Setup { addr, source };
        let listener = create_listener(config.bind, config.backlog).map_err(setup)?;
        let local_addr = listener.local_addr().map_err(setup)?;
        Ok(Self {
            listener,
            local_addr,
            signal: ShutdownSignal::new(Some(local_addr)),
            config,
            totals: Totals::new(),
            logger: Box::new(NoopLogger),
        })
    }

    pub fn with_logger(mut self, logger: Box<dyn ConnectionLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Actual bound address (resolves port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.signal.clone()
    }

    pub fn totals(&self) -> &Totals {
        &self.totals
    }

    /// Serve until a shutdown is requested, then hand back the final totals.
    ///
    /// The request flag is checked once per iteration before accepting, and
    /// once more right after `accept` returns: a request that landed while we
    /// were parked in `accept` was made while idle, so the freshly accepted
    /// socket (possibly just the wake connection) is dropped unserved.
    pub fn serve(mut self) -> Result<Totals, ServerError> {
        eprintln!("pcc server listening on {}", self.local_addr);
        self.logger.listening(self.local_addr);

        loop {
            if self.signal.is_requested() {
                break;
            }

            let (mut stream, peer) = match self.listener.accept() {
                Ok(conn) => conn,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => match classify(e) {
                    TransferError::ConnectionLocal(reason) => {
                        eprintln!("accept error (ignored): {}", reason);
                        continue;
                    }
                    TransferError::Fatal(e) => return Err(ServerError::Accept(e)),
                },
            };

            self.signal.begin_connection();
            if self.signal.is_requested() {
                self.signal.end_connection();
                break;
            }

            let result = self.serve_one(&mut stream, peer);
            drop(stream);
            self.signal.end_connection();
            result?;
        }

        self.logger
            .shutdown(self.totals.connections(), self.totals.printable_total());
        Ok(self.totals)
    }

    fn serve_one(&mut self, stream: &mut TcpStream, peer: SocketAddr) -> Result<(), ServerError> {
        if let Some(t) = self.config.io_timeout {
            if let Err(e) = stream
                .set_read_timeout(Some(t))
                .and_then(|_| stream.set_write_timeout(Some(t)))
            {
                eprintln!("failed to set {:?} timeout for {}: {}", t, peer, e);
            }
        }
        let peer_str = peer.to_string();

        match handle_connection(stream) {
            Ok(Outcome::Completed {
                length,
                count,
                tally,
            }) => {
                self.totals.fold(&tally);
                self.logger.completed(&peer_str, length, count);
                Ok(())
            }
            Ok(Outcome::Abandoned { stage, reason }) => {
                eprintln!(
                    "connection from {} abandoned during {}: {}",
                    peer_str, stage, reason
                );
                self.logger
                    .abandoned(&peer_str, stage.as_str(), &reason.to_string());
                Ok(())
            }
            Err(source) => Err(ServerError::Transfer {
                peer: peer_str,
                source,
            }),
        }
    }
}
