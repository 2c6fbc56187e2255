//! Error taxonomy shared by the framing layer and the server
//!
//! Every I/O failure is sorted into one of two classes: fatal (the process
//! cannot keep serving) or connection-local (drop this peer, keep going).

use std::fmt;
use std::io;
use thiserror::Error;

/// Why a single connection was given up on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalReason {
    TimedOut,
    Reset,
    BrokenPipe,
    /// Orderly shutdown by the peer before the expected length arrived
    PeerClosed { transferred: usize, expected: usize },
}

impl fmt::Display for LocalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocalReason::TimedOut => write!(f, "timed out"),
            LocalReason::Reset => write!(f, "connection reset by peer"),
            LocalReason::BrokenPipe => write!(f, "broken pipe"),
            LocalReason::PeerClosed {
                transferred,
                expected,
            } => write!(
                f,
                "peer closed after {} of {} bytes",
                transferred, expected
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("fatal I/O error: {0}")]
    Fatal(#[source] io::Error),
    #[error("connection error: {0}")]
    ConnectionLocal(LocalReason),
}

impl TransferError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, TransferError::Fatal(_))
    }
}

/// Sort a raw I/O error into fatal vs connection-local.
///
/// `WouldBlock` only shows up on a blocking socket when a read/write timeout
/// fired, so it counts as a timeout.
pub fn classify(err: io::Error) -> TransferError {
    use io::ErrorKind::*;
    match err.kind() {
        TimedOut | WouldBlock => TransferError::ConnectionLocal(LocalReason::TimedOut),
        ConnectionReset | ConnectionAborted => TransferError::ConnectionLocal(LocalReason::Reset),
        BrokenPipe => TransferError::ConnectionLocal(LocalReason::BrokenPipe),
        _ => TransferError::Fatal(err),
    }
}

/// Errors that stop the server process
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to set up listener on {addr}: {source}")]
    Setup {
        addr: std::net::SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("accept failed: {0}")]
    Accept(#[source] io::Error),
    #[error("fatal error on connection from {peer}: {source}")]
    Transfer {
        peer: String,
        #[source]
        source: io::Error,
    },
}
