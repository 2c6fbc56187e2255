//! pcc - printable character counting over TCP
//!
//! A client sends a length-prefixed payload; the server replies with how many
//! of its bytes are printable ASCII and keeps a per-character running total
//! across connections, reported when the server is interrupted.

pub mod cli;
pub mod client;
pub mod counter;
pub mod error;
pub mod framing;
pub mod logger;
pub mod protocol;
pub mod server;
pub mod shutdown;
