//! Clap option structs for the two binaries

use crate::protocol::{exit_code, DEFAULT_BACKLOG};
use crate::server::ServerConfig;
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Printable character counting server
#[derive(Clone, Debug, Parser)]
#[command(name = "pcc_server", version, about)]
pub struct ServerOpts {
    /// Port to listen on
    pub port: u16,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Listen backlog
    #[arg(long, default_value_t = DEFAULT_BACKLOG)]
    pub backlog: i32,

    /// Read/write timeout per connection, in seconds (none by default)
    #[arg(long = "timeout-secs")]
    pub timeout_secs: Option<u64>,

    /// Append JSONL connection events to this file
    #[arg(long = "log-file")]
    pub log_file: Option<PathBuf>,
}

impl ServerOpts {
    pub fn to_config(&self) -> ServerConfig {
        ServerConfig {
            bind: SocketAddr::new(self.host, self.port),
            backlog: self.backlog,
            io_timeout: self
                .timeout_secs
                .filter(|&s| s > 0)
                .map(Duration::from_secs),
        }
    }
}

/// Send a file to a pcc server and print its printable character count
#[derive(Clone, Debug, Parser)]
#[command(name = "pcc_client", version, about)]
pub struct ClientOpts {
    /// Server IP address
    pub server_ip: IpAddr,

    /// Server port
    pub server_port: u16,

    /// File whose contents are sent
    pub file_path: PathBuf,
}

impl ClientOpts {
    pub fn server_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server_ip, self.server_port)
    }
}

/// Parse arguments; usage errors exit 1, `--help`/`--version` exit 0
pub fn parse_or_exit<P: Parser>() -> P {
    match P::try_parse() {
        Ok(opts) => opts,
        Err(e) => {
            let _ = e.print();
            let code = if e.use_stderr() {
                exit_code::FAILURE
            } else {
                exit_code::SUCCESS
            };
            std::process::exit(code);
        }
    }
}
