use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ConnectionEvent {
    Listening {
        addr: String,
    },
    Completed {
        peer: String,
        length: u32,
        count: u32,
    },
    Abandoned {
        peer: String,
        stage: String,
        reason: String,
    },
    Shutdown {
        connections: u64,
        printable_total: u64,
    },
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ConnectionLogEntry {
    pub timestamp: String,
    #[serde(flatten)]
    pub event: ConnectionEvent,
}

pub trait ConnectionLogger: Send + Sync {
    fn listening(&self, _addr: SocketAddr) {}
    fn completed(&self, _peer: &str, _length: u32, _count: u32) {}
    fn abandoned(&self, _peer: &str, _stage: &str, _reason: &str) {}
    fn shutdown(&self, _connections: u64, _printable_total: u64) {}
}

pub struct NoopLogger;
impl ConnectionLogger for NoopLogger {}

/// Appends one JSON object per line
pub struct JsonlLogger {
    file: Mutex<File>,
}

impl JsonlLogger {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())
            .with_context(|| format!("open log file {}", path.as_ref().display()))?;
        Ok(Self {
            file: Mutex::new(f),
        })
    }

    fn record(&self, event: ConnectionEvent) {
        let entry = ConnectionLogEntry {
            timestamp: Utc::now().to_rfc3339(),
            event,
        };
        if let Ok(mut f) = self.file.lock() {
            if let Ok(line) = serde_json::to_string(&entry) {
                let _ = writeln!(f, "{}", line);
            }
        }
    }
}

impl ConnectionLogger for JsonlLogger {
    fn listening(&self, addr: SocketAddr) {
        self.record(ConnectionEvent::Listening {
            addr: addr.to_string(),
        });
    }
    fn completed(&self, peer: &str, length: u32, count: u32) {
        self.record(ConnectionEvent::Completed {
            peer: peer.to_string(),
            length,
            count,
        });
    }
    fn abandoned(&self, peer: &str, stage: &str, reason: &str) {
        self.record(ConnectionEvent::Abandoned {
            peer: peer.to_string(),
            stage: stage.to_string(),
            reason: reason.to_string(),
        });
    }
    fn shutdown(&self, connections: u64, printable_total: u64) {
        self.record(ConnectionEvent::Shutdown {
            connections,
            printable_total,
        });
    }
}

/// Read back a log written by [`JsonlLogger`]
pub fn read_log(path: &Path) -> Result<Vec<ConnectionLogEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = File::open(path).context("Failed to open connection log for reading")?;
    let reader = BufReader::new(file);
    let mut entries = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let entry: ConnectionLogEntry = serde_json::from_str(&line)?;
        entries.push(entry);
    }
    Ok(entries)
}

/// Where the server's connection log goes, if anywhere
pub fn from_path(path: Option<&PathBuf>) -> Result<Box<dyn ConnectionLogger>> {
    match path {
        Some(p) => Ok(Box::new(JsonlLogger::new(p)?)),
        None => Ok(Box::new(NoopLogger)),
    }
}
