//! Client side of the counting exchange

use crate::framing::{recv_u32, send_exact, send_u32};
use anyhow::{bail, Context, Result};
use std::net::{SocketAddr, TcpStream};
use std::path::Path;

/// Send a file's contents and return the server's printable count
pub fn count_file(addr: SocketAddr, path: &Path) -> Result<u32> {
    let data = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
    count_bytes(addr, &data)
}

/// Send `data` as a single request and wait for the count
pub fn count_bytes(addr: SocketAddr, data: &[u8]) -> Result<u32> {
    let len = match u32::try_from(data.len()) {
        Ok(n) => n,
        Err(_) => bail!("payload of {} bytes does not fit a 32-bit length", data.len()),
    };

    let mut stream = TcpStream::connect(addr).with_context(|| format!("connect {}", addr))?;
    send_u32(&mut stream, len).context("send length")?;
    send_exact(&mut stream, data).context("send payload")?;
    let count = recv_u32(&mut stream).context("receive count")?;
    Ok(count)
}
