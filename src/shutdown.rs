//! Deferred shutdown on interrupt
//!
//! The interrupt context only flips atomics; the listener loop is the one
//! that reports and stops. When no connection is in flight the loop is
//! usually parked in `accept`, so a request also pokes the listener with a
//! throwaway loopback connection to get it moving.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const WAKE_CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug)]
struct State {
    pending: AtomicBool,
    active: AtomicBool,
    wake_addr: Option<SocketAddr>,
}

/// Cloneable handle shared by the listener loop and the interrupt handler
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    state: Arc<State>,
}

impl ShutdownSignal {
    /// `listen_addr` is the listener's bound address; an unspecified host is
    /// mapped to loopback for the wake connection.
    pub fn new(listen_addr: Option<SocketAddr>) -> Self {
        Self {
            state: Arc::new(State {
                pending: AtomicBool::new(false),
                active: AtomicBool::new(false),
                wake_addr: listen_addr.map(loopback_for),
            }),
        }
    }

    /// Called from the interrupt context.
    pub fn request(&self) {
        self.state.pending.store(true, Ordering::SeqCst);
        if !self.state.active.load(Ordering::SeqCst) {
            self.wake();
        }
    }

    pub fn is_requested(&self) -> bool {
        self.state.pending.load(Ordering::SeqCst)
    }

    pub fn is_active(&self) -> bool {
        self.state.active.load(Ordering::SeqCst)
    }

    pub fn begin_connection(&self) {
        self.state.active.store(true, Ordering::SeqCst);
    }

    pub fn end_connection(&self) {
        self.state.active.store(false, Ordering::SeqCst);
    }

    /// Route Ctrl-C (SIGINT) to [`ShutdownSignal::request`]. Only one handler
    /// can be installed per process.
    pub fn install(&self) -> Result<(), ctrlc::Error> {
        let signal = self.clone();
        ctrlc::set_handler(move || signal.request())
    }

    fn wake(&self) {
        if let Some(addr) = self.state.wake_addr {
            // Failure just means the listener is already gone or busy
            let _ = TcpStream::connect_timeout(&addr, WAKE_CONNECT_TIMEOUT);
        }
    }
}

fn loopback_for(addr: SocketAddr) -> SocketAddr {
    let ip = match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    SocketAddr::new(ip, addr.port())
}
