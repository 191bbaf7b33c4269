//! Relay Session

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tracing::info;

/// Transfer accounting for one proxied session.
#[derive(Debug)]
pub struct RelaySession {
    pub client_addr: SocketAddr,
    pub target_addr: SocketAddr,
    start_time: Instant,
    bytes_up: AtomicU64,
    bytes_down: AtomicU64,
}

impl RelaySession {
    pub fn new(client_addr: SocketAddr, target_addr: SocketAddr) -> Self {
        Self {
            client_addr,
            target_addr,
            start_time: Instant::now(),
            bytes_up: AtomicU64::new(0),
            bytes_down: AtomicU64::new(0),
        }
    }

    /// Bytes transferred upstream (client to target)
    pub fn bytes_up(&self) -> u64 {
        self.bytes_up.load(Ordering::Relaxed)
    }

    /// Bytes transferred downstream (target to client)
    pub fn bytes_down(&self) -> u64 {
        self.bytes_down.load(Ordering::Relaxed)
    }

    pub fn total_bytes(&self) -> u64 {
        self.bytes_up() + self.bytes_down()
    }

    pub fn duration(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }

    pub fn update_bytes_up(&self, bytes: u64) {
        self.bytes_up.store(bytes, Ordering::Relaxed);
    }

    pub fn update_bytes_down(&self, bytes: u64) {
        self.bytes_down.store(bytes, Ordering::Relaxed);
    }

    /// Log session statistics
    pub fn log_stats(&self) {
        info!(
            client_addr = %self.client_addr,
            target_addr = %self.target_addr,
            duration_ms = self.duration().as_millis() as u64,
            bytes_up = self.bytes_up(),
            bytes_down = self.bytes_down(),
            total_bytes = self.total_bytes(),
            "relay session completed"
        );
    }
}
