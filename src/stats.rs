use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

/// Point-in-time copy of the relay counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayStatsSnapshot {
    /// Total number of sessions started
    pub total_sessions: u64,
    /// Currently active sessions
    pub active_sessions: u64,
    /// Sessions that ended with an error
    pub failed_sessions: u64,
    /// Completed request/response cycles across all sessions
    pub cycles: u64,
    /// Bytes forwarded from clients to the upstream in completed cycles
    pub bytes_to_upstream: u64,
    /// Bytes forwarded from the upstream to clients in completed cycles
    pub bytes_to_client: u64,
    /// Timestamp when the relay started (Unix timestamp)
    pub start_time: u64,
}

/// Statistics tracker shared by all sessions
#[derive(Debug, Clone)]
pub struct RelayStats {
    total_sessions: Arc<AtomicU64>,
    active_sessions: Arc<AtomicU64>,
    failed_sessions: Arc<AtomicU64>,
    cycles: Arc<AtomicU64>,
    bytes_to_upstream: Arc<AtomicU64>,
    bytes_to_client: Arc<AtomicU64>,
    start_time: u64,
}

impl RelayStats {
    pub fn new() -> Self {
        Self {
            total_sessions: Arc::new(AtomicU64::new(0)),
            active_sessions: Arc::new(AtomicU64::new(0)),
            failed_sessions: Arc::new(AtomicU64::new(0)),
            cycles: Arc::new(AtomicU64::new(0)),
            bytes_to_upstream: Arc::new(AtomicU64::new(0)),
            bytes_to_client: Arc::new(AtomicU64::new(0)),
            start_time: SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default(),
        }
    }

    /// Mark a session as started; the returned guard marks it ended on drop
    pub fn session_started(&self) -> SessionGuard {
        self.total_sessions.fetch_add(1, Ordering::Relaxed);
        self.active_sessions.fetch_add(1, Ordering::Relaxed);
        SessionGuard {
            active_sessions: Arc::clone(&self.active_sessions),
        }
    }

    /// Record a session that ended with an error
    pub fn session_failed(&self) {
        self.failed_sessions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one completed cycle
    pub fn cycle_completed(&self) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    /// Add bytes sent to the upstream
    pub fn add_bytes_to_upstream(&self, bytes: u64) {
        self.bytes_to_upstream.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Add bytes sent to a client
    pub fn add_bytes_to_client(&self, bytes: u64) {
        self.bytes_to_client.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Get current snapshot of stats
    pub fn snapshot(&self) -> RelayStatsSnapshot {
        RelayStatsSnapshot {
            total_sessions: self.total_sessions.load(Ordering::Relaxed),
            active_sessions: self.active_sessions.load(Ordering::Relaxed),
            failed_sessions: self.failed_sessions.load(Ordering::Relaxed),
            cycles: self.cycles.load(Ordering::Relaxed),
            bytes_to_upstream: self.bytes_to_upstream.load(Ordering::Relaxed),
            bytes_to_client: self.bytes_to_client.load(Ordering::Relaxed),
            start_time: self.start_time,
        }
    }
}

impl Default for RelayStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the active session count when dropped
#[derive(Debug)]
pub struct SessionGuard {
    active_sessions: Arc<AtomicU64>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.active_sessions.fetch_sub(1, Ordering::Relaxed);
    }
}
