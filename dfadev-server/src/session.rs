//! Session management.

use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Initial state, waiting for HELLO.
    Connected,
    /// Handshake complete, ready for commands.
    Ready,
    /// Session is closing.
    Closing,
}

/// A client session.
pub struct Session {
    /// Process-unique session ID.
    pub id: u64,

    /// Remote address.
    pub remote_addr: SocketAddr,

    state: SessionState,
    protocol_version: u16,
    client_name: Option<String>,
    request_count: AtomicU64,
    created_at: Instant,
    last_activity: Mutex<Instant>,
}

impl Session {
    pub fn new(remote_addr: SocketAddr) -> Self {
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            remote_addr,
            state: SessionState::Connected,
            protocol_version: 0,
            client_name: None,
            request_count: AtomicU64::new(0),
            created_at: Instant::now(),
            last_activity: Mutex::new(Instant::now()),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn set_state(&mut self, state: SessionState) {
        self.state = state;
    }

    pub fn protocol_version(&self) -> u16 {
        self.protocol_version
    }

    pub fn client_name(&self) -> Option<&str> {
        self.client_name.as_deref()
    }

    /// Completes the handshake.
    pub fn complete_handshake(&mut self, protocol_version: u16, client_name: Option<String>) {
        self.protocol_version = protocol_version;
        self.client_name = client_name;
        self.state = SessionState::Ready;
    }

    /// Records a request.
    pub fn record_request(&self) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        *self.last_activity.lock() = Instant::now();
    }

    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Returns the time since last activity.
    pub fn idle_duration(&self) -> Duration {
        self.last_activity.lock().elapsed()
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}
