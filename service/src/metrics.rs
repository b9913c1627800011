//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Lock-free metrics for the lobby server
//!
//! Counters are kept per server instance so tests can assert on them; every
//! update is mirrored to the global [`metrics`] recorder under the
//! `lobbycast.*` namespace.

use metrics::{counter, gauge};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Lock-free server metrics
///
/// All metrics are stored as atomics and can be accessed concurrently
/// without locks. Use the `snapshot()` method to get a view of all metrics
/// at a point in time.
#[derive(Debug)]
pub struct ServerMetrics {
    // Connection counts
    total_connections: AtomicU64,
    active_connections: AtomicU64,

    // Traffic
    lines_received: AtomicU64,
    empty_lines: AtomicU64,
    messages_relayed: AtomicU64,
    deliveries_sent: AtomicU64,
    deliveries_dropped: AtomicU64,

    // Errors
    connection_errors: AtomicU64,

    // Timing (stored as nanoseconds)
    total_connection_duration_ns: AtomicU64,
    closed_connections: AtomicU64,

    started_at: Instant,
}

impl Default for ServerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerMetrics {
    /// Create a new metrics instance
    pub fn new() -> Self {
        Self {
            total_connections: AtomicU64::new(0),
            active_connections: AtomicU64::new(0),
            lines_received: AtomicU64::new(0),
            empty_lines: AtomicU64::new(0),
            messages_relayed: AtomicU64::new(0),
            deliveries_sent: AtomicU64::new(0),
            deliveries_dropped: AtomicU64::new(0),
            connection_errors: AtomicU64::new(0),
            total_connection_duration_ns: AtomicU64::new(0),
            closed_connections: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    // Connection tracking

    /// Record a new connection being opened
    pub fn connection_opened(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        counter!("lobbycast.connections.total").increment(1);
        gauge!("lobbycast.connections.active").increment(1.0);
    }

    /// Record a connection being closed
    pub fn connection_closed(&self, duration: Duration) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
        self.closed_connections.fetch_add(1, Ordering::Relaxed);
        self.total_connection_duration_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
        gauge!("lobbycast.connections.active").decrement(1.0);
    }

    /// Get the current number of active connections
    pub fn active_connections(&self) -> u64 {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Get the total number of connections since server start
    pub fn total_connections(&self) -> u64 {
        self.total_connections.load(Ordering::Relaxed)
    }

    // Traffic tracking

    /// Record an inbound line
    pub fn line_received(&self) {
        self.lines_received.fetch_add(1, Ordering::Relaxed);
        counter!("lobbycast.lines.received").increment(1);
    }

    /// Record an inbound line that was empty after trimming
    pub fn empty_line(&self) {
        self.empty_lines.fetch_add(1, Ordering::Relaxed);
        counter!("lobbycast.lines.empty").increment(1);
    }

    /// Record a chat message relayed to the lobby
    pub fn message_relayed(&self) {
        self.messages_relayed.fetch_add(1, Ordering::Relaxed);
        counter!("lobbycast.messages.relayed").increment(1);
    }

    /// Record the per-recipient outcome of a broadcast
    pub fn deliveries(&self, sent: usize, dropped: usize) {
        self.deliveries_sent.fetch_add(sent as u64, Ordering::Relaxed);
        self.deliveries_dropped
            .fetch_add(dropped as u64, Ordering::Relaxed);
        counter!("lobbycast.deliveries.sent").increment(sent as u64);
        counter!("lobbycast.deliveries.dropped").increment(dropped as u64);
    }

    // Error tracking

    /// Record a connection error
    pub fn connection_error(&self) {
        self.connection_errors.fetch_add(1, Ordering::Relaxed);
        counter!("lobbycast.errors.connection").increment(1);
    }

    // Snapshot

    /// Get a snapshot of all metrics
    ///
    /// Individual counters are read independently, so the snapshot may be
    /// slightly skewed while connections are active.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_connections: self.total_connections.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            lines_received: self.lines_received.load(Ordering::Relaxed),
            empty_lines: self.empty_lines.load(Ordering::Relaxed),
            messages_relayed: self.messages_relayed.load(Ordering::Relaxed),
            deliveries_sent: self.deliveries_sent.load(Ordering::Relaxed),
            deliveries_dropped: self.deliveries_dropped.load(Ordering::Relaxed),
            connection_errors: self.connection_errors.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed(),
            avg_connection_duration: self.average_connection_duration(),
        }
    }

    fn average_connection_duration(&self) -> Duration {
        let closed = self.closed_connections.load(Ordering::Relaxed);
        if closed == 0 {
            return Duration::ZERO;
        }
        let total_ns = self.total_connection_duration_ns.load(Ordering::Relaxed);
        Duration::from_nanos(total_ns / closed)
    }
}

/// A snapshot of server metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    /// Total connections since server start
    pub total_connections: u64,
    /// Current active connections
    pub active_connections: u64,
    /// Inbound lines, including empty ones
    pub lines_received: u64,
    /// Inbound lines dropped because they were empty after trimming
    pub empty_lines: u64,
    /// Chat messages relayed
    pub messages_relayed: u64,
    /// Lines queued to recipients
    pub deliveries_sent: u64,
    /// Lines not queued because the recipient was full or not writable
    pub deliveries_dropped: u64,
    /// Total connection errors
    pub connection_errors: u64,
    /// Server uptime
    pub uptime: Duration,
    /// Average duration of closed connections
    pub avg_connection_duration: Duration,
}

impl MetricsSnapshot {
    /// Fraction of deliveries that were dropped, between 0 and 1
    pub fn drop_ratio(&self) -> f64 {
        let attempted = self.deliveries_sent + self.deliveries_dropped;
        if attempted == 0 {
            return 0.0;
        }
        self.deliveries_dropped as f64 / attempted as f64
    }
}
