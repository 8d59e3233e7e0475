//! Write leases keeping polls from overwriting in-flight writes.

use std::collections::HashMap;
use std::time::Duration;

use crate::runtime::Instant;

/// Per-channel leases taken while a local write is being sent and confirmed.
///
/// A channel with a held lease is skipped by polls and push updates. A lease
/// that is never released expires after [`WriteLeases::TIMEOUT`].
#[derive(Debug)]
pub struct WriteLeases {
    held: HashMap<String, Instant>,
    timeout: Duration,
}

impl Default for WriteLeases {
    fn default() -> Self {
        Self::new()
    }
}

impl WriteLeases {
    pub const TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new() -> Self {
        Self::with_timeout(Self::TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        WriteLeases {
            held: HashMap::new(),
            timeout,
        }
    }

    pub fn acquire(&mut self, channel: &str) {
        self.held.insert(channel.to_string(), Instant::now());
    }

    pub fn release(&mut self, channel: &str) {
        self.held.remove(channel);
    }

    pub fn is_held(&self, channel: &str) -> bool {
        self.held
            .get(channel)
            .is_some_and(|acquired| acquired.elapsed() < self.timeout)
    }

    /// Forget every lease, e.g. on reconnect.
    pub fn clear(&mut self) {
        self.held.clear();
    }
}
