// src/dag/concurrency.rs

//! Fleet-wide concurrency limits keyed by task name.
//!
//! Every task named e.g. `deploy` shares one counter, no matter which node
//! owns it. The registry is owned by the [`Process`](crate::engine::Process)
//! and handed by reference to the status and readiness operations that need
//! it.

use std::collections::HashMap;

use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Counter {
    /// `0` means unlimited.
    maximum: usize,
    current: usize,
}

/// Maximum/current running counts per task name.
#[derive(Debug, Clone, Default)]
pub struct ConcurrencyRegistry {
    counters: HashMap<String, Counter>,
}

impl ConcurrencyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum number of `name` tasks allowed to run at once (0 = unlimited).
    pub fn maximum(&self, name: &str) -> usize {
        self.counters.get(name).map(|c| c.maximum).unwrap_or(0)
    }

    pub fn set_maximum(&mut self, name: &str, maximum: usize) {
        debug!(task = %name, maximum, "setting maximum concurrency");
        self.counters.entry(name.to_string()).or_default().maximum = maximum;
    }

    /// Number of `name` tasks currently in the running state.
    pub fn current(&self, name: &str) -> usize {
        self.counters.get(name).map(|c| c.current).unwrap_or(0)
    }

    /// Overwrite the running count, e.g. to resynchronise with reality.
    pub fn set_current(&mut self, name: &str, current: usize) {
        self.counters.entry(name.to_string()).or_default().current = current;
    }

    pub fn reset_current(&mut self, name: &str) {
        self.set_current(name, 0);
    }

    pub fn is_limited(&self, name: &str) -> bool {
        self.maximum(name) > 0
    }

    /// Whether one more `name` task may enter the running state.
    pub fn available(&self, name: &str) -> bool {
        match self.counters.get(name) {
            Some(c) if c.maximum > 0 => c.current < c.maximum,
            _ => true,
        }
    }

    pub fn increase(&mut self, name: &str) -> usize {
        let counter = self.counters.entry(name.to_string()).or_default();
        counter.current += 1;
        counter.current
    }

    /// Decrease the running count, never going below zero.
    pub fn decrease(&mut self, name: &str) -> usize {
        let counter = self.counters.entry(name.to_string()).or_default();
        if counter.current == 0 {
            warn!(task = %name, "concurrency counter already at zero; not decreasing");
        }
        counter.current = counter.current.saturating_sub(1);
        counter.current
    }

    /// Names that have a limit configured.
    pub fn limited_names(&self) -> impl Iterator<Item = &str> {
        self.counters
            .iter()
            .filter(|(_, c)| c.maximum > 0)
            .map(|(name, _)| name.as_str())
    }
}
