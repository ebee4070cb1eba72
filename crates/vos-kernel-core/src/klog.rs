//! Kernel log ring.
//!
//! Every `log` syscall and kernel diagnostic lands here, in a bounded
//! ring that drops the oldest entry on overflow. Entries are mirrored to
//! the host through the `log` facade; the kernel never installs a
//! logger.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::types::Pid;

/// Maximum number of entries retained in the ring.
pub const MAX_LOG_ENTRIES: usize = 1000;

/// One kernel log entry.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogEntry {
    /// Logical time of the entry
    pub time: u64,
    /// Originating process (`Pid::KERNEL` for kernel diagnostics)
    pub pid: Pid,
    /// Message text
    pub message: String,
}

/// Bounded, append-only kernel log.
#[derive(Clone, Debug, Default)]
pub struct KernelLog {
    entries: VecDeque<LogEntry>,
}

impl KernelLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, dropping the oldest past capacity. The entry is
    /// mirrored to the host's diagnostic stream.
    pub fn append(&mut self, time: u64, pid: Pid, message: impl Into<String>) {
        let message = message.into();
        log::info!(target: "vos", "[{}ms pid={}] {}", time, pid, message);

        self.entries.push_back(LogEntry { time, pid, message });
        if self.entries.len() > MAX_LOG_ENTRIES {
            self.entries.pop_front();
        }
    }

    /// The most recent `limit` entries, oldest first (most-recent-last).
    pub fn recent(&self, limit: usize) -> Vec<LogEntry> {
        let skip = self.entries.len().saturating_sub(limit);
        self.entries.iter().skip(skip).cloned().collect()
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the log is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
