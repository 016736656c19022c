//! Message and link flood detection
//!
//! Tracks per-user activity inside a sliding window and reports when the
//! configured thresholds are crossed. Purely in-memory; the caller decides
//! what to do with a violation.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Thresholds and window sizes for flood detection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Sliding window for message counting, in milliseconds
    pub msg_window_ms: i64,
    /// Number of messages inside the window that trips a violation
    pub msg_max_in_window: usize,
    /// Sliding window for link counting, in milliseconds
    pub link_window_ms: i64,
    /// Number of links inside the window that trips a violation
    pub link_max_in_window: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            msg_window_ms: 15_000,
            msg_max_in_window: 10,
            link_window_ms: 30_000,
            link_max_in_window: 5,
        }
    }
}

/// A tripped threshold, with a reason suitable for audit logs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateViolation {
    pub reason: String,
}

/// Timestamps retained for one user in one guild
#[derive(Debug, Default)]
struct RateWindow {
    messages: VecDeque<DateTime<Utc>>,
    links: VecDeque<DateTime<Utc>>,
}

impl RateWindow {
    /// Drop every timestamp that has aged out of its window
    fn prune(&mut self, now: DateTime<Utc>, msg_window: Duration, link_window: Duration) {
        let msg_cutoff = now - msg_window;
        let link_cutoff = now - link_window;
        while self.messages.front().is_some_and(|t| *t <= msg_cutoff) {
            self.messages.pop_front();
        }
        while self.links.front().is_some_and(|t| *t <= link_cutoff) {
            self.links.pop_front();
        }
    }
}

/// Sliding-window flood detector, keyed by (guild, user)
pub struct AbuseRateDetector {
    config: DetectorConfig,
    buckets: DashMap<(u64, u64), RateWindow>,
}

impl AbuseRateDetector {
    #[must_use]
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            buckets: DashMap::new(),
        }
    }

    /// Record one message (carrying `link_count` links) and evaluate the
    /// thresholds against the pruned windows.
    ///
    /// The message threshold is checked before the link threshold, so a user
    /// flooding messages full of links is reported for the message flood.
    pub fn record(
        &self,
        guild_id: u64,
        user_id: u64,
        link_count: usize,
        now: DateTime<Utc>,
    ) -> Option<RateViolation> {
        let msg_window = Duration::milliseconds(self.config.msg_window_ms);
        let link_window = Duration::milliseconds(self.config.link_window_ms);

        let mut bucket = self.buckets.entry((guild_id, user_id)).or_default();
        bucket.messages.push_back(now);
        for _ in 0..link_count {
            bucket.links.push_back(now);
        }
        bucket.prune(now, msg_window, link_window);

        if bucket.messages.len() >= self.config.msg_max_in_window {
            return Some(RateViolation {
                reason: format!(
                    "sent {} messages within {}s (limit {})",
                    bucket.messages.len(),
                    self.config.msg_window_ms / 1000,
                    self.config.msg_max_in_window
                ),
            });
        }

        if bucket.links.len() >= self.config.link_max_in_window {
            return Some(RateViolation {
                reason: format!(
                    "posted {} links within {}s (limit {})",
                    bucket.links.len(),
                    self.config.link_window_ms / 1000,
                    self.config.link_max_in_window
                ),
            });
        }

        None
    }

    /// Forget everything recorded for a user, so the burst that earned an
    /// action cannot trip the detector again.
    pub fn clear(&self, guild_id: u64, user_id: u64) {
        self.buckets.remove(&(guild_id, user_id));
    }
}
