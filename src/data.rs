//! Shared bot state
//!
//! One instance is built during framework setup and handed to every
//! command and event handler.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use crate::config::BotConfig;
use crate::detector::AbuseRateDetector;
use crate::moderation::ModerationService;

/// State shared across commands and event handlers
pub struct Data {
    pub config: BotConfig,
    pub detector: Arc<AbuseRateDetector>,
    pub moderation: ModerationService,
    /// Ready fires again on every reconnect; startup recovery must run
    /// exactly once per process.
    pub recovery_started: AtomicBool,
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Data")
            .field("config", &self.config)
            .field("recovery_started", &self.recovery_started)
            .finish_non_exhaustive()
    }
}

impl Data {
    #[must_use]
    pub fn new(
        config: BotConfig,
        detector: Arc<AbuseRateDetector>,
        moderation: ModerationService,
    ) -> Self {
        Self {
            config,
            detector,
            moderation,
            recovery_started: AtomicBool::new(false),
        }
    }
}
