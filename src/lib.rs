pub mod commands;
pub mod config;
pub mod data;
pub mod detector;
pub mod handlers;
pub mod logging;
pub mod moderation;
pub mod platform;
pub mod scheduler;

pub const BOT_NAME: &str = "spamwarden";
pub const COMMAND_TARGET: &str = "spamwarden::command";
pub const ERROR_TARGET: &str = "spamwarden::error";
pub const EVENT_TARGET: &str = "spamwarden::handlers";
pub const CONSOLE_TARGET: &str = "spamwarden";

pub use config::BotConfig;
pub use data::Data;
pub use detector::{AbuseRateDetector, DetectorConfig};
pub use moderation::ModerationService;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
