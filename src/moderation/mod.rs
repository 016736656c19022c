//! Moderation case lifecycle
//!
//! Issues punitive actions against users, records each one as a case, and
//! automatically reverses timed actions when they expire. Pending cases are
//! re-armed from the store at startup so a restart never loses an expiry.

mod action;
mod error;
mod handler;
mod record;
mod service;
mod store;

pub use action::ActionKind;
pub use error::{ModerationError, ModerationResult};
pub use handler::{BanExpiryHandler, TimedActionHandler};
pub use record::{ActionRecord, CompletionOrigin, MAX_REASON_LEN, NewAction};
pub use service::{BanRequest, ExpungeRequest, ModerationService};
pub use store::{CaseStore, MemoryCaseStore, StoreError};
