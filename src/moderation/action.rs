//! Punitive action kinds

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of punitive action a case records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    /// Server ban, optionally timed
    Ban,
    /// Ban immediately followed by an unban, used to purge recent messages
    Softban,
    /// Communication timeout
    Timeout,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ban => write!(f, "ban"),
            Self::Softban => write!(f, "softban"),
            Self::Timeout => write!(f, "timeout"),
        }
    }
}
