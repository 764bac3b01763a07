use chrono::Duration;

use super::domain::Principal;

pub const DEFAULT_VOTING_WINDOW_HOURS: i64 = 72;

/// Longest accepted voting window: ten years.
pub const MAX_VOTING_WINDOW_HOURS: i64 = 87_600;

/// Fixed parameters of the accreditation process, set once at initialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptanceConfig {
    pub chairman: Principal,
    pub voting_window: Duration,
}

impl AcceptanceConfig {
    pub fn new(chairman: Principal) -> Self {
        Self {
            chairman,
            voting_window: Duration::hours(DEFAULT_VOTING_WINDOW_HOURS),
        }
    }

    pub fn with_voting_window(mut self, voting_window: Duration) -> Self {
        self.voting_window = voting_window;
        self
    }
}
