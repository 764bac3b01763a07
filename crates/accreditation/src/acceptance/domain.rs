use std::fmt;

use serde::{Deserialize, Serialize};

/// Base units in one fee-unit (wei per ether).
pub const BASE_UNITS_PER_FEE_UNIT: u128 = 1_000_000_000_000_000_000;

/// Fixed application fee, in fee-units.
pub const APPLICATION_FEE_UNITS: u128 = 5;

/// Number of independent criteria on every ballot.
pub const CRITERIA_COUNT: usize = 5;

/// Identity of a caller (an address-equivalent principal).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(pub String);

impl Principal {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key shared by an institution's application record and poll.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct InstitutionId(pub u64);

impl fmt::Display for InstitutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monetary value in indivisible base units.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(pub u128);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn fee_units(units: u128) -> Self {
        Self(units * BASE_UNITS_PER_FEE_UNIT)
    }

    pub const fn application_fee() -> Self {
        Self::fee_units(APPLICATION_FEE_UNITS)
    }

    pub const fn base_units(self) -> u128 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    /// Equal integer split: returns the per-recipient share and the indivisible remainder.
    pub fn split(self, recipients: usize) -> (Amount, Amount) {
        if recipients == 0 {
            return (Amount::ZERO, self);
        }
        let count = recipients as u128;
        (Amount(self.0 / count), Amount(self.0 % count))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / BASE_UNITS_PER_FEE_UNIT;
        let fraction = self.0 % BASE_UNITS_PER_FEE_UNIT;
        if fraction == 0 {
            write!(f, "{whole} ETH")
        } else {
            let digits = format!("{fraction:018}");
            write!(f, "{whole}.{} ETH", digits.trim_end_matches('0'))
        }
    }
}

/// Five independent boolean criteria cast by a single committee member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Criteria(pub [bool; CRITERIA_COUNT]);

impl Criteria {
    pub const fn new(c1: bool, c2: bool, c3: bool, c4: bool, c5: bool) -> Self {
        Self([c1, c2, c3, c4, c5])
    }

    pub const fn all(value: bool) -> Self {
        Self([value; CRITERIA_COUNT])
    }

    /// Number of criteria marked `true`.
    pub fn affirmative_count(&self) -> u32 {
        self.0.iter().filter(|criterion| **criterion).count() as u32
    }
}

/// Observable state of an institution's poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotingState {
    Open,
    Closed,
    Undetermined,
}

impl VotingState {
    /// Stable numeric code (`Open` is zero).
    pub const fn code(self) -> u8 {
        match self {
            VotingState::Open => 0,
            VotingState::Closed => 1,
            VotingState::Undetermined => 2,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            VotingState::Open => "open",
            VotingState::Closed => "closed",
            VotingState::Undetermined => "undetermined",
        }
    }
}

/// Terminal decision recorded on a poll when it closes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollOutcome {
    #[default]
    Undetermined,
    Approved,
    Rejected,
}

/// Accreditation status handed to the institution record store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccreditationStatus {
    Pending,
    Approved,
    Rejected,
}

impl AccreditationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            AccreditationStatus::Pending => "pending",
            AccreditationStatus::Approved => "approved",
            AccreditationStatus::Rejected => "rejected",
        }
    }
}
