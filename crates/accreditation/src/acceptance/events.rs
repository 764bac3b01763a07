use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{Amount, InstitutionId, PollOutcome, Principal};

/// Structured record of a committed state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AcceptanceEvent {
    NewCommitteeMember {
        member: Principal,
    },
    RemoveCommitteeMember {
        member: Principal,
    },
    ApplicantPaid {
        institution: InstitutionId,
        payer: Principal,
        amount: Amount,
    },
    VoteOpen {
        institution: InstitutionId,
        deadline: DateTime<Utc>,
    },
    Voted {
        institution: InstitutionId,
        voter: Principal,
        affirmative: u32,
    },
    VoteClose {
        institution: InstitutionId,
        score: u32,
        threshold: u32,
        outcome: PollOutcome,
    },
    /// Emitted once every share has been attempted.
    FeeDistributed {
        institution: InstitutionId,
        share: Amount,
        paid: Vec<Principal>,
        failed: Vec<Principal>,
        retained: Amount,
    },
}

impl AcceptanceEvent {
    pub const fn name(&self) -> &'static str {
        match self {
            AcceptanceEvent::NewCommitteeMember { .. } => "new_committee_member",
            AcceptanceEvent::RemoveCommitteeMember { .. } => "remove_committee_member",
            AcceptanceEvent::ApplicantPaid { .. } => "applicant_paid",
            AcceptanceEvent::VoteOpen { .. } => "vote_open",
            AcceptanceEvent::Voted { .. } => "voted",
            AcceptanceEvent::VoteClose { .. } => "vote_close",
            AcceptanceEvent::FeeDistributed { .. } => "fee_distributed",
        }
    }
}

/// Event stamped with the ledger version that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEvent {
    pub version: u64,
    pub recorded_at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: AcceptanceEvent,
}

impl LedgerEvent {
    pub const fn name(&self) -> &'static str {
        self.event.name()
    }
}
