use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::committee::CommitteeRegistry;
use super::domain::{Amount, Criteria, InstitutionId, PollOutcome, Principal};
use super::errors::AcceptanceError;
use super::escrow::{ApplicationEscrow, ApplicationRecord};
use super::events::AcceptanceEvent;
use super::poll::VotingPoll;

/// Versioned state store owned exclusively by the accreditation service.
///
/// Each operation runs against a staged clone; the clone replaces the live ledger only after
/// the whole operation succeeded and was persisted, so a rejected operation leaves no trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptanceLedger {
    pub(crate) version: u64,
    pub(crate) committee: CommitteeRegistry,
    pub(crate) escrow: ApplicationEscrow,
    pub(crate) polls: VotingPoll,
}

impl AcceptanceLedger {
    pub fn new(chairman: Principal) -> Self {
        Self {
            version: 0,
            committee: CommitteeRegistry::new(chairman),
            escrow: ApplicationEscrow::default(),
            polls: VotingPoll::default(),
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn committee(&self) -> &CommitteeRegistry {
        &self.committee
    }

    pub fn escrow(&self) -> &ApplicationEscrow {
        &self.escrow
    }

    pub fn polls(&self) -> &VotingPoll {
        &self.polls
    }

    pub(crate) fn add_member(
        &mut self,
        caller: &Principal,
        member: Principal,
    ) -> Result<AcceptanceEvent, AcceptanceError> {
        self.committee.add_member(caller, member.clone())?;
        Ok(AcceptanceEvent::NewCommitteeMember { member })
    }

    pub(crate) fn remove_member(
        &mut self,
        caller: &Principal,
        member: Principal,
    ) -> Result<AcceptanceEvent, AcceptanceError> {
        self.committee.remove_member(caller, &member)?;
        Ok(AcceptanceEvent::RemoveCommitteeMember { member })
    }

    pub(crate) fn pay_fee(
        &mut self,
        institution: InstitutionId,
        payer: Principal,
        value: Amount,
    ) -> Result<(ApplicationRecord, AcceptanceEvent), AcceptanceError> {
        let record = self.escrow.pay_fee(institution, payer, value)?.clone();
        let event = AcceptanceEvent::ApplicantPaid {
            institution,
            payer: record.payer.clone(),
            amount: record.amount_escrowed,
        };
        Ok((record, event))
    }

    pub(crate) fn open_vote(
        &mut self,
        institution: InstitutionId,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<(DateTime<Utc>, AcceptanceEvent), AcceptanceError> {
        if !self.escrow.is_paid(institution) {
            return Err(AcceptanceError::NotPaid);
        }
        let deadline = self.polls.open(institution, now, window)?.deadline;
        Ok((
            deadline,
            AcceptanceEvent::VoteOpen {
                institution,
                deadline,
            },
        ))
    }

    pub(crate) fn change_deadline(
        &mut self,
        institution: InstitutionId,
        now: DateTime<Utc>,
    ) -> Result<(), AcceptanceError> {
        self.polls.expire_deadline(institution, now)
    }

    pub(crate) fn vote(
        &mut self,
        caller: &Principal,
        institution: InstitutionId,
        criteria: Criteria,
    ) -> Result<(u32, AcceptanceEvent), AcceptanceError> {
        if !self.committee.is_member(caller) {
            return Err(AcceptanceError::NotCommitteeMember);
        }
        if !self.escrow.is_paid(institution) {
            return Err(AcceptanceError::PollNotOpen);
        }
        let score = self.polls.cast(institution, caller.clone(), criteria)?;
        let event = AcceptanceEvent::Voted {
            institution,
            voter: caller.clone(),
            affirmative: criteria.affirmative_count(),
        };
        Ok((score, event))
    }

    pub(crate) fn close_vote(
        &mut self,
        institution: InstitutionId,
        threshold: u32,
        now: DateTime<Utc>,
    ) -> Result<(PollOutcome, AcceptanceEvent), AcceptanceError> {
        let poll = self.polls.close(institution, threshold, now)?;
        let event = AcceptanceEvent::VoteClose {
            institution,
            score: poll.affirmative_score,
            threshold,
            outcome: poll.outcome,
        };
        Ok((poll.outcome, event))
    }
}
