//! Per-institution voting sessions and the scoring that turns ballots into a decision.

mod tally;

pub use tally::max_score;

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{Criteria, InstitutionId, PollOutcome, Principal, VotingState};
use super::errors::AcceptanceError;

/// A committee member's recorded ballot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    pub criteria: Criteria,
    pub has_voted: bool,
}

/// Voting session for one institution's accreditation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    pub is_open: bool,
    pub is_closed: bool,
    pub deadline: DateTime<Utc>,
    pub ballots: BTreeMap<Principal, Ballot>,
    pub affirmative_score: u32,
    pub outcome: PollOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<u32>,
}

impl Poll {
    fn opened(deadline: DateTime<Utc>) -> Self {
        Self {
            is_open: true,
            is_closed: false,
            deadline,
            ballots: BTreeMap::new(),
            affirmative_score: 0,
            outcome: PollOutcome::Undetermined,
            threshold: None,
        }
    }

    pub fn state(&self) -> VotingState {
        if self.is_closed {
            VotingState::Closed
        } else if self.is_open {
            VotingState::Open
        } else {
            VotingState::Undetermined
        }
    }

    pub fn has_voted(&self, voter: &Principal) -> bool {
        self.ballots
            .get(voter)
            .map(|ballot| ballot.has_voted)
            .unwrap_or(false)
    }

    /// Principals with a recorded ballot, in stable order.
    pub fn voters(&self) -> Vec<Principal> {
        self.ballots
            .iter()
            .filter(|(_, ballot)| ballot.has_voted)
            .map(|(voter, _)| voter.clone())
            .collect()
    }
}

/// Registry of polls keyed by institution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingPoll {
    polls: BTreeMap<InstitutionId, Poll>,
}

impl VotingPoll {
    pub fn get(&self, institution: InstitutionId) -> Option<&Poll> {
        self.polls.get(&institution)
    }

    pub fn state(&self, institution: InstitutionId) -> VotingState {
        self.polls
            .get(&institution)
            .map(Poll::state)
            .unwrap_or(VotingState::Undetermined)
    }

    /// Opens (or reopens before closing) the poll with a fresh deadline.
    ///
    /// The caller is responsible for checking that the fee has been paid.
    pub(crate) fn open(
        &mut self,
        institution: InstitutionId,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<&Poll, AcceptanceError> {
        if let Some(poll) = self.polls.get(&institution) {
            if poll.is_closed {
                return Err(AcceptanceError::AlreadyClosed);
            }
            if poll.is_open {
                return Err(AcceptanceError::AlreadyOpen);
            }
        }

        let deadline = now
            .checked_add_signed(window)
            .ok_or(AcceptanceError::DeadlineOutOfRange)?;
        let poll = self
            .polls
            .entry(institution)
            .or_insert_with(|| Poll::opened(deadline));
        poll.is_open = true;
        poll.deadline = deadline;
        Ok(&*poll)
    }

    /// Force-expires the deadline so the poll can be closed immediately.
    pub(crate) fn expire_deadline(
        &mut self,
        institution: InstitutionId,
        now: DateTime<Utc>,
    ) -> Result<(), AcceptanceError> {
        let poll = self
            .polls
            .get_mut(&institution)
            .ok_or(AcceptanceError::PollNotFound)?;
        if poll.is_closed {
            return Err(AcceptanceError::AlreadyClosed);
        }
        poll.deadline = now;
        Ok(())
    }

    /// Records a ballot. Membership is checked by the caller before this point.
    pub(crate) fn cast(
        &mut self,
        institution: InstitutionId,
        voter: Principal,
        criteria: Criteria,
    ) -> Result<u32, AcceptanceError> {
        let poll = self
            .polls
            .get_mut(&institution)
            .filter(|poll| poll.is_open && !poll.is_closed)
            .ok_or(AcceptanceError::PollNotOpen)?;
        if poll.has_voted(&voter) {
            return Err(AcceptanceError::DuplicateBallot);
        }

        poll.ballots.insert(
            voter,
            Ballot {
                criteria,
                has_voted: true,
            },
        );
        poll.affirmative_score = tally::accumulate(poll.affirmative_score, &criteria);
        Ok(poll.affirmative_score)
    }

    pub(crate) fn close(
        &mut self,
        institution: InstitutionId,
        threshold: u32,
        now: DateTime<Utc>,
    ) -> Result<&Poll, AcceptanceError> {
        let poll = self
            .polls
            .get_mut(&institution)
            .ok_or(AcceptanceError::PollNotOpen)?;
        if now < poll.deadline {
            return Err(AcceptanceError::DeadlineNotReached);
        }
        if poll.is_closed {
            return Err(AcceptanceError::AlreadyClosed);
        }

        poll.is_closed = true;
        poll.is_open = false;
        poll.threshold = Some(threshold);
        poll.outcome = tally::decide(poll.affirmative_score, threshold);
        Ok(&*poll)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const INSTITUTION: InstitutionId = InstitutionId(0);

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 24, 10, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    fn window() -> Duration {
        Duration::hours(72)
    }

    #[test]
    fn open_sets_deadline_from_now() {
        let mut polls = VotingPoll::default();
        let poll = polls.open(INSTITUTION, now(), window()).expect("opens");
        assert_eq!(poll.deadline, now() + window());
        assert_eq!(polls.state(INSTITUTION), VotingState::Open);

        assert_eq!(
            polls.open(INSTITUTION, now(), window()).map(|_| ()),
            Err(AcceptanceError::AlreadyOpen)
        );
    }

    #[test]
    fn unrepresentable_deadline_leaves_poll_closed() {
        let mut polls = VotingPoll::default();

        assert_eq!(
            polls
                .open(INSTITUTION, now(), Duration::hours(1_000_000_000_000))
                .map(|_| ()),
            Err(AcceptanceError::DeadlineOutOfRange)
        );
        assert!(polls.get(INSTITUTION).is_none());
    }

    #[test]
    fn cast_rejects_second_ballot_without_touching_score() {
        let mut polls = VotingPoll::default();
        polls.open(INSTITUTION, now(), window()).unwrap();
        let voter = Principal::new("member-1");

        assert_eq!(
            polls.cast(INSTITUTION, voter.clone(), Criteria::all(true)),
            Ok(5)
        );
        assert_eq!(
            polls.cast(INSTITUTION, voter, Criteria::all(false)),
            Err(AcceptanceError::DuplicateBallot)
        );
        assert_eq!(
            polls.get(INSTITUTION).map(|poll| poll.affirmative_score),
            Some(5)
        );
    }

    #[test]
    fn cast_requires_open_poll() {
        let mut polls = VotingPoll::default();
        assert_eq!(
            polls.cast(INSTITUTION, Principal::new("member-1"), Criteria::all(true)),
            Err(AcceptanceError::PollNotOpen)
        );
    }

    #[test]
    fn close_is_deadline_gated_and_terminal() {
        let mut polls = VotingPoll::default();
        polls.open(INSTITUTION, now(), window()).unwrap();
        polls
            .cast(INSTITUTION, Principal::new("member-1"), Criteria::all(true))
            .unwrap();

        assert_eq!(
            polls.close(INSTITUTION, 5, now()).map(|_| ()),
            Err(AcceptanceError::DeadlineNotReached)
        );

        let later = now() + window();
        let poll = polls.close(INSTITUTION, 5, later).expect("closes at deadline");
        assert_eq!(poll.outcome, PollOutcome::Approved);
        assert_eq!(poll.state(), VotingState::Closed);

        assert_eq!(
            polls.close(INSTITUTION, 0, later).map(|_| ()),
            Err(AcceptanceError::AlreadyClosed)
        );
        assert_eq!(
            polls.open(INSTITUTION, later, window()).map(|_| ()),
            Err(AcceptanceError::AlreadyClosed)
        );
    }

    #[test]
    fn expiring_the_deadline_unblocks_closing() {
        let mut polls = VotingPoll::default();
        assert_eq!(
            polls.expire_deadline(INSTITUTION, now()),
            Err(AcceptanceError::PollNotFound)
        );

        polls.open(INSTITUTION, now(), window()).unwrap();
        polls.expire_deadline(INSTITUTION, now()).expect("expires");
        let poll = polls.close(INSTITUTION, 1, now()).expect("closes");
        assert_eq!(poll.outcome, PollOutcome::Rejected);
    }
}
