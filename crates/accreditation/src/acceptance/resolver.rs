use super::domain::{AccreditationStatus, InstitutionId, PollOutcome};
use super::errors::AcceptanceError;
use super::ledger::AcceptanceLedger;

/// Read-side coupling consumed by the institution and credential record stores.
///
/// Implementations never mutate poll state; `resolve` may be called any number of times.
pub trait InstitutionStatusResolver {
    fn resolve(&self, institution: InstitutionId) -> AccreditationStatus;

    /// Gate applied before a credential is issued on the institution's behalf.
    fn ensure_approved(&self, institution: InstitutionId) -> Result<(), AcceptanceError> {
        match self.resolve(institution) {
            AccreditationStatus::Approved => Ok(()),
            AccreditationStatus::Pending | AccreditationStatus::Rejected => {
                Err(AcceptanceError::InstitutionNotApproved)
            }
        }
    }
}

impl InstitutionStatusResolver for AcceptanceLedger {
    fn resolve(&self, institution: InstitutionId) -> AccreditationStatus {
        match self.polls.get(institution) {
            Some(poll) if poll.is_closed => match poll.outcome {
                PollOutcome::Approved => AccreditationStatus::Approved,
                PollOutcome::Rejected => AccreditationStatus::Rejected,
                PollOutcome::Undetermined => AccreditationStatus::Pending,
            },
            _ => AccreditationStatus::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acceptance::domain::{Amount, Criteria, Principal};
    use chrono::{Duration, Utc};

    #[test]
    fn pending_until_closed_then_terminal() {
        let chairman = Principal::new("chairman");
        let institution = InstitutionId(0);
        let mut ledger = AcceptanceLedger::new(chairman.clone());
        assert_eq!(ledger.resolve(institution), AccreditationStatus::Pending);

        ledger
            .pay_fee(institution, Principal::new("applicant"), Amount::application_fee())
            .unwrap();
        let now = Utc::now();
        ledger.open_vote(institution, now, Duration::hours(1)).unwrap();
        ledger
            .vote(&chairman, institution, Criteria::all(true))
            .unwrap();
        assert_eq!(ledger.resolve(institution), AccreditationStatus::Pending);
        assert_eq!(
            ledger.ensure_approved(institution),
            Err(AcceptanceError::InstitutionNotApproved)
        );

        ledger
            .close_vote(institution, 5, now + Duration::hours(1))
            .unwrap();
        for _ in 0..3 {
            assert_eq!(ledger.resolve(institution), AccreditationStatus::Approved);
        }
        assert_eq!(ledger.ensure_approved(institution), Ok(()));
    }
}
