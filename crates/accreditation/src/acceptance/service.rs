use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::clock::Clock;
use super::config::AcceptanceConfig;
use super::distributor::{DistributionReport, FeeDistributor};
use super::domain::{
    AccreditationStatus, Amount, Criteria, InstitutionId, PollOutcome, Principal, VotingState,
};
use super::errors::AcceptanceError;
use super::escrow::ApplicationRecord;
use super::events::{AcceptanceEvent, LedgerEvent};
use super::ledger::AcceptanceLedger;
use super::poll::Poll;
use super::repository::{EventSink, FundsTransfer, LedgerRepository, RepositoryError};
use super::resolver::InstitutionStatusResolver;

/// Service composing the ledger, its persistence, and the outbound event and transfer hooks.
///
/// Every public mutation is one atomic transaction serialized on the ledger lock.
pub struct AccreditationService<R, E, T> {
    config: AcceptanceConfig,
    ledger: Mutex<AcceptanceLedger>,
    repository: Arc<R>,
    events: Arc<E>,
    transfers: Arc<T>,
    clock: Arc<dyn Clock>,
    unconfirmed: Mutex<Vec<UnconfirmedPayout>>,
}

/// Payout outcome that could not be persisted when the shares went out.
#[derive(Debug, Clone, Copy)]
struct UnconfirmedPayout {
    institution: InstitutionId,
    undelivered: Amount,
}

/// Version and timestamp of a committed transaction.
#[derive(Debug, Clone, Copy)]
struct Commit {
    version: u64,
    recorded_at: DateTime<Utc>,
}

impl<R, E, T> AccreditationService<R, E, T>
where
    R: LedgerRepository + 'static,
    E: EventSink + 'static,
    T: FundsTransfer + 'static,
{
    /// Restore the persisted ledger, or start a fresh one seated with the configured chairman.
    pub fn new(
        config: AcceptanceConfig,
        repository: Arc<R>,
        events: Arc<E>,
        transfers: Arc<T>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AccreditationServiceError> {
        let ledger = match repository.load()? {
            Some(ledger) => {
                if ledger.committee().chairman() != &config.chairman {
                    return Err(AccreditationServiceError::ChairmanMismatch {
                        configured: config.chairman.clone(),
                        stored: ledger.committee().chairman().clone(),
                    });
                }
                info!(version = ledger.version(), "restored accreditation ledger");
                ledger
            }
            None => AcceptanceLedger::new(config.chairman.clone()),
        };

        Ok(Self {
            config,
            ledger: Mutex::new(ledger),
            repository,
            events,
            transfers,
            clock,
            unconfirmed: Mutex::new(Vec::new()),
        })
    }

    pub fn config(&self) -> &AcceptanceConfig {
        &self.config
    }

    pub fn add_committee_member(
        &self,
        caller: &Principal,
        member: Principal,
    ) -> Result<(), AccreditationServiceError> {
        self.transact("add_committee_member", |ledger, _| {
            let event = ledger.add_member(caller, member)?;
            Ok(((), vec![event]))
        })
    }

    pub fn remove_committee_member(
        &self,
        caller: &Principal,
        member: Principal,
    ) -> Result<(), AccreditationServiceError> {
        self.transact("remove_committee_member", |ledger, _| {
            let event = ledger.remove_member(caller, member)?;
            Ok(((), vec![event]))
        })
    }

    pub fn committee_member_count(&self) -> usize {
        self.read(|ledger| ledger.committee().member_count())
    }

    pub fn committee_members(&self) -> Vec<Principal> {
        self.read(|ledger| ledger.committee().members().cloned().collect())
    }

    pub fn is_committee_member(&self, principal: &Principal) -> bool {
        self.read(|ledger| ledger.committee().is_member(principal))
    }

    /// Accept the application fee for an institution. `value` is the amount attached to the call.
    pub fn pay_fee(
        &self,
        institution: InstitutionId,
        payer: Principal,
        value: Amount,
    ) -> Result<ApplicationRecord, AccreditationServiceError> {
        self.transact("pay_fee", |ledger, _| {
            let (record, event) = ledger.pay_fee(institution, payer, value)?;
            Ok((record, vec![event]))
        })
    }

    pub fn application(&self, institution: InstitutionId) -> Option<ApplicationRecord> {
        self.read(|ledger| ledger.escrow().record(institution).cloned())
    }

    pub fn escrow_balance(&self, institution: InstitutionId) -> Amount {
        self.read(|ledger| ledger.escrow().balance(institution))
    }

    pub fn retained_balance(&self) -> Amount {
        self.read(|ledger| ledger.escrow().retained())
    }

    /// Open the institution's poll, returning its deadline.
    pub fn open_vote(
        &self,
        institution: InstitutionId,
    ) -> Result<DateTime<Utc>, AccreditationServiceError> {
        let window = self.config.voting_window;
        self.transact("open_vote", |ledger, now| {
            let (deadline, event) = ledger.open_vote(institution, now, window)?;
            Ok((deadline, vec![event]))
        })
    }

    /// Administrative override: expire the deadline now so the poll can be closed early.
    pub fn change_deadline(
        &self,
        institution: InstitutionId,
    ) -> Result<(), AccreditationServiceError> {
        self.transact("change_deadline", |ledger, now| {
            ledger.change_deadline(institution, now)?;
            Ok(((), Vec::new()))
        })
    }

    /// Cast the caller's ballot, returning the poll's running affirmative score.
    pub fn vote(
        &self,
        caller: &Principal,
        institution: InstitutionId,
        criteria: Criteria,
    ) -> Result<u32, AccreditationServiceError> {
        self.transact("vote", |ledger, _| {
            let (score, event) = ledger.vote(caller, institution, criteria)?;
            Ok((score, vec![event]))
        })
    }

    pub fn close_vote(
        &self,
        institution: InstitutionId,
        threshold: u32,
    ) -> Result<PollOutcome, AccreditationServiceError> {
        self.transact("close_vote", |ledger, now| {
            let (outcome, event) = ledger.close_vote(institution, threshold, now)?;
            Ok((outcome, vec![event]))
        })
    }

    pub fn voting_state(&self, institution: InstitutionId) -> VotingState {
        self.read(|ledger| ledger.polls().state(institution))
    }

    pub fn poll(&self, institution: InstitutionId) -> Option<Poll> {
        self.read(|ledger| ledger.polls().get(institution).cloned())
    }

    /// Pay the escrowed fee out to every member who voted on the institution.
    ///
    /// Bookkeeping commits first; transfers run after the ledger lock is released, so a
    /// recipient that calls back in observes the finalized state. The outcome is recorded in a
    /// follow-up transaction that clears the in-transit amount and retains undeliverable shares.
    /// Once value has moved this never fails: an outcome that cannot be stored is carried into
    /// the next commit and the report is flagged `retention_pending`.
    pub fn distribute_fee(
        &self,
        institution: InstitutionId,
    ) -> Result<DistributionReport, AccreditationServiceError> {
        let (plan, settled, _) = self.commit("distribute_fee", |ledger, _| {
            let plan = FeeDistributor::settle(ledger, institution)?;
            Ok((plan, Vec::new()))
        })?;

        let mut report = FeeDistributor::pay_out(plan, self.transfers.as_ref());
        let event = FeeDistributor::distributed_event(&report);

        match self.commit("confirm_fee_distribution", |ledger, _| {
            FeeDistributor::confirm(ledger, &report)?;
            Ok(((), vec![event.clone()]))
        }) {
            Ok(((), commit, events)) => self.publish(commit, events),
            Err(error) => {
                let undelivered = report.failed_total();
                warn!(
                    %institution,
                    %undelivered,
                    %error,
                    "payout outcome not persisted; deferring to the next commit"
                );
                self.unconfirmed_payouts().push(UnconfirmedPayout {
                    institution,
                    undelivered,
                });
                report.retention_pending = true;
                self.publish(settled, vec![event]);
            }
        }

        Ok(report)
    }

    /// Undelivered shares waiting for a commit to credit them to the retained balance.
    pub fn pending_retention(&self) -> Amount {
        Amount(
            self.unconfirmed_payouts()
                .iter()
                .map(|payout| payout.undelivered.0)
                .sum(),
        )
    }

    /// Current ledger version; increments once per committed operation.
    pub fn version(&self) -> u64 {
        self.read(AcceptanceLedger::version)
    }

    pub fn snapshot(&self) -> AcceptanceLedger {
        self.read(AcceptanceLedger::clone)
    }

    fn read<V>(&self, view: impl FnOnce(&AcceptanceLedger) -> V) -> V {
        view(&*self.lock())
    }

    // Staged mutations replace the live ledger in a single assignment, so a panic while the
    // lock is held cannot leave a half-applied operation behind.
    fn lock(&self) -> MutexGuard<'_, AcceptanceLedger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn unconfirmed_payouts(&self) -> MutexGuard<'_, Vec<UnconfirmedPayout>> {
        self.unconfirmed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transact<V, F>(
        &self,
        operation: &'static str,
        apply: F,
    ) -> Result<V, AccreditationServiceError>
    where
        F: FnOnce(
            &mut AcceptanceLedger,
            DateTime<Utc>,
        ) -> Result<(V, Vec<AcceptanceEvent>), AcceptanceError>,
    {
        let (value, commit, events) = self.commit(operation, apply)?;
        self.publish(commit, events);
        Ok(value)
    }

    /// Stage, apply, persist, and swap in one operation. Deferred payout outcomes ride along
    /// with whichever commit succeeds first.
    fn commit<V, F>(
        &self,
        operation: &'static str,
        apply: F,
    ) -> Result<(V, Commit, Vec<AcceptanceEvent>), AccreditationServiceError>
    where
        F: FnOnce(
            &mut AcceptanceLedger,
            DateTime<Utc>,
        ) -> Result<(V, Vec<AcceptanceEvent>), AcceptanceError>,
    {
        let mut ledger = self.lock();
        let mut unconfirmed = self.unconfirmed_payouts();
        let now = self.clock.now();
        let mut staged = ledger.clone();

        for payout in unconfirmed.iter() {
            if let Err(error) = staged
                .escrow
                .confirm_payout(payout.institution, payout.undelivered)
            {
                warn!(institution = %payout.institution, %error, "deferred payout outcome rejected");
            }
        }

        let (value, events) = match apply(&mut staged, now) {
            Ok(applied) => applied,
            Err(error) => {
                warn!(operation, reason = %error, kind = ?error.kind(), "operation rejected");
                return Err(error.into());
            }
        };

        staged.version += 1;
        self.repository.store(&staged)?;
        let version = staged.version;
        *ledger = staged;
        if !unconfirmed.is_empty() {
            info!(version, deferred = unconfirmed.len(), "deferred payout outcomes recorded");
            unconfirmed.clear();
        }

        info!(operation, version, "operation committed");
        Ok((
            value,
            Commit {
                version,
                recorded_at: now,
            },
            events,
        ))
    }

    fn publish(&self, commit: Commit, events: Vec<AcceptanceEvent>) {
        let Commit {
            version,
            recorded_at,
        } = commit;
        for event in events {
            let event = LedgerEvent {
                version,
                recorded_at,
                event,
            };
            let name = event.name();
            match self.events.publish(event) {
                Ok(()) => debug!(event = name, version, "event published"),
                Err(error) => warn!(event = name, version, %error, "event publication failed"),
            }
        }
    }
}

impl<R, E, T> InstitutionStatusResolver for AccreditationService<R, E, T>
where
    R: LedgerRepository + 'static,
    E: EventSink + 'static,
    T: FundsTransfer + 'static,
{
    fn resolve(&self, institution: InstitutionId) -> AccreditationStatus {
        self.read(|ledger| ledger.resolve(institution))
    }
}

/// Error raised by the accreditation service.
#[derive(Debug, thiserror::Error)]
pub enum AccreditationServiceError {
    #[error(transparent)]
    Rejected(#[from] AcceptanceError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("configured chairman {configured} does not match stored chairman {stored}")]
    ChairmanMismatch {
        configured: Principal,
        stored: Principal,
    },
}

impl AccreditationServiceError {
    /// The rejection reason, when the failure came from the accreditation rules.
    pub fn rejection(&self) -> Option<&AcceptanceError> {
        match self {
            AccreditationServiceError::Rejected(error) => Some(error),
            _ => None,
        }
    }
}
