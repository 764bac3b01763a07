use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, OnceLock, Weak};

use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::acceptance::{
    acceptance_router, AcceptanceConfig, AcceptanceLedger, AccreditationService,
    AccreditationServiceError, Amount, Criteria, EventError, EventSink, FundsTransfer,
    InstitutionId, LedgerEvent, LedgerRepository, ManualClock, Principal, RepositoryError,
    TransferError,
};

pub(super) type TestService = AccreditationService<MemoryLedgerRepository, MemoryEvents, MemoryWallets>;

pub(super) fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, 24, 10, 0, 0)
        .single()
        .expect("valid start time")
}

pub(super) fn chairman() -> Principal {
    Principal::new("0xchair")
}

pub(super) fn member(name: &str) -> Principal {
    Principal::new(format!("0x{name}"))
}

pub(super) fn applicant() -> Principal {
    Principal::new("0xapplicant")
}

pub(super) fn config() -> AcceptanceConfig {
    AcceptanceConfig::new(chairman()).with_voting_window(Duration::hours(72))
}

pub(super) struct Harness {
    pub(super) service: Arc<TestService>,
    pub(super) repository: Arc<MemoryLedgerRepository>,
    pub(super) events: Arc<MemoryEvents>,
    pub(super) wallets: Arc<MemoryWallets>,
    pub(super) clock: Arc<ManualClock>,
}

pub(super) fn build_service() -> Harness {
    let repository = Arc::new(MemoryLedgerRepository::default());
    let events = Arc::new(MemoryEvents::default());
    let wallets = Arc::new(MemoryWallets::default());
    let clock = Arc::new(ManualClock::new(start()));
    let service = AccreditationService::new(
        config(),
        repository.clone(),
        events.clone(),
        wallets.clone(),
        clock.clone(),
    )
    .expect("fresh service starts");

    Harness {
        service: Arc::new(service),
        repository,
        events,
        wallets,
        clock,
    }
}

/// Seat `members`, escrow the fee for `institution`, and open its poll.
pub(super) fn open_poll_with<R, E, T>(
    service: &AccreditationService<R, E, T>,
    institution: InstitutionId,
    members: &[Principal],
) where
    R: LedgerRepository + 'static,
    E: EventSink + 'static,
    T: FundsTransfer + 'static,
{
    for principal in members {
        if !service.is_committee_member(principal) {
            service
                .add_committee_member(&chairman(), principal.clone())
                .expect("chairman seats member");
        }
    }
    service
        .pay_fee(institution, applicant(), Amount::application_fee())
        .expect("fee accepted");
    service.open_vote(institution).expect("poll opens");
}

pub(super) fn cast_all<R, E, T>(
    service: &AccreditationService<R, E, T>,
    institution: InstitutionId,
    ballots: &[(Principal, Criteria)],
) where
    R: LedgerRepository + 'static,
    E: EventSink + 'static,
    T: FundsTransfer + 'static,
{
    for (voter, criteria) in ballots {
        service
            .vote(voter, institution, *criteria)
            .expect("ballot recorded");
    }
}

pub(super) fn rejection(error: AccreditationServiceError) -> crate::acceptance::AcceptanceError {
    match error {
        AccreditationServiceError::Rejected(rejection) => rejection,
        other => panic!("expected a rule rejection, got {other:?}"),
    }
}

#[derive(Default)]
pub(super) struct MemoryLedgerRepository {
    stored: Mutex<Option<AcceptanceLedger>>,
    writes: Mutex<u64>,
}

impl MemoryLedgerRepository {
    pub(super) fn seeded(ledger: AcceptanceLedger) -> Self {
        Self {
            stored: Mutex::new(Some(ledger)),
            writes: Mutex::new(0),
        }
    }

    pub(super) fn stored(&self) -> Option<AcceptanceLedger> {
        self.stored.lock().expect("repository mutex poisoned").clone()
    }

    pub(super) fn writes(&self) -> u64 {
        *self.writes.lock().expect("repository mutex poisoned")
    }
}

impl LedgerRepository for MemoryLedgerRepository {
    fn load(&self) -> Result<Option<AcceptanceLedger>, RepositoryError> {
        Ok(self.stored())
    }

    fn store(&self, ledger: &AcceptanceLedger) -> Result<(), RepositoryError> {
        *self.stored.lock().expect("repository mutex poisoned") = Some(ledger.clone());
        *self.writes.lock().expect("repository mutex poisoned") += 1;
        Ok(())
    }
}

/// Accepts writes until `fail_after` stores have happened.
pub(super) struct FlakyRepository {
    remaining: Mutex<u32>,
}

impl FlakyRepository {
    pub(super) fn failing_after(stores: u32) -> Self {
        Self {
            remaining: Mutex::new(stores),
        }
    }

    /// Accept `stores` more writes, as if the disk came back.
    pub(super) fn allow(&self, stores: u32) {
        *self.remaining.lock().expect("repository mutex poisoned") += stores;
    }
}

impl LedgerRepository for FlakyRepository {
    fn load(&self) -> Result<Option<AcceptanceLedger>, RepositoryError> {
        Ok(None)
    }

    fn store(&self, _ledger: &AcceptanceLedger) -> Result<(), RepositoryError> {
        let mut remaining = self.remaining.lock().expect("repository mutex poisoned");
        if *remaining == 0 {
            return Err(RepositoryError::Unavailable("disk full".to_string()));
        }
        *remaining -= 1;
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct MemoryEvents {
    events: Mutex<Vec<LedgerEvent>>,
}

impl MemoryEvents {
    pub(super) fn events(&self) -> Vec<LedgerEvent> {
        self.events.lock().expect("event mutex poisoned").clone()
    }

    pub(super) fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(LedgerEvent::name).collect()
    }
}

impl EventSink for MemoryEvents {
    fn publish(&self, event: LedgerEvent) -> Result<(), EventError> {
        self.events.lock().expect("event mutex poisoned").push(event);
        Ok(())
    }
}

pub(super) struct OfflineEvents;

impl EventSink for OfflineEvents {
    fn publish(&self, _event: LedgerEvent) -> Result<(), EventError> {
        Err(EventError::Transport("broker offline".to_string()))
    }
}

#[derive(Default)]
pub(super) struct MemoryWallets {
    balances: Mutex<BTreeMap<Principal, Amount>>,
    refusing: Mutex<Vec<Principal>>,
}

impl MemoryWallets {
    pub(super) fn refuse(&self, principal: Principal) {
        self.refusing
            .lock()
            .expect("wallet mutex poisoned")
            .push(principal);
    }

    pub(super) fn balance(&self, principal: &Principal) -> Amount {
        self.balances
            .lock()
            .expect("wallet mutex poisoned")
            .get(principal)
            .copied()
            .unwrap_or(Amount::ZERO)
    }

    pub(super) fn total(&self) -> Amount {
        Amount(
            self.balances
                .lock()
                .expect("wallet mutex poisoned")
                .values()
                .map(|amount| amount.0)
                .sum(),
        )
    }
}

impl FundsTransfer for MemoryWallets {
    fn transfer(&self, recipient: &Principal, amount: Amount) -> Result<(), TransferError> {
        if self
            .refusing
            .lock()
            .expect("wallet mutex poisoned")
            .contains(recipient)
        {
            return Err(TransferError::Refused(recipient.clone()));
        }
        let mut balances = self.balances.lock().expect("wallet mutex poisoned");
        let balance = balances.entry(recipient.clone()).or_default();
        *balance = Amount(balance.0 + amount.0);
        Ok(())
    }
}

pub(super) type ReentrantService =
    AccreditationService<MemoryLedgerRepository, MemoryEvents, ReentrantWallets>;

/// Recipient that calls back into `distribute_fee` while being paid.
#[derive(Default)]
pub(super) struct ReentrantWallets {
    pub(super) service: OnceLock<Weak<ReentrantService>>,
    pub(super) callbacks: Mutex<Vec<Result<(), String>>>,
    pub(super) wallets: MemoryWallets,
}

impl FundsTransfer for ReentrantWallets {
    fn transfer(&self, recipient: &Principal, amount: Amount) -> Result<(), TransferError> {
        if let Some(service) = self.service.get().and_then(Weak::upgrade) {
            let outcome = service
                .distribute_fee(InstitutionId(0))
                .map(|_| ())
                .map_err(|error| error.to_string());
            self.callbacks
                .lock()
                .expect("callback mutex poisoned")
                .push(outcome);
        }
        self.wallets.transfer(recipient, amount)
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) fn router_for(harness: &Harness) -> axum::Router {
    acceptance_router(harness.service.clone())
}
