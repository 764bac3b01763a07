//! Integration scenarios for the accreditation vote and fee escrow workflow.
//!
//! Scenarios drive the public service facade and HTTP router end to end, the way the
//! institution and credential stores consume them.

mod common {
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    use chrono::{DateTime, Duration, TimeZone, Utc};

    use accreditation::acceptance::{
        AcceptanceConfig, AcceptanceLedger, AccreditationService, Amount, EventError, EventSink,
        FundsTransfer, LedgerEvent, LedgerRepository, ManualClock, Principal, RepositoryError,
        TransferError,
    };

    pub(super) type Service = AccreditationService<MemoryLedger, RecordedEvents, Wallets>;

    pub(super) fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 24, 10, 0, 0)
            .single()
            .expect("valid start")
    }

    pub(super) fn chairman() -> Principal {
        Principal::new("0xchair")
    }

    pub(super) fn build() -> (Arc<Service>, Arc<Wallets>, Arc<RecordedEvents>, Arc<ManualClock>) {
        let wallets = Arc::new(Wallets::default());
        let events = Arc::new(RecordedEvents::default());
        let clock = Arc::new(ManualClock::new(start()));
        let service = AccreditationService::new(
            AcceptanceConfig::new(chairman()).with_voting_window(Duration::hours(72)),
            Arc::new(MemoryLedger::default()),
            events.clone(),
            wallets.clone(),
            clock.clone(),
        )
        .expect("service starts");
        (Arc::new(service), wallets, events, clock)
    }

    #[derive(Default)]
    pub(super) struct MemoryLedger {
        ledger: Mutex<Option<AcceptanceLedger>>,
    }

    impl LedgerRepository for MemoryLedger {
        fn load(&self) -> Result<Option<AcceptanceLedger>, RepositoryError> {
            Ok(self.ledger.lock().expect("ledger mutex poisoned").clone())
        }

        fn store(&self, ledger: &AcceptanceLedger) -> Result<(), RepositoryError> {
            *self.ledger.lock().expect("ledger mutex poisoned") = Some(ledger.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    pub(super) struct RecordedEvents {
        events: Mutex<Vec<LedgerEvent>>,
    }

    impl RecordedEvents {
        pub(super) fn names(&self) -> Vec<&'static str> {
            self.events
                .lock()
                .expect("event mutex poisoned")
                .iter()
                .map(LedgerEvent::name)
                .collect()
        }
    }

    impl EventSink for RecordedEvents {
        fn publish(&self, event: LedgerEvent) -> Result<(), EventError> {
            self.events.lock().expect("event mutex poisoned").push(event);
            Ok(())
        }
    }

    #[derive(Default)]
    pub(super) struct Wallets {
        balances: Mutex<BTreeMap<Principal, Amount>>,
    }

    impl Wallets {
        pub(super) fn balance(&self, principal: &Principal) -> Amount {
            self.balances
                .lock()
                .expect("wallet mutex poisoned")
                .get(principal)
                .copied()
                .unwrap_or_default()
        }
    }

    impl FundsTransfer for Wallets {
        fn transfer(&self, recipient: &Principal, amount: Amount) -> Result<(), TransferError> {
            let mut balances = self.balances.lock().expect("wallet mutex poisoned");
            let balance = balances.entry(recipient.clone()).or_default();
            *balance = Amount(balance.0 + amount.0);
            Ok(())
        }
    }
}

use std::thread;

use accreditation::acceptance::{
    acceptance_router, AcceptanceError, AccreditationServiceError, AccreditationStatus, Amount,
    Criteria, InstitutionId, InstitutionStatusResolver, PollOutcome, Principal, CALLER_HEADER,
};
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use chrono::Duration;
use common::*;
use serde_json::{json, Value};
use tower::ServiceExt;

fn principal(name: &str) -> Principal {
    Principal::new(name)
}

#[test]
fn approved_institution_passes_status_gate_and_voters_are_paid() {
    let (service, wallets, events, clock) = build();
    let institution = InstitutionId(0);

    for name in ["0xalice", "0xbob"] {
        service
            .add_committee_member(&chairman(), principal(name))
            .expect("member seated");
    }
    service
        .pay_fee(institution, principal("0xuniversity"), Amount::application_fee())
        .expect("fee escrowed");
    assert!(matches!(
        service.ensure_approved(institution),
        Err(AcceptanceError::InstitutionNotApproved)
    ));

    service.open_vote(institution).expect("poll opens");
    for name in ["0xalice", "0xbob"] {
        service
            .vote(&principal(name), institution, Criteria::all(true))
            .expect("ballot");
    }
    clock.advance(Duration::hours(72));
    assert_eq!(
        service.close_vote(institution, 9).expect("close"),
        PollOutcome::Approved
    );
    service.ensure_approved(institution).expect("approved");

    service.distribute_fee(institution).expect("distribution");
    assert_eq!(
        wallets.balance(&principal("0xalice")),
        Amount(2_500_000_000_000_000_000)
    );
    assert_eq!(
        wallets.balance(&principal("0xbob")),
        Amount(2_500_000_000_000_000_000)
    );
    assert_eq!(events.names().len(), 8);
}

#[test]
fn concurrent_ballots_are_serialized() {
    let (service, _, _, clock) = build();
    let institution = InstitutionId(11);
    let voters: Vec<Principal> = (0..8).map(|n| principal(&format!("0xmember{n}"))).collect();
    for voter in &voters {
        service
            .add_committee_member(&chairman(), voter.clone())
            .expect("member seated");
    }
    service
        .pay_fee(institution, principal("0xcollege"), Amount::application_fee())
        .expect("fee escrowed");
    service.open_vote(institution).expect("poll opens");

    let handles: Vec<_> = voters
        .iter()
        .chain(voters.iter())
        .cloned()
        .map(|voter| {
            let service = service.clone();
            thread::spawn(move || service.vote(&voter, institution, Criteria::all(true)))
        })
        .collect();

    let mut accepted = 0;
    let mut duplicates = 0;
    for handle in handles {
        match handle.join().expect("voter thread") {
            Ok(_) => accepted += 1,
            Err(AccreditationServiceError::Rejected(AcceptanceError::DuplicateBallot)) => {
                duplicates += 1
            }
            Err(other) => panic!("unexpected rejection {other:?}"),
        }
    }

    assert_eq!(accepted, 8);
    assert_eq!(duplicates, 8);
    clock.advance(Duration::hours(72));
    service.close_vote(institution, 40).expect("close");
    let poll = service.poll(institution).expect("poll");
    assert_eq!(poll.affirmative_score, 40);
    assert_eq!(service.resolve(institution), AccreditationStatus::Approved);
}

#[tokio::test]
async fn rejected_institution_is_reported_over_http() {
    let (service, _, _, clock) = build();
    let institution = InstitutionId(2);
    service
        .add_committee_member(&chairman(), principal("0xalice"))
        .expect("seated");
    service
        .add_committee_member(&chairman(), principal("0xbob"))
        .expect("seated");
    service
        .pay_fee(institution, principal("0xacademy"), Amount::application_fee())
        .expect("fee");
    service.open_vote(institution).expect("open");

    let router = acceptance_router(service.clone());
    for (voter, criteria) in [
        ("0xalice", json!([false, false, true, true, false])),
        ("0xbob", json!([true, true, true, true, true])),
    ] {
        let response = router
            .clone()
            .oneshot(
                Request::post("/api/v1/institutions/2/poll/ballots")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header(CALLER_HEADER, voter)
                    .body(Body::from(
                        serde_json::to_vec(&json!({ "criteria": criteria })).expect("json"),
                    ))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    clock.advance(Duration::hours(72));
    let response = router
        .clone()
        .oneshot(
            Request::post("/api/v1/institutions/2/poll/close")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"threshold":9}"#))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .oneshot(
            Request::get("/api/v1/institutions/2/status")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    let body = axum::body::to_bytes(response.into_body(), 4096)
        .await
        .expect("body");
    let payload: Value = serde_json::from_slice(&body).expect("json");
    assert_eq!(payload["status"], "rejected");
    assert_eq!(payload["approved"], false);
}
