use crate::infra::{InMemoryEventLog, InMemoryLedgerRepository, InMemoryWallets};
use accreditation::acceptance::{
    AcceptanceConfig, AccreditationService, Amount, Criteria, InstitutionId,
    InstitutionStatusResolver, ManualClock, PayoutStatus, PollOutcome, Principal,
    MAX_VOTING_WINDOW_HOURS,
};
use accreditation::error::AppError;
use chrono::{Duration, Utc};
use clap::Args;
use std::sync::Arc;

type DemoService = AccreditationService<InMemoryLedgerRepository, InMemoryEventLog, InMemoryWallets>;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Affirmative score required to approve an institution.
    #[arg(long, default_value_t = 9)]
    pub(crate) threshold: u32,
    /// Voting window in hours.
    #[arg(
        long,
        default_value_t = 72,
        value_parser = clap::value_parser!(i64).range(1..=MAX_VOTING_WINDOW_HOURS)
    )]
    pub(crate) window_hours: i64,
    /// Print every committed ledger event after the scenarios.
    #[arg(long)]
    pub(crate) show_events: bool,
}

impl Default for DemoArgs {
    fn default() -> Self {
        Self {
            threshold: 9,
            window_hours: 72,
            show_events: false,
        }
    }
}

struct Scenario {
    institution: InstitutionId,
    label: &'static str,
    ballots: [(&'static str, Criteria); 2],
}

fn scenarios() -> [Scenario; 2] {
    [
        Scenario {
            institution: InstitutionId(0),
            label: "unanimous committee",
            ballots: [
                ("0xalice", Criteria::all(true)),
                ("0xbob", Criteria::all(true)),
            ],
        },
        Scenario {
            institution: InstitutionId(1),
            label: "split committee",
            ballots: [
                ("0xalice", Criteria::new(false, false, true, true, false)),
                ("0xbob", Criteria::all(true)),
            ],
        },
    ]
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let chairman = Principal::new("0xchair");
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let events = Arc::new(InMemoryEventLog::default());
    let wallets = Arc::new(InMemoryWallets::default());
    let window = Duration::hours(args.window_hours);
    let service: DemoService = AccreditationService::new(
        AcceptanceConfig::new(chairman.clone()).with_voting_window(window),
        Arc::new(InMemoryLedgerRepository::default()),
        events.clone(),
        wallets.clone(),
        clock.clone(),
    )?;

    println!("Accreditation demo");
    println!("==================");
    for name in ["0xalice", "0xbob"] {
        service.add_committee_member(&chairman, Principal::new(name))?;
    }
    println!(
        "Committee ({} seats): {}",
        service.committee_member_count(),
        service
            .committee_members()
            .iter()
            .map(Principal::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("Approval threshold: {}", args.threshold);

    for scenario in scenarios() {
        println!();
        run_scenario(&service, &clock, window, args.threshold, &scenario)?;
    }

    println!();
    println!("Member balances:");
    for (member, balance) in wallets.balances() {
        println!("  {member}: {balance}");
    }
    println!("Retained by the system: {}", service.retained_balance());

    if args.show_events {
        println!();
        println!("Ledger events:");
        for event in events.events() {
            let payload = serde_json::to_string(&event)
                .unwrap_or_else(|err| format!("<unserializable event: {err}>"));
            println!("  v{} {}", event.version, payload);
        }
    }

    Ok(())
}

fn run_scenario(
    service: &DemoService,
    clock: &ManualClock,
    window: Duration,
    threshold: u32,
    scenario: &Scenario,
) -> Result<(), AppError> {
    let institution = scenario.institution;
    println!("Institution {institution} ({})", scenario.label);

    service.pay_fee(
        institution,
        Principal::new(format!("0xinstitution{institution}")),
        Amount::application_fee(),
    )?;
    println!("  fee escrowed: {}", service.escrow_balance(institution));

    let deadline = service.open_vote(institution)?;
    println!("  poll open until {}", deadline.format("%Y-%m-%d %H:%M UTC"));

    for (voter, criteria) in scenario.ballots {
        let score = service.vote(&Principal::new(voter), institution, criteria)?;
        println!(
            "  {voter} voted {}/5 affirmative (running score {score})",
            criteria.affirmative_count()
        );
    }

    clock.advance(window);
    let outcome = service.close_vote(institution, threshold)?;
    let score = service
        .poll(institution)
        .map(|poll| poll.affirmative_score)
        .unwrap_or_default();
    let verdict = match outcome {
        PollOutcome::Approved => "approved",
        PollOutcome::Rejected => "rejected",
        PollOutcome::Undetermined => "undetermined",
    };
    println!("  poll closed: score {score} vs threshold {threshold} -> {verdict}");

    let report = service.distribute_fee(institution)?;
    for payout in &report.payouts {
        match &payout.status {
            PayoutStatus::Paid => println!("  paid {} to {}", payout.amount, payout.recipient),
            PayoutStatus::Failed { reason } => println!(
                "  failed to pay {} to {}: {reason}",
                payout.amount, payout.recipient
            ),
        }
    }
    if report.retention_pending {
        println!("  payout outcome not yet persisted");
    }
    if !report.retained.is_zero() {
        println!("  retained {}", report.retained);
    }

    println!(
        "  accreditation status: {}",
        service.resolve(institution).label()
    );
    Ok(())
}
