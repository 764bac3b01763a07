//! Committee-voted accreditation with an escrowed application fee.
//!
//! The chairman curates the committee, applicants escrow the fixed fee, committee members score
//! the applicant on five criteria, and a deadline-gated close turns the affirmative score into a
//! terminal approval decision. The escrowed fee is then split among the members who voted.
//! [`InstitutionStatusResolver`] is the read-side seam for the institution and credential stores.

pub mod clock;
pub mod committee;
pub mod config;
pub mod distributor;
pub mod domain;
pub mod errors;
pub mod escrow;
pub mod events;
pub mod ledger;
pub mod poll;
pub mod repository;
pub mod resolver;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use clock::{Clock, ManualClock, SystemClock};
pub use committee::CommitteeRegistry;
pub use config::{AcceptanceConfig, DEFAULT_VOTING_WINDOW_HOURS, MAX_VOTING_WINDOW_HOURS};
pub use distributor::{DistributionPlan, DistributionReport, FeeDistributor, Payout, PayoutStatus};
pub use domain::{
    AccreditationStatus, Amount, Criteria, InstitutionId, PollOutcome, Principal, VotingState,
    APPLICATION_FEE_UNITS, BASE_UNITS_PER_FEE_UNIT, CRITERIA_COUNT,
};
pub use errors::{AcceptanceError, ErrorKind};
pub use escrow::{ApplicationEscrow, ApplicationRecord};
pub use events::{AcceptanceEvent, LedgerEvent};
pub use ledger::AcceptanceLedger;
pub use poll::{max_score, Ballot, Poll, VotingPoll};
pub use repository::{
    EventError, EventSink, FundsTransfer, LedgerRepository, RepositoryError, TransferError,
};
pub use resolver::InstitutionStatusResolver;
pub use router::{acceptance_router, CALLER_HEADER};
pub use service::{AccreditationService, AccreditationServiceError};
