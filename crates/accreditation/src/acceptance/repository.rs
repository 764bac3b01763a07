use super::domain::{Amount, Principal};
use super::events::LedgerEvent;
use super::ledger::AcceptanceLedger;

/// Storage abstraction for the ledger so the service can be exercised in isolation.
///
/// `store` receives the complete staged ledger; a failure aborts the operation that produced it.
pub trait LedgerRepository: Send + Sync {
    fn load(&self) -> Result<Option<AcceptanceLedger>, RepositoryError>;
    fn store(&self, ledger: &AcceptanceLedger) -> Result<(), RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("stored ledger is corrupt: {0}")]
    Corrupt(String),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Outbound hook for committed events (audit logs, notifications, indexers).
pub trait EventSink: Send + Sync {
    fn publish(&self, event: LedgerEvent) -> Result<(), EventError>;
}

/// Event dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("event transport unavailable: {0}")]
    Transport(String),
}

/// Moves value out of custody to a recipient.
pub trait FundsTransfer: Send + Sync {
    fn transfer(&self, recipient: &Principal, amount: Amount) -> Result<(), TransferError>;
}

/// Transfer failure reported by a recipient or the payment rail.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    #[error("recipient {0} refused the transfer")]
    Refused(Principal),
    #[error("payment rail unavailable: {0}")]
    Unavailable(String),
}
