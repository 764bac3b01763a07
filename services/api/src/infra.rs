use accreditation::acceptance::{
    AcceptanceLedger, Amount, EventError, EventSink, FundsTransfer, LedgerEvent,
    LedgerRepository, Principal, RepositoryError, TransferError,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryLedgerRepository {
    ledger: Arc<Mutex<Option<AcceptanceLedger>>>,
}

impl LedgerRepository for InMemoryLedgerRepository {
    fn load(&self) -> Result<Option<AcceptanceLedger>, RepositoryError> {
        let guard = self.ledger.lock().expect("repository mutex poisoned");
        Ok(guard.clone())
    }

    fn store(&self, ledger: &AcceptanceLedger) -> Result<(), RepositoryError> {
        let mut guard = self.ledger.lock().expect("repository mutex poisoned");
        *guard = Some(ledger.clone());
        Ok(())
    }
}

/// Persists the whole ledger as one JSON document, replaced atomically on every commit.
#[derive(Debug, Clone)]
pub(crate) struct JsonFileLedgerRepository {
    path: PathBuf,
}

impl JsonFileLedgerRepository {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn staging_path(&self) -> PathBuf {
        let mut staging = self.path.clone().into_os_string();
        staging.push(".tmp");
        PathBuf::from(staging)
    }
}

impl LedgerRepository for JsonFileLedgerRepository {
    fn load(&self) -> Result<Option<AcceptanceLedger>, RepositoryError> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(unavailable(&self.path, err)),
        };

        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|err| RepositoryError::Corrupt(format!("{}: {err}", self.path.display())))
    }

    fn store(&self, ledger: &AcceptanceLedger) -> Result<(), RepositoryError> {
        let payload = serde_json::to_vec_pretty(ledger)
            .map_err(|err| RepositoryError::Corrupt(err.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| unavailable(parent, err))?;
        }

        let staging = self.staging_path();
        fs::write(&staging, payload).map_err(|err| unavailable(&staging, err))?;
        fs::rename(&staging, &self.path).map_err(|err| unavailable(&self.path, err))
    }
}

fn unavailable(path: &Path, err: std::io::Error) -> RepositoryError {
    RepositoryError::Unavailable(format!("{}: {err}", path.display()))
}

/// Ledger backend chosen at startup from `ACCREDITATION_LEDGER_PATH`.
#[derive(Clone)]
pub(crate) enum LedgerStore {
    Memory(InMemoryLedgerRepository),
    File(JsonFileLedgerRepository),
}

impl LedgerStore {
    pub(crate) fn from_path(path: Option<&Path>) -> Self {
        match path {
            Some(path) => Self::File(JsonFileLedgerRepository::new(path)),
            None => Self::Memory(InMemoryLedgerRepository::default()),
        }
    }
}

impl LedgerRepository for LedgerStore {
    fn load(&self) -> Result<Option<AcceptanceLedger>, RepositoryError> {
        match self {
            LedgerStore::Memory(repository) => repository.load(),
            LedgerStore::File(repository) => repository.load(),
        }
    }

    fn store(&self, ledger: &AcceptanceLedger) -> Result<(), RepositoryError> {
        match self {
            LedgerStore::Memory(repository) => repository.store(ledger),
            LedgerStore::File(repository) => repository.store(ledger),
        }
    }
}

/// Keeps committed events in memory and mirrors them to the log.
#[derive(Default, Clone)]
pub(crate) struct InMemoryEventLog {
    events: Arc<Mutex<Vec<LedgerEvent>>>,
}

impl EventSink for InMemoryEventLog {
    fn publish(&self, event: LedgerEvent) -> Result<(), EventError> {
        let payload =
            serde_json::to_string(&event).map_err(|err| EventError::Transport(err.to_string()))?;
        info!(event = event.name(), version = event.version, %payload, "ledger event");
        let mut guard = self.events.lock().expect("event mutex poisoned");
        guard.push(event);
        Ok(())
    }
}

impl InMemoryEventLog {
    pub(crate) fn events(&self) -> Vec<LedgerEvent> {
        self.events.lock().expect("event mutex poisoned").clone()
    }
}

/// Custodial wallet book standing in for the payment rail.
#[derive(Default, Clone)]
pub(crate) struct InMemoryWallets {
    balances: Arc<Mutex<BTreeMap<Principal, Amount>>>,
}

impl FundsTransfer for InMemoryWallets {
    fn transfer(&self, recipient: &Principal, amount: Amount) -> Result<(), TransferError> {
        let mut guard = self.balances.lock().expect("wallet mutex poisoned");
        let balance = guard.entry(recipient.clone()).or_default();
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| TransferError::Refused(recipient.clone()))?;
        Ok(())
    }
}

impl InMemoryWallets {
    pub(crate) fn balances(&self) -> BTreeMap<Principal, Amount> {
        self.balances.lock().expect("wallet mutex poisoned").clone()
    }
}
