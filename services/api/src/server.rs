use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryEventLog, InMemoryWallets, LedgerStore};
use crate::routes::with_routes;
use accreditation::acceptance::{AccreditationService, SystemClock};
use accreditation::config::AppConfig;
use accreditation::error::AppError;
use accreditation::telemetry;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let ledger_path = config.accreditation.ledger_path.as_deref();
    let repository = Arc::new(LedgerStore::from_path(ledger_path));
    let service = Arc::new(AccreditationService::new(
        config.accreditation.acceptance_config(),
        repository,
        Arc::new(InMemoryEventLog::default()),
        Arc::new(InMemoryWallets::default()),
        Arc::new(SystemClock),
    )?);
    info!(
        chairman = %config.accreditation.chairman,
        voting_window_hours = config.accreditation.voting_window_hours,
        ledger = ?ledger_path,
        version = service.version(),
        "accreditation ledger loaded"
    );

    let app = with_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "accreditation service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
