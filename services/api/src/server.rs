use crate::cli::ServeArgs;
use crate::infra::{seed_store, AppState};
use crate::routes::with_pass_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parkflow::config::AppConfig;
use parkflow::error::AppError;
use parkflow::passes::{ExpirySweeper, PassLifecycleService};
use parkflow::telemetry;
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

    let store = Arc::new(seed_store(&config));
    let service = Arc::new(PassLifecycleService::new(store.clone(), store));
    let sweeper = ExpirySweeper::spawn(service.clone(), config.parking.sweep_interval());

    let app = with_pass_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "visitor parking pass service ready");

    axum::serve(listener, app).await?;
    sweeper.shutdown().await;
    Ok(())
}
