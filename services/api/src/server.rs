use crate::cli::ServeArgs;
use crate::infra::{build_service, AppState, LoggingEmailGateway};
use crate::routes::with_placement_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use placement_hub::config::AppConfig;
use placement_hub::error::AppError;
use placement_hub::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry, config.environment)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    if config.workflow.cron_secret.is_none() {
        warn!("CRON_SECRET is not set; the reminder endpoint will answer 503");
    }

    let (service, bus) = build_service(
        &config.notifications,
        config.workflow.clone(),
        LoggingEmailGateway::default(),
    );

    let app = with_placement_routes(service, bus)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "placement hub ready");

    axum::serve(listener, app).await?;
    Ok(())
}
