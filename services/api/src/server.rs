use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryProfileStore, InlineTextExtractor, TracingAuditLog};
use crate::routes::with_provider_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use provider_trust::config::AppConfig;
use provider_trust::error::AppError;
use provider_trust::telemetry;
use provider_trust::workflows::verification::ProviderVerificationService;
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

    let auto_approve = config.verification.auto_approve;
    let service = Arc::new(ProviderVerificationService::new(
        Arc::new(InMemoryProfileStore::default()),
        Arc::new(InlineTextExtractor),
        Arc::new(TracingAuditLog::default()),
        config.verification.clone(),
    ));

    let app = with_provider_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, auto_approve, "provider trust service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
