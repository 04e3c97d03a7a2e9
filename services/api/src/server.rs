use crate::cli::ServeArgs;
use crate::infra::{build_service, detector, AppState, InMemoryAnalysisRepository};
use crate::routes::with_service_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use shoreline::config::AppConfig;
use shoreline::error::AppError;
use shoreline::telemetry;
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

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    // Build the detection backend once, before the first request can race for it.
    let detector = detector(&config.detector);
    let warm = detector.clone();
    match tokio::task::spawn_blocking(move || warm.warm_up()).await {
        Ok(Ok(())) => info!(confidence = detector.confidence(), "detection backend ready"),
        Ok(Err(err)) => warn!(error = %err, "detection backend unavailable; analyses will fail"),
        Err(err) => warn!(error = %err, "detection warm-up task failed"),
    }

    let repository = Arc::new(InMemoryAnalysisRepository::default());
    let service = Arc::new(build_service(&config, detector, repository));

    let app = with_service_routes(service, &config.storage.upload_dir)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "shoreline cleanup service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
