use crate::cli::ServeArgs;
use crate::infra::{AppState, StubRecallApi};
use crate::routes::with_operational_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use record_a_recall::config::AppConfig;
use record_a_recall::error::AppError;
use record_a_recall::telemetry;
use record_a_recall::workflows::recall::{
    journey_router, HttpRecallApi, InMemoryJourneyStore, RecallApi, RecallJourneyService, Views,
};
use std::sync::atomic::{AtomicBool, Ordering};
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

    if args.stub_api {
        warn!("serving against the in-memory stub case-management API");
        serve(config, Arc::new(StubRecallApi::seeded())).await
    } else {
        let api = HttpRecallApi::new(&config.recall_api)?;
        info!(base_url = %config.recall_api.base_url, "using case-management API");
        serve(config, Arc::new(api)).await
    }
}

async fn serve<C>(config: AppConfig, api: Arc<C>) -> Result<(), AppError>
where
    C: RecallApi + 'static,
{
    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(InMemoryJourneyStore::with_ttl_minutes(
        config.session.ttl_minutes,
    ));
    let service = Arc::new(RecallJourneyService::new(store, api));
    let views = Arc::new(Views::new()?);

    let app = with_operational_routes(journey_router(service, views))
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "record a recall service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
