use crowd_pulse::aggregation::now_millis;
use crowd_pulse::error::AppError;
use crowd_pulse::state::{AggregationSettings, AppState, OfficeAggregate};
use crowd_pulse::store::InMemoryReportStore;
use crowd_pulse::{api, config};
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};
use tokio::sync::watch;

fn init_tracing(level: &str) {
    let parsed = level.parse::<tracing::Level>();
    let max_level = parsed.as_ref().copied().unwrap_or(tracing::Level::INFO);
    let subscriber = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(max_level)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
    if parsed.is_err() {
        tracing::warn!(configured_level = level, "Unknown log level, using info");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::load_default()?;
    init_tracing(&config.logging.level);
    tracing::info!(
        config_path = config::DEFAULT_CONFIG_PATH,
        app = %config.app.name,
        "crowd-pulse starting"
    );

    let store = match config.seed_path() {
        Some(path) => match InMemoryReportStore::load_seed_from_path(path, now_millis()) {
            Ok(store) => {
                tracing::info!(path = %path.display(), "Seed data loaded");
                store
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load seed data, starting empty");
                InMemoryReportStore::new(Vec::new())
            }
        },
        None => {
            tracing::info!("No seed path configured, starting empty");
            InMemoryReportStore::new(Vec::new())
        }
    };

    let settings = AggregationSettings::from_config(&config);
    tracing::info!(
        window_minutes = settings.window_minutes,
        source_policy = ?settings.source_policy,
        report_fetch_limit = settings.report_fetch_limit,
        "Aggregation configured"
    );
    let state = Arc::new(RwLock::new(AppState::new(Box::new(store), settings)));

    let aggregates = state
        .read()
        .map_err(|_| AppError::StateLock)?
        .subscribe_aggregates();
    tokio::spawn(log_aggregate_updates(aggregates));

    let app = api::router(Arc::clone(&state));
    let port = config.server_port();
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "API server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

/// Log every aggregate refreshed by a report submission.
async fn log_aggregate_updates(mut receiver: watch::Receiver<Option<OfficeAggregate>>) {
    while receiver.changed().await.is_ok() {
        let latest = receiver.borrow_and_update().clone();
        if let Some(OfficeAggregate { office_id, result }) = latest {
            tracing::info!(
                office_id = %office_id,
                level = %result.level,
                average_wait_minutes = result.average_wait_minutes,
                total_report_count = result.total_report_count,
                user_report_count = result.user_report_count,
                "Crowd estimate updated"
            );
        }
    }
}
