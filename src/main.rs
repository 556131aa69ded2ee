use axum::http::{header, HeaderValue, Method};
use std::net::SocketAddr;
use tokio_cron_scheduler::{Job, JobScheduler};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use outpass::api::middleware::session::{create_session_layer, AppState};
use outpass::config::Config;
use outpass::db;
use outpass::jobs;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "outpass=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting outpass server...");

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    // Create database pool
    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");

    // Run migrations
    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    // Create session layer
    let session_layer = create_session_layer(pool.clone(), &config.base_url).await?;
    tracing::info!("Session layer initialized");

    // Escalate stale pending passes every 10 minutes
    let scheduler = JobScheduler::new()
        .await
        .map_err(|e| anyhow::anyhow!("scheduler init failed: {e:?}"))?;
    let job_pool = pool.clone();
    let after_hours = config.escalation_after_hours;
    scheduler
        .add(
            Job::new_async("0 */10 * * * *", move |_id, _sched| {
                let pool = job_pool.clone();
                Box::pin(async move {
                    if let Err(e) = jobs::escalation::escalate_stale_passes(&pool, after_hours, 100).await
                    {
                        tracing::error!(error = %e, "Escalation job failed");
                    }
                })
            })
            .map_err(|e| anyhow::anyhow!("escalation job setup failed: {e:?}"))?,
        )
        .await
        .map_err(|e| anyhow::anyhow!("escalation job registration failed: {e:?}"))?;
    scheduler
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("scheduler start failed: {e:?}"))?;
    tracing::info!("Escalation job scheduled");

    // CORS for the dashboard frontend, if served from a different origin
    let cors = match &config.cors_origin {
        Some(origin) => CorsLayer::new()
            .allow_origin(origin.parse::<HeaderValue>()?)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([header::CONTENT_TYPE])
            .allow_credentials(true),
        None => CorsLayer::new(),
    };

    // Build application state
    let state = AppState {
        pool: pool.clone(),
        config: config.clone(),
    };

    // Build router
    let app = axum::Router::new()
        .merge(outpass::api::health::router())
        .merge(outpass::api::auth::router())
        .merge(outpass::api::passes::router())
        .merge(outpass::api::mentor::router())
        .merge(outpass::api::hod::router())
        .merge(outpass::api::security::router())
        .layer(session_layer)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::new(config.host.parse()?, config.port);
    tracing::info!("Listening on {}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install CTRL+C signal handler");
    tracing::info!("Shutdown signal received, cleaning up...");
}
