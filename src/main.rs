use chrono::Utc;
use std::{sync::Arc, time::Duration};
use tracing::{error, info};

use domain_checker::{
    api::{DomainApi, SecurityTrailsApi},
    bot::BotService,
    cache::CacheService,
    config::Config,
    rate_limit::RateLimiter,
    rotator::KeyRotator,
    telegram::TelegramBot,
    DomainChecker,
};

// Quota entries are swept at least this often
const MAX_PRUNE_INTERVAL_SECS: u64 = 3600;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env file is fine; the environment may already be set
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "domain_checker=info,domain_checker_bot=info,tower_http=info".into()),
        )
        .init();

    // Load configuration
    let config = Arc::new(Config::load()?);
    info!(
        "Configuration loaded: {} API keys, {} checks per {}s window",
        config.api_keys.len(),
        config.max_requests_per_window,
        config.window_seconds
    );

    // Initialize services
    let api: Arc<dyn DomainApi> = Arc::new(SecurityTrailsApi::new(&config)?);
    let rotator = Arc::new(KeyRotator::new(config.api_keys.clone(), api));
    let cache = CacheService::from_config(&config).map(Arc::new);
    if cache.is_none() {
        info!("Lookup cache disabled");
    }
    let checker = DomainChecker::from_parts(rotator.clone(), cache);
    let limiter = Arc::new(RateLimiter::new(config.max_requests_per_window, config.window()));
    let telegram = Arc::new(TelegramBot::new(&config)?);
    let me = telegram.get_me().await?;
    info!("Authorized as @{}", me.username.as_deref().unwrap_or("unknown"));
    let service = Arc::new(
        BotService::new(&config, checker, limiter.clone(), telegram.clone()).with_bot_username(me.username),
    );

    spawn_quota_pruner(limiter, config.window_seconds);
    if config.key_reset_interval_seconds > 0 {
        spawn_key_resetter(rotator, config.key_reset_interval_seconds);
    } else {
        info!("Periodic API key reset disabled; exhausted keys stay exhausted until /resetkeys");
    }

    #[cfg(feature = "server")]
    status::spawn(config.clone(), service.clone()).await?;

    info!("Bot running... Press Ctrl+C to stop.");
    tokio::select! {
        _ = service.run(telegram, config.poll_timeout_seconds) => {}
        _ = shutdown_signal() => {
            info!("Received shutdown signal, stopping bot");
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install CTRL+C signal handler: {}", e);
        std::future::pending::<()>().await;
    }
}

fn spawn_quota_pruner(limiter: Arc<RateLimiter>, window_seconds: u64) {
    let period = Duration::from_secs(window_seconds.min(MAX_PRUNE_INTERVAL_SECS));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = limiter.prune_expired(Utc::now()).await;
            if removed > 0 {
                tracing::debug!("Pruned {} expired quota entries", removed);
            }
        }
    });
}

fn spawn_key_resetter(rotator: Arc<KeyRotator>, interval_seconds: u64) {
    info!("API key cursor will reset every {}s", interval_seconds);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_seconds));
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if rotator.current_index() > 0 {
                rotator.reset();
            }
        }
    });
}

#[cfg(feature = "server")]
mod status {
    use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
    use domain_checker::{bot::BotService, config::Config, metrics};
    use serde::Serialize;
    use std::{net::SocketAddr, sync::Arc};
    use tokio::net::TcpListener;
    use tower::ServiceBuilder;
    use tower_http::{compression::CompressionLayer, trace::TraceLayer};
    use tracing::{error, info};

    #[derive(Clone)]
    struct AppState {
        config: Arc<Config>,
        service: Arc<BotService>,
    }

    #[derive(Serialize)]
    struct HealthResponse {
        status: String,
        version: String,
        uptime_seconds: u64,
        api_keys_total: usize,
        api_keys_remaining: usize,
        tracked_users: usize,
    }

    pub async fn spawn(config: Arc<Config>, service: Arc<BotService>) -> std::io::Result<()> {
        metrics::init_metrics();

        let app = Router::new()
            .route("/health", get(health_check))
            .route("/metrics", get(metrics_handler))
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(CompressionLayer::new())
                    .into_inner(),
            )
            .with_state(AppState {
                config: config.clone(),
                service,
            });

        let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
        let listener = TcpListener::bind(addr).await?;
        info!("Status server listening on {}", addr);

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("Status server stopped: {}", e);
            }
        });
        Ok(())
    }

    async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
        let rotator = state.service.checker().rotator();
        let status = if rotator.is_exhausted() { "degraded" } else { "healthy" };

        Json(HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: state.config.start_time.elapsed().as_secs(),
            api_keys_total: rotator.pool_size(),
            api_keys_remaining: rotator.remaining_keys(),
            tracked_users: state.service.limiter().tracked_users().await,
        })
    }

    async fn metrics_handler() -> impl IntoResponse {
        match metrics::render() {
            Some(body) => (StatusCode::OK, body),
            None => (StatusCode::SERVICE_UNAVAILABLE, "Metrics not initialized".to_string()),
        }
    }
}
