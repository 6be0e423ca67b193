mod assets;
mod bot;
mod config;
mod db;
mod directory;
mod errors;
mod flow;
mod lifecycle;
mod models;
mod moderation;
mod notify;
mod routes;
mod state;
mod store;
mod telegram;
mod webapp;

#[cfg(test)]
mod testing;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::assets::S3AssetStore;
use crate::bot::ChatLocks;
use crate::config::Config;
use crate::db::create_pool;
use crate::flow::RedisSessionStore;
use crate::notify::Notifier;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::PgStore;
use crate::telegram::TelegramClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting snab-bot v{}", env!("CARGO_PKG_VERSION"));

    // PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Redis session store
    let redis = redis::Client::open(config.redis_url.clone())?;
    let sessions = RedisSessionStore::connect(&redis, config.session_ttl_secs).await?;
    info!(
        "Redis session store ready (TTL {}s)",
        config.session_ttl_secs
    );

    // S3 / MinIO
    let s3 = build_s3_client(&config).await;
    let assets = Arc::new(S3AssetStore::new(
        s3,
        config.s3_bucket.clone(),
        config.s3_public_url.clone(),
    ));
    info!("S3 asset store initialized (bucket: {})", config.s3_bucket);

    // Telegram
    let telegram_client = TelegramClient::new(config.telegram_bot_token.clone())?;
    info!("Telegram client initialized");

    let state = AppState {
        store: Arc::new(PgStore::new(db)),
        sessions: Arc::new(sessions),
        assets: assets.clone(),
        notifier: Notifier::new(Arc::new(telegram_client.clone()), assets),
        chat_locks: ChatLocks::new(),
        config: config.clone(),
    };

    if config.telegram_polling {
        let polling_state = state.clone();
        tokio::spawn(async move {
            telegram::polling::run(telegram_client, |update| {
                let state = polling_state.clone();
                async move { bot::handle_update(&state, update).await }
            })
            .await;
        });
    }

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "snab-static",
    );

    let shared = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    // MinIO serves buckets under the path, not as subdomains.
    let s3_config = aws_sdk_s3::config::Builder::from(&shared)
        .force_path_style(true)
        .build();
    aws_sdk_s3::Client::from_conf(s3_config)
}
