use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use cab_booking_api::{
    build_router,
    clock::SystemClock,
    config::{AppConfig, StoreBackend},
    database::connection::connect_store,
    errors::AppError,
    services::{
        cache::MemoryCache,
        notifier::{LogNotifier, Notifier, SmsNotifier},
        razorpay::RazorpayClient,
    },
    state::{AppState, BookingSettings},
    store::{MemoryStore, Store},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    tracing::info!("⚙️ Configuration: {}", config.get_config_info());
    AppError::expose_internal_detail(!config.is_production());

    let app_state = initialize_app_state(&config).await?;
    let app = build_router(app_state);
    start_server(app, &config).await
}

async fn initialize_app_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let store: Arc<dyn Store> = match config.store_backend {
        StoreBackend::Mongo => Arc::new(
            connect_store(config)
                .await
                .context("connecting to MongoDB")?,
        ),
        StoreBackend::Memory => {
            tracing::warn!("⚠️ Using the in-memory store, data will not survive a restart");
            Arc::new(MemoryStore::new())
        }
    };

    let razorpay = Arc::new(RazorpayClient::new(
        config.razorpay.clone(),
        config.site_name.clone(),
        config.currency.clone(),
    )?);

    let notifier: Arc<dyn Notifier> = match &config.sms {
        Some(sms) => {
            tracing::info!("✅ SMS notifications enabled");
            Arc::new(SmsNotifier::new(sms.clone(), config.site_name.clone())?)
        }
        None => {
            tracing::warn!("SMS credentials missing, notifications go to the log");
            Arc::new(LogNotifier::new(config.site_name.clone()))
        }
    };

    Ok(AppState::new(
        store,
        Arc::new(MemoryCache::new()),
        razorpay.clone(),
        razorpay,
        notifier,
        Arc::new(SystemClock),
        BookingSettings::from_config(config),
    ))
}

async fn start_server(app: axum::Router, config: &AppConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", config.host, config.port))?;

    tracing::info!("🚀 Server starting on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app).await?;
    Ok(())
}
