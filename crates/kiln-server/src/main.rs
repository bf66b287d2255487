//! Kiln Server binary
//!
//! Reads configuration from the environment, opens the SQLite version
//! store, wires the blob gateway, and serves the sync protocol over HTTP.

use anyhow::{Context, Result};
use kiln_core::ports::BlobGateway;
use kiln_server::gateway::{HttpBlobGateway, MemoryBlobGateway};
use kiln_server::storage::Database;
use kiln_server::{router, AppState};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() {
    // Set up panic hook to log crashes
    std::panic::set_hook(Box::new(|info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()));
        let payload = if let Some(s) = info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        eprintln!("[PANIC] at {:?}: {}", location, payload);
        tracing::error!("PANIC at {:?}: {}", location, payload);
    }));

    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("[FATAL] Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    info!("Starting Kiln Server v{}", env!("CARGO_PKG_VERSION"));
    info!("PID: {}", std::process::id());

    if let Err(e) = run_server().await {
        error!("Server failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run_server() -> Result<()> {
    info!("Loading configuration...");
    let config = load_config().await.context("Failed to load configuration")?;
    info!(
        "Config loaded: bind={}, db={}",
        config.bind_address, config.database_path
    );

    info!("Initializing SQLite version store...");
    let db = Arc::new(
        Database::new(&config.database_path)
            .await
            .context("Failed to initialize database")?,
    );
    info!("Version store ready at: {}", config.database_path);

    let gateway: Arc<dyn BlobGateway> = match config.blob_gateway.as_str() {
        "http" => {
            let base_url = config
                .blob_public_url
                .clone()
                .context("BLOB_PUBLIC_URL is required when BLOB_GATEWAY=http")?;
            info!("Blob gateway: http, base={}", base_url);
            let gateway =
                HttpBlobGateway::new(base_url, config.blob_signing_secret.clone().into_bytes())
                    .context("Failed to build HTTP blob gateway")?;
            Arc::new(gateway)
        }
        _ => {
            info!("Blob gateway: memory (standalone mode)");
            Arc::new(MemoryBlobGateway::new())
        }
    };

    let state = AppState::new(
        db,
        gateway,
        config.jwt_secret.clone(),
        Duration::from_secs(config.upload_url_ttl_secs),
        Duration::from_secs(config.download_url_ttl_secs),
    );

    info!("Building HTTP router...");
    let app = router(state);

    let addr: SocketAddr = config
        .bind_address
        .parse()
        .context("Failed to parse bind address")?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!("Server ready to accept connections");
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

#[derive(Debug, Clone)]
struct Config {
    bind_address: String,
    database_path: String,
    jwt_secret: String,
    blob_gateway: String,
    blob_public_url: Option<String>,
    blob_signing_secret: String,
    upload_url_ttl_secs: u64,
    download_url_ttl_secs: u64,
}

async fn load_config() -> Result<Config> {
    info!("Loading configuration from environment...");

    let data_dir = std::env::var("DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./data"));
    info!("Data directory: {}", data_dir.display());

    tokio::fs::create_dir_all(&data_dir)
        .await
        .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;

    let database_path = std::env::var("DATABASE_PATH").unwrap_or_else(|_| {
        let path = data_dir.join("kiln.db");
        path.to_string_lossy().to_string()
    });

    let bind_address =
        std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8787".to_string());

    let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
        warn!("JWT_SECRET not set, using insecure default");
        "dev-secret-change-me".to_string()
    });

    let blob_gateway = std::env::var("BLOB_GATEWAY").unwrap_or_else(|_| {
        warn!("BLOB_GATEWAY not set, defaulting to in-memory gateway");
        "memory".to_string()
    });

    let blob_public_url = std::env::var("BLOB_PUBLIC_URL").ok();

    let blob_signing_secret = std::env::var("BLOB_SIGNING_SECRET").unwrap_or_else(|_| {
        warn!("BLOB_SIGNING_SECRET not set, deriving from JWT_SECRET");
        format!("{jwt_secret}-blobs")
    });

    let upload_url_ttl_secs = env_u64("UPLOAD_URL_TTL_SECS", 900);
    let download_url_ttl_secs = env_u64("DOWNLOAD_URL_TTL_SECS", 300);

    Ok(Config {
        bind_address,
        database_path,
        jwt_secret,
        blob_gateway,
        blob_public_url,
        blob_signing_secret,
        upload_url_ttl_secs,
        download_url_ttl_secs,
    })
}

fn env_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("Invalid {}={}, using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}
