use std::env;

use carelink_config::AppConfig;
use carelink_crypto::FieldCipher;
use carelink_server::{AppState, observability, router};

/// How the configuration path was determined.
#[derive(Debug, Clone, Copy)]
enum ConfigSource {
    /// From --config CLI argument
    CliArgument,
    /// From CARELINK_CONFIG environment variable
    EnvironmentVariable,
    /// Default path (carelink.toml)
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CliArgument => write!(f, "CLI argument (--config)"),
            Self::EnvironmentVariable => write!(f, "environment variable (CARELINK_CONFIG)"),
            Self::Default => write!(f, "default"),
        }
    }
}

#[tokio::main]
async fn main() {
    // Load .env file if present (before anything else)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist - it's optional
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    // Initialize tracing early with the default level
    observability::init_tracing();

    let (config_path, source) = resolve_config_path();

    let cfg = match AppConfig::load(Some(&config_path)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    tracing::info!(
        path = %config_path,
        source = %source,
        "Configuration loaded"
    );

    observability::apply_logging_level(&cfg.logging.level);

    // validate() already proved the key material usable.
    let cipher = match cfg
        .encryption
        .key_bytes()
        .map_err(|e| e.to_string())
        .and_then(|key| FieldCipher::new(&key).map_err(|e| e.to_string()))
    {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Encryption key error: {e}");
            std::process::exit(2);
        }
    };

    let pool = match carelink_postgres::create_pool(&cfg.storage.postgres).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Database connection failed: {e}");
            std::process::exit(2);
        }
    };

    if let Err(e) = carelink_postgres::ensure_schema(&pool).await {
        eprintln!("Schema bootstrap failed: {e}");
        std::process::exit(2);
    }

    match carelink_postgres::SessionStorage::new(&pool).purge_expired().await {
        Ok(purged) if purged > 0 => tracing::info!(purged, "Expired sessions removed"),
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, "Expired-session purge failed"),
    }

    // First operator identity; there is no public sign-up surface.
    if let (Ok(email), Ok(password)) = (
        env::var("CARELINK_ADMIN_EMAIL"),
        env::var("CARELINK_ADMIN_PASSWORD"),
    ) && !email.is_empty()
        && !password.is_empty()
    {
        match carelink_postgres::ensure_admin(&pool, &email, &password, "Administrator").await {
            Ok(true) => tracing::info!(%email, "Super-admin account created"),
            Ok(false) => {}
            Err(e) => {
                eprintln!("Admin bootstrap failed: {e}");
                std::process::exit(2);
            }
        }
    }

    let addr = cfg.addr();
    let state = AppState::new(cfg, pool, cipher);
    let app = router(state);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Failed to bind {addr}: {e}");
            std::process::exit(2);
        }
    };

    tracing::info!(%addr, "Server listening");

    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        eprintln!("Server error: {err}");
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("Shutdown signal received");
    }
}

/// Resolve the configuration file path.
///
/// Priority order:
/// 1. CLI argument: --config <path>
/// 2. Environment variable: CARELINK_CONFIG
/// 3. Default: carelink.toml
fn resolve_config_path() -> (String, ConfigSource) {
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config"
            && let Some(path) = args.next()
        {
            return (path, ConfigSource::CliArgument);
        }
        if let Some(path) = arg.strip_prefix("--config=") {
            return (path.to_string(), ConfigSource::CliArgument);
        }
    }

    if let Ok(path) = env::var("CARELINK_CONFIG")
        && !path.is_empty()
    {
        return (path, ConfigSource::EnvironmentVariable);
    }

    ("carelink.toml".to_string(), ConfigSource::Default)
}
