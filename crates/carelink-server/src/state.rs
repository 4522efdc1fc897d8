//! Shared application state.
//!
//! Everything handlers need is injected here explicitly; there are no
//! process-global singletons.

use std::sync::Arc;

use carelink_config::AppConfig;
use carelink_crypto::FieldCipher;
use carelink_postgres::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub pool: PgPool,
    pub cipher: Arc<FieldCipher>,
}

impl AppState {
    #[must_use]
    pub fn new(config: AppConfig, pool: PgPool, cipher: FieldCipher) -> Self {
        Self {
            config: Arc::new(config),
            pool,
            cipher: Arc::new(cipher),
        }
    }
}
