use std::sync::Arc;

use tracing::error;

use portal_db::Database;

use crate::config::PortalConfig;
use crate::email::Mailer;
use crate::error::ApiError;
use crate::storage::Storage;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub config: PortalConfig,
    pub storage: Storage,
    pub mailer: Mailer,
}

impl AppStateInner {
    /// Runs blocking database work off the async runtime.
    pub async fn with_db<F, T>(self: &Arc<Self>, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Database) -> Result<T, ApiError> + Send + 'static,
        T: Send + 'static,
    {
        let state = self.clone();
        tokio::task::spawn_blocking(move || f(&state.db))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                ApiError::Internal
            })?
    }
}
