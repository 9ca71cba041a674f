pub mod admin;
pub mod auth;
pub mod cache;
pub mod comments;
pub mod config;
pub mod error;
pub mod extract;
pub mod feeds;
pub mod follows;
pub mod middleware;
pub mod pagination;
pub mod posts;
pub mod routes;
pub mod views;

use tracing::error;
use yatube_db::Database;

use crate::auth::AppState;
use crate::error::AppError;

/// Run blocking store work off the async runtime.
pub(crate) async fn with_db<F, T>(state: &AppState, f: F) -> Result<T, AppError>
where
    F: FnOnce(&Database) -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            AppError::Internal(anyhow::anyhow!("blocking task failed: {}", e))
        })?
}
