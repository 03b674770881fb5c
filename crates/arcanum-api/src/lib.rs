pub mod auth;
pub mod error;
pub mod listings;
pub mod middleware;
pub mod session;
pub mod settlement;
pub mod trades;

use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use tracing::warn;
use uuid::Uuid;

use arcanum_db::Database;

use crate::error::ApiError;
use crate::session::SessionManager;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub sessions: SessionManager,
}

/// Run blocking DB work off the async runtime.
pub(crate) async fn run_blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!("spawn_blocking join error: {}", e);
            Err(ApiError::Internal(anyhow::anyhow!("blocking task failed")))
        }
    }
}

// Stored rows hold raw TEXT; parse at the edge and keep serving on corrupt
// data rather than failing the whole response.

pub(crate) fn parse_uuid(raw: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt uuid '{}': {}", raw, e);
        Uuid::default()
    })
}

pub(crate) fn parse_decimal(raw: &str) -> Decimal {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt decimal '{}': {}", raw, e);
        Decimal::ZERO
    })
}

pub(crate) fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite DEFAULT timestamps come back as "YYYY-MM-DD HH:MM:SS"
            // without a timezone. Parse as naive UTC and convert.
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}
