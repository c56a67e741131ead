/// Background task implementations
use crate::{context::AppContext, error::AppResult};

/// Cleanup expired sessions
pub async fn cleanup_expired_sessions(ctx: &AppContext) -> AppResult<u64> {
    ctx.accounts.cleanup_expired_sessions().await
}

/// Health check - verify the database is reachable
pub async fn health_check(ctx: &AppContext) -> AppResult<()> {
    crate::db::test_connection(&ctx.db).await
}
