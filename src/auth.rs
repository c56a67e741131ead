/// Session extractors
use crate::{context::AppContext, db::account::Account, error::AppError};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::CookieJar;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "vestibule_session";

/// Authenticated context - resolves the session cookie to an active account
#[derive(Debug, Clone)]
pub struct CurrentSession {
    pub account: Account,
    pub token: String,
}

#[async_trait]
impl FromRequestParts<AppContext> for CurrentSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);

        let token = jar
            .get(SESSION_COOKIE)
            .map(|c| c.value().to_string())
            .ok_or_else(|| AppError::Authentication("Not logged in".to_string()))?;

        let (_session, account) = state
            .accounts
            .find_session(&token)
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid or expired session".to_string()))?;

        Ok(CurrentSession { account, token })
    }
}

/// Optional session context - does not fail if no valid session is present
#[derive(Debug, Clone)]
pub struct OptionalSession(pub Option<CurrentSession>);

#[async_trait]
impl FromRequestParts<AppContext> for OptionalSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let session = match CurrentSession::from_request_parts(parts, state).await {
            Ok(session) => Some(session),
            Err(AppError::Authentication(_)) => None,
            Err(e) => return Err(e),
        };

        Ok(OptionalSession(session))
    }
}
