/// Activation and password-reset tokens
///
/// Tokens are not persisted. Each one is an HS256-signed value carrying the
/// account id, a purpose, an expiry, and a fingerprint of the mutable account
/// state it is bound to. State changes invalidate outstanding tokens:
///
/// - flipping `active` invalidates activation tokens
/// - replacing the password hash invalidates reset tokens
/// - a successful login (last_login) invalidates reset tokens
use crate::{config::ServerConfig, db::account::Account, error::AppResult};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

/// What a token authorizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPurpose {
    Activate,
    ResetPassword,
}

impl TokenPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::Activate => "activate",
            TokenPurpose::ResetPassword => "reset-password",
        }
    }

    /// Token lifetime in seconds
    fn ttl_secs(&self) -> i64 {
        match self {
            TokenPurpose::Activate => 24 * 3600,
            TokenPurpose::ResetPassword => 3600,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: Uuid,
    purpose: String,
    fp: String,
    iat: i64,
    exp: i64,
}

/// Token issuing and verification service
pub struct TokenService {
    config: Arc<ServerConfig>,
}

impl TokenService {
    pub fn new(config: Arc<ServerConfig>) -> Self {
        Self { config }
    }

    /// Issue a token for an account and purpose
    pub fn issue(&self, account: &Account, purpose: TokenPurpose) -> AppResult<String> {
        self.issue_with_ttl(account, purpose, purpose.ttl_secs())
    }

    fn issue_with_ttl(
        &self,
        account: &Account,
        purpose: TokenPurpose,
        ttl_secs: i64,
    ) -> AppResult<String> {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: account.id,
            purpose: purpose.as_str().to_string(),
            fp: Self::fingerprint(account),
            iat: now,
            exp: now + ttl_secs,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.auth.token_secret.as_bytes()),
        )
        .map_err(|e| {
            crate::error::AppError::Internal(format!("Failed to generate token: {}", e))
        })?;

        Ok(token)
    }

    /// Verify a token against the current state of an account
    ///
    /// Returns false for any failure: bad signature, expiry, purpose
    /// mismatch, wrong account, or a state fingerprint that no longer
    /// matches the account row.
    pub fn verify(&self, token: &str, account: &Account, purpose: TokenPurpose) -> bool {
        let decoding_key = DecodingKey::from_secret(self.config.auth.token_secret.as_bytes());
        let validation = Validation::new(Algorithm::HS256);

        let data = match decode::<Claims>(token, &decoding_key, &validation) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!("token verification failed: {}", e);
                return false;
            }
        };

        let claims = data.claims;

        if claims.sub != account.id {
            tracing::warn!("token bound to a different account");
            return false;
        }

        if claims.purpose != purpose.as_str() {
            tracing::warn!(
                expected = purpose.as_str(),
                got = %claims.purpose,
                "token purpose mismatch"
            );
            return false;
        }

        if claims.fp != Self::fingerprint(account) {
            tracing::warn!("token fingerprint stale; account state changed since issue");
            return false;
        }

        true
    }

    /// Fingerprint of the mutable account state a token is bound to
    fn fingerprint(account: &Account) -> String {
        let mut hasher = Sha256::new();
        hasher.update(account.password_hash.as_bytes());
        hasher.update([account.active as u8]);
        if let Some(last_login) = account.last_login {
            hasher.update(last_login.timestamp_micros().to_be_bytes());
        }
        hex::encode(hasher.finalize())
    }
}
