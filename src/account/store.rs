/// Account store implementation using runtime queries
///
/// Uses sqlx runtime query building instead of compile-time macros to avoid
/// needing DATABASE_URL during compilation.

use crate::{
    account::password,
    config::ServerConfig,
    db::account::{Account, Session},
    error::{AppError, AppResult},
};
use chrono::{Duration, Utc};
use rand::Rng;
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

/// Fields required to create a new account
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password: String,
}

/// Account store service
pub struct AccountStore {
    db: SqlitePool,
    config: Arc<ServerConfig>,
}

impl AccountStore {
    /// Create a new account store
    pub fn new(db: SqlitePool, config: Arc<ServerConfig>) -> Self {
        Self { db, config }
    }

    /// Create a new account in the inactive state
    ///
    /// Uniqueness is pre-checked by the validator, but the UNIQUE constraints
    /// remain the source of truth; a lost race maps to `AppError::Conflict`.
    pub async fn create_account(&self, new: NewAccount) -> AppResult<Account> {
        let password_hash = password::hash_password(&new.password)?;
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO account (id, username, email, full_name, password_hash, active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(id)
        .bind(&new.username)
        .bind(&new.email)
        .bind(&new.full_name)
        .bind(&password_hash)
        .bind(false)
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                if db_err.message().contains("account.email") {
                    AppError::Conflict("Email is taken".to_string())
                } else {
                    AppError::Conflict("Username is taken".to_string())
                }
            }
            _ => AppError::Database(e),
        })?;

        Ok(Account {
            id,
            username: new.username,
            email: new.email,
            full_name: new.full_name,
            password_hash,
            active: false,
            created_at: now,
            last_login: None,
        })
    }

    /// Get account by id
    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>("SELECT * FROM account WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .map_err(AppError::Database)?;

        Ok(account)
    }

    /// Get account by username
    pub async fn find_by_username(&self, username: &str) -> AppResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>("SELECT * FROM account WHERE username = ?1")
            .bind(username)
            .fetch_optional(&self.db)
            .await
            .map_err(AppError::Database)?;

        Ok(account)
    }

    /// Get account by email
    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>("SELECT * FROM account WHERE email = ?1")
            .bind(email)
            .fetch_optional(&self.db)
            .await
            .map_err(AppError::Database)?;

        Ok(account)
    }

    /// Check if username exists
    pub async fn username_exists(&self, username: &str) -> AppResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM account WHERE username = ?1")
            .bind(username)
            .fetch_one(&self.db)
            .await
            .map_err(AppError::Database)?;

        Ok(count > 0)
    }

    /// Check if email exists
    pub async fn email_exists(&self, email: &str) -> AppResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM account WHERE email = ?1")
            .bind(email)
            .fetch_one(&self.db)
            .await
            .map_err(AppError::Database)?;

        Ok(count > 0)
    }

    /// Verify credentials against an active account
    ///
    /// Returns `None` for unknown usernames, wrong passwords, and inactive
    /// accounts alike; callers render one uniform "Invalid login" message.
    pub async fn authenticate(&self, username: &str, password_input: &str) -> AppResult<Option<Account>> {
        let Some(account) = self.find_by_username(username).await? else {
            return Ok(None);
        };

        if !password::verify_password(password_input, &account.password_hash)? {
            return Ok(None);
        }

        if !account.active {
            return Ok(None);
        }

        Ok(Some(account))
    }

    /// Flip the account to active
    pub async fn activate(&self, id: Uuid) -> AppResult<()> {
        sqlx::query("UPDATE account SET active = TRUE WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(AppError::Database)?;

        tracing::info!(account_id = %id, "account activated");

        Ok(())
    }

    /// Replace the account's password hash
    pub async fn update_password(&self, id: Uuid, new_password: &str) -> AppResult<()> {
        let password_hash = password::hash_password(new_password)?;

        sqlx::query("UPDATE account SET password_hash = ?1 WHERE id = ?2")
            .bind(&password_hash)
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(AppError::Database)?;

        // Existing sessions are bound to the old credential; drop them
        sqlx::query("DELETE FROM session WHERE account_id = ?1")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(AppError::Database)?;

        tracing::info!(account_id = %id, "password updated");

        Ok(())
    }

    /// Record a successful login
    pub async fn touch_last_login(&self, id: Uuid) -> AppResult<()> {
        sqlx::query("UPDATE account SET last_login = ?1 WHERE id = ?2")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(AppError::Database)?;

        Ok(())
    }

    /// Create a session for an account
    pub async fn create_session(&self, account_id: Uuid) -> AppResult<Session> {
        let id = Uuid::new_v4();
        let token = Self::generate_session_token();
        let now = Utc::now();
        let expires_at = now + Duration::hours(self.config.auth.session_ttl_hours);

        sqlx::query(
            "INSERT INTO session (id, account_id, token, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(id)
        .bind(account_id)
        .bind(&token)
        .bind(now)
        .bind(expires_at)
        .execute(&self.db)
        .await
        .map_err(AppError::Database)?;

        Ok(Session {
            id,
            account_id,
            token,
            created_at: now,
            expires_at,
        })
    }

    /// Resolve a session token to a live session and its active account
    pub async fn find_session(&self, token: &str) -> AppResult<Option<(Session, Account)>> {
        let Some(session) =
            sqlx::query_as::<_, Session>("SELECT * FROM session WHERE token = ?1")
                .bind(token)
                .fetch_optional(&self.db)
                .await
                .map_err(AppError::Database)?
        else {
            return Ok(None);
        };

        if Utc::now() > session.expires_at {
            return Ok(None);
        }

        let Some(account) = self.find_by_id(session.account_id).await? else {
            return Ok(None);
        };

        if !account.active {
            return Ok(None);
        }

        Ok(Some((session, account)))
    }

    /// Delete a session (logout)
    pub async fn delete_session(&self, token: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM session WHERE token = ?1")
            .bind(token)
            .execute(&self.db)
            .await
            .map_err(AppError::Database)?;

        Ok(())
    }

    /// Cleanup expired sessions
    ///
    /// Called periodically by the background job scheduler.
    pub async fn cleanup_expired_sessions(&self) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM session WHERE expires_at < ?1")
            .bind(Utc::now())
            .execute(&self.db)
            .await
            .map_err(AppError::Database)?;

        Ok(result.rows_affected())
    }

    /// Generate a random alphanumeric session token
    fn generate_session_token() -> String {
        const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ\
                                 abcdefghijklmnopqrstuvwxyz\
                                 0123456789";
        let mut rng = rand::thread_rng();
        (0..32)
            .map(|_| {
                let idx = rng.gen_range(0..CHARSET.len());
                CHARSET[idx] as char
            })
            .collect()
    }
}
