/// Application context and dependency injection
use crate::{
    account::AccountStore,
    config::ServerConfig,
    db,
    error::AppResult,
    mailer::Mailer,
    token::TokenService,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub accounts: Arc<AccountStore>,
    pub tokens: Arc<TokenService>,
    pub mailer: Arc<Mailer>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> AppResult<Self> {
        config.validate()?;

        let config = Arc::new(config);

        let db = db::create_pool(&config.storage.account_db, db::DatabaseOptions::default())
            .await?;
        db::run_migrations(&db).await?;
        db::test_connection(&db).await?;

        let accounts = Arc::new(AccountStore::new(db.clone(), Arc::clone(&config)));
        let tokens = Arc::new(TokenService::new(Arc::clone(&config)));
        let mailer = Arc::new(Mailer::new(config.email.clone())?);
        if !mailer.is_configured() {
            tracing::warn!("Email not configured; notifications will be logged and dropped");
        }

        Ok(Self {
            config,
            db,
            accounts,
            tokens,
            mailer,
        })
    }

    /// Base URL used in activation and reset links
    pub fn base_url(&self) -> String {
        self.config.public_url()
    }
}

#[cfg(test)]
pub(crate) async fn test_context() -> AppContext {
    use crate::config::test_config;
    use crate::db::DatabaseOptions;
    use std::path::Path;

    let config = Arc::new(test_config());

    // A single connection keeps the in-memory database shared across queries
    let db = db::create_pool(
        Path::new(":memory:"),
        DatabaseOptions {
            max_connections: 1,
            enable_wal: false,
        },
    )
    .await
    .unwrap();
    db::run_migrations(&db).await.unwrap();

    let accounts = Arc::new(AccountStore::new(db.clone(), Arc::clone(&config)));
    let tokens = Arc::new(TokenService::new(Arc::clone(&config)));
    let mailer = Arc::new(Mailer::new(None).unwrap());

    AppContext {
        config,
        db,
        accounts,
        tokens,
        mailer,
    }
}
