/// Configuration management for Vestibule
use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub email: Option<EmailConfig>,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    /// Externally reachable base URL, used in activation/reset links.
    /// Falls back to http://{hostname}:{port} when unset.
    pub public_url: Option<String>,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub account_db: PathBuf,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for activation and reset tokens
    pub token_secret: String,
    /// Session lifetime in hours
    pub session_ttl_hours: i64,
}

/// Email configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_url: String,
    pub from_address: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("VESTIBULE_HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let port = env::var("VESTIBULE_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| AppError::Validation("Invalid port number".to_string()))?;
        let public_url = env::var("VESTIBULE_PUBLIC_URL").ok();

        let data_directory: PathBuf = env::var("VESTIBULE_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let account_db = env::var("VESTIBULE_ACCOUNT_DB_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("accounts.sqlite"));

        let token_secret = env::var("VESTIBULE_TOKEN_SECRET")
            .map_err(|_| AppError::Validation("Token secret required".to_string()))?;
        let session_ttl_hours = env::var("VESTIBULE_SESSION_TTL_HOURS")
            .unwrap_or_else(|_| "336".to_string())
            .parse()
            .unwrap_or(336);

        let email = if let Ok(smtp_url) = env::var("VESTIBULE_EMAIL_SMTP_URL") {
            Some(EmailConfig {
                smtp_url,
                from_address: env::var("VESTIBULE_EMAIL_FROM_ADDRESS")
                    .unwrap_or_else(|_| format!("noreply@{}", hostname)),
            })
        } else {
            None
        };

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                public_url,
            },
            storage: StorageConfig {
                data_directory,
                account_db,
            },
            auth: AuthConfig {
                token_secret,
                session_ttl_hours,
            },
            email,
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.service.hostname.is_empty() {
            return Err(AppError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.auth.token_secret.len() < 32 {
            return Err(AppError::Validation(
                "Token secret must be at least 32 characters".to_string(),
            ));
        }

        if self.auth.session_ttl_hours <= 0 {
            return Err(AppError::Validation(
                "Session TTL must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Base URL used when rendering activation and reset links
    pub fn public_url(&self) -> String {
        self.service.public_url.clone().unwrap_or_else(|| {
            format!("http://{}:{}", self.service.hostname, self.service.port)
        })
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> ServerConfig {
    ServerConfig {
        service: ServiceConfig {
            hostname: "localhost".to_string(),
            port: 8080,
            public_url: None,
        },
        storage: StorageConfig {
            data_directory: PathBuf::from("./data"),
            account_db: PathBuf::from(":memory:"),
        },
        auth: AuthConfig {
            token_secret: "test-secret-key-for-testing-only-0123456789".to_string(),
            session_ttl_hours: 336,
        },
        email: None,
        logging: LoggingConfig {
            level: "info".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_test_config() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_short_secret() {
        let mut config = test_config();
        config.auth.token_secret = "short".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_public_url_falls_back_to_hostname() {
        let mut config = test_config();
        assert_eq!(config.public_url(), "http://localhost:8080");

        config.service.public_url = Some("https://accounts.example.com".to_string());
        assert_eq!(config.public_url(), "https://accounts.example.com");
    }
}
