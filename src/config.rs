//! Process configuration, read from the environment (and `.env` via dotenvy).

use std::{env, net::SocketAddr, path::PathBuf, time::Duration};
use thiserror::Error;
use url::Url;

pub const DEFAULT_DATABASE_URL: &str = "sqlite:./db/gallery.db";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_UPLOAD_DIR: &str = "./uploads";
pub const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_JWT_EXPIRATION_SECS: u64 = 86_400;
pub const DEFAULT_BCRYPT_COST: u32 = 12;
pub const DEFAULT_IMAGE_API_URL: &str = "https://pixabay.com/api/";
pub const DEFAULT_IMAGE_API_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";

/// HS256 secrets shorter than this are refused.
pub const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub upload_dir: PathBuf,
    /// Base used to build the URLs of uploaded files.
    pub public_base_url: Url,
    pub jwt_secret: String,
    pub jwt_expiration: Duration,
    pub bcrypt_cost: u32,
    pub image_api_url: Url,
    pub image_api_key: String,
    pub image_api_timeout: Duration,
    pub cors_origin: String,
    /// When set, an `admin` account with this password is ensured at startup.
    pub admin_password: Option<String>,
}

// Secrets stay out of logs.
impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("database_url", &self.database_url)
            .field("bind_addr", &self.bind_addr)
            .field("upload_dir", &self.upload_dir)
            .field("public_base_url", &self.public_base_url.as_str())
            .field("jwt_expiration", &self.jwt_expiration)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("image_api_url", &self.image_api_url.as_str())
            .field("image_api_timeout", &self.image_api_timeout)
            .field("cors_origin", &self.cors_origin)
            .field("admin_password", &self.admin_password.as_ref().map(|_| "<set>"))
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_env_with(|name| env::var(name).ok())
    }

    pub fn from_env_with<F>(get_env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &'static str| get_env(name).filter(|v| !v.trim().is_empty());

        let jwt_secret = get("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::Invalid {
                name: "JWT_SECRET",
                reason: format!("must be at least {MIN_JWT_SECRET_LEN} bytes"),
            });
        }

        let image_api_key = get("IMAGE_API_KEY").ok_or(ConfigError::Missing("IMAGE_API_KEY"))?;

        let bcrypt_cost = parse_or("BCRYPT_COST", get("BCRYPT_COST"), DEFAULT_BCRYPT_COST)?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::Invalid {
                name: "BCRYPT_COST",
                reason: "must be between 4 and 31".to_string(),
            });
        }

        Ok(Self {
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            bind_addr: parse_or(
                "BIND_ADDR",
                get("BIND_ADDR"),
                parse_default(DEFAULT_BIND_ADDR)?,
            )?,
            upload_dir: get("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR)),
            public_base_url: parse_or(
                "PUBLIC_BASE_URL",
                get("PUBLIC_BASE_URL"),
                parse_default(DEFAULT_PUBLIC_BASE_URL)?,
            )?,
            jwt_secret,
            jwt_expiration: Duration::from_secs(parse_or(
                "JWT_EXPIRATION_SECS",
                get("JWT_EXPIRATION_SECS"),
                DEFAULT_JWT_EXPIRATION_SECS,
            )?),
            bcrypt_cost,
            image_api_url: parse_or(
                "IMAGE_API_URL",
                get("IMAGE_API_URL"),
                parse_default(DEFAULT_IMAGE_API_URL)?,
            )?,
            image_api_key,
            image_api_timeout: Duration::from_secs(parse_or(
                "IMAGE_API_TIMEOUT_SECS",
                get("IMAGE_API_TIMEOUT_SECS"),
                DEFAULT_IMAGE_API_TIMEOUT_SECS,
            )?),
            cors_origin: get("CORS_ORIGIN").unwrap_or_else(|| DEFAULT_CORS_ORIGIN.to_string()),
            admin_password: get("ADMIN_PASSWORD"),
        })
    }
}

fn parse_or<T>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn parse_default<T>(raw: &'static str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
        name: "default",
        reason: e.to_string(),
    })
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::{AppConfig, ConfigError};
    use std::{collections::HashMap, time::Duration};

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_env_with(|name| vars.get(name).cloned())
    }

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_defaults() {
        let config = config(&[("JWT_SECRET", SECRET), ("IMAGE_API_KEY", "key")]).unwrap();

        assert_eq!("sqlite:./db/gallery.db", config.database_url);
        assert_eq!("0.0.0.0:8080", config.bind_addr.to_string());
        assert_eq!(Duration::from_secs(86_400), config.jwt_expiration);
        assert_eq!(12, config.bcrypt_cost);
        assert_eq!("https://pixabay.com/api/", config.image_api_url.as_str());
        assert_eq!(Duration::from_secs(10), config.image_api_timeout);
        assert_eq!("http://localhost:3000", config.cors_origin);
        assert!(config.admin_password.is_none());
    }

    #[test]
    fn test_required_and_invalid_values() {
        assert!(matches!(
            config(&[("IMAGE_API_KEY", "key")]),
            Err(ConfigError::Missing("JWT_SECRET"))
        ));
        assert!(matches!(
            config(&[("JWT_SECRET", SECRET)]),
            Err(ConfigError::Missing("IMAGE_API_KEY"))
        ));
        assert!(matches!(
            config(&[("JWT_SECRET", "short"), ("IMAGE_API_KEY", "key")]),
            Err(ConfigError::Invalid { name: "JWT_SECRET", .. })
        ));
        assert!(matches!(
            config(&[
                ("JWT_SECRET", SECRET),
                ("IMAGE_API_KEY", "key"),
                ("BCRYPT_COST", "abc")
            ]),
            Err(ConfigError::Invalid { name: "BCRYPT_COST", .. })
        ));
        assert!(matches!(
            config(&[
                ("JWT_SECRET", SECRET),
                ("IMAGE_API_KEY", "key"),
                ("BIND_ADDR", "nowhere")
            ]),
            Err(ConfigError::Invalid { name: "BIND_ADDR", .. })
        ));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let config = config(&[
            ("JWT_SECRET", SECRET),
            ("IMAGE_API_KEY", "very-secret-key"),
            ("ADMIN_PASSWORD", "hunter22"),
        ])
        .unwrap();
        let printed = format!("{config:?}");

        assert!(!printed.contains(SECRET));
        assert!(!printed.contains("very-secret-key"));
        assert!(!printed.contains("hunter22"));
    }
}
