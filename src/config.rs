use anyhow::{Context, Result};
use chrono::Duration;
use clap::Args;
use std::path::PathBuf;

use crate::auth::RefreshPolicy;
use crate::theme::Theme;

/// Application name used for cache directory paths
const APP_NAME: &str = "habit-tracker";

/// Token store file name
const STORE_FILE: &str = "session.json";

/// Longest token lifetime accepted from configuration
const MAX_TOKEN_TTL_DAYS: i64 = 3650;

/// Connection settings shared by every subcommand
#[derive(Args, Debug, Clone)]
pub struct CliArgs {
    /// Base URL of the habit tracker API
    #[arg(short = 'u', long, env = "API_URL")]
    pub api_url: Option<String>,

    /// Path of the credential store file
    #[arg(short = 's', long, env = "TOKEN_STORE")]
    pub token_store: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format (text, json)
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "30")]
    pub http_timeout: u64,

    /// How concurrent 401s share refresh exchanges (per-request, single-flight)
    #[arg(long, env = "REFRESH_POLICY", default_value = "per-request")]
    pub refresh_policy: String,

    /// Theme used when neither a saved nor an account preference exists
    #[arg(long, env = "SYSTEM_THEME", default_value = "light")]
    pub system_theme: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    // Service
    pub api_url: String,

    // Credentials
    pub token_store_path: PathBuf,
    pub access_token_ttl_days: i64,
    pub refresh_token_ttl_days: i64,
    pub refresh_policy: RefreshPolicy,

    // HTTP client
    pub http_max_connections: usize,
    pub http_connect_timeout: u64,
    pub http_request_timeout: u64,

    // Presentation
    pub system_theme: Theme,
    pub log_level: String,
    pub log_json: bool,
}

impl Config {
    /// Build configuration with priority: CLI > ENV (.env included) > defaults
    pub fn load(args: CliArgs) -> Result<Self> {
        let token_store_path = match args.token_store {
            Some(path) => expand_tilde(&path),
            None => default_store_path()?,
        };

        let config = Config {
            api_url: args
                .api_url
                .map(|url| url.trim_end_matches('/').to_string())
                .context("API_URL is required (use -u or set API_URL env var)")?,

            token_store_path,

            access_token_ttl_days: env_or("ACCESS_TOKEN_TTL_DAYS", 1),
            refresh_token_ttl_days: env_or("REFRESH_TOKEN_TTL_DAYS", 30),
            refresh_policy: RefreshPolicy::parse(&args.refresh_policy),

            http_max_connections: env_or("HTTP_MAX_CONNECTIONS", 10),
            http_connect_timeout: env_or("HTTP_CONNECT_TIMEOUT", 10),
            http_request_timeout: args.http_timeout,

            system_theme: args.system_theme.parse().unwrap_or_default(),
            log_level: args.log_level,
            log_json: args.log_format.eq_ignore_ascii_case("json"),
        };

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.api_url)
            .with_context(|| format!("API_URL is not a valid URL: {}", self.api_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("API_URL must use http or https: {}", self.api_url);
        }

        for (name, days) in [
            ("ACCESS_TOKEN_TTL_DAYS", self.access_token_ttl_days),
            ("REFRESH_TOKEN_TTL_DAYS", self.refresh_token_ttl_days),
        ] {
            if !(1..=MAX_TOKEN_TTL_DAYS).contains(&days) {
                anyhow::bail!(
                    "{} must be between 1 and {} days, got {}",
                    name,
                    MAX_TOKEN_TTL_DAYS,
                    days
                );
            }
        }

        if self.http_request_timeout == 0 {
            anyhow::bail!("HTTP_REQUEST_TIMEOUT must be greater than zero");
        }

        Ok(())
    }

    pub fn access_token_ttl(&self) -> Duration {
        Duration::days(self.access_token_ttl_days)
    }

    pub fn refresh_token_ttl(&self) -> Duration {
        Duration::days(self.refresh_token_ttl_days)
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn default_store_path() -> Result<PathBuf> {
    let cache_dir = dirs::cache_dir().context("Could not find cache directory")?;
    Ok(cache_dir.join(APP_NAME).join(STORE_FILE))
}

/// Expand tilde (~) in file paths to user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            api_url: "http://localhost:5000/api".to_string(),
            token_store_path: PathBuf::from("/tmp/session.json"),
            access_token_ttl_days: 1,
            refresh_token_ttl_days: 30,
            refresh_policy: RefreshPolicy::PerRequest,
            http_max_connections: 10,
            http_connect_timeout: 10,
            http_request_timeout: 30,
            system_theme: Theme::Light,
            log_level: "info".to_string(),
            log_json: false,
        }
    }

    fn test_args() -> CliArgs {
        CliArgs {
            api_url: Some("https://habits.example.com/api/".to_string()),
            token_store: Some("/tmp/tokens.json".to_string()),
            log_level: "debug".to_string(),
            log_format: "json".to_string(),
            http_timeout: 15,
            refresh_policy: "single-flight".to_string(),
            system_theme: "dark".to_string(),
        }
    }

    #[test]
    fn test_expand_tilde() {
        let path = expand_tilde("~/test/file.txt");
        assert!(path.to_string_lossy().contains("test/file.txt"));
        assert!(!path.to_string_lossy().starts_with("~"));

        let path = expand_tilde("/absolute/path");
        assert_eq!(path, PathBuf::from("/absolute/path"));
    }

    #[test]
    fn test_expand_tilde_just_tilde() {
        // Just "~" without slash should not expand
        let path = expand_tilde("~");
        assert_eq!(path, PathBuf::from("~"));
    }

    #[test]
    fn test_load_from_args() {
        let config = Config::load(test_args()).unwrap();
        assert_eq!(config.api_url, "https://habits.example.com/api");
        assert_eq!(config.token_store_path, PathBuf::from("/tmp/tokens.json"));
        assert_eq!(config.refresh_policy, RefreshPolicy::SingleFlight);
        assert_eq!(config.system_theme, Theme::Dark);
        assert_eq!(config.http_request_timeout, 15);
        assert_eq!(config.log_level, "debug");
        assert!(config.log_json);
    }

    #[test]
    fn test_load_requires_api_url() {
        let mut args = test_args();
        args.api_url = None;
        let err = Config::load(args).unwrap_err();
        assert!(err.to_string().contains("API_URL is required"));
    }

    #[test]
    fn test_unknown_system_theme_defaults_to_light() {
        let mut args = test_args();
        args.system_theme = "neon".to_string();
        assert_eq!(Config::load(args).unwrap().system_theme, Theme::Light);
    }

    #[test]
    fn test_validate() {
        assert!(test_config().validate().is_ok());

        let mut config = test_config();
        config.api_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());

        let mut config = test_config();
        config.api_url = "not a url".to_string();
        assert!(config.validate().is_err());

        let mut config = test_config();
        config.refresh_token_ttl_days = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_oversized_token_lifetimes() {
        let mut config = test_config();
        config.access_token_ttl_days = 1_000_000_000;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ACCESS_TOKEN_TTL_DAYS"));

        let mut config = test_config();
        config.refresh_token_ttl_days = MAX_TOKEN_TTL_DAYS + 1;
        assert!(config.validate().is_err());

        let mut config = test_config();
        config.refresh_token_ttl_days = MAX_TOKEN_TTL_DAYS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_token_ttls() {
        let config = test_config();
        assert_eq!(config.access_token_ttl(), Duration::days(1));
        assert_eq!(config.refresh_token_ttl(), Duration::days(30));
    }
}
