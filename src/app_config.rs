//! Application configuration from file and environment variables
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Environment variables (prefixed with PALAVER_)
//! 2. Config file (config.toml)
//! 3. Default values
//!
//! Secrets like the database URL and session key stay in environment
//! variables, not in the config file.

use config::{Config, ConfigError, Environment, File};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// Global application configuration
pub static APP_CONFIG: Lazy<RwLock<AppConfig>> = Lazy::new(|| {
    RwLock::new(AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config file, using defaults: {}", e);
        AppConfig::default()
    }))
});

/// Site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub name: String,
    pub description: String,
    pub base_url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: "Palaver".to_string(),
            description: "A discussion board built in Rust".to_string(),
            base_url: "http://localhost:8080".to_string(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Worker thread count, 0 = one per core
    pub workers: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            workers: 0,
        }
    }
}

/// Content limits configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Articles per page on list views
    pub articles_per_page: u32,
    /// Notifications per page
    pub notifications_per_page: u32,
    /// Maximum article title length
    pub max_title_length: u32,
    /// Maximum article/reply body length
    pub max_content_length: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            articles_per_page: 50,
            notifications_per_page: 20,
            max_title_length: 80,
            max_content_length: 20000,
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Maximum pool connections
    pub max_connections: u32,
    /// Connect timeout in seconds
    pub connect_timeout_seconds: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            max_connections: 16,
            connect_timeout_seconds: 8,
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub site: SiteConfig,
    pub server: ServerConfig,
    pub limits: LimitsConfig,
    pub database: DatabaseConfig,
}

impl AppConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &str) -> Result<Self, ConfigError> {
        use config::FileFormat;

        let config = Config::builder()
            // Start with defaults
            .add_source(config::Config::try_from(&AppConfig::default())?)
            // Add config file (optional) - use from_file for full path support
            .add_source(File::new(path, FileFormat::Toml).required(false))
            // Override with environment variables (PALAVER_ prefix)
            // e.g., PALAVER_SITE_NAME, PALAVER_SERVER_PORT
            .add_source(
                Environment::with_prefix("PALAVER")
                    .separator("_")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Reload configuration from file
    pub fn reload() -> Result<(), ConfigError> {
        let new_config = Self::load()?;
        if let Ok(mut config) = APP_CONFIG.write() {
            *config = new_config;
            log::info!("Configuration reloaded");
        }
        Ok(())
    }
}

/// Initialize application configuration
///
/// This triggers the lazy loading of the config file and logs the result.
/// Should be called early in application startup.
pub fn init() {
    // Access the lazy static to trigger initialization
    let config = APP_CONFIG.read().expect("Configuration lock poisoned.");
    log::info!("Configuration loaded: site.name = {}", config.site.name);
}

// Convenience functions for accessing global config

/// Get the current application configuration
pub fn get_config() -> AppConfig {
    APP_CONFIG.read().map(|c| c.clone()).unwrap_or_default()
}

/// Get site configuration
pub fn site() -> SiteConfig {
    get_config().site
}

/// Get server configuration
pub fn server() -> ServerConfig {
    get_config().server
}

/// Get limits configuration
pub fn limits() -> LimitsConfig {
    get_config().limits
}

/// Get database configuration
pub fn database() -> DatabaseConfig {
    get_config().database
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.site.name, "Palaver");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.limits.articles_per_page, 50);
        assert_eq!(config.database.max_connections, 16);
    }

    #[test]
    #[serial]
    fn test_load_from_toml_file() {
        // Create a temporary config file
        let mut temp_file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[site]
name = "Test Board"
description = "A test board"
base_url = "https://test.example.com"

[server]
port = 9090

[limits]
articles_per_page = 25
"#
        )
        .unwrap();

        let config = AppConfig::load_from_path(temp_file.path().to_str().unwrap()).unwrap();

        assert_eq!(config.site.name, "Test Board");
        assert_eq!(config.site.base_url, "https://test.example.com");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.limits.articles_per_page, 25);
        // Defaults should still apply for unspecified values
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.limits.notifications_per_page, 20);
    }

    #[test]
    #[serial]
    fn test_missing_config_file_uses_defaults() {
        let config = AppConfig::load_from_path("/nonexistent/config.toml").unwrap();
        assert_eq!(config.site.name, "Palaver");
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    #[serial]
    fn test_env_overrides_file_and_defaults() {
        let mut temp_file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[site]
description = "From the file"

[server]
port = 9090
"#
        )
        .unwrap();

        std::env::set_var("PALAVER_SERVER_PORT", "7070");
        std::env::set_var("PALAVER_SITE_NAME", "Env Board");
        let config = AppConfig::load_from_path(temp_file.path().to_str().unwrap());
        std::env::remove_var("PALAVER_SERVER_PORT");
        std::env::remove_var("PALAVER_SITE_NAME");

        let config = config.unwrap();
        assert_eq!(config.server.port, 7070);
        assert_eq!(config.site.name, "Env Board");
        // File values not shadowed by the environment still win over defaults
        assert_eq!(config.site.description, "From the file");
    }
}
