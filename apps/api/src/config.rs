//! API configuration module.
//!
//! Configuration is loaded from environment variables with fallback to
//! defaults.

use std::env;

use meridian_core::TaxRate;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// HTTP listen port
    pub http_port: u16,

    /// Path to the SQLite database file
    pub database_path: String,

    /// Maximum database connections in the pool
    pub db_max_connections: u32,

    /// Redis connection string for cache invalidation (optional)
    pub redis_url: Option<String>,

    /// Sales tax rate in basis points (825 = 8.25%)
    pub tax_rate_bps: u32,
}

impl ApiConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let config = ApiConfig {
            http_port: env::var("HTTP_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("HTTP_PORT".to_string()))?,

            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "./meridian.db".to_string()),

            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()))?,

            redis_url: env::var("REDIS_URL").ok(),

            tax_rate_bps: env::var("TAX_RATE_BPS")
                .unwrap_or_else(|_| "0".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("TAX_RATE_BPS".to_string()))?,
        };

        // Rates above 100% are configuration mistakes, not policies
        if config.tax_rate_bps > 10_000 {
            return Err(ConfigError::InvalidValue("TAX_RATE_BPS".to_string()));
        }

        Ok(config)
    }

    /// Returns the configured tax rate.
    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.tax_rate_bps)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tax_rate_conversion() {
        let config = ApiConfig {
            http_port: 8080,
            database_path: "./test.db".to_string(),
            db_max_connections: 5,
            redis_url: None,
            tax_rate_bps: 825,
        };
        assert_eq!(config.tax_rate().bps(), 825);
    }
}
