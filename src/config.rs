//! Server configuration module
//! Handles dynamic configuration parameters for the arena server

use crate::constants::{
    DEFAULT_HOST, DEFAULT_LEADERBOARD_SIZE, DEFAULT_MATCH_BASE_RANGE, DEFAULT_MATCH_INTERVAL_SECS,
    DEFAULT_MATCH_WIDEN_RATE, DEFAULT_MESSAGE_BUFFER_SIZE, DEFAULT_PORT, DEFAULT_RATING,
    DEFAULT_TOKEN_TTL_HOURS,
};
use crate::core::matchmaker::MatchPolicy;
use crate::error::{ArenaError, Result};
use std::env;
use std::time::Duration;

/// Server configuration parameters
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// JWT secret for token signing/validation
    pub jwt_secret: String,
    /// Lifetime of issued identity tokens
    pub token_ttl_hours: u64,
    /// Capacity of each connection's outbound buffer
    pub message_buffer_size: usize,
    /// Pause between two matchmaking passes
    pub match_interval: Duration,
    /// Rating gap accepted for a ticket that has not waited at all
    pub match_base_range: i32,
    /// Extra rating gap accepted per second waited
    pub match_widen_rate: f64,
    /// Rating given to newly registered players
    pub default_rating: i32,
    /// Number of entries returned by the leaderboard
    pub leaderboard_size: usize,
}

impl ServerConfig {
    /// Create a test configuration - DANGEROUS: Only for testing!
    #[cfg(test)]
    pub fn for_testing() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            jwt_secret: "unit-tests-only-0b7e9c4d2f1a8e6b3c5d7f9a1b3c5e7f".to_string(),
            token_ttl_hours: DEFAULT_TOKEN_TTL_HOURS,
            message_buffer_size: DEFAULT_MESSAGE_BUFFER_SIZE,
            match_interval: Duration::from_secs(DEFAULT_MATCH_INTERVAL_SECS),
            match_base_range: DEFAULT_MATCH_BASE_RANGE,
            match_widen_rate: DEFAULT_MATCH_WIDEN_RATE,
            default_rating: DEFAULT_RATING,
            leaderboard_size: DEFAULT_LEADERBOARD_SIZE,
        }
    }

    /// Validate that a secret meets security requirements
    fn validate_jwt_secret(secret: &str) -> Result<()> {
        if secret.len() < 32 {
            return Err(ArenaError::ConfigError(
                "JWT secret must be at least 32 characters long".to_string(),
            ));
        }

        // Check for insecure default or example values
        let insecure_patterns = ["your-secret-key", "change-this", "default", "password", "12345"];

        for pattern in &insecure_patterns {
            if secret.contains(pattern) {
                return Err(ArenaError::ConfigError(format!(
                    "JWT secret contains insecure pattern '{}'. Generate one with: openssl rand -base64 32",
                    pattern
                )));
            }
        }

        if secret.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ArenaError::ConfigError(
                "JWT secret should contain mixed characters (letters, numbers, symbols)".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_match_range(base_range: i32, widen_rate: f64) -> Result<()> {
        if !widen_rate.is_finite() {
            return Err(ArenaError::ConfigError(
                "ARENA_MATCH_WIDEN_RATE must be a finite number".to_string(),
            ));
        }
        if base_range < 0 || widen_rate < 0.0 {
            return Err(ArenaError::ConfigError(
                "Matchmaking range settings cannot be negative".to_string(),
            ));
        }
        Ok(())
    }

    fn parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
        env::var(key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Load configuration from environment variables if available
    pub fn from_env() -> Result<Self> {
        let host = env::var("ARENA_HOST").unwrap_or(DEFAULT_HOST.to_string());
        let port = Self::parsed("ARENA_PORT", DEFAULT_PORT);

        let jwt_secret = env::var("ARENA_JWT_SECRET")
            .or_else(|_| env::var("JWT_SECRET"))
            .map_err(|_| {
                ArenaError::ConfigError(
                    "ARENA_JWT_SECRET environment variable is required. \
                     Generate one with: openssl rand -base64 32"
                        .to_string(),
                )
            })?;
        Self::validate_jwt_secret(&jwt_secret)?;

        let token_ttl_hours = Self::parsed("ARENA_TOKEN_TTL_HOURS", DEFAULT_TOKEN_TTL_HOURS);
        let message_buffer_size = Self::parsed("ARENA_MESSAGE_BUFFER", DEFAULT_MESSAGE_BUFFER_SIZE);
        let interval_secs = Self::parsed("ARENA_MATCH_INTERVAL_SECS", DEFAULT_MATCH_INTERVAL_SECS);
        let match_base_range = Self::parsed("ARENA_MATCH_BASE_RANGE", DEFAULT_MATCH_BASE_RANGE);
        let match_widen_rate = Self::parsed("ARENA_MATCH_WIDEN_RATE", DEFAULT_MATCH_WIDEN_RATE);
        let default_rating = Self::parsed("ARENA_DEFAULT_RATING", DEFAULT_RATING);
        let leaderboard_size = Self::parsed("ARENA_LEADERBOARD_SIZE", DEFAULT_LEADERBOARD_SIZE);

        if message_buffer_size == 0 {
            return Err(ArenaError::ConfigError(
                "ARENA_MESSAGE_BUFFER must be greater than zero".to_string(),
            ));
        }
        if interval_secs == 0 {
            return Err(ArenaError::ConfigError(
                "ARENA_MATCH_INTERVAL_SECS must be greater than zero".to_string(),
            ));
        }
        Self::validate_match_range(match_base_range, match_widen_rate)?;

        Ok(Self {
            host,
            port,
            jwt_secret,
            token_ttl_hours,
            message_buffer_size,
            match_interval: Duration::from_secs(interval_secs),
            match_base_range,
            match_widen_rate,
            default_rating,
            leaderboard_size,
        })
    }

    /// Matchmaking settings derived from this configuration
    pub fn match_policy(&self) -> MatchPolicy {
        MatchPolicy {
            base_range: self.match_base_range,
            widen_rate: self.match_widen_rate,
            interval: self.match_interval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_testing_uses_defaults() {
        let config = ServerConfig::for_testing();
        assert_eq!(config.message_buffer_size, 256);
        assert_eq!(config.match_interval, Duration::from_secs(3));
        assert_eq!(config.default_rating, 500);
        assert!(ServerConfig::validate_jwt_secret(&config.jwt_secret).is_ok());
    }

    #[test]
    fn test_weak_secrets_rejected() {
        assert!(ServerConfig::validate_jwt_secret("short").is_err());
        assert!(ServerConfig::validate_jwt_secret("abcdefghijklmnopqrstuvwxyzabcdefgh").is_err());
        assert!(
            ServerConfig::validate_jwt_secret("change-this-0123456789-0123456789-xyz").is_err()
        );
    }

    #[test]
    fn test_match_range_settings_validated() {
        assert!(ServerConfig::validate_match_range(50, 5.0).is_ok());
        assert!(ServerConfig::validate_match_range(0, 0.0).is_ok());
        assert!(ServerConfig::validate_match_range(-1, 5.0).is_err());
        assert!(ServerConfig::validate_match_range(50, -0.5).is_err());

        let inf: f64 = "inf".parse().unwrap();
        let nan: f64 = "NaN".parse().unwrap();
        assert!(ServerConfig::validate_match_range(50, inf).is_err());
        assert!(ServerConfig::validate_match_range(50, nan).is_err());
    }

    #[test]
    fn test_match_policy_from_config() {
        let policy = ServerConfig::for_testing().match_policy();
        assert_eq!(policy.base_range, 50);
        assert_eq!(policy.widen_rate, 5.0);
    }
}
