// src/config.rs
use std::env;

use crate::models::PasswordPolicy;

/// Crate configuration. Loaded from the environment by the embedding
/// application; every field has a working default for local use.
#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub database_url: String,

    // Encryption of at-rest secret fields
    pub field_secret: String,

    // Password generation
    pub default_policy: PasswordPolicy,
    pub manual_reset_policy: PasswordPolicy,

    // Suggestion generation gives up after `count * suggestion_attempt_factor`
    // attempts when the policy space is too small to produce unique values.
    pub suggestion_attempt_factor: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite:./data/resetvault.db".to_string(),
            field_secret: "resetvault-dev-secret".to_string(),
            default_policy: PasswordPolicy::default(),
            manual_reset_policy: PasswordPolicy::manual_reset(),
            suggestion_attempt_factor: 10,
        }
    }
}

impl Config {
    /// Build a config from `RESETVAULT_*` environment variables, falling
    /// back to defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let mut config = Config::default();

        if let Ok(url) = env::var("RESETVAULT_DATABASE_URL") {
            config.database_url = url;
        }

        if let Ok(secret) = env::var("RESETVAULT_FIELD_SECRET") {
            config.field_secret = secret;
        }

        if let Ok(length) = env::var("RESETVAULT_PASSWORD_LENGTH") {
            if let Ok(length) = length.parse::<usize>() {
                config.default_policy.length = length;
            }
        }

        if let Ok(exclude) = env::var("RESETVAULT_EXCLUDE_SIMILAR") {
            config.default_policy.exclude_similar = exclude == "1" || exclude == "true";
        }

        config
    }
}
