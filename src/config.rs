use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment};
use secrecy::SecretString;
use serde::Deserialize;

/// Runtime configuration, sourced from the environment. Must load cleanly
/// before any sync attempt is made.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Remote API root, e.g. `https://api.bitbucket.org/2.0`.
    pub bitbucket_url: String,
    /// Team / workspace whose repositories are mirrored.
    pub bitbucket_team: String,
    pub bitbucket_username: String,
    pub bitbucket_app_password: SecretString,
}

impl Config {
    pub fn load() -> Result<Self> {
        #[cfg(debug_assertions)]
        dotenvy::from_filename(".env.local").ok();

        let config = ConfigBuilder::builder()
            .add_source(Environment::default().separator("__"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}
