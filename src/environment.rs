//! # Application Environment
//!
//! The environment selects which `config/<env>.yaml` file is loaded. It comes
//! from the `--environment` flag, then `INFERENCE_ENV`, and falls back to
//! `development`.
use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{config::Config, Result};

pub const DEFAULT_ENVIRONMENT: &str = "development";
pub const ENV_VAR: &str = "INFERENCE_ENV";

/// Resolves the environment name from `INFERENCE_ENV` or the default.
#[must_use]
pub fn resolve_from_env() -> String {
    std::env::var(ENV_VAR).unwrap_or_else(|_| DEFAULT_ENVIRONMENT.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Environment {
    #[serde(rename = "production")]
    Production,
    #[default]
    #[serde(rename = "development")]
    Development,
    #[serde(rename = "test")]
    Test,
    Any(String),
}

impl Environment {
    /// Loads the configuration of this environment.
    ///
    /// # Errors
    ///
    /// Returns error when the configuration file cannot be loaded.
    pub fn load(&self) -> Result<Config> {
        Config::new(self)
    }
}

impl From<String> for Environment {
    fn from(env: String) -> Self {
        Self::from_str(&env).unwrap_or(Self::Any(env))
    }
}

impl FromStr for Environment {
    type Err = &'static str;

    fn from_str(input: &str) -> std::result::Result<Self, Self::Err> {
        match input {
            "production" => Ok(Self::Production),
            "development" => Ok(Self::Development),
            "test" => Ok(Self::Test),
            s => Ok(Self::Any(s.to_string())),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Production => "production".fmt(f),
            Self::Development => "development".fmt(f),
            Self::Test => "test".fmt(f),
            Self::Any(s) => s.fmt(f),
        }
    }
}
