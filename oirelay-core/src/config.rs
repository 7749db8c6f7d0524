//! # Relay configuration
//!
//! Read once at startup from the environment and never mutated afterwards.
//! The assistant receives a shared reference instead of having fields patched
//! on it.

use crate::error::{Error, Result};
use crate::provider::ProviderConfig;

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_MAX_BUDGET: f64 = 100.0;
pub const DEFAULT_EXECUTABLE: &str = "python3";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub const ENV_MODEL: &str = "MODEL";
pub const ENV_MAX_BUDGET: &str = "MAX_BUDGET";
/// Older launchers export the budget under this name.
pub const ENV_BUDGET_ALIAS: &str = "BUDGET";
pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_BASE_URL: &str = "OPENAI_BASE_URL";

/// Appended to the system message when running unattended.
pub const UNATTENDED_GUIDANCE: &str = "If using pip, be sure to invoke with `python3 -m pip` instead of `pip`.\nAlways say something before you run some code describing what you will do, even if it seems trivial.";

/// Startup profile of the relay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RelayVariant {
    /// Generated code waits for confirmation (never runs on its own)
    #[default]
    Interactive,
    /// Generated code runs immediately; the system message carries extra guidance
    Unattended,
}

impl RelayVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelayVariant::Interactive => "interactive",
            RelayVariant::Unattended => "unattended",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelayConfig {
    pub variant: RelayVariant,
    /// Model identifier passed to the provider
    pub model: String,
    /// Spending ceiling in USD
    pub max_budget: f64,
    /// Execute generated code without asking
    pub auto_run: bool,
    /// Interpreter used for Python code, when the default must be replaced
    pub executable_override: Option<String>,
    /// Extra instructions appended to the system message
    pub system_message_suffix: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

impl RelayConfig {
    /// Build the configuration from the process environment.
    pub fn from_env(variant: RelayVariant) -> Result<Self> {
        Self::from_lookup(variant, |key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(variant: RelayVariant, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let model = lookup(ENV_MODEL).unwrap_or_else(|| DEFAULT_MODEL.to_string());
        if model.trim().is_empty() {
            return Err(Error::config_invalid(ENV_MODEL, "model identifier is empty")
                .with_operation("config::from_env"));
        }

        let max_budget = match (lookup(ENV_MAX_BUDGET), lookup(ENV_BUDGET_ALIAS)) {
            (Some(raw), _) => parse_budget(ENV_MAX_BUDGET, &raw)?,
            (None, Some(raw)) => parse_budget(ENV_BUDGET_ALIAS, &raw)?,
            (None, None) => DEFAULT_MAX_BUDGET,
        };

        let (auto_run, executable_override, system_message_suffix) = match variant {
            RelayVariant::Interactive => (false, None, None),
            RelayVariant::Unattended => (
                true,
                Some(DEFAULT_EXECUTABLE.to_string()),
                Some(UNATTENDED_GUIDANCE.to_string()),
            ),
        };

        Ok(Self {
            variant,
            model,
            max_budget,
            auto_run,
            executable_override,
            system_message_suffix,
            api_key: lookup(ENV_API_KEY).filter(|k| !k.is_empty()),
            base_url: lookup(ENV_BASE_URL).filter(|u| !u.is_empty()),
        })
    }

    /// Interpreter used to run Python code
    pub fn executable(&self) -> &str {
        self.executable_override.as_deref().unwrap_or(DEFAULT_EXECUTABLE)
    }

    /// Provider settings derived from this configuration
    pub fn provider_config(&self) -> ProviderConfig {
        let mut config = ProviderConfig::openai(self.api_key.clone().unwrap_or_default())
            .with_model(self.model.clone());
        if let Some(url) = &self.base_url {
            config = config.with_base_url(url.trim_end_matches('/'));
        }
        config
    }
}

fn parse_budget(key: &'static str, raw: &str) -> Result<f64> {
    let value: f64 = raw.trim().parse().map_err(|e| {
        Error::config_invalid(key, format!("'{}' is not a number", raw))
            .with_operation("config::from_env")
            .set_source(e)
    })?;

    if !value.is_finite() || value < 0.0 {
        return Err(Error::config_invalid(key, format!("'{}' must be a non-negative amount", raw))
            .with_operation("config::from_env"));
    }
    Ok(value)
}
