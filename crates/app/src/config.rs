use bepp_import::{DedupStage, LedgerFormat, PaymentFormat};
use bepp_rates::FallbackPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Invalid config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid reporting currency '{0}'")]
    ReportingCurrency(String),
}

/// Everything that shapes a run. Every field has a default, so an empty file
/// is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Drop ledger rows that duplicate payment-platform rows.
    pub remove_duplicates: bool,
    /// Case-insensitive substring that marks such a ledger row.
    pub duplicate_marker: String,
    pub dedup_stage: DedupStage,
    pub convert_currency: bool,
    pub reporting_currency: String,
    pub rate_fallback: FallbackPolicy,
    /// Replaces the built-in narration rules.
    pub rules_file: Option<PathBuf>,
    pub ledger: LedgerFormat,
    pub payment: PaymentFormat,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            remove_duplicates: true,
            duplicate_marker: "PayPal".to_string(),
            dedup_stage: DedupStage::Raw,
            convert_currency: false,
            reporting_currency: "EUR".to_string(),
            rate_fallback: FallbackPolicy::MostRecentPrior,
            rules_file: None,
            ledger: LedgerFormat::default(),
            payment: PaymentFormat::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml(&content)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Checks and canonicalizes the reporting currency code.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        let code = self.reporting_currency.trim().to_uppercase();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ConfigError::ReportingCurrency(self.reporting_currency));
        }
        self.reporting_currency = code;
        Ok(self)
    }
}
