use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RateError {
    #[error("Unknown currency: {0}")]
    UnknownCurrency(String),
    #[error("No {currency} rate for {date}")]
    NoRate { currency: String, date: NaiveDate },
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Rate service returned {status} for {currency}")]
    Status { currency: String, status: u16 },
    #[error("Malformed rate data: {0}")]
    Parse(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Cannot read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

/// What to do when no rate was published on the requested day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Only the requested day.
    Exact,
    /// Latest rate on or before the requested day.
    #[default]
    MostRecentPrior,
    /// Closest published day either side; ties go to the earlier day.
    Nearest,
    /// Linear interpolation between the surrounding days, nearest at the ends.
    Interpolate,
}

/// Historical exchange rates.
pub trait RateSource {
    /// Units of `to` per unit of `from` on `date`.
    fn rate(&self, from: &str, to: &str, date: NaiveDate) -> Result<Decimal, RateError>;
}

impl<T: RateSource + ?Sized> RateSource for &T {
    fn rate(&self, from: &str, to: &str, date: NaiveDate) -> Result<Decimal, RateError> {
        (**self).rate(from, to, date)
    }
}
