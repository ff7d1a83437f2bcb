use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::money::Money;

/// Which export a transaction came from.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Bank statement spreadsheet with debit/credit columns.
    #[default]
    Ledger,
    /// Payment platform CSV with gross amount and payee.
    Payment,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Ledger => write!(f, "ledger"),
            Source::Payment => write!(f, "payment"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalTransaction {
    pub date: NaiveDate,
    pub amount: Money,
    pub currency: String,
    pub note: String,
    #[serde(skip)]
    pub source: Source,
}

impl CanonicalTransaction {
    pub fn new(
        date: NaiveDate,
        amount: Money,
        currency: impl Into<String>,
        note: impl Into<String>,
        source: Source,
    ) -> Self {
        CanonicalTransaction {
            date,
            amount,
            currency: currency.into(),
            note: note.into(),
            source,
        }
    }

    pub fn is_in(&self, currency: &str) -> bool {
        self.currency.eq_ignore_ascii_case(currency)
    }
}
