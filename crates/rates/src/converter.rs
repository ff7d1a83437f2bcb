use bepp_core::CanonicalTransaction;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::source::RateSource;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversionReport {
    /// Rows rewritten into the reporting currency.
    pub converted: usize,
    /// Foreign rows left as they were because no rate was found.
    pub unconverted: usize,
    /// Calls made to the rate source.
    pub lookups: usize,
}

impl ConversionReport {
    pub fn absorb(&mut self, other: ConversionReport) {
        self.converted += other.converted;
        self.unconverted += other.unconverted;
        self.lookups += other.lookups;
    }
}

/// Converts amounts into a single reporting currency.
///
/// Lookups are memoized per `(currency, date)` for the converter's lifetime,
/// failed ones included.
pub struct CurrencyConverter<'a> {
    source: &'a dyn RateSource,
    reporting: String,
    cache: HashMap<(String, NaiveDate), Option<Decimal>>,
}

impl<'a> CurrencyConverter<'a> {
    pub fn new(source: &'a dyn RateSource, reporting: &str) -> Self {
        Self {
            source,
            reporting: reporting.to_uppercase(),
            cache: HashMap::new(),
        }
    }

    pub fn reporting(&self) -> &str {
        &self.reporting
    }

    /// Rewrites every foreign-currency row in place: the amount becomes
    /// `amount * rate` rounded half-even to cents, the currency the reporting
    /// code. Rows without a rate are logged and kept unchanged.
    pub fn convert_all(&mut self, transactions: &mut [CanonicalTransaction]) -> ConversionReport {
        let mut report = ConversionReport::default();
        for tx in transactions.iter_mut() {
            if tx.is_in(&self.reporting) {
                continue;
            }
            let currency = tx.currency.to_uppercase();
            let key = (currency.clone(), tx.date);
            let rate = match self.cache.get(&key) {
                Some(cached) => *cached,
                None => {
                    report.lookups += 1;
                    let looked_up = match self.source.rate(&currency, &self.reporting, tx.date) {
                        Ok(rate) => Some(rate),
                        Err(e) => {
                            tracing::warn!(%currency, date = %tx.date, "no exchange rate: {e}");
                            None
                        }
                    };
                    self.cache.insert(key, looked_up);
                    looked_up
                }
            };

            match rate {
                Some(rate) => {
                    tx.amount = (tx.amount * rate).round_cents();
                    tx.currency = self.reporting.clone();
                    report.converted += 1;
                }
                None => report.unconverted += 1,
            }
        }
        report
    }
}
