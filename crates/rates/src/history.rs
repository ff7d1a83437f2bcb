use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use crate::source::{FallbackPolicy, RateError, RateSource};

/// Daily reference rates of many currencies against one base currency.
///
/// Rates are stored as units of the currency per one unit of the base, the
/// way the ECB publishes them. Cross rates go through the base.
#[derive(Debug, Clone)]
pub struct RateHistory {
    base: String,
    series: HashMap<String, BTreeMap<NaiveDate, Decimal>>,
    policy: FallbackPolicy,
}

impl RateHistory {
    pub fn new(base: &str, policy: FallbackPolicy) -> Self {
        Self {
            base: base.to_uppercase(),
            series: HashMap::new(),
            policy,
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn policy(&self) -> FallbackPolicy {
        self.policy
    }

    pub fn insert(&mut self, currency: &str, date: NaiveDate, per_base: Decimal) {
        self.series
            .entry(currency.to_uppercase())
            .or_default()
            .insert(date, per_base);
    }

    /// Known currencies, base excluded, sorted.
    pub fn currencies(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self.series.keys().map(String::as_str).collect();
        out.sort_unstable();
        out
    }

    pub fn is_empty(&self) -> bool {
        self.series.values().all(BTreeMap::is_empty)
    }

    /// Parses the ECB historical reference-rate file (`eurofxref-hist.csv`):
    /// one `Date` column followed by one column per currency.
    pub fn from_ecb_csv<R: Read>(data: R, policy: FallbackPolicy) -> Result<Self, RateError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(data);

        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        if !headers
            .first()
            .is_some_and(|h| h.eq_ignore_ascii_case("date"))
        {
            return Err(RateError::Parse("expected a leading Date column".to_string()));
        }

        let mut history = Self::new("EUR", policy);
        for result in reader.records() {
            let record = result?;
            let Some(date_field) = record.get(0).filter(|s| !s.is_empty()) else {
                continue;
            };
            let date = parse_date(date_field)?;
            for (idx, currency) in headers.iter().enumerate().skip(1) {
                if currency.is_empty() {
                    continue;
                }
                let Some(value) = record.get(idx) else {
                    continue;
                };
                if value.is_empty() || value.eq_ignore_ascii_case("N/A") {
                    continue;
                }
                history.insert(currency, date, parse_rate(value)?);
            }
        }
        Ok(history)
    }

    /// Adds the observations of an ECB data-API CSV response
    /// (`format=csvdata`). Returns how many observations were read.
    pub fn merge_sdmx_csv<R: Read>(&mut self, data: R) -> Result<usize, RateError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(data);

        let headers = reader.headers()?.clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h.eq_ignore_ascii_case(name))
                .ok_or_else(|| RateError::Parse(format!("missing {name} column")))
        };
        let currency_col = column("CURRENCY")?;
        let date_col = column("TIME_PERIOD")?;
        let value_col = column("OBS_VALUE")?;
        let denom_col = column("CURRENCY_DENOM").ok();

        let mut read = 0;
        for result in reader.records() {
            let record = result?;
            if let Some(denom) = denom_col.and_then(|c| record.get(c)) {
                if !denom.eq_ignore_ascii_case(&self.base) {
                    continue;
                }
            }
            let (Some(currency), Some(date), Some(value)) = (
                record.get(currency_col),
                record.get(date_col),
                record.get(value_col),
            ) else {
                continue;
            };
            if value.is_empty() || value.eq_ignore_ascii_case("NaN") {
                continue;
            }
            self.insert(currency, parse_date(date)?, parse_rate(value)?);
            read += 1;
        }
        Ok(read)
    }

    /// Loads a local rate file in either ECB layout.
    pub fn load(path: &Path, policy: FallbackPolicy) -> Result<Self, RateError> {
        let content = std::fs::read_to_string(path).map_err(|source| RateError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let first_line = content.lines().next().unwrap_or_default();
        let history = if first_line.contains("TIME_PERIOD") {
            let mut history = Self::new("EUR", policy);
            history.merge_sdmx_csv(content.as_bytes())?;
            history
        } else {
            Self::from_ecb_csv(content.as_bytes(), policy)?
        };
        tracing::info!(
            path = %path.display(),
            currencies = history.series.len(),
            "loaded exchange rates"
        );
        Ok(history)
    }

    /// Units of `currency` per one unit of the base on `date`.
    fn per_base(&self, currency: &str, date: NaiveDate) -> Result<Decimal, RateError> {
        let currency = currency.to_uppercase();
        if currency == self.base {
            return Ok(Decimal::ONE);
        }
        let series = self
            .series
            .get(&currency)
            .ok_or_else(|| RateError::UnknownCurrency(currency.clone()))?;
        lookup(series, date, self.policy).ok_or(RateError::NoRate { currency, date })
    }
}

impl RateSource for RateHistory {
    fn rate(&self, from: &str, to: &str, date: NaiveDate) -> Result<Decimal, RateError> {
        if from.eq_ignore_ascii_case(to) {
            return Ok(Decimal::ONE);
        }
        let from_rate = self.per_base(from, date)?;
        let to_rate = self.per_base(to, date)?;
        to_rate
            .checked_div(from_rate)
            .ok_or_else(|| RateError::Parse(format!("zero rate for {from} on {date}")))
    }
}

fn lookup(
    series: &BTreeMap<NaiveDate, Decimal>,
    date: NaiveDate,
    policy: FallbackPolicy,
) -> Option<Decimal> {
    if let Some(rate) = series.get(&date) {
        return Some(*rate);
    }
    let prior = series.range(..date).next_back();
    let next = series.range(date..).next();
    match policy {
        FallbackPolicy::Exact => None,
        FallbackPolicy::MostRecentPrior => prior.map(|(_, r)| *r),
        FallbackPolicy::Nearest => match (prior, next) {
            (Some((pd, pr)), Some((nd, nr))) => {
                if (date - *pd) <= (*nd - date) {
                    Some(*pr)
                } else {
                    Some(*nr)
                }
            }
            (Some((_, r)), None) | (None, Some((_, r))) => Some(*r),
            (None, None) => None,
        },
        FallbackPolicy::Interpolate => match (prior, next) {
            (Some((pd, pr)), Some((nd, nr))) => {
                let span = Decimal::from((*nd - *pd).num_days());
                let offset = Decimal::from((date - *pd).num_days());
                Some(*pr + (*nr - *pr) * offset / span)
            }
            (Some((_, r)), None) | (None, Some((_, r))) => Some(*r),
            (None, None) => None,
        },
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, RateError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| RateError::Parse(format!("invalid date '{s}'")))
}

fn parse_rate(s: &str) -> Result<Decimal, RateError> {
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .map_err(|_| RateError::Parse(format!("invalid rate '{s}'")))
}
