use chrono::NaiveDate;
use reqwest::{Client, ClientBuilder};
use std::time::Duration;

use crate::history::RateHistory;
use crate::source::{FallbackPolicy, RateError};

pub const ECB_DATA_API: &str = "https://data-api.ecb.europa.eu/service/data";

/// Downloads euro reference rates from the ECB data API.
pub struct EcbClient {
    client: Client,
    base_url: String,
}

impl EcbClient {
    pub fn new() -> Result<Self, RateError> {
        Self::with_base_url(ECB_DATA_API)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, RateError> {
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Daily series URL for one currency against the euro.
    pub fn series_url(&self, currency: &str, since: Option<NaiveDate>) -> String {
        let mut url = format!(
            "{base}/EXR/D.{cur}.EUR.SP00.A?format=csvdata",
            base = self.base_url,
            cur = currency.to_uppercase()
        );
        if let Some(since) = since {
            url.push_str(&format!("&startPeriod={}", since.format("%Y-%m-%d")));
        }
        url
    }

    /// Fetches each currency's series once and merges them into a single
    /// history. `since` limits the download to observations from that day on;
    /// pass a few days before the earliest transaction so fallbacks can reach
    /// back over weekends and holidays.
    pub async fn fetch(
        &self,
        currencies: &[String],
        since: Option<NaiveDate>,
        policy: FallbackPolicy,
    ) -> Result<RateHistory, RateError> {
        let mut history = RateHistory::new("EUR", policy);
        for currency in currencies {
            if currency.eq_ignore_ascii_case("EUR") {
                continue;
            }
            let url = self.series_url(currency, since);
            tracing::debug!(%url, "fetching reference rates");

            let res = self.client.get(&url).send().await?;
            let status = res.status();
            if !status.is_success() {
                return Err(RateError::Status {
                    currency: currency.to_uppercase(),
                    status: status.as_u16(),
                });
            }
            let body = res.text().await?;
            let read = history.merge_sdmx_csv(body.as_bytes())?;
            tracing::info!(currency = %currency, observations = read, "downloaded reference rates");
        }
        Ok(history)
    }
}
