use anyhow::Context;
use bepp::{discover, Exporter, Pipeline, PipelineConfig};
use bepp_rates::{EcbClient, RateHistory};
use chrono::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;

/// Days of rates fetched before the earliest foreign transaction, so the
/// fallback can reach back over weekends and holidays.
const RATE_LOOKBACK_DAYS: i64 = 10;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "{}=info,bepp_import=info,bepp_rates=info",
                    env!("CARGO_CRATE_NAME")
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = cli::parse();

    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if args.keep_pp_dupes {
        config.remove_duplicates = false;
    }
    if args.convert {
        config.convert_currency = true;
    }
    if let Some(code) = &args.currency {
        config.reporting_currency = code.clone();
    }
    let config = config.validate().context("invalid settings")?;

    // ── Inputs ────────────────────────────────────────────────────────────────
    let input = discover(&args.directory)
        .with_context(|| format!("reading {}", args.directory.display()))?;
    for path in input.ledger_files.iter().chain(&input.payment_files) {
        println!("found {}", path.display());
    }

    let pipeline = Pipeline::new(config.clone()).context("preparing pipeline")?;
    let mut ingested = pipeline.ingest(&input).context("reading exports")?;

    // ── Currency conversion ───────────────────────────────────────────────────
    if config.convert_currency {
        let reporting = config.reporting_currency.as_str();
        let currencies = ingested.foreign_currencies(reporting);
        if currencies.is_empty() {
            tracing::info!(%reporting, "all transactions already in reporting currency");
        } else {
            let rates = match &args.rates {
                Some(path) => RateHistory::load(path, config.rate_fallback)
                    .with_context(|| format!("loading rates from {}", path.display()))?,
                None => {
                    let mut wanted = currencies.clone();
                    if !reporting.eq_ignore_ascii_case("EUR") {
                        wanted.push(reporting.to_string());
                    }
                    let since = ingested
                        .earliest_foreign_date(reporting)
                        .map(|d| d - Duration::days(RATE_LOOKBACK_DAYS));
                    EcbClient::new()?
                        .fetch(&wanted, since, config.rate_fallback)
                        .await
                        .context("downloading exchange rates")?
                }
            };
            ingested.convert(&rates, reporting);
        }
    }

    // ── Output ────────────────────────────────────────────────────────────────
    let exporter = Exporter::new(args.output_dir(), args.merge, args.backup);
    if args.dry_run {
        for path in exporter.planned_files() {
            println!("would write {}", path.display());
        }
    } else {
        for path in exporter.export(&ingested).context("writing results")? {
            println!("wrote {}", path.display());
        }
    }

    println!("{}", ingested.report);
    Ok(())
}
