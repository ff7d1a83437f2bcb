use bepp_core::{merge, sort_by_date_desc, CanonicalTransaction};
use bepp_import::{
    DedupStage, Deduplicator, DropCounts, FieldMapper, ImportError, LedgerReader,
    NarrationCascade, NarrationError, PaymentReader, RawTable,
};
use bepp_rates::{ConversionReport, CurrencyConverter, RateSource};
use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::config::PipelineConfig;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("No ledger export (.xls, .xlsx, .ods) found")]
    NoLedgerFiles,
    #[error("No payment export (.csv) found")]
    NoPaymentFiles,
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error(transparent)]
    Narration(#[from] NarrationError),
    #[error("Cannot read rules file {path}: {source}")]
    RulesFile {
        path: String,
        source: std::io::Error,
    },
}

/// Input files of one run, in discovery order.
#[derive(Debug, Clone, Default)]
pub struct PipelineInput {
    pub ledger_files: Vec<PathBuf>,
    pub payment_files: Vec<PathBuf>,
}

/// Counters collected along the way.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub ledger_rows: usize,
    pub payment_rows: usize,
    pub ledger_dropped: DropCounts,
    pub payment_dropped: DropCounts,
    pub duplicates_removed: usize,
    pub notes_normalized: usize,
    pub conversion: Option<ConversionReport>,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "ledger rows read: {}, dropped: {}",
            self.ledger_rows,
            self.ledger_dropped.total()
        )?;
        for (reason, n) in self.ledger_dropped.iter() {
            writeln!(f, "  {reason}: {n}")?;
        }
        writeln!(
            f,
            "payment rows read: {}, dropped: {}",
            self.payment_rows,
            self.payment_dropped.total()
        )?;
        for (reason, n) in self.payment_dropped.iter() {
            writeln!(f, "  {reason}: {n}")?;
        }
        writeln!(f, "duplicates removed: {}", self.duplicates_removed)?;
        write!(f, "notes normalized: {}", self.notes_normalized)?;
        if let Some(c) = &self.conversion {
            write!(
                f,
                "\nconverted: {}, left unconverted: {}, rate lookups: {}",
                c.converted, c.unconverted, c.lookups
            )?;
        }
        Ok(())
    }
}

/// Canonical rows of both sources, ready to convert and merge.
#[derive(Debug, Clone, Default)]
pub struct Ingested {
    pub ledger: Vec<CanonicalTransaction>,
    pub payment: Vec<CanonicalTransaction>,
    /// Source tables as read, for backups.
    pub ledger_raw: RawTable,
    pub payment_raw: RawTable,
    pub report: RunReport,
}

impl Ingested {
    /// Distinct currencies, other than `reporting`, that need a rate.
    pub fn foreign_currencies(&self, reporting: &str) -> Vec<String> {
        self.all()
            .filter(|tx| !tx.is_in(reporting))
            .map(|tx| tx.currency.to_uppercase())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Earliest date among rows not in `reporting`.
    pub fn earliest_foreign_date(&self, reporting: &str) -> Option<NaiveDate> {
        self.all()
            .filter(|tx| !tx.is_in(reporting))
            .map(|tx| tx.date)
            .min()
    }

    /// Converts both sources with one shared rate cache.
    pub fn convert(&mut self, source: &dyn RateSource, reporting: &str) -> ConversionReport {
        let mut converter = CurrencyConverter::new(source, reporting);
        let mut report = converter.convert_all(&mut self.ledger);
        report.absorb(converter.convert_all(&mut self.payment));
        tracing::info!(
            converted = report.converted,
            unconverted = report.unconverted,
            lookups = report.lookups,
            "currency conversion done"
        );
        self.report.conversion = Some(report);
        report
    }

    pub fn sorted_ledger(&self) -> Vec<CanonicalTransaction> {
        let mut out = self.ledger.clone();
        sort_by_date_desc(&mut out);
        out
    }

    pub fn sorted_payment(&self) -> Vec<CanonicalTransaction> {
        let mut out = self.payment.clone();
        sort_by_date_desc(&mut out);
        out
    }

    /// Ledger rows then payment rows, newest first, stable on ties.
    pub fn merge(&self) -> Vec<CanonicalTransaction> {
        merge(self.ledger.clone(), self.payment.clone())
    }

    fn all(&self) -> impl Iterator<Item = &CanonicalTransaction> {
        self.ledger.iter().chain(self.payment.iter())
    }
}

/// Read, map, deduplicate and normalize, configured once per run.
pub struct Pipeline {
    config: PipelineConfig,
    ledger_reader: LedgerReader,
    payment_reader: PaymentReader,
    mapper: FieldMapper,
    cascade: NarrationCascade,
    dedup: Option<Deduplicator>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        let cascade = match &config.rules_file {
            Some(path) => {
                let content =
                    std::fs::read_to_string(path).map_err(|source| PipelineError::RulesFile {
                        path: path.display().to_string(),
                        source,
                    })?;
                NarrationCascade::from_toml(&content)?
            }
            None => NarrationCascade::default_rules()?,
        };
        tracing::debug!(rules = cascade.len(), "narration rules ready");

        let dedup = config
            .remove_duplicates
            .then(|| Deduplicator::new(config.duplicate_marker.as_str()));

        Ok(Self {
            ledger_reader: LedgerReader::new(config.ledger.clone()),
            payment_reader: PaymentReader::new(config.payment.clone()),
            mapper: FieldMapper::new(config.ledger.clone(), config.payment.clone()),
            cascade,
            dedup,
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn ingest(&self, input: &PipelineInput) -> Result<Ingested, PipelineError> {
        if input.ledger_files.is_empty() {
            return Err(PipelineError::NoLedgerFiles);
        }
        if input.payment_files.is_empty() {
            return Err(PipelineError::NoPaymentFiles);
        }
        let ledger = self.ledger_reader.read_files(&input.ledger_files)?;
        let payment = self.payment_reader.read_files(&input.payment_files)?;
        self.process(ledger, payment)
    }

    /// Runs every stage after reading on tables already in memory.
    pub fn process(&self, ledger: RawTable, payment: RawTable) -> Result<Ingested, PipelineError> {
        let ledger_rows = self.ledger_reader.rows(&ledger)?;
        let payment_rows = self.payment_reader.rows(&payment)?;

        let mut report = RunReport {
            ledger_rows: ledger_rows.len(),
            payment_rows: payment_rows.len(),
            ..RunReport::default()
        };

        let mapped_ledger = self.mapper.map_all(&ledger_rows);
        let mapped_payment = self.mapper.map_all(&payment_rows);
        report.ledger_dropped = mapped_ledger.dropped;
        report.payment_dropped = mapped_payment.dropped;

        let mut ledger_txs = mapped_ledger.transactions;
        if self.config.dedup_stage == DedupStage::Raw {
            report.duplicates_removed += self.deduplicate(&mut ledger_txs);
        }
        report.notes_normalized = self.cascade.apply(&mut ledger_txs);
        if self.config.dedup_stage == DedupStage::Normalized {
            report.duplicates_removed += self.deduplicate(&mut ledger_txs);
        }

        tracing::info!(
            ledger = ledger_txs.len(),
            payment = mapped_payment.transactions.len(),
            dropped = report.ledger_dropped.total() + report.payment_dropped.total(),
            duplicates = report.duplicates_removed,
            "ingested transactions"
        );

        Ok(Ingested {
            ledger: ledger_txs,
            payment: mapped_payment.transactions,
            ledger_raw: ledger,
            payment_raw: payment,
            report,
        })
    }

    fn deduplicate(&self, ledger: &mut Vec<CanonicalTransaction>) -> usize {
        self.dedup.as_ref().map_or(0, |d| d.apply(ledger))
    }
}
