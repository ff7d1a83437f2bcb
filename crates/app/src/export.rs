use bepp_core::CanonicalTransaction;
use bepp_import::RawTable;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::pipeline::Ingested;

pub const LEDGER_FILE: &str = "Banca Etica.csv";
pub const PAYMENT_FILE: &str = "PayPal.csv";
pub const MERGED_FILE: &str = "BEPP.csv";
pub const LEDGER_BACKUP_FILE: &str = "Banca Etica - original.csv";
pub const PAYMENT_BACKUP_FILE: &str = "Pay Pal - original.csv";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Cannot write {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("CSV error writing {path}: {source}")]
    Csv { path: String, source: csv::Error },
}

/// Writes canonical rows as `date,amount,currency,note`.
pub fn write_transactions<W: Write>(
    out: W,
    transactions: &[CanonicalTransaction],
) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(["date", "amount", "currency", "note"])?;
    for tx in transactions {
        writer.write_record([
            tx.date.format("%Y-%m-%d").to_string(),
            tx.amount.to_string(),
            tx.currency.clone(),
            tx.note.clone(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes a source table back out with all of its columns.
pub fn write_raw_table<W: Write>(out: W, table: &RawTable) -> Result<(), csv::Error> {
    let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(out);
    writer.write_record(&table.headers)?;
    for record in &table.records {
        let width = table.headers.len().max(record.cells.len());
        writer.write_record((0..width).map(|i| record.get(i).to_string()))?;
    }
    writer.flush()?;
    Ok(())
}

/// Decides which files a run produces and writes them into one directory.
pub struct Exporter {
    dir: PathBuf,
    merge: bool,
    backup: bool,
}

impl Exporter {
    pub fn new(dir: impl Into<PathBuf>, merge: bool, backup: bool) -> Self {
        Self {
            dir: dir.into(),
            merge,
            backup,
        }
    }

    /// Files a run would write, in write order.
    pub fn planned_files(&self) -> Vec<PathBuf> {
        let mut names = if self.merge {
            vec![MERGED_FILE]
        } else {
            vec![LEDGER_FILE, PAYMENT_FILE]
        };
        if self.backup {
            names.extend([LEDGER_BACKUP_FILE, PAYMENT_BACKUP_FILE]);
        }
        names.into_iter().map(|n| self.dir.join(n)).collect()
    }

    pub fn export(&self, ingested: &Ingested) -> Result<Vec<PathBuf>, ExportError> {
        fs::create_dir_all(&self.dir).map_err(|source| ExportError::Io {
            path: self.dir.display().to_string(),
            source,
        })?;

        let mut written = Vec::new();
        if self.merge {
            let merged = ingested.merge();
            written.push(self.write(MERGED_FILE, |w| write_transactions(w, &merged))?);
        } else {
            let ledger = ingested.sorted_ledger();
            let payment = ingested.sorted_payment();
            written.push(self.write(LEDGER_FILE, |w| write_transactions(w, &ledger))?);
            written.push(self.write(PAYMENT_FILE, |w| write_transactions(w, &payment))?);
        }
        if self.backup {
            written.push(self.write(LEDGER_BACKUP_FILE, |w| {
                write_raw_table(w, &ingested.ledger_raw)
            })?);
            written.push(self.write(PAYMENT_BACKUP_FILE, |w| {
                write_raw_table(w, &ingested.payment_raw)
            })?);
        }
        for path in &written {
            tracing::info!(path = %path.display(), "wrote export");
        }
        Ok(written)
    }

    /// Writes next to the target and renames into place, so a failed run never
    /// leaves a half-written file under the final name.
    fn write<F>(&self, name: &str, fill: F) -> Result<PathBuf, ExportError>
    where
        F: FnOnce(&mut fs::File) -> Result<(), csv::Error>,
    {
        let target = self.dir.join(name);
        let tmp = self.dir.join(format!(".{name}.tmp"));
        let io_err = |path: &Path, source| ExportError::Io {
            path: path.display().to_string(),
            source,
        };

        let mut file = fs::File::create(&tmp).map_err(|e| io_err(&tmp, e))?;
        if let Err(source) = fill(&mut file) {
            let _ = fs::remove_file(&tmp);
            return Err(ExportError::Csv {
                path: target.display().to_string(),
                source,
            });
        }
        file.sync_all().map_err(|e| io_err(&tmp, e))?;
        drop(file);
        fs::rename(&tmp, &target).map_err(|e| io_err(&target, e))?;
        Ok(target)
    }
}
