use thiserror::Error;

/// Failures that invalidate a whole input file, and with it the run.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },
    #[error("Spreadsheet error in {path}: {source}")]
    Spreadsheet {
        path: String,
        source: calamine::Error,
    },
    #[error("{path}: missing required column(s): {}", .columns.join(", "))]
    MissingColumns { path: String, columns: Vec<String> },
    #[error("{0}: no worksheet has the expected ledger header")]
    NoLedgerSheet(String),
}
