use bepp_core::NumberFormat;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::ImportError;
use crate::raw::{Cell, PaymentRow, RawRecord, RawRow, RawTable, RowOrigin};

/// Column labels of the payment-processor activity export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentColumns {
    pub date: String,
    pub payee: String,
    pub gross: String,
    pub currency: String,
    pub subject: String,
    pub message: String,
}

impl PaymentColumns {
    fn required(&self) -> [&str; 4] {
        [&self.date, &self.payee, &self.gross, &self.currency]
    }
}

impl Default for PaymentColumns {
    fn default() -> Self {
        Self {
            date: "Data".to_string(),
            payee: "Nome".to_string(),
            gross: "Lordo".to_string(),
            currency: "Valuta".to_string(),
            subject: "Oggetto".to_string(),
            message: "Messaggio".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentFormat {
    pub columns: PaymentColumns,
    pub date_format: String,
    pub number_format: NumberFormat,
    pub delimiter: String,
}

impl Default for PaymentFormat {
    fn default() -> Self {
        Self {
            columns: PaymentColumns::default(),
            date_format: "%d/%m/%Y".to_string(),
            number_format: NumberFormat::ITALIAN,
            delimiter: ",".to_string(),
        }
    }
}

/// Reads payment-processor CSV exports.
pub struct PaymentReader {
    format: PaymentFormat,
}

impl PaymentReader {
    pub fn new(format: PaymentFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> &PaymentFormat {
        &self.format
    }

    pub fn read_file(&self, path: &Path) -> Result<RawTable, ImportError> {
        let shown = path.display().to_string();
        let file = File::open(path).map_err(|source| ImportError::Io {
            path: shown.clone(),
            source,
        })?;
        let label = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(shown.as_str())
            .to_string();
        let table = self.read_from(file, &label)?;
        tracing::info!(file = %shown, rows = table.len(), "read payment export");
        Ok(table)
    }

    /// Parses one export. Columns that are blank in every row are dropped, so
    /// exports with trailing empty columns line up with the rest. The mandatory
    /// columns are always kept, and an export with rows but without one of them
    /// is rejected.
    pub fn read_from<R: Read>(&self, data: R, label: &str) -> Result<RawTable, ImportError> {
        let delimiter = self.format.delimiter.as_bytes().first().copied().unwrap_or(b',');
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(data);

        let csv_err = |source| ImportError::Csv {
            path: label.to_string(),
            source,
        };

        let headers: Vec<String> = reader
            .headers()
            .map_err(csv_err)?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();

        let mut table = RawTable::new(headers);
        for (idx, result) in reader.records().enumerate() {
            let record = result.map_err(csv_err)?;
            let cells: Vec<Cell> = record.iter().map(Cell::text).collect();
            if cells.iter().all(Cell::is_empty) {
                continue;
            }
            table.records.push(RawRecord {
                origin: RowOrigin {
                    file: label.to_string(),
                    line: record.position().map(|p| p.line() as usize).unwrap_or(idx + 2),
                },
                cells,
            });
        }

        if !table.is_empty() {
            let missing = self.missing_columns(&table);
            if !missing.is_empty() {
                return Err(ImportError::MissingColumns {
                    path: label.to_string(),
                    columns: missing,
                });
            }
            table.drop_empty_columns_except(&self.format.columns.required());
        }
        Ok(table)
    }

    /// Reads the files in the given order and stacks their rows, aligning
    /// columns by label.
    pub fn read_files(&self, paths: &[PathBuf]) -> Result<RawTable, ImportError> {
        let tables = paths
            .iter()
            .map(|p| self.read_file(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RawTable::concat(tables))
    }

    /// Resolves the configured columns and projects every record onto a
    /// [`PaymentRow`]. Subject and message are optional columns.
    pub fn rows(&self, table: &RawTable) -> Result<Vec<RawRow>, ImportError> {
        let cols = &self.format.columns;
        if let Some(first) = table.records.first() {
            let missing = self.missing_columns(table);
            if !missing.is_empty() {
                return Err(ImportError::MissingColumns {
                    path: first.origin.file.clone(),
                    columns: missing,
                });
            }
        }

        let idx = |name: &str| table.column(name).unwrap_or(usize::MAX);
        let (date, payee, gross, currency, subject, message) = (
            idx(&cols.date),
            idx(&cols.payee),
            idx(&cols.gross),
            idx(&cols.currency),
            idx(&cols.subject),
            idx(&cols.message),
        );

        Ok(table
            .records
            .iter()
            .map(|r| {
                RawRow::Payment(PaymentRow {
                    origin: r.origin.clone(),
                    date: r.get(date).clone(),
                    payee: r.get(payee).clone(),
                    gross: r.get(gross).clone(),
                    currency: r.get(currency).clone(),
                    subject: r.get(subject).clone(),
                    message: r.get(message).clone(),
                })
            })
            .collect())
    }

    fn missing_columns(&self, table: &RawTable) -> Vec<String> {
        self.format
            .columns
            .required()
            .into_iter()
            .filter(|name| table.column(name).is_none())
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const EXPORT: &str = "\u{feff}Data,Orario,Nome,Tipo,Lordo,Valuta,Oggetto,Messaggio,Vuota\n\
        01/03/2024,10:00:00,Luigi Verdi,Pagamento,\"-1.234,56\",EUR,Bici,Grazie,\n\
        02/03/2024,11:00:00,,Conversione,\"10,00\",EUR,,,\n";

    fn reader() -> PaymentReader {
        PaymentReader::new(PaymentFormat::default())
    }

    // ── parsing ───────────────────────────────────────────────────────────────

    #[test]
    fn strips_bom_and_drops_blank_columns() {
        let table = reader().read_from(EXPORT.as_bytes(), "pp.csv").unwrap();
        assert_eq!(table.headers[0], "Data");
        assert!(table.column("Vuota").is_none());
        assert_eq!(table.len(), 2);
        assert_eq!(table.records[0].origin.line, 2);
        assert_eq!(table.records[1].origin.line, 3);
    }

    #[test]
    fn rows_keep_raw_text() {
        let r = reader();
        let table = r.read_from(EXPORT.as_bytes(), "pp.csv").unwrap();
        let rows = r.rows(&table).unwrap();

        let RawRow::Payment(row) = &rows[0] else {
            panic!("expected a payment row");
        };
        assert_eq!(row.gross, Cell::Text("-1.234,56".to_string()));
        assert_eq!(row.payee, Cell::Text("Luigi Verdi".to_string()));
        assert_eq!(row.subject, Cell::Text("Bici".to_string()));
        assert_eq!(row.message, Cell::Text("Grazie".to_string()));

        let RawRow::Payment(row) = &rows[1] else {
            panic!("expected a payment row");
        };
        assert!(row.payee.is_empty());
    }

    #[test]
    fn optional_columns_may_be_absent() {
        let data = "Data,Nome,Lordo,Valuta\n01/03/2024,Mario,\"5,00\",EUR\n";
        let r = reader();
        let table = r.read_from(data.as_bytes(), "pp.csv").unwrap();
        let rows = r.rows(&table).unwrap();
        let RawRow::Payment(row) = &rows[0] else {
            panic!("expected a payment row");
        };
        assert!(row.subject.is_empty());
        assert!(row.message.is_empty());
    }

    #[test]
    fn missing_mandatory_column_is_an_error() {
        let data = "Data,Nome,Valuta\n01/03/2024,Mario,EUR\n";
        let err = reader().read_from(data.as_bytes(), "pp.csv").unwrap_err();
        match err {
            ImportError::MissingColumns { path, columns } => {
                assert_eq!(path, "pp.csv");
                assert_eq!(columns, vec!["Lordo"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn header_only_file_may_lack_columns() {
        let table = reader().read_from("Data,Nome\n".as_bytes(), "pp.csv").unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn rows_name_the_file_of_a_malformed_table() {
        let mut table = RawTable::new(vec!["Data".to_string(), "Nome".to_string()]);
        table.records.push(RawRecord {
            origin: RowOrigin {
                file: "built.csv".to_string(),
                line: 2,
            },
            cells: vec![Cell::text("01/03/2024"), Cell::text("Mario")],
        });
        let err = reader().rows(&table).unwrap_err();
        assert!(matches!(err, ImportError::MissingColumns { ref path, .. } if path == "built.csv"));
    }

    #[test]
    fn header_only_file_keeps_columns() {
        let data = "Data,Nome,Lordo,Valuta\n";
        let table = reader().read_from(data.as_bytes(), "pp.csv").unwrap();
        assert!(table.is_empty());
        assert_eq!(table.headers.len(), 4);
    }

    #[test]
    fn semicolon_delimiter() {
        let r = PaymentReader::new(PaymentFormat {
            delimiter: ";".to_string(),
            ..PaymentFormat::default()
        });
        let data = "Data;Nome;Lordo;Valuta\n01/03/2024;Mario;5,00;EUR\n";
        let table = r.read_from(data.as_bytes(), "pp.csv").unwrap();
        assert_eq!(table.records[0].get(2), &Cell::Text("5,00".to_string()));
    }

    // ── files ─────────────────────────────────────────────────────────────────

    #[test]
    fn read_files_aligns_differently_shaped_exports() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.csv");
        let b = dir.path().join("b.csv");
        File::create(&a)
            .unwrap()
            .write_all(b"Data,Nome,Lordo,Valuta,Vuota\n01/03/2024,Mario,\"1,00\",EUR,\n")
            .unwrap();
        File::create(&b)
            .unwrap()
            .write_all(b"Nome,Data,Valuta,Lordo,Oggetto\nLuigi,02/03/2024,USD,\"2,00\",Libro\n")
            .unwrap();

        let r = reader();
        let table = r.read_files(&[a, b]).unwrap();
        assert_eq!(table.headers, vec!["Data", "Nome", "Lordo", "Valuta", "Oggetto"]);
        assert_eq!(table.records[0].origin.file, "a.csv");
        assert_eq!(table.records[1].origin.file, "b.csv");
        assert_eq!(table.records[1].get(3), &Cell::Text("USD".to_string()));
        assert!(table.records[0].get(4).is_empty());
    }

    #[test]
    fn one_export_missing_a_mandatory_column_fails_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.csv");
        let b = dir.path().join("b.csv");
        File::create(&a)
            .unwrap()
            .write_all(b"Data,Nome,Lordo,Valuta\n01/03/2024,Mario,\"1,00\",EUR\n")
            .unwrap();
        File::create(&b)
            .unwrap()
            .write_all(b"Data,Nome,Valuta\n02/03/2024,Luigi,EUR\n")
            .unwrap();

        let err = reader().read_files(&[a, b]).unwrap_err();
        match err {
            ImportError::MissingColumns { path, columns } => {
                assert_eq!(path, "b.csv");
                assert_eq!(columns, vec!["Lordo"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unreadable_file_is_an_error() {
        let err = reader()
            .read_file(Path::new("/definitely/not/here.csv"))
            .unwrap_err();
        assert!(matches!(err, ImportError::Io { .. }));
    }
}
