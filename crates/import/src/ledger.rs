use bepp_core::NumberFormat;
use calamine::{open_workbook_auto, Data, Range, Reader};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ImportError;
use crate::raw::{Cell, LedgerRow, RawRecord, RawRow, RawTable, RowOrigin};

/// Column labels of the bank statement export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerColumns {
    pub value_date: String,
    pub debit: String,
    pub credit: String,
    pub currency: String,
    pub description: String,
}

impl Default for LedgerColumns {
    fn default() -> Self {
        Self {
            value_date: "Valuta".to_string(),
            debit: "Dare".to_string(),
            credit: "Avere".to_string(),
            currency: "Divisa".to_string(),
            description: "Descrizione".to_string(),
        }
    }
}

impl LedgerColumns {
    fn required(&self) -> [&str; 5] {
        [
            &self.value_date,
            &self.debit,
            &self.credit,
            &self.currency,
            &self.description,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerFormat {
    pub columns: LedgerColumns,
    /// Tried in order when a date arrives as text instead of a date cell.
    pub date_formats: Vec<String>,
    /// Used when an amount arrives as text instead of a number cell.
    pub number_format: NumberFormat,
}

impl Default for LedgerFormat {
    fn default() -> Self {
        Self {
            columns: LedgerColumns::default(),
            date_formats: vec!["%Y-%m-%d".to_string(), "%d/%m/%Y".to_string()],
            number_format: NumberFormat::ITALIAN,
        }
    }
}

/// Reads bank statement spreadsheets (`.xls`, `.xlsx`, `.ods`).
pub struct LedgerReader {
    format: LedgerFormat,
}

impl LedgerReader {
    pub fn new(format: LedgerFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> &LedgerFormat {
        &self.format
    }

    /// Reads every worksheet carrying the ledger header. A workbook with no such
    /// sheet is rejected.
    pub fn read_file(&self, path: &Path) -> Result<RawTable, ImportError> {
        let shown = path.display().to_string();
        let mut workbook = open_workbook_auto(path).map_err(|source| ImportError::Spreadsheet {
            path: shown.clone(),
            source,
        })?;

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        let mut sheets = Vec::new();
        for sheet_name in workbook.sheet_names() {
            let range = workbook
                .worksheet_range(&sheet_name)
                .map_err(|source| ImportError::Spreadsheet {
                    path: shown.clone(),
                    source,
                })?;
            let label = format!("{file_name}[{sheet_name}]");
            match self.read_range(&range, &label) {
                Some(table) => sheets.push(table),
                None => tracing::debug!(sheet = %label, "no ledger header, skipping sheet"),
            }
        }

        if sheets.is_empty() {
            return Err(ImportError::NoLedgerSheet(shown));
        }

        let table = RawTable::concat(sheets);
        tracing::info!(file = %shown, rows = table.len(), "read ledger export");
        Ok(table)
    }

    /// Reads the files in the given order and stacks their rows.
    pub fn read_files(&self, paths: &[PathBuf]) -> Result<RawTable, ImportError> {
        let tables = paths
            .iter()
            .map(|p| self.read_file(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RawTable::concat(tables))
    }

    /// Locates the header row in a worksheet and collects the non-blank rows
    /// below it. Returns `None` when the sheet has no ledger header.
    pub fn read_range(&self, range: &Range<Data>, label: &str) -> Option<RawTable> {
        let first_row = range.start().map(|(r, _)| r as usize).unwrap_or(0);
        let mut rows = range.rows().enumerate();

        let header_idx = rows
            .by_ref()
            .find(|(_, row)| self.is_header(row))
            .map(|(idx, _)| idx)?;
        let headers: Vec<String> = range
            .rows()
            .nth(header_idx)
            .map(|row| row.iter().map(|c| to_cell(c).to_string().trim().to_string()).collect())
            .unwrap_or_default();

        let mut table = RawTable::new(headers);
        for (idx, row) in rows {
            let cells: Vec<Cell> = row.iter().map(to_cell).collect();
            if cells.iter().all(Cell::is_empty) {
                continue;
            }
            table.records.push(RawRecord {
                origin: RowOrigin {
                    file: label.to_string(),
                    line: first_row + idx + 1,
                },
                cells,
            });
        }
        Some(table)
    }

    /// Resolves the configured columns and projects every record onto a
    /// [`LedgerRow`].
    pub fn rows(&self, table: &RawTable) -> Result<Vec<RawRow>, ImportError> {
        let cols = &self.format.columns;
        let missing: Vec<String> = cols
            .required()
            .iter()
            .filter(|name| table.column(name).is_none())
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ImportError::MissingColumns {
                path: table
                    .records
                    .first()
                    .map(|r| r.origin.file.clone())
                    .unwrap_or_else(|| "ledger export".to_string()),
                columns: missing,
            });
        }

        let idx = |name: &str| table.column(name).unwrap_or(usize::MAX);
        let (value_date, debit, credit, currency, description) = (
            idx(&cols.value_date),
            idx(&cols.debit),
            idx(&cols.credit),
            idx(&cols.currency),
            idx(&cols.description),
        );

        Ok(table
            .records
            .iter()
            .map(|r| {
                RawRow::Ledger(LedgerRow {
                    origin: r.origin.clone(),
                    value_date: r.get(value_date).clone(),
                    debit: r.get(debit).clone(),
                    credit: r.get(credit).clone(),
                    currency: r.get(currency).clone(),
                    description: r.get(description).clone(),
                })
            })
            .collect())
    }

    fn is_header(&self, row: &[Data]) -> bool {
        let labels: Vec<String> = row
            .iter()
            .filter_map(|c| match c {
                Data::String(s) => Some(s.trim().to_lowercase()),
                _ => None,
            })
            .collect();
        self.format
            .columns
            .required()
            .iter()
            .all(|name| labels.iter().any(|l| *l == name.trim().to_lowercase()))
    }
}

fn to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::String(s) => Cell::text(s),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::DateTime(dt) => excel_serial_to_date(dt.as_f64())
            .map(Cell::Date)
            .unwrap_or(Cell::Number(dt.as_f64())),
        Data::DateTimeIso(s) => s
            .get(..10)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .map(Cell::Date)
            .unwrap_or_else(|| Cell::text(s)),
        other => Cell::text(&other.to_string()),
    }
}

/// Excel serial day numbers count from 1899-12-30.
pub(crate) fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    base.checked_add_signed(Duration::days(serial.floor() as i64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Builds a worksheet from rows of cells, top-left at A1.
    fn sheet(rows: Vec<Vec<Data>>) -> Range<Data> {
        let height = rows.len() as u32;
        let width = rows.iter().map(Vec::len).max().unwrap_or(0) as u32;
        let mut range = Range::new((0, 0), (height - 1, width - 1));
        for (r, row) in rows.into_iter().enumerate() {
            for (c, value) in row.into_iter().enumerate() {
                range.set_value((r as u32, c as u32), value);
            }
        }
        range
    }

    fn s(v: &str) -> Data {
        Data::String(v.to_string())
    }

    fn header() -> Vec<Data> {
        vec![
            s("Data contabile"),
            s("Valuta"),
            s("Dare"),
            s("Avere"),
            s("Divisa"),
            s("Descrizione"),
        ]
    }

    fn reader() -> LedgerReader {
        LedgerReader::new(LedgerFormat::default())
    }

    // ── header detection ──────────────────────────────────────────────────────

    #[test]
    fn finds_header_below_preamble() {
        let range = sheet(vec![
            vec![s("Estratto conto"), Data::Empty, Data::Empty, Data::Empty, Data::Empty, Data::Empty],
            vec![Data::Empty; 6],
            header(),
            vec![
                s("2024-03-01"),
                s("2024-03-01"),
                Data::Empty,
                Data::Float(50.0),
                s("EUR"),
                s("BONIFICO DA FAVORE MARIO ROSSI IND.ORD. XX Note: Affitto"),
            ],
        ]);

        let table = reader().read_range(&range, "be.xls[Foglio1]").unwrap();
        assert_eq!(table.headers.len(), 6);
        assert_eq!(table.len(), 1);
        assert_eq!(table.records[0].origin.line, 4);
        assert_eq!(table.records[0].origin.file, "be.xls[Foglio1]");
    }

    #[test]
    fn sheet_without_header_is_skipped() {
        let range = sheet(vec![vec![s("Riepilogo"), s("Totale")], vec![s("x"), Data::Float(1.0)]]);
        assert!(reader().read_range(&range, "be.xls[Riepilogo]").is_none());
    }

    #[test]
    fn blank_rows_are_ignored() {
        let range = sheet(vec![
            header(),
            vec![Data::Empty; 6],
            vec![
                s("2024-03-02"),
                s("2024-03-02"),
                Data::Float(-12.5),
                Data::Empty,
                s("EUR"),
                s("Canone"),
            ],
        ]);
        let table = reader().read_range(&range, "be.xls[Foglio1]").unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.records[0].origin.line, 3);
    }

    // ── row projection ────────────────────────────────────────────────────────

    #[test]
    fn rows_select_configured_columns() {
        let range = sheet(vec![
            header(),
            vec![
                s("2024-01-14"),
                s("2024-01-15"),
                Data::Float(-100.0),
                Data::Empty,
                s("USD"),
                s("Hosting"),
            ],
        ]);
        let r = reader();
        let table = r.read_range(&range, "be.xls[Foglio1]").unwrap();
        let rows = r.rows(&table).unwrap();

        let RawRow::Ledger(row) = &rows[0] else {
            panic!("expected a ledger row");
        };
        assert_eq!(row.value_date, Cell::Text("2024-01-15".to_string()));
        assert_eq!(row.debit, Cell::Number(-100.0));
        assert_eq!(row.credit, Cell::Empty);
        assert_eq!(row.currency, Cell::Text("USD".to_string()));
        assert_eq!(row.description, Cell::Text("Hosting".to_string()));
    }

    #[test]
    fn rows_report_missing_columns() {
        let table = RawTable::new(vec!["Valuta".to_string(), "Dare".to_string()]);
        let err = reader().rows(&table).unwrap_err();
        match err {
            ImportError::MissingColumns { columns, .. } => {
                assert_eq!(columns, vec!["Avere", "Divisa", "Descrizione"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn header_lacking_a_mandatory_label_is_not_a_ledger_sheet() {
        let mut partial = header();
        partial.retain(|c| *c != s("Divisa"));
        let range = sheet(vec![partial, vec![s("2024-03-01"); 5]]);
        assert!(reader().read_range(&range, "be.xls[Foglio1]").is_none());
    }

    #[test]
    fn rows_name_the_source_of_a_malformed_table() {
        let mut table = RawTable::new(vec!["Valuta".to_string()]);
        table.records.push(RawRecord {
            origin: RowOrigin {
                file: "be.xls[Foglio1]".to_string(),
                line: 2,
            },
            cells: vec![Cell::text("2024-03-01")],
        });
        let err = reader().rows(&table).unwrap_err();
        assert!(matches!(err, ImportError::MissingColumns { ref path, .. } if path == "be.xls[Foglio1]"));
    }

    #[test]
    fn localized_labels_are_configurable() {
        let format = LedgerFormat {
            columns: LedgerColumns {
                value_date: "Value date".to_string(),
                debit: "Debit".to_string(),
                credit: "Credit".to_string(),
                currency: "Currency".to_string(),
                description: "Description".to_string(),
            },
            ..LedgerFormat::default()
        };
        let range = sheet(vec![
            vec![s("Value date"), s("Debit"), s("Credit"), s("Currency"), s("Description")],
            vec![s("2024-03-01"), Data::Empty, Data::Float(1.0), s("EUR"), s("x")],
        ]);
        let r = LedgerReader::new(format);
        let table = r.read_range(&range, "en.xlsx[Sheet1]").unwrap();
        assert_eq!(r.rows(&table).unwrap().len(), 1);
    }

    // ── cells ─────────────────────────────────────────────────────────────────

    #[test]
    fn iso_datetime_cells_become_dates() {
        assert_eq!(
            to_cell(&Data::DateTimeIso("2024-03-01T00:00:00".to_string())),
            Cell::Date(date(2024, 3, 1))
        );
    }

    #[test]
    fn excel_serial_dates() {
        assert_eq!(excel_serial_to_date(45352.0), Some(date(2024, 3, 1)));
        assert_eq!(excel_serial_to_date(f64::NAN), None);
        assert_eq!(excel_serial_to_date(0.0), None);
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = reader()
            .read_file(Path::new("/definitely/not/here.xls"))
            .unwrap_err();
        assert!(matches!(err, ImportError::Spreadsheet { .. }));
    }
}
