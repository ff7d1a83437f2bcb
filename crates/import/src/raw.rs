use chrono::NaiveDate;
use std::fmt;

/// A single cell as read from a source file, before any interpretation.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

static EMPTY_CELL: Cell = Cell::Empty;

impl Cell {
    pub fn text(s: &str) -> Self {
        if s.trim().is_empty() {
            Cell::Empty
        } else {
            Cell::Text(s.to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(_) | Cell::Date(_) => false,
        }
    }

    /// Trimmed textual content, `None` when blank.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Text(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(s) => write!(f, "{s}"),
            Cell::Number(n) => write!(f, "{n}"),
            Cell::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

/// Where a row came from, for log messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowOrigin {
    pub file: String,
    /// 1-based line (CSV) or sheet row (spreadsheet), header included.
    pub line: usize,
}

impl fmt::Display for RowOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub origin: RowOrigin,
    pub cells: Vec<Cell>,
}

impl RawRecord {
    pub fn get(&self, idx: usize) -> &Cell {
        self.cells.get(idx).unwrap_or(&EMPTY_CELL)
    }
}

/// Column headers plus the rows below them, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub records: Vec<RawRecord>,
}

impl RawTable {
    pub fn new(headers: Vec<String>) -> Self {
        RawTable {
            headers,
            records: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Index of the column labelled `name`, compared trimmed and case-insensitively.
    pub fn column(&self, name: &str) -> Option<usize> {
        let wanted = name.trim();
        self.headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(wanted))
    }

    /// Removes every column whose cells are all blank.
    pub fn drop_empty_columns(&mut self) {
        self.drop_empty_columns_except(&[]);
    }

    /// Like [`RawTable::drop_empty_columns`], but columns labelled with one of
    /// `protected` stay even when blank.
    pub fn drop_empty_columns_except(&mut self, protected: &[&str]) {
        let keep: Vec<bool> = self
            .headers
            .iter()
            .enumerate()
            .map(|(col, header)| {
                protected
                    .iter()
                    .any(|p| header.trim().eq_ignore_ascii_case(p.trim()))
                    || self.records.iter().any(|r| !r.get(col).is_empty())
            })
            .collect();

        let mut col = 0;
        self.headers.retain(|_| {
            col += 1;
            keep[col - 1]
        });
        for record in &mut self.records {
            record.cells.resize(keep.len(), Cell::Empty);
            let mut col = 0;
            record.cells.retain(|_| {
                col += 1;
                keep[col - 1]
            });
        }
    }

    /// Stacks tables on top of each other, aligning columns by label. Columns
    /// appear in first-seen order; cells a table lacks are left empty.
    pub fn concat(tables: impl IntoIterator<Item = RawTable>) -> RawTable {
        let mut out = RawTable::default();
        for table in tables {
            let mapping: Vec<usize> = table
                .headers
                .iter()
                .map(|h| match out.column(h) {
                    Some(idx) => idx,
                    None => {
                        out.headers.push(h.clone());
                        out.headers.len() - 1
                    }
                })
                .collect();

            for record in table.records {
                let mut cells = vec![Cell::Empty; out.headers.len()];
                for (src, cell) in record.cells.into_iter().enumerate() {
                    if let Some(&dst) = mapping.get(src) {
                        cells[dst] = cell;
                    }
                }
                out.records.push(RawRecord {
                    origin: record.origin,
                    cells,
                });
            }
        }
        // Rows from earlier tables are shorter when later tables added columns.
        let width = out.headers.len();
        for record in &mut out.records {
            record.cells.resize(width, Cell::Empty);
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerRow {
    pub origin: RowOrigin,
    pub value_date: Cell,
    pub debit: Cell,
    pub credit: Cell,
    pub currency: Cell,
    pub description: Cell,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRow {
    pub origin: RowOrigin,
    pub date: Cell,
    pub payee: Cell,
    pub gross: Cell,
    pub currency: Cell,
    pub subject: Cell,
    pub message: Cell,
}

/// A source row with its columns already resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum RawRow {
    Ledger(LedgerRow),
    Payment(PaymentRow),
}

impl RawRow {
    pub fn origin(&self) -> &RowOrigin {
        match self {
            RawRow::Ledger(row) => &row.origin,
            RawRow::Payment(row) => &row.origin,
        }
    }
}
