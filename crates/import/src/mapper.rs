use bepp_core::{CanonicalTransaction, Money, Source};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt;

use crate::ledger::{excel_serial_to_date, LedgerFormat};
use crate::payment::PaymentFormat;
use crate::raw::{Cell, LedgerRow, PaymentRow, RawRow};

/// Why a source row did not become a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DropReason {
    InvalidDate,
    InvalidAmount,
    MissingAmount,
    ConflictingAmounts,
    MissingPayee,
    MissingCurrency,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DropReason::InvalidDate => "invalid date",
            DropReason::InvalidAmount => "invalid amount",
            DropReason::MissingAmount => "missing amount",
            DropReason::ConflictingAmounts => "both debit and credit set",
            DropReason::MissingPayee => "missing payee",
            DropReason::MissingCurrency => "missing currency",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DropCounts(BTreeMap<DropReason, usize>);

impl DropCounts {
    pub fn record(&mut self, reason: DropReason) {
        *self.0.entry(reason).or_insert(0) += 1;
    }

    pub fn get(&self, reason: DropReason) -> usize {
        self.0.get(&reason).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DropReason, usize)> + '_ {
        self.0.iter().map(|(r, n)| (*r, *n))
    }

    pub fn extend(&mut self, other: &DropCounts) {
        for (reason, n) in other.iter() {
            *self.0.entry(reason).or_insert(0) += n;
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Mapped {
    pub transactions: Vec<CanonicalTransaction>,
    pub dropped: DropCounts,
}

/// Turns resolved source rows into canonical transactions.
pub struct FieldMapper {
    ledger: LedgerFormat,
    payment: PaymentFormat,
}

impl FieldMapper {
    pub fn new(ledger: LedgerFormat, payment: PaymentFormat) -> Self {
        Self { ledger, payment }
    }

    pub fn map(&self, row: &RawRow) -> Result<CanonicalTransaction, DropReason> {
        match row {
            RawRow::Ledger(r) => self.map_ledger(r),
            RawRow::Payment(r) => self.map_payment(r),
        }
    }

    /// Maps every row, keeping input order. Rejected rows are counted and logged.
    pub fn map_all(&self, rows: &[RawRow]) -> Mapped {
        let mut out = Mapped::default();
        for row in rows {
            match self.map(row) {
                Ok(tx) => out.transactions.push(tx),
                Err(reason) => {
                    if reason == DropReason::ConflictingAmounts {
                        tracing::warn!(row = %row.origin(), "dropping row: {reason}");
                    } else {
                        tracing::debug!(row = %row.origin(), "dropping row: {reason}");
                    }
                    out.dropped.record(reason);
                }
            }
        }
        out
    }

    fn map_ledger(&self, row: &LedgerRow) -> Result<CanonicalTransaction, DropReason> {
        let date = self.ledger_date(&row.value_date)?;

        let debit = self.ledger_amount(&row.debit)?;
        let credit = self.ledger_amount(&row.credit)?;
        let amount = match (debit, credit) {
            (Some(d), None) => d,
            (None, Some(c)) => c,
            (Some(_), Some(_)) => return Err(DropReason::ConflictingAmounts),
            (None, None) => return Err(DropReason::MissingAmount),
        };

        let currency = row
            .currency
            .as_text()
            .ok_or(DropReason::MissingCurrency)?
            .to_uppercase();
        let note = row.description.as_text().unwrap_or_default();

        Ok(CanonicalTransaction::new(
            date,
            amount,
            currency,
            note,
            Source::Ledger,
        ))
    }

    fn map_payment(&self, row: &PaymentRow) -> Result<CanonicalTransaction, DropReason> {
        let payee = row.payee.as_text().ok_or(DropReason::MissingPayee)?;

        let date = match &row.date {
            Cell::Date(d) => *d,
            cell => cell
                .as_text()
                .and_then(|s| NaiveDate::parse_from_str(&s, &self.payment.date_format).ok())
                .ok_or(DropReason::InvalidDate)?,
        };

        let amount = match &row.gross {
            Cell::Empty => return Err(DropReason::MissingAmount),
            Cell::Number(n) => Money::from_f64(*n).map_err(|_| DropReason::InvalidAmount)?,
            cell => {
                let text = cell.as_text().ok_or(DropReason::MissingAmount)?;
                Money::parse(&text, &self.payment.number_format)
                    .map_err(|_| DropReason::InvalidAmount)?
            }
        };

        let currency = row
            .currency
            .as_text()
            .ok_or(DropReason::MissingCurrency)?
            .to_uppercase();

        let mut note = payee;
        for part in [row.message.as_text(), row.subject.as_text()]
            .into_iter()
            .flatten()
        {
            note.push_str(", ");
            note.push_str(&part);
        }

        Ok(CanonicalTransaction::new(
            date,
            amount,
            currency,
            note,
            Source::Payment,
        ))
    }

    fn ledger_date(&self, cell: &Cell) -> Result<NaiveDate, DropReason> {
        match cell {
            Cell::Date(d) => Ok(*d),
            Cell::Number(n) => excel_serial_to_date(*n).ok_or(DropReason::InvalidDate),
            Cell::Text(s) => {
                let s = s.trim();
                self.ledger
                    .date_formats
                    .iter()
                    .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                    .ok_or(DropReason::InvalidDate)
            }
            Cell::Empty => Err(DropReason::InvalidDate),
        }
    }

    /// `Ok(None)` for a blank cell.
    fn ledger_amount(&self, cell: &Cell) -> Result<Option<Money>, DropReason> {
        match cell {
            Cell::Empty => Ok(None),
            Cell::Number(n) => Money::from_f64(*n)
                .map(Some)
                .map_err(|_| DropReason::InvalidAmount),
            Cell::Text(s) if s.trim().is_empty() => Ok(None),
            Cell::Text(s) => Money::parse(s, &self.ledger.number_format)
                .map(Some)
                .map_err(|_| DropReason::InvalidAmount),
            Cell::Date(_) => Err(DropReason::InvalidAmount),
        }
    }
}
