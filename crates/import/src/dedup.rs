use bepp_core::CanonicalTransaction;
use serde::{Deserialize, Serialize};

/// When the duplicate filter looks at ledger notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupStage {
    /// Before the narration cascade, on the bank's own wording.
    #[default]
    Raw,
    /// After the narration cascade.
    Normalized,
}

/// Drops ledger rows that mirror a payment-platform transaction.
///
/// The bank statement books every payment made through the platform a second
/// time, with the platform's name somewhere in the description. The payment
/// export carries the detailed row, so the ledger copy is discarded.
#[derive(Debug, Clone)]
pub struct Deduplicator {
    marker: String,
}

impl Deduplicator {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into().to_lowercase(),
        }
    }

    /// An empty marker matches nothing.
    pub fn is_duplicate(&self, tx: &CanonicalTransaction) -> bool {
        !self.marker.is_empty() && tx.note.to_lowercase().contains(&self.marker)
    }

    /// Removes duplicates from ledger rows in place. Returns how many went.
    pub fn apply(&self, ledger: &mut Vec<CanonicalTransaction>) -> usize {
        let before = ledger.len();
        ledger.retain(|tx| !self.is_duplicate(tx));
        let removed = before - ledger.len();
        if removed > 0 {
            tracing::debug!(removed, marker = %self.marker, "removed platform duplicates from ledger");
        }
        removed
    }
}
