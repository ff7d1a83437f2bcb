use crate::transaction::CanonicalTransaction;

/// Sorts newest first. Equal dates keep their incoming order.
pub fn sort_by_date_desc(transactions: &mut [CanonicalTransaction]) {
    // `sort_by` is stable, which is what keeps same-day rows in source order.
    transactions.sort_by(|a, b| b.date.cmp(&a.date));
}

/// Concatenates ledger rows then payment rows and sorts the result newest first.
pub fn merge(
    ledger: Vec<CanonicalTransaction>,
    payment: Vec<CanonicalTransaction>,
) -> Vec<CanonicalTransaction> {
    let mut merged = Vec::with_capacity(ledger.len() + payment.len());
    merged.extend(ledger);
    merged.extend(payment);
    sort_by_date_desc(&mut merged);
    merged
}
