pub mod merge;
pub mod money;
pub mod transaction;

pub use merge::{merge, sort_by_date_desc};
pub use money::{Money, MoneyError, NumberFormat};
pub use transaction::{CanonicalTransaction, Source};
