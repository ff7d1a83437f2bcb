pub mod dedup;
pub mod error;
pub mod ledger;
pub mod mapper;
pub mod narration;
pub mod payment;
pub mod raw;

pub use dedup::{DedupStage, Deduplicator};
pub use error::ImportError;
pub use ledger::{LedgerColumns, LedgerFormat, LedgerReader};
pub use mapper::{DropCounts, DropReason, FieldMapper, Mapped};
pub use narration::{NarrationCascade, NarrationError, NarrationRule, DEFAULT_RULES};
pub use payment::{PaymentColumns, PaymentFormat, PaymentReader};
pub use raw::{Cell, LedgerRow, PaymentRow, RawRecord, RawRow, RawTable, RowOrigin};
