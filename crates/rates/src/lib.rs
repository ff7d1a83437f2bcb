pub mod converter;
pub mod ecb;
pub mod history;
pub mod source;

pub use converter::{ConversionReport, CurrencyConverter};
pub use ecb::{EcbClient, ECB_DATA_API};
pub use history::RateHistory;
pub use source::{FallbackPolicy, RateError, RateSource};
