pub mod config;
pub mod discover;
pub mod export;
pub mod pipeline;

pub use config::{ConfigError, PipelineConfig};
pub use discover::discover;
pub use export::{ExportError, Exporter};
pub use pipeline::{Ingested, Pipeline, PipelineError, PipelineInput, RunReport};
