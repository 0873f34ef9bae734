//! Message ingestion pipeline.

pub mod gate;
pub mod types;

pub use gate::{IngestOutcome, IngestionGate, ProcessedIngest};
pub use types::{Classification, Message, ProcessingStatus, RawMessage};
