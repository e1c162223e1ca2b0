pub mod records;

// Re-export the core types to provide a clean public API.
pub use records::{InfoRecord, OperationOutcome, RecordFilter};
