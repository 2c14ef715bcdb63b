//! Input documents and batch processing

pub mod batch;
pub mod parser;

pub use batch::{average_windows, BatchItem, BatchProcessor, BatchSummary};
pub use parser::{GeometryDocument, InputError, MeasurementParser, ParsedRecord, Station};
