//! Service and output interfaces
//!
//! The HTTP locate endpoint, its request/response types, and the text and
//! CSV renderers used by the command-line tool.

pub mod formatting;
pub mod server;
pub mod types;

pub use formatting::{CsvFormatter, OutputTarget, ResultFormatter, TextFormatter};
pub use server::{router, serve, AppState};
pub use types::{ApiError, ApiResult, LocateRequest, LocateResponse, Method, RecordError, RecordResult};
