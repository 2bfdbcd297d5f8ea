//! Lectio Core Library
//!
//! Domain models, the processing status state machine, error types and configuration
//! shared by every Lectio crate.

pub mod config;
pub mod error;
pub mod models;
pub mod status;
pub mod task_error;

pub use config::{BaseConfig, Config, LectioConfig, LlmEndpoint};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use status::{ProcessingStatus, StatusEvent, TransitionError};
pub use task_error::{TaskError, TaskResultExt};
