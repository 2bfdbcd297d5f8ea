//! Lectio API Library
//!
//! HTTP handlers, authentication, task dispatch and application setup.

mod api_doc;
pub mod constants;
mod handlers;
pub mod setup;
mod task_dispatch;
mod task_handlers;
mod telemetry;
pub mod validation;

pub mod auth;
pub mod error;
pub mod state;

pub use error::ErrorResponse;
pub use lectio_worker::{TaskQueue, TaskQueueConfig};
pub use task_handlers::{PipelineTaskHandler, TaskHandler};
