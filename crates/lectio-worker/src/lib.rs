//! Lectio Worker Library
//!
//! A Postgres-backed task queue. Tasks are rows in the `tasks` table; a semaphore-bounded
//! pool claims them with `FOR UPDATE SKIP LOCKED`, wakes on `LISTEN/NOTIFY` or polling,
//! enforces per-task timeouts and reschedules recoverable failures with backoff.

mod context;
mod queue;

pub use context::{empty_context_weak, TaskHandlerContext};
pub use queue::{TaskQueue, TaskQueueConfig, TaskSubmitter, MAX_RETRY_BACKOFF_SECS};
