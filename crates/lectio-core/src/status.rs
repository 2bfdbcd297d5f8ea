//! Processing status state machine.
//!
//! Both `processing_status` and `mcq_generation_status` on a video are driven through
//! [`ProcessingStatus::transition`]. Call sites never assign a status directly; they
//! compute the next one from the current one and an event, and the store writes it
//! with a compare-and-set on the current value.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "processing_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Events that move a status forward (or, for `Reset`, back to the start).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEvent {
    Begin,
    Succeed,
    Fail,
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid status transition: cannot apply {event:?} to {from}")]
pub struct TransitionError {
    pub from: ProcessingStatus,
    pub event: StatusEvent,
}

impl ProcessingStatus {
    /// Compute the next status for `event`, or reject the transition.
    ///
    /// `Begin` is accepted from `Processing` so a run interrupted by a crash or a
    /// worker timeout can be re-entered by the retried task.
    pub fn transition(self, event: StatusEvent) -> Result<ProcessingStatus, TransitionError> {
        use ProcessingStatus::*;
        use StatusEvent::*;

        match (self, event) {
            (Pending, Begin) | (Processing, Begin) => Ok(Processing),
            (Processing, Succeed) => Ok(Completed),
            (Processing, Fail) => Ok(Failed),
            (Pending, Reset) | (Completed, Reset) | (Failed, Reset) => Ok(Pending),
            (from, event) => Err(TransitionError { from, event }),
        }
    }

    /// Reset then begin. Used by operations that may be re-run after a terminal state.
    pub fn restart(self) -> Result<ProcessingStatus, TransitionError> {
        match self {
            ProcessingStatus::Processing => self.transition(StatusEvent::Begin),
            _ => self
                .transition(StatusEvent::Reset)?
                .transition(StatusEvent::Begin),
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ProcessingStatus::Completed | ProcessingStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Processing => "processing",
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Failed => "failed",
        }
    }
}

impl Display for ProcessingStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessingStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ProcessingStatus::Pending),
            "processing" => Ok(ProcessingStatus::Processing),
            "completed" => Ok(ProcessingStatus::Completed),
            "failed" => Ok(ProcessingStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid processing status: {}", s)),
        }
    }
}
