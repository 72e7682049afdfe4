//! Task status transition rules.

use thiserror::Error;

use crate::executor::types::TaskStatus;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },
    #[error("Cannot transition from terminal state {state}")]
    FromTerminalState { state: TaskStatus },
}

pub struct StateTransition;

impl StateTransition {
    /// Validate a status change.
    ///
    /// Pending may go to InProgress, or straight to Failed when no worker
    /// could be acquired. InProgress ends in Completed or Failed.
    pub fn validate(from: TaskStatus, to: TaskStatus) -> Result<(), TransitionError> {
        if Self::is_terminal(from) {
            return Err(TransitionError::FromTerminalState { state: from });
        }

        let is_valid = matches!(
            (from, to),
            (TaskStatus::Pending, TaskStatus::InProgress)
                | (TaskStatus::Pending, TaskStatus::Failed)
                | (TaskStatus::InProgress, TaskStatus::Completed)
                | (TaskStatus::InProgress, TaskStatus::Failed)
        );

        if is_valid {
            Ok(())
        } else {
            Err(TransitionError::InvalidTransition { from, to })
        }
    }

    pub fn next_status(current: TaskStatus) -> Option<TaskStatus> {
        match current {
            TaskStatus::Pending => Some(TaskStatus::InProgress),
            TaskStatus::InProgress => Some(TaskStatus::Completed),
            TaskStatus::Completed | TaskStatus::Failed => None,
        }
    }

    pub fn is_terminal(status: TaskStatus) -> bool {
        status.is_terminal()
    }
}
