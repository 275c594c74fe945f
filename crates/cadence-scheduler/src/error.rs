use cadence_core::{CommandId, TargetAddress};
use cadence_protocol::{DaySet, MutationKind};
use serde::Serialize;
use thiserror::Error;

use crate::client::ServiceError;

/// One remote step of a multi-step edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitStep {
    /// Delete of the whole original series.
    DeleteOriginal,
    /// Re-add of the original fields on the days that were not edited.
    RecreateUntouched,
    /// Add of the edited command.
    AddEdited,
}

/// Errors that can occur within the schedule engine.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// The scheduler could not be fetched or created (remote failure or timeout).
    #[error("Scheduler unavailable for {target}: {source}")]
    SchedulerUnavailable {
        target: TargetAddress,
        source: ServiceError,
    },

    /// The service sent a command that does not decode.
    #[error("Malformed command {id:?}: {reason}")]
    MalformedCommand { id: String, reason: String },

    /// No command with the given id exists on the scheduler.
    #[error("Command not found: {id}")]
    NotFound { id: CommandId },

    /// A caller-supplied command violates an invariant (e.g. no days).
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// A pending decision was resolved with an impossible choice.
    #[error("Invalid decision: {0}")]
    InvalidDecision(String),

    /// A mutation failed before anything was committed in this edit.
    #[error("Remote {kind:?} failed: {source}")]
    RemoteMutationFailed {
        kind: MutationKind,
        source: ServiceError,
    },

    /// The series was deleted but re-adding the remaining days failed.
    #[error("Deleted command {id} but recreating days {remaining} failed: {source}")]
    DeleteSucceededRecreateFailed {
        id: CommandId,
        remaining: DaySet,
        source: ServiceError,
    },

    /// Some steps of a multi-step update committed, a later one failed.
    #[error("Update of command {id} partially applied (completed {completed:?}, failed {failed:?}): {source}")]
    UpdateSucceededPartially {
        id: CommandId,
        completed: Vec<SplitStep>,
        failed: SplitStep,
        source: ServiceError,
    },
}

/// Stable, payload-free classification of a [`ScheduleError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    SchedulerUnavailable,
    MalformedCommand,
    NotFound,
    InvalidCommand,
    InvalidDecision,
    RemoteMutationFailed,
    DeleteSucceededRecreateFailed,
    UpdateSucceededPartially,
}

impl ScheduleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScheduleError::SchedulerUnavailable { .. } => ErrorKind::SchedulerUnavailable,
            ScheduleError::MalformedCommand { .. } => ErrorKind::MalformedCommand,
            ScheduleError::NotFound { .. } => ErrorKind::NotFound,
            ScheduleError::InvalidCommand(_) => ErrorKind::InvalidCommand,
            ScheduleError::InvalidDecision(_) => ErrorKind::InvalidDecision,
            ScheduleError::RemoteMutationFailed { .. } => ErrorKind::RemoteMutationFailed,
            ScheduleError::DeleteSucceededRecreateFailed { .. } => {
                ErrorKind::DeleteSucceededRecreateFailed
            }
            ScheduleError::UpdateSucceededPartially { .. } => ErrorKind::UpdateSucceededPartially,
        }
    }

    /// Short error code string for host applications.
    pub fn code(&self) -> &'static str {
        match self.kind() {
            ErrorKind::SchedulerUnavailable => "SCHEDULER_UNAVAILABLE",
            ErrorKind::MalformedCommand => "MALFORMED_COMMAND",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::InvalidCommand => "INVALID_COMMAND",
            ErrorKind::InvalidDecision => "INVALID_DECISION",
            ErrorKind::RemoteMutationFailed => "REMOTE_MUTATION_FAILED",
            ErrorKind::DeleteSucceededRecreateFailed => "DELETE_SUCCEEDED_RECREATE_FAILED",
            ErrorKind::UpdateSucceededPartially => "UPDATE_SUCCEEDED_PARTIALLY",
        }
    }

    /// True when part of the edit is committed remotely. The caller should
    /// re-query the schedule rather than retry the whole edit.
    pub fn is_partial(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::DeleteSucceededRecreateFailed | ErrorKind::UpdateSucceededPartially
        )
    }

    pub(crate) fn malformed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        ScheduleError::MalformedCommand {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScheduleError>;

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_protocol::Day;

    #[test]
    fn partial_kinds_are_flagged() {
        let partial = ScheduleError::DeleteSucceededRecreateFailed {
            id: CommandId::from("c1"),
            remaining: DaySet::single(Day::Mon),
            source: ServiceError::Transport("reset".into()),
        };
        assert!(partial.is_partial());
        assert_eq!(partial.code(), "DELETE_SUCCEEDED_RECREATE_FAILED");

        let clean = ScheduleError::RemoteMutationFailed {
            kind: MutationKind::DeleteCommand,
            source: ServiceError::Timeout { ms: 30_000 },
        };
        assert!(!clean.is_partial());
        assert_eq!(clean.kind(), ErrorKind::RemoteMutationFailed);
    }

    #[test]
    fn partial_update_message_names_steps() {
        let err = ScheduleError::UpdateSucceededPartially {
            id: CommandId::from("c2"),
            completed: vec![SplitStep::DeleteOriginal, SplitStep::RecreateUntouched],
            failed: SplitStep::AddEdited,
            source: ServiceError::Transport("closed".into()),
        };
        let msg = err.to_string();
        assert!(msg.contains("DeleteOriginal"));
        assert!(msg.contains("failed AddEdited"));
    }
}
