use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{days::TimeMode, methods};

/// One command as stored by the remote scheduler.
///
/// Fields are kept in their raw wire form; decoding into a typed command
/// (and rejecting malformed values) is the consumer's job.
/// Wire: `{ "id": "c1", "group": "WEEKLY", "messageType": "swit:SetAttributes",
///          "days": ["MON","FRI"], "mode": "ABSOLUTE", "time": "07:00:00",
///          "attributes": {"swit:state": "ON"} }`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub message_type: String,
    #[serde(default)]
    pub days: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset_minutes: Option<i32>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

/// Result of a get-or-create call: the scheduler plus every command it holds,
/// keyed by command id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerSnapshot {
    pub address: String,
    pub target: String,
    #[serde(default)]
    pub commands: HashMap<String, CommandRecord>,
}

impl SchedulerSnapshot {
    /// Remote method that returns a snapshot, creating the scheduler if needed.
    pub const METHOD: &'static str = methods::GET_OR_CREATE_SCHEDULER;

    /// Params for a get-or-create call on `target`.
    pub fn request_params(target: &str) -> Value {
        serde_json::json!({ "target": target })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    ScheduleCommand,
    UpdateCommand,
    DeleteCommand,
}

impl MutationKind {
    /// Remote method name for this mutation.
    pub fn method(self) -> &'static str {
        match self {
            MutationKind::ScheduleCommand => methods::SCHEDULE_WEEKLY_COMMAND,
            MutationKind::UpdateCommand => methods::UPDATE_WEEKLY_COMMAND,
            MutationKind::DeleteCommand => methods::DELETE_COMMAND,
        }
    }
}

/// Wire-level payload of a mutation. Which fields are set depends on the kind:
/// schedule carries everything but `commandId`, update carries `commandId`
/// plus the mutable fields except `messageType`, delete carries only
/// `commandId` and `group`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_id: Option<String>,
    pub group: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub days: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<TimeMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset_minutes: Option<i32>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
}

/// A typed mutation against one scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationRequest {
    pub kind: MutationKind,
    pub fields: MutationFields,
}

impl MutationRequest {
    /// Create a new command. `fields.command_id` is cleared; the service assigns ids.
    pub fn schedule(mut fields: MutationFields) -> Self {
        fields.command_id = None;
        Self {
            kind: MutationKind::ScheduleCommand,
            fields,
        }
    }

    /// Update an existing command in place. The service cannot change
    /// `messageType` this way, so it is cleared.
    pub fn update(command_id: impl Into<String>, mut fields: MutationFields) -> Self {
        fields.command_id = Some(command_id.into());
        fields.message_type = None;
        Self {
            kind: MutationKind::UpdateCommand,
            fields,
        }
    }

    /// Delete a whole command series.
    pub fn delete(command_id: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            kind: MutationKind::DeleteCommand,
            fields: MutationFields {
                command_id: Some(command_id.into()),
                group: group.into(),
                ..MutationFields::default()
            },
        }
    }

    pub fn method(&self) -> &'static str {
        self.kind.method()
    }

    /// Request params as the transport should send them.
    pub fn params(&self) -> serde_json::Result<Value> {
        serde_json::to_value(&self.fields)
    }
}

/// Acknowledgement of a committed mutation. `commandId` is set when the
/// service created a command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ack {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_id: Option<String>,
}
