use std::fmt;

use cadence_core::CommandId;
use cadence_protocol::{
    days::{format_clock_time, parse_clock_time},
    CommandRecord, DaySet, MutationFields, TimeMode,
};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, ScheduleError};

/// When a command fires on each of its days.
///
/// The derived order is Absolute < Sunrise < Sunset, then by time or offset.
/// Display ordering of a day's commands lives in [`crate::query`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TimeSpec {
    Absolute { time: NaiveTime },
    Sunrise { offset_minutes: i32 },
    Sunset { offset_minutes: i32 },
}

impl TimeSpec {
    pub fn at(time: NaiveTime) -> Self {
        TimeSpec::Absolute { time }
    }

    /// True for sunrise/sunset based times.
    pub fn is_relative(&self) -> bool {
        !matches!(self, TimeSpec::Absolute { .. })
    }

    pub fn mode(&self) -> TimeMode {
        match self {
            TimeSpec::Absolute { .. } => TimeMode::Absolute,
            TimeSpec::Sunrise { .. } => TimeMode::Sunrise,
            TimeSpec::Sunset { .. } => TimeMode::Sunset,
        }
    }
}

impl fmt::Display for TimeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeSpec::Absolute { time } => write!(f, "{}", time.format("%H:%M")),
            TimeSpec::Sunrise { offset_minutes } => write!(f, "sunrise{offset_minutes:+}m"),
            TimeSpec::Sunset { offset_minutes } => write!(f, "sunset{offset_minutes:+}m"),
        }
    }
}

/// Everything about a command except its remote id.
///
/// Used for commands that do not exist yet and as the mutable part of a
/// stored [`Command`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Command family on the scheduler; sent with every mutation.
    pub group_id: String,
    pub message_type: String,
    pub days: DaySet,
    pub time: TimeSpec,
    /// Forwarded to the service verbatim.
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl CommandSpec {
    pub fn new(
        group_id: impl Into<String>,
        message_type: impl Into<String>,
        days: DaySet,
        time: TimeSpec,
    ) -> Result<Self> {
        let spec = Self {
            group_id: group_id.into(),
            message_type: message_type.into(),
            days,
            time,
            attributes: Map::new(),
        };
        spec.validate()?;
        Ok(spec)
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Same fields on a different day set. May be empty; callers check before sending.
    pub fn on_days(&self, days: DaySet) -> Self {
        Self {
            days,
            ..self.clone()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.days.is_empty() {
            return Err(ScheduleError::InvalidCommand(
                "a command needs at least one day".to_string(),
            ));
        }
        if self.group_id.is_empty() {
            return Err(ScheduleError::InvalidCommand("group id is empty".to_string()));
        }
        if self.message_type.is_empty() {
            return Err(ScheduleError::InvalidCommand(
                "message type is empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Wire fields for a schedule or update mutation.
    pub fn to_fields(&self) -> MutationFields {
        let (time, offset_minutes) = match self.time {
            TimeSpec::Absolute { time } => (Some(format_clock_time(time)), None),
            TimeSpec::Sunrise { offset_minutes } | TimeSpec::Sunset { offset_minutes } => {
                (None, Some(offset_minutes))
            }
        };
        MutationFields {
            command_id: None,
            group: self.group_id.clone(),
            message_type: Some(self.message_type.clone()),
            days: self.days.tokens(),
            mode: Some(self.time.mode()),
            time,
            offset_minutes,
            attributes: self.attributes.clone(),
        }
    }
}

/// A command stored on a remote scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub id: CommandId,
    #[serde(flatten)]
    pub spec: CommandSpec,
}

impl Command {
    pub fn new(id: impl Into<CommandId>, spec: CommandSpec) -> Self {
        Self {
            id: id.into(),
            spec,
        }
    }

    pub fn days(&self) -> DaySet {
        self.spec.days
    }

    /// More than one day: edits need an all-days / single-day decision.
    pub fn is_series(&self) -> bool {
        self.spec.days.len() > 1
    }

    /// Decode a wire record. Missing or unparsable fields are errors, never defaulted.
    pub fn from_record(record: CommandRecord) -> Result<Self> {
        let id = record.id;
        if id.is_empty() {
            return Err(ScheduleError::malformed("", "missing id"));
        }
        if record.group.is_empty() {
            return Err(ScheduleError::malformed(id, "missing group"));
        }
        if record.message_type.is_empty() {
            return Err(ScheduleError::malformed(id, "missing messageType"));
        }
        if record.days.is_empty() {
            return Err(ScheduleError::malformed(id, "no days"));
        }
        let days = match DaySet::parse_tokens(&record.days) {
            Ok(days) => days,
            Err(e) => return Err(ScheduleError::malformed(id, e.to_string())),
        };

        let mode = match record.mode.as_deref().map(str::parse::<TimeMode>) {
            Some(Ok(mode)) => mode,
            Some(Err(e)) => return Err(ScheduleError::malformed(id, e.to_string())),
            None => return Err(ScheduleError::malformed(id, "missing mode")),
        };
        let time = match mode {
            TimeMode::Absolute => {
                let Some(raw) = record.time.as_deref() else {
                    return Err(ScheduleError::malformed(id, "absolute command without time"));
                };
                match parse_clock_time(raw) {
                    Ok(time) => TimeSpec::Absolute { time },
                    Err(e) => return Err(ScheduleError::malformed(id, e.to_string())),
                }
            }
            TimeMode::Sunrise | TimeMode::Sunset => {
                let Some(offset_minutes) = record.offset_minutes else {
                    return Err(ScheduleError::malformed(
                        id,
                        "relative command without offsetMinutes",
                    ));
                };
                if mode == TimeMode::Sunrise {
                    TimeSpec::Sunrise { offset_minutes }
                } else {
                    TimeSpec::Sunset { offset_minutes }
                }
            }
        };

        Ok(Self {
            id: CommandId(id),
            spec: CommandSpec {
                group_id: record.group,
                message_type: record.message_type,
                days,
                time,
                attributes: record.attributes,
            },
        })
    }
}
