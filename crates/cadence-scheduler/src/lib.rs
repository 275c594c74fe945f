//! `cadence-scheduler`: weekly schedule command engine.
//!
//! # Overview
//!
//! Commands live on a remote scheduler that belongs to a target entity (a
//! device or a rule). A command fires at one time on a set of weekdays; a
//! command with several days is a single series sharing one id.
//!
//! | Component        | Role                                                      |
//! |------------------|-----------------------------------------------------------|
//! | [`command`]      | typed command model and wire conversions                  |
//! | [`cache`]        | per-target snapshot cache in front of the remote service  |
//! | [`query`]        | commands effective on a given weekday, display-ordered    |
//! | [`edit`]         | add / update / delete, including single-day series splits |
//! | [`editor`]       | listener-driven wrapper for UI hosts                      |
//!
//! The remote service is reached through the [`client::SchedulerService`]
//! trait; the host supplies the transport.

pub mod cache;
pub mod client;
pub mod command;
pub mod edit;
pub mod editor;
pub mod error;
pub mod query;

#[cfg(test)]
pub(crate) mod fake;

pub use cache::{Scheduler, SchedulerCache};
pub use client::{RemoteClient, SchedulerService, ServiceError};
pub use command::{Command, CommandSpec, TimeSpec};
pub use edit::{EditEngine, EditKind, EditOutcome, PendingEdit, Scope};
pub use editor::{EditListener, EditPhase, ListenerId, ScheduleEditor};
pub use error::{ErrorKind, Result, ScheduleError, SplitStep};
pub use query::{DaySchedule, QueryEngine};

pub use cadence_core::{CommandId, SchedulerAddress, TargetAddress};
pub use cadence_protocol::{Day, DaySet};
