//! `cadence-core`: shared configuration, identifiers and logging setup for
//! the cadence workspace.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod types;

pub use config::CadenceConfig;
pub use error::{CoreError, Result};
pub use types::{CommandId, EditId, SchedulerAddress, TargetAddress};
