//! `cadence-protocol`: wire representation of the remote scheduling service.
//!
//! Everything here mirrors what the service sends and accepts: weekday
//! tokens, time modes, command records inside a scheduler snapshot, and the
//! three typed mutation requests. No I/O happens in this crate.

pub mod days;
pub mod error;
pub mod methods;
pub mod records;

pub use days::{Day, DaySet, TimeMode};
pub use error::ProtocolError;
pub use records::{Ack, CommandRecord, MutationFields, MutationKind, MutationRequest, SchedulerSnapshot};
