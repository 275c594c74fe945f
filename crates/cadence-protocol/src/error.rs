use thiserror::Error;

/// A wire value that does not decode into its typed form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Unknown day token: {0:?}")]
    UnknownDay(String),

    #[error("Unknown time mode: {0:?}")]
    UnknownMode(String),

    #[error("Invalid clock time: {0:?}")]
    InvalidTime(String),
}
