//! Error types for excel-gateway-core

use thiserror::Error;

use crate::naming::NameError;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in excel-gateway-core
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Invalid range address
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Invalid column letters or index
    #[error("Invalid column: {0}")]
    InvalidColumn(String),

    /// Serial date outside the representable calendar range
    #[error("Invalid serial date: {0}")]
    InvalidSerial(f64),

    /// Worksheet or table name rejected by the naming rules
    #[error(transparent)]
    InvalidName(#[from] NameError),
}
