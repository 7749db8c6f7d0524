//! Relay error types
//!
//! Re-exports oirelay-error and adds constructors used by the core crate.

pub use oirelay_error::{Error, ErrorKind, ErrorStatus, Result};

/// Create an InputInvalid error for a line that could not be decoded
pub fn input_invalid(line_number: usize, reason: impl Into<String>) -> Error {
    Error::new(ErrorKind::InputInvalid, reason)
        .with_operation("wire::next_command")
        .with_context("line", line_number.to_string())
}

/// Create a SerializationFailed error from a serde_json failure
pub fn serialization_error(err: serde_json::Error) -> Error {
    Error::new(ErrorKind::SerializationFailed, err.to_string())
        .with_operation("wire::write")
        .set_source(err)
}
