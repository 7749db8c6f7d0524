//! Error kinds for relay operations

use std::fmt;

/// The kind of error that occurred.
///
/// Callers match on the kind to decide whether a failure ends the process
/// (bad configuration, broken stdout) or only the current command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // =========================================================================
    // General errors
    // =========================================================================
    /// An unexpected error occurred - catch-all for unhandled cases
    Unexpected,

    /// The requested feature or operation is not supported
    Unsupported,

    /// Invalid configuration (environment variables, flags)
    ConfigInvalid,

    // =========================================================================
    // Input/output framing
    // =========================================================================
    /// A command line could not be decoded (e.g. not UTF-8)
    InputInvalid,

    /// A fragment could not be serialized
    SerializationFailed,

    // =========================================================================
    // Assistant errors
    // =========================================================================
    /// The model call failed or returned something unusable
    InferenceFailed,

    /// The spending ceiling for this process has been reached
    BudgetExceeded,

    /// Generated code could not be run
    CodeExecutionFailed,

    /// Rate limit exceeded
    RateLimited,

    /// The model service rejected our credentials
    AuthenticationFailed,

    // =========================================================================
    // IO errors
    // =========================================================================
    /// File not found
    FileNotFound,

    /// Permission denied
    PermissionDenied,

    /// IO operation failed
    IoFailed,

    /// Network error
    NetworkFailed,

    // =========================================================================
    // Parse errors
    // =========================================================================
    /// Failed to parse a response or argument payload
    ParseFailed,
}

impl ErrorKind {
    /// Returns the error kind as a static string
    pub fn as_str(&self) -> &'static str {
        match self {
            // General
            ErrorKind::Unexpected => "Unexpected",
            ErrorKind::Unsupported => "Unsupported",
            ErrorKind::ConfigInvalid => "ConfigInvalid",

            // Framing
            ErrorKind::InputInvalid => "InputInvalid",
            ErrorKind::SerializationFailed => "SerializationFailed",

            // Assistant
            ErrorKind::InferenceFailed => "InferenceFailed",
            ErrorKind::BudgetExceeded => "BudgetExceeded",
            ErrorKind::CodeExecutionFailed => "CodeExecutionFailed",
            ErrorKind::RateLimited => "RateLimited",
            ErrorKind::AuthenticationFailed => "AuthenticationFailed",

            // IO
            ErrorKind::FileNotFound => "FileNotFound",
            ErrorKind::PermissionDenied => "PermissionDenied",
            ErrorKind::IoFailed => "IoFailed",
            ErrorKind::NetworkFailed => "NetworkFailed",

            // Parse
            ErrorKind::ParseFailed => "ParseFailed",
        }
    }

    /// Check if this error kind is retryable by default
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::InferenceFailed | ErrorKind::NetworkFailed | ErrorKind::RateLimited
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
