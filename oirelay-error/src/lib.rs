//! # oirelay-error
//!
//! Unified error handling for the relay crates.
//!
//! - **ErrorKind**: what went wrong (e.g. `ConfigInvalid`, `BudgetExceeded`)
//! - **ErrorStatus**: whether trying again can help
//! - **Context**: key/value pairs and the operation that failed
//! - **Source**: the wrapped lower-level error, never leaked as a raw type
//!
//! ```rust
//! use oirelay_error::{Error, ErrorKind};
//!
//! fn parse_budget(raw: &str) -> Result<f64, Error> {
//!     raw.parse().map_err(|e| {
//!         Error::new(ErrorKind::ConfigInvalid, "MAX_BUDGET is not a number")
//!             .with_operation("config::from_env")
//!             .with_context("value", raw)
//!             .set_source(e)
//!     })
//! }
//!
//! assert_eq!(parse_budget("five").unwrap_err().kind(), ErrorKind::ConfigInvalid);
//! ```

mod error;
mod kind;
mod status;

pub use error::Error;
pub use kind::ErrorKind;
pub use status::ErrorStatus;

/// Result type alias using the relay Error
pub type Result<T> = std::result::Result<T, Error>;
