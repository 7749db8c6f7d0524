//! # oirelay agent
//!
//! The assistant capability and the loop that drives it:
//! 1. The relay reads one command per line
//! 2. The assistant streams the model's answer as fragments
//! 3. Code the model asks to run goes through the executor (auto-run only)
//! 4. Its output is fed back to the model until it stops asking
//! 5. Each fragment is written as JSON before the next line is read

mod assistant;
mod executor;
mod interpreter;
mod prompt;
mod relay;

pub use assistant::{Assistant, ChatOptions, FragmentStream};
pub use executor::{CodeExecutor, ProcessExecutor};
pub use interpreter::InterpreterAssistant;
pub use prompt::{run_code_tool, BASE_SYSTEM_MESSAGE, RUN_CODE_TOOL};
pub use relay::{FailurePolicy, Relay, RelayOptions, RelayStats};
