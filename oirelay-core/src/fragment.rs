//! Response fragments emitted while a command is processed.
//!
//! Each fragment serializes to a single-key JSON object, e.g.
//! `{"message":"Listing files"}` or `{"executing":{"code":"ls","language":"shell"}}`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFragment {
    /// A piece of assistant prose
    Message(String),
    /// Language of the code block that follows
    Language(String),
    /// A piece of generated code
    Code(String),
    /// The complete code block is about to run
    Executing { code: String, language: String },
    /// 1-based line of the running code block, for highlighting
    ActiveLine(usize),
    /// Combined stdout/stderr of the last run
    Output(String),
    /// The last run has finished
    EndOfExecution(bool),
}

impl ResponseFragment {
    /// Human-readable rendering for terminal display
    pub fn render(&self) -> String {
        match self {
            ResponseFragment::Message(text) => text.clone(),
            ResponseFragment::Language(language) => format!("\n```{}\n", language),
            ResponseFragment::Code(code) => code.clone(),
            ResponseFragment::Executing { .. } => "\n```\n".to_string(),
            ResponseFragment::Output(output) => format!("\nResult: {}\n", output.trim_end()),
            ResponseFragment::ActiveLine(_) | ResponseFragment::EndOfExecution(_) => String::new(),
        }
    }
}
