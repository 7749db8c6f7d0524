//! System message and tool definition sent with every model call.

use oirelay_core::ToolDefinition;
use serde::Deserialize;

pub const BASE_SYSTEM_MESSAGE: &str = "You are a world-class programmer that can complete any goal by executing code.\n\
First, write a plan. Then run code in small steps, checking the output of each step before moving on.\n\
When you execute code, it will be executed on the user's machine with their full permission.\n\
To run code, call the `run_code` function with a `language` (python, shell, javascript, applescript or r) and the `code`.\n\
Prose you write is shown to the user as-is, so keep it short and in Markdown.";

pub const RUN_CODE_TOOL: &str = "run_code";

/// Arguments of a `run_code` call
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct RunCodeArgs {
    pub language: String,
    pub code: String,
}

pub fn run_code_tool() -> ToolDefinition {
    ToolDefinition::new(RUN_CODE_TOOL, "Executes code on the user's machine and returns the output")
        .with_parameters(serde_json::json!({
            "type": "object",
            "properties": {
                "language": {
                    "type": "string",
                    "description": "The programming language",
                    "enum": ["python", "shell", "javascript", "applescript", "r"]
                },
                "code": {
                    "type": "string",
                    "description": "The code to execute"
                }
            },
            "required": ["language", "code"]
        }))
}

/// Base message plus the configured suffix, if any
pub(crate) fn system_message(suffix: Option<&str>) -> String {
    match suffix {
        Some(extra) if !extra.is_empty() => format!("{}\n\n{}", BASE_SYSTEM_MESSAGE, extra),
        _ => BASE_SYSTEM_MESSAGE.to_string(),
    }
}
