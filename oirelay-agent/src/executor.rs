//! Runs generated code in a child process.

use oirelay_core::{Error, Result};
use std::process::Stdio;
use tokio::process::Command;

/// Executes one block of code and returns what it printed.
#[allow(async_fn_in_trait)]
pub trait CodeExecutor {
    async fn execute(&self, language: &str, code: &str) -> Result<String>;
}

/// Executes code with locally installed interpreters.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    python: String,
}

impl ProcessExecutor {
    /// `python` is the interpreter used for Python code
    pub fn new(python: impl Into<String>) -> Self {
        Self {
            python: python.into(),
        }
    }

    /// Program and arguments that run `code` for `language`
    fn command_for(&self, language: &str, code: &str) -> Result<(String, Vec<String>)> {
        let (program, flag) = match language.to_ascii_lowercase().as_str() {
            "python" | "python3" | "py" => (self.python.as_str(), "-c"),
            "shell" | "bash" | "sh" | "zsh" => ("bash", "-c"),
            "javascript" | "js" | "node" => ("node", "-e"),
            "applescript" => ("osascript", "-e"),
            "r" => ("Rscript", "-e"),
            _ => {
                return Err(Error::unsupported(format!("no interpreter for language '{}'", language))
                    .with_operation("executor::execute")
                    .with_context("language", language));
            }
        };
        Ok((program.to_string(), vec![flag.to_string(), code.to_string()]))
    }
}

impl CodeExecutor for ProcessExecutor {
    async fn execute(&self, language: &str, code: &str) -> Result<String> {
        let (program, args) = self.command_for(language, code)?;
        tracing::debug!(%program, language, bytes = code.len(), "running generated code");

        let output = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                Error::code_execution_failed(language, format!("cannot start {}: {}", program, e))
                    .with_operation("executor::execute")
                    .with_context("program", program.clone())
                    .set_source(e)
            })?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        if !output.status.success() {
            match output.status.code() {
                Some(code) => text.push_str(&format!("\n[exit code {}]", code)),
                None => text.push_str("\n[terminated by signal]"),
            }
        }
        Ok(text)
    }
}
