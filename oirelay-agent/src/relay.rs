//! The command relay loop: one line in, one assistant turn out.

use crate::assistant::{Assistant, ChatOptions};
use futures_util::StreamExt;
use oirelay_core::{CommandReader, Error, ErrorKind, FragmentWriter, Result};
use tokio::io::{AsyncBufRead, AsyncWrite};

/// What to do when a single command fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Log the error and read the next line
    #[default]
    Continue,
    /// Stop the relay with the first error
    Abort,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RelayOptions {
    pub policy: FailurePolicy,
}

impl RelayOptions {
    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Counters for one relay run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub commands: usize,
    pub fragments: usize,
    pub failures: usize,
}

pub struct Relay<A> {
    assistant: A,
    options: RelayOptions,
}

impl<A: Assistant> Relay<A> {
    pub fn new(assistant: A, options: RelayOptions) -> Self {
        Self { assistant, options }
    }

    pub fn assistant(&self) -> &A {
        &self.assistant
    }

    pub fn into_assistant(self) -> A {
        self.assistant
    }

    /// Relay commands from `reader` until it is exhausted.
    ///
    /// Each command's fragments are written and flushed before the next
    /// line is read. Output errors always end the run.
    pub async fn run<R, W>(&mut self, reader: R, writer: W) -> Result<RelayStats>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut commands = CommandReader::new(reader);
        let mut out = FragmentWriter::new(writer);
        let mut stats = RelayStats::default();
        let policy = self.options.policy;

        loop {
            let command = match commands.next_command().await {
                Ok(Some(command)) => command,
                Ok(None) => break,
                Err(e) if e.kind() == ErrorKind::InputInvalid => {
                    stats.failures += 1;
                    absorb(policy, e)?;
                    continue;
                }
                Err(e) => return Err(e),
            };

            stats.commands += 1;
            tracing::info!(line = commands.lines_read(), "Executing command...");

            let mut failure = None;
            {
                let mut fragments = self.assistant.chat(&command, ChatOptions::relay());
                while let Some(item) = fragments.next().await {
                    match item {
                        Ok(fragment) => {
                            out.write(&fragment).await?;
                            stats.fragments += 1;
                        }
                        Err(e) => {
                            failure = Some(e);
                            break;
                        }
                    }
                }
            }

            match failure {
                Some(e) => {
                    stats.failures += 1;
                    absorb(policy, e)?;
                }
                None => tracing::info!("Command finished"),
            }
        }

        tracing::info!(
            commands = stats.commands,
            fragments = stats.fragments,
            failures = stats.failures,
            "input closed"
        );
        Ok(stats)
    }
}

fn absorb(policy: FailurePolicy, err: Error) -> Result<()> {
    match policy {
        FailurePolicy::Continue => {
            tracing::error!(error = %err, "Command failed");
            Ok(())
        }
        FailurePolicy::Abort => Err(err),
    }
}
