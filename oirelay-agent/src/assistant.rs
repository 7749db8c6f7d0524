//! The assistant capability as seen by the relay.

use futures_core::Stream;
use oirelay_core::{ResponseFragment, Result};
use std::pin::Pin;

/// Lazy, finite, non-restartable sequence of fragments for one command.
pub type FragmentStream<'a> = Pin<Box<dyn Stream<Item = Result<ResponseFragment>> + 'a>>;

/// How a single command should be delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatOptions {
    /// Also render fragments for a human (stderr)
    pub display: bool,
    /// Yield fragments as they are produced rather than all at the end
    pub stream: bool,
}

impl ChatOptions {
    /// What the relay asks for: incremental delivery, no rendering
    pub fn relay() -> Self {
        Self {
            display: false,
            stream: true,
        }
    }
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self::relay()
    }
}

pub trait Assistant {
    /// Process one command.
    ///
    /// An `Err` item ends the command; the stream yields nothing after it.
    fn chat<'a>(&'a mut self, command: &str, options: ChatOptions) -> FragmentStream<'a>;
}
