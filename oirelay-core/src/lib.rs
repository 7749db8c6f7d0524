//! # oirelay core
//!
//! Building blocks for a command relay that forwards stdin commands to a
//! code-running assistant and streams its answer back as JSON.
//!
//! ## Core Concepts
//! - **Config**: immutable startup settings read from the environment
//! - **Fragments**: the incremental pieces of an answer, one JSON value each
//! - **Wire**: line framing for commands in and fragments out
//! - **Provider**: trait-based LLM communication (OpenAI-compatible)
//! - **Budget**: per-model pricing and the spending ceiling
//! - **Icon**: SVG to icon.ray.so URL helper

pub mod budget;
pub mod config;
pub mod error;
pub mod fragment;
pub mod icon;
pub mod provider;
pub mod wire;

pub use budget::{BudgetTracker, ModelPricing};
pub use config::{RelayConfig, RelayVariant};
pub use error::{Error, ErrorKind, ErrorStatus, Result};
pub use fragment::ResponseFragment;
pub use provider::{
    LlmProvider, ProviderConfig, ProviderError,
    ChatMessage, Role, CompletionRequest,
    ToolDefinition, ToolCall,
    StreamChunk, StreamReceiver, FinishReason, Usage, UsageTracker,
    OpenAIProvider,
};
pub use wire::{CommandReader, FragmentWriter};
