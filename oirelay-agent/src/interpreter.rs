//! Assistant that lets the model run code through a single `run_code` tool.
//!
//! The conversation is kept across commands, so a follow-up command can refer
//! to earlier results.

use crate::assistant::{Assistant, ChatOptions, FragmentStream};
use crate::executor::CodeExecutor;
use crate::prompt::{self, RunCodeArgs, RUN_CODE_TOOL};
use futures_core::Stream;
use futures_util::StreamExt;
use oirelay_core::budget::{estimate_usage, BudgetTracker};
use oirelay_core::{
    ChatMessage, CompletionRequest, Error, LlmProvider, RelayConfig, ResponseFragment, Result,
    StreamChunk, ToolCall, Usage,
};

/// Upper bound on model calls for one command
const MAX_ROUNDS: usize = 16;

const NOT_EXECUTED: &str = "The code was not executed: auto-run is disabled.";
const NO_OUTPUT: &str = "No output";

pub struct InterpreterAssistant<P, E> {
    provider: P,
    executor: E,
    model: String,
    auto_run: bool,
    system_message: String,
    budget: BudgetTracker,
    messages: Vec<ChatMessage>,
}

impl<P: LlmProvider, E: CodeExecutor> InterpreterAssistant<P, E> {
    pub fn new(provider: P, executor: E, config: &RelayConfig) -> Self {
        Self {
            provider,
            executor,
            model: config.model.clone(),
            auto_run: config.auto_run,
            system_message: prompt::system_message(config.system_message_suffix.as_deref()),
            budget: BudgetTracker::new(config.max_budget),
            messages: Vec::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn auto_run(&self) -> bool {
        self.auto_run
    }

    pub fn max_budget(&self) -> f64 {
        self.budget.max_budget()
    }

    pub fn system_message(&self) -> &str {
        &self.system_message
    }

    /// Conversation so far, without the system message
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn budget(&self) -> &BudgetTracker {
        &self.budget
    }

    fn request(&self) -> CompletionRequest {
        let mut messages = Vec::with_capacity(self.messages.len() + 1);
        messages.push(ChatMessage::system(self.system_message.as_str()));
        messages.extend(self.messages.iter().cloned());

        CompletionRequest::new(messages)
            .with_model(self.model.as_str())
            .with_temperature(0.0)
            .with_tools(vec![prompt::run_code_tool()])
    }

    /// One command: model calls and code runs until the model stops asking.
    fn turn(&mut self, command: String) -> impl Stream<Item = Result<ResponseFragment>> + '_ {
        async_stream::try_stream! {
            self.messages.push(ChatMessage::user(command));

            for round in 0..MAX_ROUNDS {
                self.budget.ensure_available()?;

                let request = self.request();
                let prompt_chars = request.content_chars();
                let mut rx = self.provider.stream(request).await.map_err(|e| {
                    Error::from(e)
                        .with_operation("assistant::chat")
                        .with_context("model", self.model.clone())
                })?;

                let mut text = String::new();
                let mut calls = PendingCalls::default();
                let mut usage: Option<Usage> = None;

                while let Some(chunk) = rx.next().await {
                    match chunk {
                        StreamChunk::Text(delta) => {
                            text.push_str(&delta);
                            yield ResponseFragment::Message(delta);
                        }
                        StreamChunk::ToolCallDelta { index, id, name, arguments_delta } => {
                            calls.apply(index, id, name, arguments_delta);
                        }
                        StreamChunk::Usage(reported) => usage = Some(reported),
                        StreamChunk::Done { .. } => {}
                        StreamChunk::Error(message) => {
                            Err::<(), _>(
                                Error::inference_failed(message)
                                    .with_operation("assistant::chat")
                                    .with_context("model", self.model.clone()),
                            )?;
                        }
                    }
                }

                let usage = usage.unwrap_or_else(|| {
                    estimate_usage(prompt_chars, text.len() + calls.argument_chars())
                });
                let cost = self.budget.record(&self.model, &usage);
                tracing::debug!(
                    provider = self.provider.name(),
                    round,
                    tokens = usage.total_tokens,
                    cost,
                    spent = self.budget.spent(),
                    "model call finished"
                );

                let tool_calls = calls.finish();
                if tool_calls.is_empty() {
                    self.messages.push(ChatMessage::assistant(text));
                    return;
                }

                let content = (!text.is_empty()).then_some(text);
                self.messages.push(ChatMessage::assistant_tool_calls(content, tool_calls.clone()));

                let mut ran_code = false;
                for call in tool_calls {
                    if call.name != RUN_CODE_TOOL {
                        tracing::warn!(name = %call.name, "model called an unknown function");
                        self.messages.push(ChatMessage::tool_result(
                            call.id.as_str(),
                            format!("Unknown function '{}'. Use `{}`.", call.name, RUN_CODE_TOOL),
                        ));
                        ran_code = true;
                        continue;
                    }

                    let args: RunCodeArgs = match call.parse_arguments() {
                        Ok(args) => args,
                        Err(e) => {
                            tracing::warn!(error = %e, "unparseable run_code arguments");
                            self.messages.push(ChatMessage::tool_result(
                                call.id.as_str(),
                                format!("Invalid arguments: {}", e),
                            ));
                            ran_code = true;
                            continue;
                        }
                    };

                    yield ResponseFragment::Language(args.language.clone());
                    yield ResponseFragment::Code(args.code.clone());

                    if !self.auto_run {
                        self.messages.push(ChatMessage::tool_result(call.id.as_str(), NOT_EXECUTED));
                        continue;
                    }

                    yield ResponseFragment::Executing {
                        code: args.code.clone(),
                        language: args.language.clone(),
                    };

                    let output = match self.executor.execute(&args.language, &args.code).await {
                        Ok(output) => output,
                        Err(e) => {
                            tracing::warn!(error = %e, "generated code could not run");
                            e.message().to_string()
                        }
                    };

                    yield ResponseFragment::Output(output.clone());
                    yield ResponseFragment::EndOfExecution(true);

                    let result = if output.trim().is_empty() { NO_OUTPUT.to_string() } else { output };
                    self.messages.push(ChatMessage::tool_result(call.id.as_str(), result));
                    ran_code = true;
                }

                if !ran_code {
                    return;
                }
            }

            tracing::warn!(max_rounds = MAX_ROUNDS, "stopping command after the maximum number of model calls");
        }
    }
}

impl<P: LlmProvider, E: CodeExecutor> Assistant for InterpreterAssistant<P, E> {
    fn chat<'a>(&'a mut self, command: &str, options: ChatOptions) -> FragmentStream<'a> {
        let display = options.display;
        let turn = self.turn(command.to_string()).inspect(move |item| {
            if let (true, Ok(fragment)) = (display, item) {
                eprint!("{}", fragment.render());
            }
        });

        if options.stream {
            Box::pin(turn)
        } else {
            Box::pin(async_stream::stream! {
                let items: Vec<Result<ResponseFragment>> = turn.collect().await;
                for item in items {
                    yield item;
                }
            })
        }
    }
}

/// Tool calls assembled from streamed deltas
#[derive(Debug, Default)]
struct PendingCalls {
    calls: Vec<PendingCall>,
}

#[derive(Debug, Default)]
struct PendingCall {
    id: String,
    name: String,
    arguments: String,
}

impl PendingCalls {
    fn apply(
        &mut self,
        index: usize,
        id: Option<String>,
        name: Option<String>,
        arguments_delta: Option<String>,
    ) {
        if self.calls.len() <= index {
            self.calls.resize_with(index + 1, PendingCall::default);
        }
        let call = &mut self.calls[index];
        if let Some(id) = id {
            call.id = id;
        }
        if let Some(name) = name {
            call.name.push_str(&name);
        }
        if let Some(delta) = arguments_delta {
            call.arguments.push_str(&delta);
        }
    }

    fn argument_chars(&self) -> usize {
        self.calls.iter().map(|c| c.arguments.len()).sum()
    }

    fn finish(self) -> Vec<ToolCall> {
        self.calls
            .into_iter()
            .enumerate()
            .filter(|(_, call)| !call.name.is_empty())
            .map(|(i, call)| ToolCall {
                id: if call.id.is_empty() { format!("call_{}", i) } else { call.id },
                name: call.name,
                arguments: call.arguments,
            })
            .collect()
    }
}
