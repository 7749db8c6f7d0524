//! OpenAI-compatible provider implementation
//!
//! Works with OpenAI, Azure OpenAI, vLLM, Ollama, and other OpenAI-compatible APIs.

use super::*;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// OpenAI-compatible provider
pub struct OpenAIProvider {
    client: Client,
    config: ProviderConfig,
}

impl OpenAIProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs.unwrap_or(300)))
            .build()
            .map_err(|e| ProviderError::InvalidRequest(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn base_url(&self) -> &str {
        self.config.base_url.as_deref().unwrap_or(crate::config::DEFAULT_BASE_URL)
    }

    fn build_request(&self, request: CompletionRequest) -> OpenAIRequest {
        let model = request.model.as_deref().unwrap_or(self.default_model()).to_string();

        OpenAIRequest {
            model,
            messages: request.messages.into_iter().map(OpenAIMessage::from).collect(),
            temperature: request.temperature,
            stream: true,
            stream_options: Some(OpenAIStreamOptions { include_usage: true }),
            tools: request.tools.map(|tools| {
                tools.into_iter().map(|t| OpenAITool {
                    r#type: "function".into(),
                    function: OpenAIFunction {
                        name: t.name,
                        description: Some(t.description),
                        parameters: Some(t.parameters),
                    },
                }).collect()
            }),
        }
    }
}

impl LlmProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn default_model(&self) -> &str {
        self.config.default_model.as_deref().unwrap_or(crate::config::DEFAULT_MODEL)
    }

    async fn stream(&self, request: CompletionRequest) -> Result<StreamReceiver, ProviderError> {
        let api_request = self.build_request(request);
        tracing::debug!(model = %api_request.model, messages = api_request.messages.len(), "opening completion stream");

        let mut req = self.client
            .post(format!("{}/chat/completions", self.base_url()))
            .json(&api_request);

        if let Some(api_key) = &self.config.api_key {
            if !api_key.is_empty() {
                req = req.header("Authorization", format!("Bearer {}", api_key));
            }
        }

        for (key, value) in &self.config.headers {
            req = req.header(key, value);
        }

        let response = req.send().await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            let text = response.text().await.unwrap_or_default();

            return Err(match status {
                401 => ProviderError::AuthenticationFailed,
                429 => ProviderError::RateLimited { retry_after },
                400 | 404 => ProviderError::InvalidRequest(text),
                _ => ProviderError::Api { status, message: text },
            });
        }

        Ok(StreamReceiver::new(sse_chunks(response.bytes_stream())))
    }
}

/// Turn a body of SSE bytes into stream chunks.
///
/// Events are split on raw bytes and only decoded once complete, so a
/// multi-byte character split across network reads stays intact.
fn sse_chunks<S, B, E>(body: S) -> impl futures_core::Stream<Item = StreamChunk> + Send + 'static
where
    S: futures_core::Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    async_stream::stream! {
        use futures_util::StreamExt;

        futures_util::pin_mut!(body);
        let mut buffer = SseBuffer::default();

        while let Some(chunk_result) = body.next().await {
            match chunk_result {
                Ok(bytes) => {
                    buffer.extend(bytes.as_ref());

                    while let Some(event) = buffer.next_event() {
                        for data in event.lines().filter_map(sse_data) {
                            if data == "[DONE]" {
                                return;
                            }
                            for chunk in parse_stream_event(data) {
                                yield chunk;
                            }
                        }
                    }
                }
                Err(e) => {
                    yield StreamChunk::Error(e.to_string());
                    return;
                }
            }
        }
    }
}

/// Undecoded SSE bytes waiting for their event terminator
#[derive(Debug, Default)]
struct SseBuffer {
    pending: Vec<u8>,
}

impl SseBuffer {
    fn extend(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Next complete event, without its `\n\n` terminator
    fn next_event(&mut self) -> Option<String> {
        let pos = self.pending.windows(2).position(|w| w == b"\n\n")?;
        let mut event: Vec<u8> = self.pending.drain(..pos + 2).collect();
        event.truncate(pos);

        Some(String::from_utf8(event).unwrap_or_else(|e| {
            tracing::warn!(error = %e.utf8_error(), "stream event is not valid UTF-8");
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }))
    }
}

/// Payload of an SSE `data:` line
fn sse_data(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

/// Translate one SSE data payload into stream chunks.
fn parse_stream_event(data: &str) -> Vec<StreamChunk> {
    let chunk = match serde_json::from_str::<OpenAIStreamChunk>(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            tracing::debug!(error = %e, "skipping unparseable stream event");
            return Vec::new();
        }
    };

    let mut out = Vec::new();

    if let Some(error) = chunk.error {
        out.push(StreamChunk::Error(error.message));
        return out;
    }

    if let Some(choice) = chunk.choices.first() {
        if let Some(content) = &choice.delta.content {
            if !content.is_empty() {
                out.push(StreamChunk::Text(content.clone()));
            }
        }

        for tc in choice.delta.tool_calls.iter().flatten() {
            out.push(StreamChunk::ToolCallDelta {
                index: tc.index,
                id: tc.id.clone(),
                name: tc.function.as_ref().and_then(|f| f.name.clone()),
                arguments_delta: tc.function.as_ref().and_then(|f| f.arguments.clone()),
            });
        }

        if let Some(reason) = &choice.finish_reason {
            out.push(StreamChunk::Done {
                finish_reason: FinishReason::parse(reason),
            });
        }
    }

    if let Some(u) = chunk.usage {
        out.push(StreamChunk::Usage(Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }));
    }

    out
}

// ============================================================================
// OpenAI API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<OpenAIStreamOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAITool>>,
}

#[derive(Debug, Serialize)]
struct OpenAIStreamOptions {
    include_usage: bool,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAIToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl From<ChatMessage> for OpenAIMessage {
    fn from(msg: ChatMessage) -> Self {
        Self {
            role: match msg.role {
                Role::System => "system".into(),
                Role::User => "user".into(),
                Role::Assistant => "assistant".into(),
                Role::Tool => "tool".into(),
            },
            content: msg.content,
            tool_calls: msg.tool_calls.map(|tcs| {
                tcs.into_iter().map(|tc| OpenAIToolCall {
                    id: tc.id,
                    r#type: "function".into(),
                    function: OpenAIFunctionCall {
                        name: tc.name,
                        arguments: tc.arguments,
                    },
                }).collect()
            }),
            tool_call_id: msg.tool_call_id,
        }
    }
}

#[derive(Debug, Serialize)]
struct OpenAITool {
    r#type: String,
    function: OpenAIFunction,
}

#[derive(Debug, Serialize)]
struct OpenAIFunction {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct OpenAIToolCall {
    id: String,
    r#type: String,
    function: OpenAIFunctionCall,
}

#[derive(Debug, Serialize)]
struct OpenAIFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
    total_tokens: usize,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAIStreamChoice>,
    usage: Option<OpenAIUsage>,
    error: Option<OpenAIStreamError>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamChoice {
    delta: OpenAIStreamDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamDelta {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAIToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct OpenAIToolCallDelta {
    index: usize,
    id: Option<String>,
    function: Option<OpenAIFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct OpenAIFunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> OpenAIProvider {
        OpenAIProvider::new(ProviderConfig::openai("sk-test").with_model("gpt-4")).unwrap()
    }

    #[test]
    fn test_request_body() {
        let request = CompletionRequest::new(vec![
            ChatMessage::system("be brief"),
            ChatMessage::user("list files"),
        ])
        .with_temperature(0.0)
        .with_tools(vec![ToolDefinition::new("run_code", "Run code")]);

        let body = serde_json::to_value(provider().build_request(request)).unwrap();
        assert_eq!(body["model"], "gpt-4");
        assert_eq!(body["stream"], true);
        assert_eq!(body["stream_options"]["include_usage"], true);
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "run_code");
    }

    #[test]
    fn test_request_model_override() {
        let request = CompletionRequest::new(vec![ChatMessage::user("hi")]).with_model("gpt-4o");
        assert_eq!(provider().build_request(request).model, "gpt-4o");
    }

    #[test]
    fn test_parse_text_and_finish() {
        let chunks = parse_stream_event(
            r#"{"choices":[{"delta":{"content":"Hi"},"finish_reason":"stop"}]}"#,
        );
        assert_eq!(chunks.len(), 2);
        assert!(matches!(&chunks[0], StreamChunk::Text(t) if t == "Hi"));
        assert!(matches!(chunks[1], StreamChunk::Done { finish_reason: FinishReason::Stop }));
    }

    #[test]
    fn test_parse_tool_call_delta() {
        let chunks = parse_stream_event(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"run_code","arguments":"{\"lang"}}]},"finish_reason":null}]}"#,
        );
        match &chunks[..] {
            [StreamChunk::ToolCallDelta { index, id, name, arguments_delta }] => {
                assert_eq!(*index, 0);
                assert_eq!(id.as_deref(), Some("call_1"));
                assert_eq!(name.as_deref(), Some("run_code"));
                assert_eq!(arguments_delta.as_deref(), Some("{\"lang"));
            }
            other => panic!("unexpected chunks: {:?}", other),
        }
    }

    #[test]
    fn test_parse_usage_only_event() {
        let chunks = parse_stream_event(
            r#"{"choices":[],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#,
        );
        match &chunks[..] {
            [StreamChunk::Usage(usage)] => assert_eq!(usage.total_tokens, 15),
            other => panic!("unexpected chunks: {:?}", other),
        }
    }

    #[test]
    fn test_parse_error_event_and_garbage() {
        let chunks = parse_stream_event(r#"{"error":{"message":"overloaded"}}"#);
        assert!(matches!(&chunks[..], [StreamChunk::Error(m)] if m == "overloaded"));

        assert!(parse_stream_event("not json").is_empty());
    }

    #[test]
    fn test_buffer_waits_for_event_terminator() {
        let mut buffer = SseBuffer::default();
        buffer.extend(b"data: {}\n");
        assert_eq!(buffer.next_event(), None);
        buffer.extend(b"\ndata: [DONE]\n\n");
        assert_eq!(buffer.next_event().as_deref(), Some("data: {}"));
        assert_eq!(buffer.next_event().as_deref(), Some("data: [DONE]"));
        assert_eq!(buffer.next_event(), None);
    }

    #[tokio::test]
    async fn test_character_split_across_reads() {
        use futures_util::StreamExt;

        let event = "data: {\"choices\":[{\"delta\":{\"content\":\"caf\u{e9}\"}}]}\n\ndata: [DONE]\n\n";
        let bytes = event.as_bytes();
        // cut between the two bytes of the encoded \u{e9}
        let cut = event.find('\u{e9}').unwrap() + 1;
        let reads: Vec<Result<Vec<u8>, std::io::Error>> =
            vec![Ok(bytes[..cut].to_vec()), Ok(bytes[cut..].to_vec())];

        let chunks: Vec<StreamChunk> = sse_chunks(futures_util::stream::iter(reads)).collect().await;
        match &chunks[..] {
            [StreamChunk::Text(text)] => assert_eq!(text, "caf\u{e9}"),
            other => panic!("unexpected chunks: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_read_error_ends_stream() {
        use futures_util::StreamExt;

        let reads: Vec<Result<Vec<u8>, std::io::Error>> = vec![
            Ok(b"data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n".to_vec()),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
            Ok(b"data: {\"choices\":[{\"delta\":{\"content\":\"lost\"}}]}\n\n".to_vec()),
        ];

        let chunks: Vec<StreamChunk> = sse_chunks(futures_util::stream::iter(reads)).collect().await;
        assert_eq!(chunks.len(), 2);
        assert!(matches!(&chunks[0], StreamChunk::Text(t) if t == "Hi"));
        assert!(matches!(&chunks[1], StreamChunk::Error(m) if m == "reset"));
    }

    #[test]
    fn test_sse_data_prefix() {
        assert_eq!(sse_data("data: {}"), Some("{}"));
        assert_eq!(sse_data("data:[DONE]"), Some("[DONE]"));
        assert_eq!(sse_data(": keep-alive"), None);
    }
}
