//! OpenAI Chat Completions API provider

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest_eventsource::{Event, EventSource, retry::Never};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    models::ModelProfile,
    providers::Generator,
    stream::{FragmentStream, StreamEvent},
    types::Turn,
};

/// Default API endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI API client
pub struct OpenAIProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider with an API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point the client at an OpenAI-compatible server
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// List available chat models
    pub async fn list_models(&self) -> Result<Vec<OpenAIModelInfo>> {
        let url = format!("{}/models", self.base_url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::from_status(status, &text));
        }

        let list: OpenAIModelList = response.json().await?;

        let mut chat_models: Vec<_> = list
            .data
            .into_iter()
            .filter(|m| is_chat_model(&m.id))
            .collect();
        chat_models.sort_by(|a, b| a.id.cmp(&b.id));

        Ok(chat_models)
    }

    /// Stream a response. Returns once the server has accepted the request.
    pub async fn stream(&self, model: &ModelProfile, turns: &[Turn]) -> Result<FragmentStream> {
        let request = build_request(model, turns);
        let url = format!("{}/chat/completions", self.base_url);

        let request_builder = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request);

        let mut event_source = EventSource::new(request_builder)
            .map_err(|e| Error::Sse(format!("Failed to create event source: {}", e)))?;
        // Reconnecting would resend the request and duplicate the reply
        event_source.set_retry_policy(Box::new(Never));

        match event_source.next().await {
            Some(Ok(Event::Open)) => {}
            Some(Ok(Event::Message(msg))) => {
                return Err(Error::UnexpectedResponse(format!(
                    "event before connection opened: {}",
                    msg.data
                )));
            }
            Some(Err(e)) => return Err(connection_error(e).await),
            None => {
                return Err(Error::UnexpectedResponse(
                    "stream closed before it opened".to_string(),
                ));
            }
        }

        Ok(Box::pin(create_stream(event_source)))
    }
}

#[async_trait]
impl Generator for OpenAIProvider {
    async fn stream(&self, model: &ModelProfile, turns: &[Turn]) -> Result<FragmentStream> {
        OpenAIProvider::stream(self, model, turns).await
    }
}

/// Filter function to identify chat-capable models
fn is_chat_model(id: &str) -> bool {
    if id.starts_with("gpt-4") || id.starts_with("gpt-3.5-turbo") {
        !id.contains("instruct") && !id.contains("embedding") && !id.contains("audio")
    } else {
        id.starts_with("o1") || id.starts_with("o3")
    }
}

async fn connection_error(error: reqwest_eventsource::Error) -> Error {
    match error {
        reqwest_eventsource::Error::InvalidStatusCode(status, response) => {
            let body = response.text().await.unwrap_or_default();
            Error::from_status(status.as_u16(), &body)
        }
        reqwest_eventsource::Error::Transport(e) => Error::Http(e),
        other => Error::Sse(other.to_string()),
    }
}

fn build_request(model: &ModelProfile, turns: &[Turn]) -> OpenAIRequest {
    OpenAIRequest {
        model: model.id.clone(),
        messages: turns
            .iter()
            .map(|t| OpenAIMessage {
                role: t.role.as_str().to_string(),
                content: t.content.clone(),
            })
            .collect(),
        stream: true,
    }
}

/// Turn one `data:` payload into a stream event.
fn parse_chunk(data: &str) -> StreamEvent {
    match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => match chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
        {
            Some(text) if !text.is_empty() => StreamEvent::Delta { text },
            _ => StreamEvent::Skipped,
        },
        Err(e) => {
            tracing::debug!("Skipping unparseable chunk ({}): {}", e, data);
            StreamEvent::Skipped
        }
    }
}

fn create_stream(mut event_source: EventSource) -> impl futures::Stream<Item = StreamEvent> {
    stream! {
        while let Some(event) = event_source.next().await {
            match event {
                Ok(Event::Open) => {}
                Ok(Event::Message(msg)) => {
                    if msg.data == "[DONE]" {
                        break;
                    }
                    yield parse_chunk(&msg.data);
                }
                Err(reqwest_eventsource::Error::StreamEnded) => break,
                Err(e) => {
                    yield StreamEvent::Error {
                        message: format!("SSE error: {}", e),
                    };
                    break;
                }
            }
        }
        event_source.close();
    }
}

/// Model info returned from the models endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIModelInfo {
    pub id: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIModelList {
    data: Vec<OpenAIModelInfo>,
}

// Request/Response types

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_request_keeps_role_and_content_only() {
        let model = ModelProfile::new("gpt-4", 8192);
        let turns = vec![
            Turn::system("be brief").with_user("ana"),
            Turn::user("hi").with_user("ana").with_model("gpt-4"),
        ];
        let value = serde_json::to_value(build_request(&model, &turns)).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "model": "gpt-4",
                "stream": true,
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "hi"},
                ]
            })
        );
    }

    #[test]
    fn test_parse_chunk_delta() {
        let data = r#"{"id":"c1","choices":[{"index":0,"delta":{"content":"Hel"},"finish_reason":null}]}"#;
        assert_eq!(parse_chunk(data), StreamEvent::delta("Hel"));
    }

    #[test]
    fn test_parse_chunk_without_content_is_skipped() {
        let role_header = r#"{"choices":[{"index":0,"delta":{"role":"assistant"}}]}"#;
        let finish = r#"{"choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}"#;
        let empty = r#"{"choices":[]}"#;
        assert_eq!(parse_chunk(role_header), StreamEvent::Skipped);
        assert_eq!(parse_chunk(finish), StreamEvent::Skipped);
        assert_eq!(parse_chunk(empty), StreamEvent::Skipped);
    }

    #[test]
    fn test_parse_chunk_garbage_is_skipped() {
        assert_eq!(parse_chunk("not json"), StreamEvent::Skipped);
    }

    #[test]
    fn test_is_chat_model() {
        assert!(is_chat_model("gpt-4"));
        assert!(is_chat_model("gpt-3.5-turbo-16k"));
        assert!(is_chat_model("o1-mini"));
        assert!(!is_chat_model("gpt-3.5-turbo-instruct"));
        assert!(!is_chat_model("text-embedding-3-small"));
        assert!(!is_chat_model("whisper-1"));
    }

    #[tokio::test]
    async fn test_refused_connection_is_retryable() {
        let provider = OpenAIProvider::new("k").with_base_url("http://127.0.0.1:1/v1");
        let model = ModelProfile::new("gpt-4", 8192);
        let err = match provider.stream(&model, &[Turn::user("hi")]).await {
            Ok(_) => panic!("stream opened against a closed port"),
            Err(e) => e,
        };
        assert!(err.is_retryable(), "unexpected error: {}", err);
    }

    #[test]
    fn test_with_base_url_trims_slash() {
        let provider = OpenAIProvider::new("k").with_base_url("http://localhost:8080/v1/");
        assert_eq!(provider.base_url, "http://localhost:8080/v1");
    }
}
