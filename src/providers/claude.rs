//! Anthropic Messages API client.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::{send_error, upstream_error, Completion, CompletionRequest, ContentPart, LlmProvider, ProviderError, ProviderFamily};
use crate::domain::RawModel;

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct ClaudeProvider {
  client: reqwest::Client,
  api_key: String,
  base_url: String,
  timeout_secs: u64,
}

impl ClaudeProvider {
  pub fn new(client: reqwest::Client, api_key: &str, base_url: &str, timeout_secs: u64) -> Self {
    Self {
      client,
      api_key: api_key.to_string(),
      base_url: base_url.trim_end_matches('/').to_string(),
      timeout_secs,
    }
  }

  fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    builder
      .header(USER_AGENT, "mathe-tutor-backend/0.1")
      .header("x-api-key", &self.api_key)
      .header("anthropic-version", ANTHROPIC_VERSION)
      .timeout(Duration::from_secs(self.timeout_secs))
  }
}

#[async_trait]
impl LlmProvider for ClaudeProvider {
  fn family(&self) -> ProviderFamily {
    ProviderFamily::Claude
  }

  #[instrument(level = "info", skip(self, request), fields(model = %request.model, parts = request.content.len()))]
  async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ProviderError> {
    let body = MessagesRequest {
      model: &request.model,
      max_tokens: request.max_tokens,
      temperature: request.temperature,
      system: request.system.as_deref(),
      messages: vec![Message {
        role: "user",
        content: request.content.iter().map(ContentBlock::from).collect(),
      }],
    };

    let start = Instant::now();
    let res = self
      .request(self.client.post(format!("{}/v1/messages", self.base_url)))
      .header(CONTENT_TYPE, "application/json")
      .json(&body)
      .send()
      .await
      .map_err(|e| send_error(e, self.timeout_secs))?;

    if !res.status().is_success() {
      return Err(upstream_error(res).await);
    }

    let parsed: MessagesResponse = res
      .json()
      .await
      .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

    let text = parsed
      .content
      .iter()
      .filter_map(|c| c.text.as_deref())
      .collect::<Vec<_>>()
      .join("");

    info!(
      target: "provider",
      elapsed_ms = start.elapsed().as_millis() as u64,
      input_tokens = parsed.usage.input_tokens,
      output_tokens = parsed.usage.output_tokens,
      response_len = text.len(),
      "Claude completion received"
    );

    Ok(Completion { text, input_tokens: parsed.usage.input_tokens, output_tokens: parsed.usage.output_tokens })
  }

  #[instrument(level = "info", skip(self))]
  async fn list_models(&self) -> Result<Vec<RawModel>, ProviderError> {
    let res = self
      .request(self.client.get(format!("{}/v1/models", self.base_url)))
      .query(&[("limit", "100")])
      .send()
      .await
      .map_err(|e| send_error(e, self.timeout_secs))?;

    if !res.status().is_success() {
      return Err(upstream_error(res).await);
    }

    let parsed: ModelsResponse = res
      .json()
      .await
      .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
    info!(target: "provider", count = parsed.data.len(), "Claude models listed");

    Ok(parsed.data.into_iter().map(|m| RawModel { id: m.id, created_at: m.created_at }).collect())
  }
}

// --- Messages DTOs ---

#[derive(Serialize)]
struct MessagesRequest<'a> {
  model: &'a str,
  max_tokens: u32,
  #[serde(skip_serializing_if = "Option::is_none")]
  temperature: Option<f32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  system: Option<&'a str>,
  messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
  role: &'a str,
  content: Vec<ContentBlock<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock<'a> {
  Text { text: &'a str },
  Image { source: ImageSource<'a> },
}

#[derive(Serialize)]
struct ImageSource<'a> {
  #[serde(rename = "type")]
  kind: &'a str,
  media_type: &'a str,
  data: &'a str,
}

impl<'a> From<&'a ContentPart> for ContentBlock<'a> {
  fn from(part: &'a ContentPart) -> Self {
    match part {
      ContentPart::Text(text) => ContentBlock::Text { text },
      ContentPart::Image { media_type, data } => ContentBlock::Image {
        source: ImageSource { kind: "base64", media_type, data },
      },
    }
  }
}

#[derive(Deserialize)]
struct MessagesResponse {
  #[serde(default)]
  content: Vec<ResponseBlock>,
  #[serde(default)]
  usage: Usage,
}

#[derive(Deserialize)]
struct ResponseBlock {
  #[serde(default)]
  text: Option<String>,
}

#[derive(Deserialize, Default)]
struct Usage {
  #[serde(default)]
  input_tokens: u32,
  #[serde(default)]
  output_tokens: u32,
}

#[derive(Deserialize)]
struct ModelsResponse {
  #[serde(default)]
  data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
  id: String,
  #[serde(default)]
  created_at: Option<String>,
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use wiremock::matchers::{body_partial_json, header, method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn provider(server: &MockServer) -> ClaudeProvider {
    ClaudeProvider::new(reqwest::Client::new(), "test-key", &server.uri(), 5)
  }

  fn request(content: Vec<ContentPart>) -> CompletionRequest {
    CompletionRequest {
      model: "claude-sonnet-4-20250514".into(),
      max_tokens: 1024,
      temperature: Some(0.2),
      system: Some("Du bist ein Tutor.".into()),
      content,
    }
  }

  #[tokio::test]
  async fn successful_completion() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
      .and(path("/v1/messages"))
      .and(header("x-api-key", "test-key"))
      .and(header("anthropic-version", ANTHROPIC_VERSION))
      .and(body_partial_json(json!({
        "model": "claude-sonnet-4-20250514",
        "max_tokens": 1024,
        "system": "Du bist ein Tutor.",
        "messages": [{"role": "user", "content": [{"type": "text", "text": "Hallo"}]}]
      })))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "content": [{"type": "text", "text": "{\"ok\": "}, {"type": "text", "text": "true}"}],
        "usage": {"input_tokens": 12, "output_tokens": 4}
      })))
      .mount(&server)
      .await;

    let out = provider(&server).complete(&request(vec![ContentPart::Text("Hallo".into())])).await.unwrap();
    assert_eq!(out.text, "{\"ok\": true}");
    assert_eq!(out.input_tokens, 12);
    assert_eq!(out.output_tokens, 4);
  }

  #[tokio::test]
  async fn image_is_sent_as_base64_block() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
      .and(path("/v1/messages"))
      .and(body_partial_json(json!({
        "messages": [{"role": "user", "content": [
          {"type": "image", "source": {"type": "base64", "media_type": "image/png", "data": "aGFsbG8="}},
          {"type": "text", "text": "Analysiere"}
        ]}]
      })))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"content": [{"type": "text", "text": "ok"}]})))
      .mount(&server)
      .await;

    let parts = vec![
      ContentPart::Image { media_type: "image/png".into(), data: "aGFsbG8=".into() },
      ContentPart::Text("Analysiere".into()),
    ];
    let out = provider(&server).complete(&request(parts)).await.unwrap();
    assert_eq!(out.text, "ok");
  }

  #[tokio::test]
  async fn upstream_error_is_forwarded() {
    let server = MockServer::start().await;
    let error_body = json!({"type": "error", "error": {"type": "authentication_error", "message": "invalid x-api-key"}});

    Mock::given(method("POST"))
      .and(path("/v1/messages"))
      .respond_with(ResponseTemplate::new(401).set_body_json(&error_body))
      .mount(&server)
      .await;

    let err = provider(&server).complete(&request(vec![])).await.unwrap_err();
    match err {
      ProviderError::Upstream { status, details } => {
        assert_eq!(status, 401);
        assert_eq!(details, error_body);
      }
      other => panic!("unexpected error: {other:?}"),
    }
  }

  #[tokio::test]
  async fn non_json_error_body_is_wrapped() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
      .and(path("/v1/messages"))
      .respond_with(ResponseTemplate::new(529).set_body_string("overloaded"))
      .mount(&server)
      .await;

    let err = provider(&server).complete(&request(vec![])).await.unwrap_err();
    assert!(matches!(
      err,
      ProviderError::Upstream { status: 529, ref details } if details == &json!({"message": "overloaded"})
    ));
  }

  #[tokio::test]
  async fn lists_models() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
      .and(path("/v1/models"))
      .and(header("x-api-key", "test-key"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "data": [
          {"id": "claude-sonnet-4-20250514", "created_at": "2025-05-22T00:00:00Z", "display_name": "Claude Sonnet 4"},
          {"id": "claude-3-haiku-20240307", "created_at": "2024-03-07T00:00:00Z"}
        ]
      })))
      .mount(&server)
      .await;

    let models = provider(&server).list_models().await.unwrap();
    assert_eq!(models.len(), 2);
    assert_eq!(models[0].id, "claude-sonnet-4-20250514");
    assert_eq!(models[1].created_at.as_deref(), Some("2024-03-07T00:00:00Z"));
  }
}
