//! Google Gemini (Generative Language API) client.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use super::{send_error, upstream_error, Completion, CompletionRequest, ContentPart, LlmProvider, ProviderError, ProviderFamily};
use crate::domain::RawModel;

pub struct GeminiProvider {
  client: reqwest::Client,
  api_key: String,
  base_url: String,
  timeout_secs: u64,
}

impl GeminiProvider {
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
      .header("x-goog-api-key", &self.api_key)
      .timeout(Duration::from_secs(self.timeout_secs))
  }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
  fn family(&self) -> ProviderFamily {
    ProviderFamily::Gemini
  }

  #[instrument(level = "info", skip(self, request), fields(model = %request.model, parts = request.content.len()))]
  async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ProviderError> {
    let body = GenerateRequest {
      system_instruction: request.system.as_deref().map(|text| SystemInstruction { parts: vec![Part::Text { text }] }),
      contents: vec![Content { role: "user", parts: request.content.iter().map(Part::from).collect() }],
      generation_config: GenerationConfig { temperature: request.temperature, max_output_tokens: request.max_tokens },
    };

    let model = request.model.trim_start_matches("models/");
    let start = Instant::now();
    let res = self
      .request(self.client.post(format!("{}/v1beta/models/{}:generateContent", self.base_url, model)))
      .header(CONTENT_TYPE, "application/json")
      .json(&body)
      .send()
      .await
      .map_err(|e| send_error(e, self.timeout_secs))?;

    if !res.status().is_success() {
      return Err(upstream_error(res).await);
    }

    let raw = res.text().await.map_err(|e| send_error(e, self.timeout_secs))?;
    let parsed: GenerateResponse =
      serde_json::from_str(&raw).map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

    let Some(candidate) = parsed.candidates.into_iter().next() else {
      let reason = parsed
        .prompt_feedback
        .and_then(|f| f.block_reason)
        .map(|r| format!("no candidates (blockReason {r})"))
        .unwrap_or_else(|| "no candidates".into());
      warn!(target: "provider", %reason, "Gemini returned no candidates");
      return Err(ProviderError::NoContent { reason, raw });
    };
    let text = candidate
      .content
      .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect::<Vec<_>>().join(""))
      .unwrap_or_default();

    let usage = parsed.usage_metadata.unwrap_or_default();
    info!(
      target: "provider",
      elapsed_ms = start.elapsed().as_millis() as u64,
      input_tokens = usage.prompt_token_count,
      output_tokens = usage.candidates_token_count,
      finish_reason = candidate.finish_reason.as_deref().unwrap_or("unknown"),
      response_len = text.len(),
      "Gemini completion received"
    );

    Ok(Completion { text, input_tokens: usage.prompt_token_count, output_tokens: usage.candidates_token_count })
  }

  #[instrument(level = "info", skip(self))]
  async fn list_models(&self) -> Result<Vec<RawModel>, ProviderError> {
    let res = self
      .request(self.client.get(format!("{}/v1beta/models", self.base_url)))
      .query(&[("pageSize", "100")])
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
    info!(target: "provider", count = parsed.models.len(), "Gemini models listed");

    // Gemini publishes no creation date; the catalog keeps listing order.
    Ok(parsed
      .models
      .into_iter()
      .filter(|m| m.supported_generation_methods.iter().any(|g| g == "generateContent"))
      .map(|m| RawModel { id: m.name.trim_start_matches("models/").to_string(), created_at: None })
      .collect())
  }
}

// --- generateContent DTOs ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
  #[serde(skip_serializing_if = "Option::is_none")]
  system_instruction: Option<SystemInstruction<'a>>,
  contents: Vec<Content<'a>>,
  generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct SystemInstruction<'a> {
  parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
  role: &'a str,
  parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
  Text { text: &'a str },
  Inline {
    #[serde(rename = "inlineData")]
    inline_data: InlineData<'a>,
  },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
  mime_type: &'a str,
  data: &'a str,
}

impl<'a> From<&'a ContentPart> for Part<'a> {
  fn from(part: &'a ContentPart) -> Self {
    match part {
      ContentPart::Text(text) => Part::Text { text },
      ContentPart::Image { media_type, data } => Part::Inline { inline_data: InlineData { mime_type: media_type, data } },
    }
  }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
  #[serde(skip_serializing_if = "Option::is_none")]
  temperature: Option<f32>,
  max_output_tokens: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
  #[serde(default)]
  candidates: Vec<Candidate>,
  #[serde(default)]
  usage_metadata: Option<UsageMetadata>,
  #[serde(default)]
  prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
  #[serde(default)]
  block_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
  #[serde(default)]
  content: Option<CandidateContent>,
  #[serde(default)]
  finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
  #[serde(default)]
  parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
  #[serde(default)]
  text: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
  #[serde(default)]
  prompt_token_count: u32,
  #[serde(default)]
  candidates_token_count: u32,
}

#[derive(Deserialize)]
struct ModelsResponse {
  #[serde(default)]
  models: Vec<ModelEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelEntry {
  name: String,
  #[serde(default)]
  supported_generation_methods: Vec<String>,
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use wiremock::matchers::{body_partial_json, header, method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn provider(server: &MockServer) -> GeminiProvider {
    GeminiProvider::new(reqwest::Client::new(), "g-key", &server.uri(), 5)
  }

  #[tokio::test]
  async fn successful_completion() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
      .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
      .and(header("x-goog-api-key", "g-key"))
      .and(body_partial_json(json!({
        "systemInstruction": {"parts": [{"text": "System"}]},
        "contents": [{"role": "user", "parts": [
          {"inlineData": {"mimeType": "image/jpeg", "data": "aGFsbG8="}},
          {"text": "Frage"}
        ]}],
        "generationConfig": {"maxOutputTokens": 256}
      })))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "candidates": [{"content": {"parts": [{"text": "Ant"}, {"text": "wort"}]}, "finishReason": "STOP"}],
        "usageMetadata": {"promptTokenCount": 30, "candidatesTokenCount": 2}
      })))
      .mount(&server)
      .await;

    let request = CompletionRequest {
      model: "models/gemini-2.0-flash".into(),
      max_tokens: 256,
      temperature: None,
      system: Some("System".into()),
      content: vec![
        ContentPart::Image { media_type: "image/jpeg".into(), data: "aGFsbG8=".into() },
        ContentPart::Text("Frage".into()),
      ],
    };
    let out = provider(&server).complete(&request).await.unwrap();
    assert_eq!(out.text, "Antwort");
    assert_eq!(out.input_tokens, 30);
    assert_eq!(out.output_tokens, 2);
  }

  #[tokio::test]
  async fn blocked_prompt_has_no_content() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"promptFeedback": {"blockReason": "SAFETY"}})))
      .mount(&server)
      .await;

    let request = CompletionRequest {
      model: "gemini-2.0-flash".into(),
      max_tokens: 16,
      temperature: Some(0.5),
      system: None,
      content: vec![ContentPart::Text("x".into())],
    };
    match provider(&server).complete(&request).await.unwrap_err() {
      ProviderError::NoContent { reason, raw } => {
        assert!(reason.contains("SAFETY"), "{reason}");
        assert!(raw.contains("promptFeedback"));
      }
      other => panic!("unexpected error: {other:?}"),
    }
  }

  #[tokio::test]
  async fn upstream_status_is_kept() {
    let server = MockServer::start().await;
    let body = json!({"error": {"code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT"}});

    Mock::given(method("GET"))
      .and(path("/v1beta/models"))
      .respond_with(ResponseTemplate::new(400).set_body_json(&body))
      .mount(&server)
      .await;

    let err = provider(&server).list_models().await.unwrap_err();
    assert!(matches!(err, ProviderError::Upstream { status: 400, ref details } if details == &body));
  }

  #[tokio::test]
  async fn lists_generation_models_only() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
      .and(path("/v1beta/models"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "models": [
          {"name": "models/gemini-1.5-pro", "supportedGenerationMethods": ["generateContent", "countTokens"]},
          {"name": "models/text-embedding-004", "supportedGenerationMethods": ["embedContent"]}
        ]
      })))
      .mount(&server)
      .await;

    let models = provider(&server).list_models().await.unwrap();
    assert_eq!(models, vec![RawModel { id: "gemini-1.5-pro".into(), created_at: None }]);
  }
}
