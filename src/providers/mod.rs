//! LLM provider clients (Anthropic Claude, Google Gemini).
//!
//! Both speak the same small contract: one completion call (text, optionally
//! with an image) and one model listing. Calls are instrumented and log model
//! names, latencies and token usage, never contents or keys. Nothing is retried;
//! every failure goes straight back to the caller.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::ProviderSettings;
use crate::domain::RawModel;

pub mod claude;
pub mod gemini;

pub use claude::ClaudeProvider;
pub use gemini::GeminiProvider;

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProviderFamily {
  #[default]
  Claude,
  Gemini,
}

impl fmt::Display for ProviderFamily {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ProviderFamily::Claude => f.write_str("claude"),
      ProviderFamily::Gemini => f.write_str("gemini"),
    }
  }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContentPart {
  Text(String),
  /// Base64 image data (no data-URL prefix).
  Image { media_type: String, data: String },
}

#[derive(Clone, Debug)]
pub struct CompletionRequest {
  pub model: String,
  pub max_tokens: u32,
  pub temperature: Option<f32>,
  pub system: Option<String>,
  pub content: Vec<ContentPart>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Completion {
  pub text: String,
  pub input_tokens: u32,
  pub output_tokens: u32,
}

#[derive(Debug, Error)]
pub enum ProviderError {
  /// Non-2xx from the provider; `details` is the upstream body.
  #[error("provider returned HTTP {status}")]
  Upstream { status: u16, details: Value },

  #[error("request timed out after {0}s")]
  Timeout(u64),

  #[error("network error: {0}")]
  Network(String),

  /// 2xx with a body we cannot read.
  #[error("invalid provider response: {0}")]
  InvalidResponse(String),

  /// 2xx without any generated text (e.g. a safety block). `raw` is the body.
  #[error("provider returned no content: {reason}")]
  NoContent { reason: String, raw: String },
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
  fn family(&self) -> ProviderFamily;

  async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ProviderError>;

  async fn list_models(&self) -> Result<Vec<RawModel>, ProviderError>;
}

/// Build a client for one request. The API key belongs to the learner and
/// arrives with every request; the HTTP connection pool is shared.
pub fn build_provider(
  family: ProviderFamily,
  api_key: &str,
  settings: &ProviderSettings,
  client: reqwest::Client,
) -> Box<dyn LlmProvider> {
  match family {
    ProviderFamily::Claude => Box::new(ClaudeProvider::new(client, api_key, &settings.claude_base_url, settings.timeout_secs)),
    ProviderFamily::Gemini => Box::new(GeminiProvider::new(client, api_key, &settings.gemini_base_url, settings.timeout_secs)),
  }
}

pub(crate) fn send_error(e: reqwest::Error, timeout_secs: u64) -> ProviderError {
  if e.is_timeout() { ProviderError::Timeout(timeout_secs) } else { ProviderError::Network(e.to_string()) }
}

/// Turn a non-2xx response into `ProviderError::Upstream`, keeping the body.
pub(crate) async fn upstream_error(res: reqwest::Response) -> ProviderError {
  let status = res.status().as_u16();
  let body = res.text().await.unwrap_or_default();
  let details = serde_json::from_str::<Value>(&body).unwrap_or_else(|_| serde_json::json!({ "message": body }));
  ProviderError::Upstream { status, details }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn family_wire_names() {
    assert_eq!(serde_json::from_str::<ProviderFamily>("\"claude\"").unwrap(), ProviderFamily::Claude);
    assert!(serde_json::from_str::<ProviderFamily>("\"gpt\"").is_err());
    assert_eq!(ProviderFamily::default(), ProviderFamily::Claude);
    assert_eq!(serde_json::to_string(&ProviderFamily::Gemini).unwrap(), "\"gemini\"");
  }
}
