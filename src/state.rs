//! Application state shared by all handlers.
//!
//! Everything in here is read-only after start-up: the prompt engine, the
//! provider settings, the demo login and one pooled HTTP client. Provider
//! clients are built per request because the API key belongs to the learner.

use std::time::Duration;

use tracing::{info, instrument};

use crate::config::{AppConfig, DemoAuth, ProviderSettings};
use crate::prompts::{PromptEngine, PromptRegistry};
use crate::providers::{build_provider, LlmProvider, ProviderFamily};

pub struct AppState {
    pub prompts: PromptEngine,
    pub providers: ProviderSettings,
    pub auth: DemoAuth,
    pub http: reqwest::Client,
}

impl AppState {
    #[instrument(level = "info", skip_all)]
    pub fn new(cfg: AppConfig) -> Result<Self, reqwest::Error> {
        let registry = PromptRegistry::with_overrides(&cfg.prompts);
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        info!(
            target: "mathe_tutor",
            claude_base_url = %cfg.providers.claude_base_url,
            gemini_base_url = %cfg.providers.gemini_base_url,
            claude_default_model = %cfg.providers.claude_default_model,
            gemini_default_model = %cfg.providers.gemini_default_model,
            templates = registry.names().count(),
            "Application state ready"
        );

        Ok(Self {
            prompts: PromptEngine::new(registry),
            providers: cfg.providers,
            auth: cfg.auth,
            http,
        })
    }

    pub fn provider(&self, family: ProviderFamily, api_key: &str) -> Box<dyn LlmProvider> {
        build_provider(family, api_key, &self.providers, self.http.clone())
    }

    /// Requested model, or the configured default for the family when absent or blank.
    pub fn model_for(&self, family: ProviderFamily, requested: Option<&str>) -> String {
        match requested.map(str::trim) {
            Some(m) if !m.is_empty() => m.to_string(),
            _ => match family {
                ProviderFamily::Claude => self.providers.claude_default_model.clone(),
                ProviderFamily::Gemini => self.providers.gemini_default_model.clone(),
            },
        }
    }
}
