//! Loading service configuration (providers, prompt overrides, demo login) from TOML.
//!
//! Every section is optional; missing values fall back to the defaults below.
//! Example:
//!
//! ```toml
//! [providers]
//! claude_default_model = "claude-3-5-haiku-20241022"
//! excluded_model_tiers = ["opus"]
//!
//! [prompts]
//! system_tutor = "Du bist ein freundlicher Mathe-Tutor."
//!
//! [auth]
//! username = "klasse9b"
//! password = "geheim"
//! ```

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::{error, info};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
  #[serde(default)]
  pub providers: ProviderSettings,
  /// Template name → template text; replaces or extends the built-in prompts.
  #[serde(default)]
  pub prompts: BTreeMap<String, String>,
  #[serde(default)]
  pub auth: DemoAuth,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
  pub claude_base_url: String,
  pub gemini_base_url: String,
  pub claude_default_model: String,
  pub gemini_default_model: String,
  pub max_tokens: u32,
  pub timeout_secs: u64,
  /// Id substrings hidden from the model catalog (cost gate).
  pub excluded_model_tiers: Vec<String>,
}

impl Default for ProviderSettings {
  fn default() -> Self {
    Self {
      claude_base_url: "https://api.anthropic.com".into(),
      gemini_base_url: "https://generativelanguage.googleapis.com".into(),
      claude_default_model: "claude-sonnet-4-20250514".into(),
      gemini_default_model: "gemini-2.0-flash".into(),
      max_tokens: 4096,
      timeout_secs: 90,
      excluded_model_tiers: vec!["opus".into()],
    }
  }
}

/// Placeholder login for the demo deployment. Not a security boundary.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DemoAuth {
  pub username: String,
  pub password: String,
}

impl Default for DemoAuth {
  fn default() -> Self {
    Self { username: "demo".into(), password: "mathe2024".into() }
  }
}

impl AppConfig {
  pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
    toml::from_str(s)
  }

  /// TOML file from TUTOR_CONFIG_PATH (if any), then base-URL overrides from
  /// ANTHROPIC_BASE_URL / GEMINI_BASE_URL. Errors are logged and defaults used.
  pub fn from_env() -> Self {
    let mut cfg = load_config_file_from_env().unwrap_or_default();
    if let Ok(url) = std::env::var("ANTHROPIC_BASE_URL") {
      cfg.providers.claude_base_url = url;
    }
    if let Ok(url) = std::env::var("GEMINI_BASE_URL") {
      cfg.providers.gemini_base_url = url;
    }
    cfg
  }
}

/// Attempt to load `AppConfig` from TUTOR_CONFIG_PATH. On any parsing/IO error, returns None.
fn load_config_file_from_env() -> Option<AppConfig> {
  let path = std::env::var("TUTOR_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match AppConfig::from_toml_str(&s) {
      Ok(cfg) => {
        info!(target: "mathe_tutor", %path, prompt_overrides = cfg.prompts.len(), "Loaded config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "mathe_tutor", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "mathe_tutor", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_config_uses_defaults() {
    let cfg = AppConfig::from_toml_str("").unwrap();
    assert_eq!(cfg.providers.claude_base_url, "https://api.anthropic.com");
    assert_eq!(cfg.providers.excluded_model_tiers, vec!["opus".to_string()]);
    assert_eq!(cfg.auth.username, "demo");
    assert!(cfg.prompts.is_empty());
  }

  #[test]
  fn partial_sections_keep_other_defaults() {
    let cfg = AppConfig::from_toml_str(
      r#"
[providers]
max_tokens = 2048
excluded_model_tiers = []

[prompts]
system_tutor = "Kurz und freundlich."

[auth]
password = "geheim"
"#,
    )
    .unwrap();
    assert_eq!(cfg.providers.max_tokens, 2048);
    assert_eq!(cfg.providers.timeout_secs, 90);
    assert!(cfg.providers.excluded_model_tiers.is_empty());
    assert_eq!(cfg.prompts.get("system_tutor").map(String::as_str), Some("Kurz und freundlich."));
    assert_eq!(cfg.auth.username, "demo");
    assert_eq!(cfg.auth.password, "geheim");
  }

  #[test]
  fn invalid_toml_is_an_error() {
    assert!(AppConfig::from_toml_str("[providers\nmax_tokens = ").is_err());
  }
}
