//! Prompt registry and rendering engine.
//!
//! The registry is built once at start-up (built-in templates, optionally
//! overridden from the TOML config) and owned by the engine afterwards.
//! Templates use `{{NAME}}` placeholders.

use std::collections::BTreeMap;
use std::fmt;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const IMAGE_ANALYSIS: &str = "image_analysis";
pub const QUESTION_GENERATION: &str = "question_generation";
pub const AUTO_MODE_ASSESSMENT: &str = "auto_mode_assessment";
pub const SOLUTION_EXPLANATION: &str = "solution_explanation";
pub const SYSTEM_TUTOR: &str = "system_tutor";

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}").expect("PLACEHOLDER is a valid regex pattern")
});

const SYSTEM_TUTOR_TEMPLATE: &str = r#"
Du bist ein geduldiger Mathematik-Tutor für Schülerinnen und Schüler an einem deutschen Gymnasium.
Du orientierst dich an den Bildungsstandards (Leitideen, Themen, Unterthemen) und an den
Anforderungsbereichen AFB I bis III. Antworte immer auf Deutsch. Wenn JSON verlangt ist,
antworte ausschließlich mit gültigem JSON ohne zusätzlichen Text.
"#;

const IMAGE_ANALYSIS_TEMPLATE: &str = r#"
Analysiere das Foto einer Schulbuch- oder Arbeitsblattseite.
Klassenstufe: {{GRADE_LEVEL}}
Kursart: {{COURSE_TYPE}}

Bestimme die mathematischen Themen, die auf der Seite behandelt werden, und ordne sie
dem Lehrplan zu (Leitidee -> Thema -> Unterthema). Gib, falls erkennbar, den
Anforderungsbereich (AFB I, II oder III) an.

Antworte ausschließlich mit JSON in diesem Format:
{
  "topics": [
    {"leitidee": "...", "thema": "...", "unterthema": "...", "afb": "II"}
  ],
  "summary": "Kurze Zusammenfassung der Seite",
  "suggestedDifficulty": 3
}
"#;

const QUESTION_GENERATION_TEMPLATE: &str = r#"
Erstelle {{QUESTION_COUNT}} Übungsaufgaben für Klassenstufe {{GRADE_LEVEL}} ({{COURSE_TYPE}}).
Themen: {{TOPICS}}
Schwierigkeit (1 = sehr leicht, 5 = sehr schwer): {{DIFFICULTY}}
Erlaubte Aufgabentypen: {{QUESTION_TYPES}}

{{AUTO_MODE_SECTION}}

Regeln:
- "multiple-choice": genau eine Option mit "isCorrect": true, 3 bis 5 Optionen mit ids "a", "b", "c", ...
- "step-by-step": jeder Schritt hat eine numerische "expectedAnswer" und optional "tolerance".
- Jede Aufgabe hat genau 3 Hinweise mit steigender Genauigkeit (der dritte verrät fast die Lösung).
- Formeln in LaTeX-Schreibweise mit $...$.

Antworte ausschließlich mit JSON in diesem Format:
{
  "questions": [
    {
      "id": "q1",
      "type": "multiple-choice",
      "difficulty": 3,
      "topic": "...",
      "question": "...",
      "options": [{"id": "a", "text": "...", "isCorrect": false}],
      "steps": [{"stepNumber": 1, "instruction": "...", "expectedAnswer": 2.5, "tolerance": 0.01}],
      "hints": ["...", "...", "..."],
      "solution": "...",
      "explanation": "..."
    }
  ]
}
"#;

const AUTO_MODE_ASSESSMENT_TEMPLATE: &str = r#"
Bewerte den Lernstand und passe die Tutor-Einstellungen an.

Aktuelle Einstellungen:
- Detailgrad der Erklärungen (0-100): {{CURRENT_DETAIL_LEVEL}}
- Temperatur / Kreativität (0.0-1.0): {{CURRENT_TEMPERATURE}}
- Hilfsbereitschaft der Hinweise (0-100): {{CURRENT_HELPFULNESS}}

Leistung seit der letzten Bewertung:
{{PERFORMANCE_SUMMARY}}

Wer viele Fehler macht oder viele Hinweise braucht, bekommt ausführlichere Erklärungen
und hilfreichere Hinweise. Wer schnell und sicher löst, bekommt knappere Erklärungen.
Ändere die Werte behutsam.

Antworte ausschließlich mit JSON:
{"detailLevel": 60, "temperature": 0.7, "helpfulness": 55, "reasoning": "..."}
"#;

const SOLUTION_EXPLANATION_TEMPLATE: &str = r#"
Erkläre einer Schülerin oder einem Schüler der Klassenstufe {{GRADE_LEVEL}} die Lösung dieser Aufgabe.

Aufgabe: {{QUESTION}}
Antwort der Schülerin / des Schülers: {{USER_ANSWER}}
Richtige Antwort: {{CORRECT_ANSWER}}

Gehe auf den vermutlichen Denkfehler ein und erkläre den Lösungsweg Schritt für Schritt.
Antworte in einfachem Fließtext, ohne JSON.
"#;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PromptError {
    #[error("unknown prompt template '{name}' (available: {available})")]
    UnknownTemplate { name: String, available: String },
}

/// Immutable name → template map.
#[derive(Clone, Debug)]
pub struct PromptRegistry {
    templates: BTreeMap<String, String>,
}

impl PromptRegistry {
    pub fn builtin() -> Self {
        let templates = [
            (SYSTEM_TUTOR, SYSTEM_TUTOR_TEMPLATE),
            (IMAGE_ANALYSIS, IMAGE_ANALYSIS_TEMPLATE),
            (QUESTION_GENERATION, QUESTION_GENERATION_TEMPLATE),
            (AUTO_MODE_ASSESSMENT, AUTO_MODE_ASSESSMENT_TEMPLATE),
            (SOLUTION_EXPLANATION, SOLUTION_EXPLANATION_TEMPLATE),
        ]
        .into_iter()
        .map(|(name, tpl)| (name.to_string(), tpl.to_string()))
        .collect();
        Self { templates }
    }

    /// Built-in templates with per-name replacements (e.g. from `[prompts]` in TOML).
    pub fn with_overrides(overrides: &BTreeMap<String, String>) -> Self {
        let mut registry = Self::builtin();
        for (name, tpl) in overrides {
            let replaced = registry.templates.insert(name.clone(), tpl.clone()).is_some();
            info!(target: "prompt", %name, replaced, "Prompt template loaded from config");
        }
        registry
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.templates.get(name).map(String::as_str)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }
}

/// Per-request placeholder values.
#[derive(Clone, Debug, Default)]
pub struct Variables {
    values: BTreeMap<String, String>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl fmt::Display) -> Self {
        self.values.insert(key.to_string(), value.to_string());
        self
    }

    /// `None` renders as an empty string.
    pub fn with_opt<V: fmt::Display>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.with(key, v),
            None => self.with(key, ""),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

pub struct PromptEngine {
    registry: PromptRegistry,
}

impl PromptEngine {
    pub fn new(registry: PromptRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &PromptRegistry {
        &self.registry
    }

    /// Substitute `variables` into the named template.
    ///
    /// Placeholders without a value are replaced with an empty string and
    /// reported with a warning; some templates carry optional sections.
    pub fn render(&self, name: &str, variables: &Variables) -> Result<String, PromptError> {
        let template = self.registry.get(name).ok_or_else(|| PromptError::UnknownTemplate {
            name: name.to_string(),
            available: self.registry.names().collect::<Vec<_>>().join(", "),
        })?;

        let (out, unresolved) = substitute(template, variables);
        if !unresolved.is_empty() {
            warn!(target: "prompt", template = %name, unresolved = ?unresolved, "Unresolved prompt placeholders rendered empty");
        }

        debug!(target: "prompt", template = %name, len = out.len(), "Prompt rendered");
        Ok(out)
    }
}

/// Single pass over `template`; returns the trimmed text and the placeholder
/// keys that had no value, in order of first appearance.
fn substitute(template: &str, variables: &Variables) -> (String, Vec<String>) {
    let mut unresolved: Vec<String> = Vec::new();
    let rendered = PLACEHOLDER.replace_all(template, |caps: &Captures| {
        let key = &caps[1];
        match variables.get(key) {
            Some(value) => value.to_string(),
            None => {
                if !unresolved.iter().any(|k| k == key) {
                    unresolved.push(key.to_string());
                }
                String::new()
            }
        }
    });
    (rendered.trim().to_string(), unresolved)
}
