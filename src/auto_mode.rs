//! AUTO mode: adaptive detail level, temperature and helpfulness.
//!
//! The model proposes new values after a batch of answered questions; whatever
//! it returns is clamped into range before it reaches the browser.

use serde::{Deserialize, Serialize};

/// Settings as shown to (and stored by) the browser.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AutoModeAssessment {
    /// 0–100
    pub detail_level: u8,
    /// 0.0–1.0, one decimal
    pub temperature: f64,
    /// 0–100
    pub helpfulness: u8,
    /// Model's justification. Never sent to the client.
    #[serde(default, skip_serializing)]
    pub reasoning: String,
}

impl Default for AutoModeAssessment {
    fn default() -> Self {
        Self { detail_level: 50, temperature: 0.7, helpfulness: 50, reasoning: String::new() }
    }
}

/// Unchecked values, as sent by the model or the browser.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentDraft {
    pub detail_level: f64,
    pub temperature: f64,
    pub helpfulness: f64,
    #[serde(default)]
    pub reasoning: String,
}

impl Default for AssessmentDraft {
    fn default() -> Self {
        let d = AutoModeAssessment::default();
        Self {
            detail_level: f64::from(d.detail_level),
            temperature: d.temperature,
            helpfulness: f64::from(d.helpfulness),
            reasoning: String::new(),
        }
    }
}

impl AssessmentDraft {
    pub fn clamped(self) -> AutoModeAssessment {
        AutoModeAssessment {
            detail_level: percent(self.detail_level),
            temperature: (self.temperature.clamp(0.0, 1.0) * 10.0).round() / 10.0,
            helpfulness: percent(self.helpfulness),
            reasoning: self.reasoning,
        }
    }
}

fn percent(v: f64) -> u8 {
    v.round().clamp(0.0, 100.0) as u8
}

/// Aggregate of the learner's answers since the last assessment.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSummary {
    pub answered: u32,
    pub correct: u32,
    #[serde(default)]
    pub skipped: u32,
    #[serde(default)]
    pub average_hints: f64,
    /// Seconds per question.
    #[serde(default)]
    pub average_time: f64,
    #[serde(default)]
    pub average_difficulty: Option<f64>,
}

impl PerformanceSummary {
    pub fn accuracy_percent(&self) -> u32 {
        if self.answered == 0 {
            0
        } else {
            ((f64::from(self.correct.min(self.answered)) / f64::from(self.answered)) * 100.0).round() as u32
        }
    }

    /// Compact German block for the assessment prompt.
    pub fn to_prompt_text(&self) -> String {
        let mut lines = vec![
            format!("- Beantwortete Aufgaben: {}", self.answered),
            format!("- Davon richtig: {} ({} %)", self.correct, self.accuracy_percent()),
            format!("- Übersprungen: {}", self.skipped),
            format!("- Durchschnittlich genutzte Hinweise: {:.1}", self.average_hints),
            format!("- Durchschnittliche Bearbeitungszeit: {:.0} s", self.average_time),
        ];
        if let Some(d) = self.average_difficulty {
            lines.push(format!("- Durchschnittliche Schwierigkeit: {:.1}", d));
        }
        lines.join("\n")
    }
}

/// Optional section for the question prompt when AUTO mode is on.
pub fn question_prompt_section(a: &AutoModeAssessment) -> String {
    format!(
        "AUTO-Modus ist aktiv: Detailgrad der Erklärungen {}/100, Hilfsbereitschaft der Hinweise {}/100. \
         Passe Länge der Erklärungen und Deutlichkeit der Hinweise daran an.",
        a.detail_level, a.helpfulness
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn clamps_out_of_range_values() {
        let draft: AssessmentDraft = serde_json::from_value(json!({
            "detailLevel": 140.2,
            "temperature": 1.7,
            "helpfulness": -5,
            "reasoning": "zu viele Fehler"
        }))
        .unwrap();
        let a = draft.clamped();
        assert_eq!(a.detail_level, 100);
        assert_eq!(a.temperature, 1.0);
        assert_eq!(a.helpfulness, 0);
        assert_eq!(a.reasoning, "zu viele Fehler");
    }

    #[test]
    fn temperature_has_one_decimal() {
        let draft = AssessmentDraft { temperature: 0.66, ..AssessmentDraft::default() };
        assert_eq!(draft.clamped().temperature, 0.7);
        let draft = AssessmentDraft { temperature: 0.04, ..AssessmentDraft::default() };
        assert_eq!(draft.clamped().temperature, 0.0);
    }

    #[test]
    fn reasoning_is_not_serialized() {
        let a = AssessmentDraft { reasoning: "intern".into(), ..AssessmentDraft::default() }.clamped();
        let v = serde_json::to_value(&a).unwrap();
        assert!(v.get("reasoning").is_none());
        assert_eq!(v["detailLevel"], 50);
    }

    #[test]
    fn performance_text() {
        let p = PerformanceSummary { answered: 8, correct: 6, skipped: 1, average_hints: 1.25, average_time: 42.4, average_difficulty: None };
        assert_eq!(p.accuracy_percent(), 75);
        let text = p.to_prompt_text();
        assert!(text.contains("Davon richtig: 6 (75 %)"));
        assert!(text.contains("Hinweise: 1.2") || text.contains("Hinweise: 1.3"));
        assert!(!text.contains("Schwierigkeit"));
    }

    #[test]
    fn empty_performance_has_zero_accuracy() {
        assert_eq!(PerformanceSummary::default().accuracy_percent(), 0);
    }
}
