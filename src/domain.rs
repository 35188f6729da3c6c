//! Domain models used by the backend: generated questions, evaluation results,
//! model catalog entries and the image analysis shape.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What kind of exercise is presented to the learner?
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionType {
    /// Pick exactly one option; compared by option id.
    MultipleChoice,
    /// Numeric answer per step, compared with a tolerance.
    StepByStep,
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionType::MultipleChoice => f.write_str("multiple-choice"),
            QuestionType::StepByStep => f.write_str("step-by-step"),
        }
    }
}

/// A JSON value that is either a number or a string. Models and browsers
/// are inconsistent about `3.5` vs `"3,5"`, so both are accepted.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Scalar {
    Number(f64),
    Text(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Number(n) => write!(f, "{}", n),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceOption {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SolutionStep {
    pub step_number: u32,
    #[serde(default)]
    pub instruction: String,
    pub expected_answer: Scalar,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<f64>,
}

/// One generated exercise. Produced by the model, checked by the handler and
/// handed to the browser, which is the only durable store.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionRecord {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    pub difficulty: u8,
    #[serde(default)]
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<ChoiceOption>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<SolutionStep>,
    #[serde(default)]
    pub hints: Vec<String>,
    #[serde(default)]
    pub solution: String,
    #[serde(default)]
    pub explanation: String,
}

/// Number of hint levels every question carries, from vague to specific.
pub const HINT_LEVELS: usize = 3;

impl QuestionRecord {
    /// Structural check for freshly generated questions.
    pub fn check(&self) -> Result<(), String> {
        let id = if self.id.is_empty() { "<ohne id>" } else { self.id.as_str() };
        if !(1..=5).contains(&self.difficulty) {
            return Err(format!("question {}: difficulty {} outside 1-5", id, self.difficulty));
        }
        if self.question.trim().is_empty() {
            return Err(format!("question {}: empty question text", id));
        }
        if self.hints.len() != HINT_LEVELS {
            return Err(format!("question {}: expected {} hints, got {}", id, HINT_LEVELS, self.hints.len()));
        }
        match self.kind {
            QuestionType::MultipleChoice => {
                let correct = self.options.iter().filter(|o| o.is_correct).count();
                if self.options.len() < 2 {
                    return Err(format!("question {}: multiple-choice needs at least 2 options", id));
                }
                if correct != 1 {
                    return Err(format!("question {}: expected exactly one correct option, got {}", id, correct));
                }
            }
            QuestionType::StepByStep => {
                if self.steps.is_empty() {
                    return Err(format!("question {}: step-by-step without steps", id));
                }
            }
        }
        Ok(())
    }
}

/// The answer revealed to the learner after evaluation.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum CorrectAnswer {
    /// Id of the correct multiple-choice option.
    Option(String),
    /// Expected answer per step, in step order.
    Steps(Vec<Scalar>),
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct XpBreakdown {
    pub base: i32,
    pub hint_penalty: i32,
    /// Always 0 with the current policy.
    pub time_penalty: i32,
    pub bonuses: i32,
    pub total: i32,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    pub is_correct: bool,
    pub feedback: String,
    pub correct_answer: CorrectAnswer,
    pub xp_earned: u32,
    pub xp_breakdown: XpBreakdown,
    /// Per-step verdicts (step-by-step only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub step_results: Vec<bool>,
}

/// Model entry as listed by a provider, before normalization.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawModel {
    pub id: String,
    pub created_at: Option<String>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    Fast,
    Balanced,
    Powerful,
    Standard,
}

/// Display-friendly catalog entry derived from a raw provider model id.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ModelDescriptor {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub tier: ModelTier,
    pub description: String,
    pub created: Option<DateTime<Utc>>,
}

/// One curriculum entry recognized on a photographed page
/// (Leitidee / Thema / Unterthema).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DetectedTopic {
    #[serde(default)]
    pub leitidee: String,
    pub thema: String,
    #[serde(default)]
    pub unterthema: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub afb: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImageAnalysis {
    pub topics: Vec<DetectedTopic>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub suggested_difficulty: Option<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mc_question() -> QuestionRecord {
        serde_json::from_value(json!({
            "id": "q1",
            "type": "multiple-choice",
            "difficulty": 2,
            "question": "Was ist 2 + 2?",
            "options": [
                {"id": "a", "text": "3", "isCorrect": false},
                {"id": "b", "text": "4", "isCorrect": true}
            ],
            "hints": ["h1", "h2", "h3"],
            "solution": "4",
            "explanation": "Addition."
        }))
        .unwrap()
    }

    #[test]
    fn question_uses_wire_names() {
        let q = mc_question();
        assert_eq!(q.kind, QuestionType::MultipleChoice);
        let back = serde_json::to_value(&q).unwrap();
        assert_eq!(back["type"], "multiple-choice");
        assert_eq!(back["options"][1]["isCorrect"], true);
        assert!(back.get("steps").is_none());
    }

    #[test]
    fn check_accepts_well_formed_question() {
        assert!(mc_question().check().is_ok());
    }

    #[test]
    fn check_rejects_structural_problems() {
        let mut q = mc_question();
        q.hints.pop();
        assert!(q.check().unwrap_err().contains("hints"));

        let mut q = mc_question();
        q.options[0].is_correct = true;
        assert!(q.check().unwrap_err().contains("exactly one"));

        let mut q = mc_question();
        q.difficulty = 6;
        assert!(q.check().is_err());
    }

    #[test]
    fn scalar_accepts_numbers_and_text() {
        let s: Vec<Scalar> = serde_json::from_value(json!([1.5, "3,5"])).unwrap();
        assert_eq!(s[0], Scalar::Number(1.5));
        assert_eq!(s[1], Scalar::Text("3,5".into()));
    }
}
