//! Answer evaluation and XP scoring.
//!
//! Pure functions: the same question and submission always produce the same
//! result. Feedback is German, like the rest of the learner-facing text.

use serde::Deserialize;
use thiserror::Error;

use crate::domain::{
    ChoiceOption, CorrectAnswer, EvaluationResult, QuestionRecord, QuestionType, Scalar, SolutionStep,
    XpBreakdown,
};

/// Tolerance for step answers that do not specify one.
pub const DEFAULT_TOLERANCE: f64 = 0.01;
/// Base XP for difficulties outside 1..=5.
pub const DEFAULT_BASE_XP: u32 = 20;
/// Share of base XP granted for a fast solution.
pub const SPEED_BONUS_RATE: f64 = 0.2;

// Keeps |actual - expected| == tolerance inclusive despite binary floating point.
const BOUNDARY_EPSILON: f64 = 1e-9;

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum UserAnswer {
    Steps(Vec<Scalar>),
    Single(Scalar),
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    #[serde(default)]
    pub user_answer: Option<UserAnswer>,
    #[serde(default)]
    pub hints_used: u32,
    /// Seconds.
    #[serde(default)]
    pub time_spent: f64,
    #[serde(default)]
    pub skipped: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EvaluationError {
    #[error("question {question_id}: expected exactly one correct option, found {found}")]
    CorrectOption { question_id: String, found: usize },
    #[error("question {question_id}: step-by-step question has no steps")]
    NoSteps { question_id: String },
}

pub fn base_xp(difficulty: u8) -> u32 {
    match difficulty {
        1 => 10,
        2 => 15,
        3 => 20,
        4 => 30,
        5 => 50,
        _ => DEFAULT_BASE_XP,
    }
}

/// Share of base XP kept after using hints; more than 3 hints count as 3.
pub fn hint_multiplier(hints_used: u32) -> f64 {
    match hints_used.min(3) {
        0 => 1.0,
        1 => 0.85,
        2 => 0.65,
        _ => 0.40,
    }
}

/// Expected time is one minute per difficulty point; the bonus needs less than half of it.
pub fn earns_speed_bonus(difficulty: u8, time_spent: f64) -> bool {
    time_spent < 0.5 * f64::from(difficulty) * 60.0
}

/// XP breakdown for a correct, non-skipped answer. Every figure is rounded on
/// its own; `base + hint_penalty + time_penalty + bonuses` matches `total`
/// within rounding.
pub fn score(difficulty: u8, hints_used: u32, time_spent: f64) -> XpBreakdown {
    let base = f64::from(base_xp(difficulty));
    let multiplier = hint_multiplier(hints_used);
    let time_bonus = if earns_speed_bonus(difficulty, time_spent) { SPEED_BONUS_RATE * base } else { 0.0 };

    XpBreakdown {
        base: base.round() as i32,
        hint_penalty: -((base * (1.0 - multiplier)).round() as i32),
        time_penalty: 0,
        bonuses: time_bonus.round() as i32,
        total: (base * multiplier + time_bonus).round() as i32,
    }
}

pub fn evaluate(question: &QuestionRecord, submission: &Submission) -> Result<EvaluationResult, EvaluationError> {
    let correct_answer = correct_answer_of(question)?;

    if submission.skipped {
        let base = base_xp(question.difficulty) as i32;
        return Ok(EvaluationResult {
            is_correct: false,
            feedback: "Frage übersprungen.".into(),
            correct_answer,
            xp_earned: 0,
            xp_breakdown: XpBreakdown { base, hint_penalty: -base, time_penalty: 0, bonuses: 0, total: 0 },
            step_results: Vec::new(),
        });
    }

    let (is_correct, feedback, step_results) = match question.kind {
        QuestionType::MultipleChoice => {
            let (ok, feedback) = judge_choice(question, submission.user_answer.as_ref());
            (ok, feedback, Vec::new())
        }
        QuestionType::StepByStep => judge_steps(question, submission.user_answer.as_ref()),
    };

    let xp_breakdown = if is_correct {
        score(question.difficulty, submission.hints_used, submission.time_spent)
    } else {
        XpBreakdown::default()
    };

    Ok(EvaluationResult {
        is_correct,
        feedback,
        correct_answer,
        xp_earned: xp_breakdown.total.max(0) as u32,
        xp_breakdown,
        step_results,
    })
}

fn correct_answer_of(question: &QuestionRecord) -> Result<CorrectAnswer, EvaluationError> {
    match question.kind {
        QuestionType::MultipleChoice => correct_option(question).map(|o| CorrectAnswer::Option(o.id.clone())),
        QuestionType::StepByStep => {
            if question.steps.is_empty() {
                return Err(EvaluationError::NoSteps { question_id: question.id.clone() });
            }
            Ok(CorrectAnswer::Steps(question.steps.iter().map(|s| s.expected_answer.clone()).collect()))
        }
    }
}

fn correct_option(question: &QuestionRecord) -> Result<&ChoiceOption, EvaluationError> {
    let mut correct = question.options.iter().filter(|o| o.is_correct);
    match (correct.next(), correct.next()) {
        (Some(option), None) => Ok(option),
        _ => Err(EvaluationError::CorrectOption {
            question_id: question.id.clone(),
            found: question.options.iter().filter(|o| o.is_correct).count(),
        }),
    }
}

fn judge_choice(question: &QuestionRecord, answer: Option<&UserAnswer>) -> (bool, String) {
    // Validated by `correct_answer_of` before we get here.
    let Ok(correct) = correct_option(question) else {
        return (false, String::new());
    };

    let chosen_id = match answer {
        Some(UserAnswer::Single(s)) => s.to_string().trim().to_string(),
        Some(UserAnswer::Steps(v)) if v.len() == 1 => v[0].to_string().trim().to_string(),
        _ => String::new(),
    };

    if chosen_id.is_empty() {
        let feedback = with_explanation(
            format!("Keine Antwort gewählt. Richtig ist {}: „{}“.", correct.id, correct.text),
            &question.explanation,
        );
        return (false, feedback);
    }

    let chosen_text = question
        .options
        .iter()
        .find(|o| o.id == chosen_id)
        .map(|o| o.text.as_str())
        .unwrap_or(chosen_id.as_str());

    if chosen_id == correct.id {
        let feedback = with_explanation(format!("Richtig! „{}“ ist die korrekte Antwort.", chosen_text), &question.explanation);
        (true, feedback)
    } else {
        let feedback = with_explanation(
            format!(
                "Leider falsch. Du hast „{}“ gewählt, richtig ist {}: „{}“.",
                chosen_text, correct.id, correct.text
            ),
            &question.explanation,
        );
        (false, feedback)
    }
}

fn judge_steps(question: &QuestionRecord, answer: Option<&UserAnswer>) -> (bool, String, Vec<bool>) {
    let answers: Vec<&Scalar> = match answer {
        Some(UserAnswer::Steps(v)) => v.iter().collect(),
        Some(UserAnswer::Single(s)) => vec![s],
        None => Vec::new(),
    };

    let results: Vec<bool> = question
        .steps
        .iter()
        .enumerate()
        .map(|(i, step)| answers.get(i).map(|a| step_matches(step, a)).unwrap_or(false))
        .collect();

    let failed: Vec<String> = results
        .iter()
        .enumerate()
        .filter(|(_, ok)| !**ok)
        .map(|(i, _)| (i + 1).to_string())
        .collect();

    if failed.is_empty() {
        (true, with_explanation("Richtig! Alle Schritte stimmen.".into(), &question.explanation), results)
    } else {
        let head = if failed.len() == 1 {
            format!("Schritt {} ist nicht korrekt.", failed[0])
        } else {
            format!("Schritte {} sind nicht korrekt.", failed.join(", "))
        };
        (false, with_explanation(head, &question.explanation), results)
    }
}

fn step_matches(step: &SolutionStep, answer: &Scalar) -> bool {
    match parse_number(&step.expected_answer) {
        Some(expected) => match parse_number(answer) {
            Some(actual) => {
                let tolerance = step.tolerance.filter(|t| t.is_finite() && *t >= 0.0).unwrap_or(DEFAULT_TOLERANCE);
                (actual - expected).abs() <= tolerance + BOUNDARY_EPSILON
            }
            None => false,
        },
        // Non-numeric expected answers (e.g. "x > 2") are compared as normalized text.
        None => normalize_text(&answer.to_string()) == normalize_text(&step.expected_answer.to_string()),
    }
}

/// Parse a learner's number: whitespace, decimal comma and a leading
/// `x =` are tolerated.
pub fn parse_number(value: &Scalar) -> Option<f64> {
    match value {
        Scalar::Number(n) => Some(*n).filter(|n| n.is_finite()),
        Scalar::Text(s) => {
            let s = s.rsplit('=').next().unwrap_or(s);
            let cleaned: String = s
                .chars()
                .filter(|c| !c.is_whitespace())
                .map(|c| if c == ',' { '.' } else { c })
                .collect();
            cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
        }
    }
}

fn normalize_text(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).flat_map(char::to_lowercase).collect()
}

fn with_explanation(head: String, explanation: &str) -> String {
    let explanation = explanation.trim();
    if explanation.is_empty() { head } else { format!("{} {}", head, explanation) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mc(difficulty: u8) -> QuestionRecord {
        serde_json::from_value(json!({
            "id": "q-mc",
            "type": "multiple-choice",
            "difficulty": difficulty,
            "question": "Welche Zahl ist prim?",
            "options": [
                {"id": "a", "text": "9", "isCorrect": false},
                {"id": "b", "text": "7", "isCorrect": true},
                {"id": "c", "text": "15", "isCorrect": false}
            ],
            "hints": ["h1", "h2", "h3"],
            "solution": "7",
            "explanation": "7 hat nur die Teiler 1 und 7."
        }))
        .unwrap()
    }

    fn steps(difficulty: u8) -> QuestionRecord {
        serde_json::from_value(json!({
            "id": "q-steps",
            "type": "step-by-step",
            "difficulty": difficulty,
            "question": "Löse 2x + 1 = 6.",
            "steps": [
                {"stepNumber": 1, "instruction": "Subtrahiere 1", "expectedAnswer": 5},
                {"stepNumber": 2, "instruction": "Teile durch 2", "expectedAnswer": "2,5", "tolerance": 0.1}
            ],
            "hints": ["h1", "h2", "h3"],
            "solution": "x = 2,5",
            "explanation": ""
        }))
        .unwrap()
    }

    fn answer(v: serde_json::Value, hints: u32, time: f64) -> Submission {
        Submission { user_answer: Some(serde_json::from_value(v).unwrap()), hints_used: hints, time_spent: time, skipped: false }
    }

    #[test]
    fn one_hint_no_bonus() {
        let r = evaluate(&mc(3), &answer(json!("b"), 1, 200.0)).unwrap();
        assert!(r.is_correct);
        assert_eq!(r.xp_earned, 17);
        assert_eq!(r.xp_breakdown.hint_penalty, -3);
        assert_eq!(r.xp_breakdown.bonuses, 0);
        assert_eq!(r.xp_breakdown.base, 20);
    }

    #[test]
    fn fast_solution_gets_bonus() {
        let r = evaluate(&mc(5), &answer(json!("b"), 0, 149.0)).unwrap();
        assert_eq!(r.xp_breakdown.bonuses, 10);
        assert_eq!(r.xp_earned, 60);
    }

    #[test]
    fn bonus_threshold_is_strict() {
        assert!(!earns_speed_bonus(5, 150.0));
        assert!(earns_speed_bonus(5, 149.9));
    }

    #[test]
    fn skipped_forfeits_base() {
        for d in 1..=5 {
            let mut s = answer(json!("b"), 2, 10.0);
            s.skipped = true;
            let r = evaluate(&mc(d), &s).unwrap();
            assert!(!r.is_correct);
            assert_eq!(r.xp_earned, 0);
            assert_eq!(r.xp_breakdown.hint_penalty, -(base_xp(d) as i32));
            assert_eq!(r.feedback, "Frage übersprungen.");
        }
    }

    #[test]
    fn wrong_choice_earns_nothing() {
        let r = evaluate(&mc(4), &answer(json!("a"), 0, 5.0)).unwrap();
        assert!(!r.is_correct);
        assert_eq!(r.xp_earned, 0);
        assert_eq!(r.xp_breakdown, XpBreakdown::default());
        assert!(r.feedback.contains("„9“"));
        assert!(r.feedback.contains("richtig ist b"));
        assert!(r.feedback.ends_with("7 hat nur die Teiler 1 und 7."));
        assert_eq!(r.correct_answer, CorrectAnswer::Option("b".into()));
    }

    #[test]
    fn missing_choice_is_incorrect() {
        let s = Submission { user_answer: None, ..Default::default() };
        let r = evaluate(&mc(1), &s).unwrap();
        assert!(!r.is_correct);
        assert!(r.feedback.starts_with("Keine Antwort"));
    }

    #[test]
    fn steps_with_german_decimal_comma() {
        let r = evaluate(&steps(2), &answer(json!(["5", "2,5"]), 0, 500.0)).unwrap();
        assert!(r.is_correct);
        assert_eq!(r.step_results, vec![true, true]);
        assert_eq!(r.xp_earned, 15);
    }

    #[test]
    fn tolerance_boundary_is_inclusive() {
        // |2.6 - 2.5| == 0.1 exactly, |5.01 - 5| == default 0.01
        let r = evaluate(&steps(2), &answer(json!([5.01, 2.6]), 0, 500.0)).unwrap();
        assert!(r.is_correct);
        let r = evaluate(&steps(2), &answer(json!([5.02, 2.6]), 0, 500.0)).unwrap();
        assert!(!r.is_correct);
    }

    #[test]
    fn failed_steps_are_named() {
        let r = evaluate(&steps(2), &answer(json!([4, "abc"]), 0, 500.0)).unwrap();
        assert!(!r.is_correct);
        assert_eq!(r.step_results, vec![false, false]);
        assert_eq!(r.feedback, "Schritte 1, 2 sind nicht korrekt.");

        let r = evaluate(&steps(2), &answer(json!([5]), 0, 500.0)).unwrap();
        assert_eq!(r.feedback, "Schritt 2 ist nicht korrekt.");
    }

    #[test]
    fn breakdown_reconciles() {
        for d in 1..=5u8 {
            for hints in 0..=5u32 {
                for time in [1.0, 10_000.0] {
                    let b = score(d, hints, time);
                    let sum = b.base + b.hint_penalty + b.time_penalty + b.bonuses;
                    assert!((sum - b.total).abs() <= 1, "d={d} hints={hints} time={time}: {b:?}");
                }
            }
        }
    }

    #[test]
    fn hint_count_is_capped() {
        assert_eq!(score(3, 3, 1000.0), score(3, 9, 1000.0));
        assert_eq!(score(3, 9, 1000.0).total, 8);
    }

    #[test]
    fn unknown_difficulty_defaults_base() {
        assert_eq!(base_xp(0), DEFAULT_BASE_XP);
        assert_eq!(base_xp(9), DEFAULT_BASE_XP);
    }

    #[test]
    fn evaluation_is_idempotent() {
        let q = steps(3);
        let s = answer(json!(["5", "2.5"]), 1, 20.0);
        assert_eq!(evaluate(&q, &s).unwrap(), evaluate(&q, &s).unwrap());
    }

    #[test]
    fn malformed_questions_are_rejected() {
        let mut q = mc(2);
        q.options[0].is_correct = true;
        assert_eq!(
            evaluate(&q, &Submission::default()).unwrap_err(),
            EvaluationError::CorrectOption { question_id: "q-mc".into(), found: 2 }
        );

        let mut q = steps(2);
        q.steps.clear();
        assert!(matches!(evaluate(&q, &Submission::default()), Err(EvaluationError::NoSteps { .. })));
    }

    #[test]
    fn parse_number_variants() {
        assert_eq!(parse_number(&Scalar::Text(" x = -1,25 ".into())), Some(-1.25));
        assert_eq!(parse_number(&Scalar::Text("1 000".into())), Some(1000.0));
        assert_eq!(parse_number(&Scalar::Text("zwei".into())), None);
        assert_eq!(parse_number(&Scalar::Number(3.0)), Some(3.0));
    }

    #[test]
    fn text_expected_answers_compare_normalized() {
        let mut q = steps(1);
        q.steps.truncate(1);
        q.steps[0].expected_answer = Scalar::Text("x > 2".into());
        let r = evaluate(&q, &answer(json!(["X>2"]), 0, 1.0)).unwrap();
        assert!(r.is_correct);
    }
}
