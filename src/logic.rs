//! Endpoint behaviors: validate → render prompt → call provider → extract → shape.
//!
//! Handlers in `routes::http` stay thin, own the request span and forward
//! here. Nothing in this module keeps state between requests.

use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auto_mode::{question_prompt_section, AssessmentDraft};
use crate::catalog;
use crate::domain::{DetectedTopic, ImageAnalysis, QuestionRecord, QuestionType};
use crate::error::{ApiError, ApiResult};
use crate::evaluator::{self, UserAnswer};
use crate::extract::{extract_as, extract_json, fenced_block, ResponseParseError};
use crate::prompts::{self, Variables};
use crate::protocol::*;
use crate::providers::{Completion, CompletionRequest, ContentPart, ProviderFamily};
use crate::state::AppState;
use crate::util::ImagePayload;

const ANALYSIS_TEMPERATURE: f32 = 0.2;
const ASSESSMENT_TEMPERATURE: f32 = 0.3;

/// Placeholder login; compares against the configured demo pair.
pub fn login(state: &AppState, body: &LoginIn) -> ApiResult<LoginOut> {
  if body.username != state.auth.username || body.password != state.auth.password {
    warn!(target: "mathe_tutor", username = %body.username, "Login rejected");
    return Err(ApiError::Unauthorized("Benutzername oder Passwort ist falsch.".into()));
  }
  info!(target: "mathe_tutor", username = %body.username, "Login accepted");
  Ok(LoginOut {
    success: true,
    user: UserOut { username: body.username.clone() },
    token: Uuid::new_v4().to_string(),
  })
}

pub async fn analyze_image(state: &AppState, body: AnalyzeImageIn) -> ApiResult<AnalyzeImageOut> {
  let image = ImagePayload::parse(&body.image).map_err(ApiError::Validation)?;

  let vars = Variables::new()
    .with("GRADE_LEVEL", body.grade_level)
    .with("COURSE_TYPE", course_label(&body.course_type));
  let prompt = state.prompts.render(prompts::IMAGE_ANALYSIS, &vars)?;

  let content = vec![
    ContentPart::Image { media_type: image.media_type, data: image.data },
    ContentPart::Text(prompt),
  ];
  let (completion, model) =
    complete(state, body.provider, &body.api_key, body.model.as_deref(), Some(ANALYSIS_TEMPERATURE), content).await?;

  let mut analysis: ImageAnalysis = extract_as(&completion.text)?;
  analysis.suggested_difficulty = analysis.suggested_difficulty.map(|d| d.clamp(1, 5));
  info!(target: "mathe_tutor", topics = analysis.topics.len(), "Image analyzed");

  Ok(AnalyzeImageOut { success: true, analysis, usage: usage(model, &completion) })
}

pub async fn generate_questions(state: &AppState, body: GenerateQuestionsIn) -> ApiResult<GenerateQuestionsOut> {
  let auto = body.auto_mode.clone().map(AssessmentDraft::clamped);

  let vars = Variables::new()
    .with("QUESTION_COUNT", body.question_count)
    .with("GRADE_LEVEL", body.grade_level)
    .with("COURSE_TYPE", course_label(&body.course_type))
    .with("TOPICS", topic_list(&body.topics))
    .with("DIFFICULTY", body.difficulty)
    .with("QUESTION_TYPES", type_list(&body.question_types))
    .with_opt("AUTO_MODE_SECTION", auto.as_ref().map(question_prompt_section));
  let prompt = state.prompts.render(prompts::QUESTION_GENERATION, &vars)?;

  let temperature = auto.as_ref().map(|a| a.temperature as f32);
  let (completion, model) = complete(
    state,
    body.provider,
    &body.api_key,
    body.model.as_deref(),
    temperature,
    vec![ContentPart::Text(prompt)],
  )
  .await?;

  let questions = parse_questions(&completion.text)?;
  let unrequested = questions.iter().filter(|q| !body.question_types.contains(&q.kind)).count();
  if unrequested > 0 {
    warn!(target: "mathe_tutor", unrequested, "Model returned question types that were not requested");
  }
  info!(target: "mathe_tutor", returned = questions.len(), requested = body.question_count, "Questions generated");

  Ok(GenerateQuestionsOut { success: true, questions, usage: usage(model, &completion) })
}

/// Scores locally; no provider call.
pub fn evaluate_answer(body: &EvaluateIn) -> ApiResult<EvaluateOut> {
  let result = evaluator::evaluate(&body.question, &body.submission())?;
  info!(
    target: "evaluation",
    question_id = %body.question.id,
    correct = result.is_correct,
    xp = result.xp_earned,
    hints = body.hints_used,
    "Answer evaluated"
  );
  Ok(EvaluateOut { success: true, result })
}

pub async fn assess_auto_mode(state: &AppState, body: AutoModeIn) -> ApiResult<AutoModeOut> {
  let current = body.current.clone().unwrap_or_default().clamped();

  let vars = Variables::new()
    .with("CURRENT_DETAIL_LEVEL", current.detail_level)
    .with("CURRENT_TEMPERATURE", current.temperature)
    .with("CURRENT_HELPFULNESS", current.helpfulness)
    .with("PERFORMANCE_SUMMARY", body.performance.to_prompt_text());
  let prompt = state.prompts.render(prompts::AUTO_MODE_ASSESSMENT, &vars)?;

  let (completion, model) = complete(
    state,
    body.provider,
    &body.api_key,
    body.model.as_deref(),
    Some(ASSESSMENT_TEMPERATURE),
    vec![ContentPart::Text(prompt)],
  )
  .await?;

  let assessment = extract_as::<AssessmentDraft>(&completion.text)?.clamped();
  info!(
    target: "mathe_tutor",
    detail_level = assessment.detail_level,
    temperature = assessment.temperature,
    helpfulness = assessment.helpfulness,
    reasoning_len = assessment.reasoning.len(),
    "AUTO mode reassessed"
  );

  Ok(AutoModeOut { success: true, assessment, usage: usage(model, &completion) })
}

pub async fn explain(state: &AppState, body: ExplainIn) -> ApiResult<ExplainOut> {
  let vars = Variables::new()
    .with("GRADE_LEVEL", body.grade_level)
    .with("QUESTION", question_text(&body.question))
    .with("USER_ANSWER", user_answer_text(body.user_answer.as_ref()))
    .with("CORRECT_ANSWER", correct_answer_text(&body.question));
  let prompt = state.prompts.render(prompts::SOLUTION_EXPLANATION, &vars)?;

  let temperature = body.auto_mode.clone().map(|d| d.clamped().temperature as f32);
  let (completion, model) = complete(
    state,
    body.provider,
    &body.api_key,
    body.model.as_deref(),
    temperature,
    vec![ContentPart::Text(prompt)],
  )
  .await?;

  let explanation = completion.text.trim().to_string();
  if explanation.is_empty() {
    return Err(ResponseParseError::new("empty explanation", &completion.text).into());
  }

  Ok(ExplainOut { success: true, explanation, usage: usage(model, &completion) })
}

pub async fn list_models(state: &AppState, body: ModelsIn) -> ApiResult<ModelsOut> {
  let provider = state.provider(body.provider, &body.api_key);
  let raw = provider.list_models().await?;
  let listed = raw.len();
  let models = catalog::normalize(raw, body.provider, &state.providers.excluded_model_tiers);
  info!(target: "mathe_tutor", provider = %body.provider, listed, shown = models.len(), "Model catalog built");
  Ok(ModelsOut { success: true, provider: body.provider, models })
}

/// One completion with the tutor system prompt. Returns the model id used.
async fn complete(
  state: &AppState,
  family: ProviderFamily,
  api_key: &str,
  model: Option<&str>,
  temperature: Option<f32>,
  content: Vec<ContentPart>,
) -> ApiResult<(Completion, String)> {
  let model = state.model_for(family, model);
  let system = state.prompts.render(prompts::SYSTEM_TUTOR, &Variables::new())?;
  let request = CompletionRequest {
    model: model.clone(),
    max_tokens: state.providers.max_tokens,
    temperature,
    system: Some(system).filter(|s| !s.is_empty()),
    content,
  };

  let provider = state.provider(family, api_key);
  debug!(target: "provider", family = %provider.family(), %model, "Dispatching completion");
  let completion = provider.complete(&request).await?;
  Ok((completion, model))
}

fn usage(model: String, completion: &Completion) -> UsageOut {
  UsageOut { model, input_tokens: completion.input_tokens, output_tokens: completion.output_tokens }
}

/// Accepts `{"questions": [...]}` or a bare array; fills missing ids and checks each question.
fn parse_questions(raw: &str) -> Result<Vec<QuestionRecord>, ResponseParseError> {
  // A bare array must be read before `extract_json`, whose brace slice would
  // return only the first object.
  let candidate = fenced_block(raw).unwrap_or_else(|| raw.trim());
  let list = if candidate.starts_with('[') {
    serde_json::from_str::<Value>(candidate).map_err(|e| ResponseParseError::new(format!("question array: {e}"), raw))?
  } else {
    questions_field(extract_json(raw)?, raw)?
  };

  let mut questions: Vec<QuestionRecord> =
    serde_json::from_value(list).map_err(|e| ResponseParseError::new(format!("question shape: {e}"), raw))?;
  if questions.is_empty() {
    return Err(ResponseParseError::new("no questions returned", raw));
  }

  for q in &mut questions {
    if q.id.trim().is_empty() {
      q.id = Uuid::new_v4().to_string();
    }
    q.check().map_err(|reason| ResponseParseError::new(reason, raw))?;
  }
  Ok(questions)
}

fn questions_field(value: Value, raw: &str) -> Result<Value, ResponseParseError> {
  match value {
    Value::Object(mut map) => map
      .remove("questions")
      .ok_or_else(|| ResponseParseError::new("missing \"questions\" array", raw)),
    array @ Value::Array(_) => Ok(array),
    _ => Err(ResponseParseError::new("expected a JSON object or array", raw)),
  }
}

fn course_label(course_type: &str) -> &str {
  match course_type.trim() {
    "" => "Regelunterricht",
    other => other,
  }
}

fn topic_list(topics: &[DetectedTopic]) -> String {
  topics
    .iter()
    .map(|t| {
      let path: Vec<&str> = [t.leitidee.as_str(), t.thema.as_str(), t.unterthema.as_str()]
        .into_iter()
        .filter(|s| !s.trim().is_empty())
        .collect();
      match &t.afb {
        Some(afb) => format!("{} (AFB {})", path.join(" > "), afb),
        None => path.join(" > "),
      }
    })
    .collect::<Vec<_>>()
    .join("; ")
}

fn type_list(types: &[QuestionType]) -> String {
  types.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

fn question_text(q: &QuestionRecord) -> String {
  let mut text = q.question.clone();
  for step in &q.steps {
    text.push_str(&format!("\nSchritt {}: {}", step.step_number, step.instruction));
  }
  text
}

fn user_answer_text(answer: Option<&UserAnswer>) -> String {
  match answer {
    None => "(keine Antwort)".into(),
    Some(UserAnswer::Single(s)) => s.to_string(),
    Some(UserAnswer::Steps(steps)) => steps
      .iter()
      .enumerate()
      .map(|(i, s)| format!("Schritt {}: {}", i + 1, s))
      .collect::<Vec<_>>()
      .join(", "),
  }
}

fn correct_answer_text(q: &QuestionRecord) -> String {
  match q.kind {
    QuestionType::MultipleChoice => q
      .options
      .iter()
      .find(|o| o.is_correct)
      .map(|o| format!("{}: {}", o.id, o.text))
      .unwrap_or_default(),
    QuestionType::StepByStep => q
      .steps
      .iter()
      .map(|s| format!("Schritt {}: {}", s.step_number, s.expected_answer))
      .collect::<Vec<_>>()
      .join(", "),
  }
}
