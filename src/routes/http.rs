//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented; request bodies are validated by `ValidJson`.

use std::sync::Arc;
use axum::{extract::State, Json, response::IntoResponse};
use tracing::instrument;

use crate::error::ApiResult;
use crate::logic::*;
use crate::protocol::*;
use crate::state::AppState;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse {
  Json(HealthOut { success: true, status: "ok", version: env!("CARGO_PKG_VERSION") })
}

#[instrument(level = "info", skip(state, body), fields(username = %body.username))]
pub async fn http_post_login(
  State(state): State<Arc<AppState>>,
  ValidJson(body): ValidJson<LoginIn>,
) -> ApiResult<Json<LoginOut>> {
  Ok(Json(login(&state, &body)?))
}

#[instrument(level = "info", skip(state, body), fields(provider = %body.provider, grade = body.grade_level, image_len = body.image.len()))]
pub async fn http_post_analyze_image(
  State(state): State<Arc<AppState>>,
  ValidJson(body): ValidJson<AnalyzeImageIn>,
) -> ApiResult<Json<AnalyzeImageOut>> {
  Ok(Json(analyze_image(&state, body).await?))
}

#[instrument(
  level = "info",
  skip(state, body),
  fields(
    provider = %body.provider,
    grade = body.grade_level,
    difficulty = body.difficulty,
    count = body.question_count,
    topics = body.topics.len(),
    auto_mode = body.auto_mode.is_some()
  )
)]
pub async fn http_post_generate_questions(
  State(state): State<Arc<AppState>>,
  ValidJson(body): ValidJson<GenerateQuestionsIn>,
) -> ApiResult<Json<GenerateQuestionsOut>> {
  Ok(Json(generate_questions(&state, body).await?))
}

#[instrument(level = "info", skip(body), fields(question_id = %body.question.id, kind = %body.question.kind, skipped = body.skipped))]
pub async fn http_post_evaluate_answer(ValidJson(body): ValidJson<EvaluateIn>) -> ApiResult<Json<EvaluateOut>> {
  Ok(Json(evaluate_answer(&body)?))
}

#[instrument(level = "info", skip(state, body), fields(provider = %body.provider, answered = body.performance.answered))]
pub async fn http_post_auto_mode_assess(
  State(state): State<Arc<AppState>>,
  ValidJson(body): ValidJson<AutoModeIn>,
) -> ApiResult<Json<AutoModeOut>> {
  Ok(Json(assess_auto_mode(&state, body).await?))
}

#[instrument(level = "info", skip(state, body), fields(provider = %body.provider, question_id = %body.question.id))]
pub async fn http_post_explain(
  State(state): State<Arc<AppState>>,
  ValidJson(body): ValidJson<ExplainIn>,
) -> ApiResult<Json<ExplainOut>> {
  Ok(Json(explain(&state, body).await?))
}

#[instrument(level = "info", skip(state, body), fields(provider = %body.provider))]
pub async fn http_post_models(
  State(state): State<Arc<AppState>>,
  ValidJson(body): ValidJson<ModelsIn>,
) -> ApiResult<Json<ModelsOut>> {
  Ok(Json(list_models(&state, body).await?))
}
