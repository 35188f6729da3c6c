//! Request and response bodies of the JSON API (serde ready).
//! Every request type is validated at the boundary by `ValidJson` before the
//! handlers see it.

use axum::{
    extract::{FromRequest, Request},
    Json,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use validator::Validate;

use crate::auto_mode::{AssessmentDraft, AutoModeAssessment, PerformanceSummary};
use crate::domain::{DetectedTopic, EvaluationResult, ImageAnalysis, ModelDescriptor, QuestionRecord, QuestionType};
use crate::error::ApiError;
use crate::evaluator::{Submission, UserAnswer};
use crate::providers::ProviderFamily;

/// `Json<T>` that also runs `T::validate()`. Both failures become a 400 JSON error.
pub struct ValidJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::Validation(rejection.body_text()))?;
        value.validate()?;
        Ok(ValidJson(value))
    }
}

// --- Requests ---

#[derive(Debug, Deserialize, Validate)]
pub struct LoginIn {
    #[validate(length(min = 1, max = 100))]
    pub username: String,
    #[validate(length(min = 1, max = 100))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeImageIn {
    #[validate(length(min = 1))]
    pub api_key: String,
    /// Data URL or bare base64.
    #[validate(length(min = 1))]
    pub image: String,
    #[validate(range(min = 5, max = 13))]
    pub grade_level: u8,
    #[serde(default)]
    pub course_type: String,
    #[serde(default)]
    pub provider: ProviderFamily,
    #[serde(default)]
    pub model: Option<String>,
}

fn default_difficulty() -> u8 {
    3
}

fn default_question_count() -> u8 {
    5
}

fn default_question_types() -> Vec<QuestionType> {
    vec![QuestionType::MultipleChoice, QuestionType::StepByStep]
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GenerateQuestionsIn {
    #[validate(length(min = 1))]
    pub api_key: String,
    #[validate(range(min = 5, max = 13))]
    pub grade_level: u8,
    #[serde(default)]
    pub course_type: String,
    #[validate(length(min = 1, max = 20))]
    pub topics: Vec<DetectedTopic>,
    #[serde(default = "default_difficulty")]
    #[validate(range(min = 1, max = 5))]
    pub difficulty: u8,
    #[serde(default = "default_question_count")]
    #[validate(range(min = 1, max = 20))]
    pub question_count: u8,
    #[serde(default = "default_question_types")]
    #[validate(length(min = 1))]
    pub question_types: Vec<QuestionType>,
    /// Present when AUTO mode is on.
    #[serde(default)]
    pub auto_mode: Option<AssessmentDraft>,
    #[serde(default)]
    pub provider: ProviderFamily,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateIn {
    pub question: QuestionRecord,
    #[serde(default)]
    pub user_answer: Option<UserAnswer>,
    #[serde(default)]
    #[validate(range(max = 100))]
    pub hints_used: u32,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub time_spent: f64,
    #[serde(default)]
    pub skipped: bool,
}

impl EvaluateIn {
    pub fn submission(&self) -> Submission {
        Submission {
            user_answer: self.user_answer.clone(),
            hints_used: self.hints_used,
            time_spent: self.time_spent,
            skipped: self.skipped,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AutoModeIn {
    #[validate(length(min = 1))]
    pub api_key: String,
    /// Settings currently in use; defaults apply when absent.
    #[serde(default)]
    pub current: Option<AssessmentDraft>,
    pub performance: PerformanceSummary,
    #[serde(default)]
    pub provider: ProviderFamily,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ExplainIn {
    #[validate(length(min = 1))]
    pub api_key: String,
    pub question: QuestionRecord,
    #[serde(default)]
    pub user_answer: Option<UserAnswer>,
    #[validate(range(min = 5, max = 13))]
    pub grade_level: u8,
    /// Explanation temperature comes from here when AUTO mode is on.
    #[serde(default)]
    pub auto_mode: Option<AssessmentDraft>,
    #[serde(default)]
    pub provider: ProviderFamily,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ModelsIn {
    #[validate(length(min = 1))]
    pub api_key: String,
    #[serde(default)]
    pub provider: ProviderFamily,
}

// --- Responses ---

#[derive(Debug, Serialize)]
pub struct HealthOut {
    pub success: bool,
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct UserOut {
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct LoginOut {
    pub success: bool,
    pub user: UserOut,
    /// Opaque demo session token; the server does not check it.
    pub token: String,
}

/// Model and token counts of the upstream call behind a response.
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UsageOut {
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeImageOut {
    pub success: bool,
    #[serde(flatten)]
    pub analysis: ImageAnalysis,
    pub usage: UsageOut,
}

#[derive(Debug, Serialize)]
pub struct GenerateQuestionsOut {
    pub success: bool,
    pub questions: Vec<QuestionRecord>,
    pub usage: UsageOut,
}

#[derive(Debug, Serialize)]
pub struct EvaluateOut {
    pub success: bool,
    #[serde(flatten)]
    pub result: EvaluationResult,
}

#[derive(Debug, Serialize)]
pub struct AutoModeOut {
    pub success: bool,
    pub assessment: AutoModeAssessment,
    pub usage: UsageOut,
}

#[derive(Debug, Serialize)]
pub struct ExplainOut {
    pub success: bool,
    pub explanation: String,
    pub usage: UsageOut,
}

#[derive(Debug, Serialize)]
pub struct ModelsOut {
    pub success: bool,
    pub provider: ProviderFamily,
    pub models: Vec<ModelDescriptor>,
}
