use axum::{
    extract::{Path, State},
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ApiJson, AppState, AuthUser, OptionalJson};
use crate::error::AppResult;
use crate::models::{ChatMessage, ChatSender, Note, StudyPlan};
use crate::response::{ApiResponse, Created};
use crate::services::ai_service::{
    ChatParams, GenerateFlashcardsParams, GenerateNotesParams, GenerateQuizParams,
    GeneratedFlashcards, GeneratedNotes, GeneratedQuiz, HistoryMessage, StudyPlanParams,
    WeeklyInsights,
};

/// `/ai/solve` 的 context 可以是一段文字，也可以是聊天记录数组
#[derive(Debug, Deserialize)]
struct SolveRequest {
    #[serde(default)]
    question: String,
    #[serde(default)]
    context: Option<Value>,
}

impl SolveRequest {
    fn into_chat_params(self) -> ChatParams {
        let history = match self.context {
            Some(Value::String(text)) if !text.trim().is_empty() => Some(vec![HistoryMessage {
                sender: ChatSender::Ai,
                text,
            }]),
            Some(value @ Value::Array(_)) => serde_json::from_value(value).ok(),
            _ => None,
        };
        ChatParams {
            message: self.question,
            history,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatResponse {
    response: String,
    user_message: ChatMessage,
    ai_message: ChatMessage,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SolveResponse {
    solution: String,
    user_message: ChatMessage,
    ai_message: ChatMessage,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StudyPlanResponse {
    plan: String,
    study_plan: StudyPlan,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/chat", post(chat))
        .route("/solve", post(solve))
        .route("/:id/summarize", post(summarize))
        .route("/:id/flashcards", post(generate_flashcards))
        .route("/:id/mcqs-from-notes", post(generate_quiz))
        .route("/study-plan", post(study_plan))
        .route("/generate-notes", post(generate_notes))
        .route("/weekly-report", post(weekly_report))
}

async fn chat(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(params): ApiJson<ChatParams>,
) -> AppResult<ApiResponse<ChatResponse>> {
    let reply = state.ai.solve_doubt(auth.id(), &params).await?;
    Ok(ApiResponse::ok(
        "Response generated successfully",
        ChatResponse {
            response: reply.response,
            user_message: reply.user_message,
            ai_message: reply.ai_message,
        },
    ))
}

async fn solve(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(req): ApiJson<SolveRequest>,
) -> AppResult<ApiResponse<SolveResponse>> {
    let reply = state.ai.solve_doubt(auth.id(), &req.into_chat_params()).await?;
    Ok(ApiResponse::ok(
        "Solution generated successfully",
        SolveResponse {
            solution: reply.response,
            user_message: reply.user_message,
            ai_message: reply.ai_message,
        },
    ))
}

pub(super) async fn summarize(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Note>> {
    let note = state.ai.summarize_note(auth.id(), &id).await?;
    Ok(ApiResponse::ok("Summary generated successfully", note))
}

async fn generate_flashcards(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    OptionalJson(params): OptionalJson<GenerateFlashcardsParams>,
) -> AppResult<Created<GeneratedFlashcards>> {
    let result = state.ai.generate_flashcards(auth.id(), &id, &params).await?;
    Ok(Created(ApiResponse::ok(
        "Flashcards generated successfully",
        result,
    )))
}

async fn generate_quiz(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    OptionalJson(params): OptionalJson<GenerateQuizParams>,
) -> AppResult<Created<GeneratedQuiz>> {
    let result = state.ai.generate_quiz(auth.id(), &id, &params).await?;
    Ok(Created(ApiResponse::ok("Quiz generated successfully", result)))
}

async fn study_plan(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(params): ApiJson<StudyPlanParams>,
) -> AppResult<ApiResponse<StudyPlanResponse>> {
    let study_plan = state.ai.generate_study_plan(auth.id(), &params).await?;
    Ok(ApiResponse::ok(
        "Study plan generated successfully",
        StudyPlanResponse {
            plan: study_plan.plan_text.clone(),
            study_plan,
        },
    ))
}

async fn generate_notes(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(params): ApiJson<GenerateNotesParams>,
) -> AppResult<Created<GeneratedNotes>> {
    let result = state.ai.generate_notes(auth.id(), &params).await?;
    Ok(Created(ApiResponse::ok("Notes generated successfully", result)))
}

async fn weekly_report(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<ApiResponse<WeeklyInsights>> {
    let insights = state.ai.weekly_insights(auth.id()).await?;
    Ok(ApiResponse::ok("Weekly report generated successfully", insights))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_solve_context_variants() {
        let req: SolveRequest =
            serde_json::from_value(json!({"question": "Why?", "context": "Earlier answer"})).unwrap();
        let params = req.into_chat_params();
        let history = params.history.expect("history");
        assert_eq!(history[0].sender, ChatSender::Ai);

        let req: SolveRequest = serde_json::from_value(json!({
            "question": "Why?",
            "context": [{"sender": "user", "text": "hi"}, {"sender": "ai", "text": "hello"}]
        }))
        .unwrap();
        assert_eq!(req.into_chat_params().history.map(|h| h.len()), Some(2));

        let req: SolveRequest = serde_json::from_value(json!({"question": "Why?"})).unwrap();
        assert!(req.into_chat_params().history.is_none());
    }
}
