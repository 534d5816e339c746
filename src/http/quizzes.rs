use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Router,
};
use serde::Serialize;

use super::notes::SubjectFilter;
use super::{ApiJson, AppState, AuthUser};
use crate::error::AppResult;
use crate::models::{CreateQuizParams, Quiz, UpdateQuizParams};
use crate::repos::QuizRepo;
use crate::response::{ApiResponse, Created};
use crate::services::quiz_service::{QuizResults, SubmitQuizParams, SubmitQuizResult};

#[derive(Debug, Serialize)]
struct StartedQuiz {
    quiz: Quiz,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_quizzes).post(create_quiz))
        .route("/:id", get(get_quiz).put(update_quiz).delete(delete_quiz))
        .route("/:id/start", post(start_quiz))
        .route("/:id/submit", post(submit_quiz))
        .route("/:id/results", get(quiz_results))
}

async fn create_quiz(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(params): ApiJson<CreateQuizParams>,
) -> AppResult<Created<Quiz>> {
    let quiz = QuizRepo::create(&state.db, auth.id(), &params)?;
    Ok(Created(ApiResponse::ok("Quiz created successfully", quiz)))
}

async fn list_quizzes(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(filter): Query<SubjectFilter>,
) -> AppResult<ApiResponse<Vec<Quiz>>> {
    let quizzes = QuizRepo::list(&state.db, auth.id(), filter.subject_id())?;
    Ok(ApiResponse::ok("Quizzes fetched successfully", quizzes))
}

async fn get_quiz(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Quiz>> {
    let quiz = QuizRepo::find(&state.db, auth.id(), &id)?;
    Ok(ApiResponse::ok("Quiz fetched successfully", quiz))
}

async fn update_quiz(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    ApiJson(params): ApiJson<UpdateQuizParams>,
) -> AppResult<ApiResponse<Quiz>> {
    let quiz = QuizRepo::update(&state.db, auth.id(), &id, &params)?;
    Ok(ApiResponse::ok("Quiz updated successfully", quiz))
}

async fn delete_quiz(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<()>> {
    QuizRepo::soft_delete(&state.db, auth.id(), &id)?;
    Ok(ApiResponse::message("Quiz deleted successfully"))
}

async fn start_quiz(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<StartedQuiz>> {
    let quiz = state.quizzes.start(auth.id(), &id)?;
    Ok(ApiResponse::ok("Quiz started", StartedQuiz { quiz }))
}

async fn submit_quiz(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    ApiJson(params): ApiJson<SubmitQuizParams>,
) -> AppResult<ApiResponse<SubmitQuizResult>> {
    let result = state.quizzes.submit(auth.id(), &id, &params)?;
    Ok(ApiResponse::ok("Quiz submitted successfully", result))
}

async fn quiz_results(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<QuizResults>> {
    let results = state.quizzes.results(auth.id(), &id)?;
    Ok(ApiResponse::ok("Results fetched successfully", results))
}
