use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};

use super::notes::SubjectFilter;
use super::{ApiJson, AppState, AuthUser};
use crate::error::{AppError, AppResult};
use crate::models::{CreateFlashcardParams, Flashcard, UpdateFlashcardParams};
use crate::repos::FlashcardRepo;
use crate::response::{ApiResponse, Created};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReviewRequest {
    #[serde(default)]
    is_correct: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReviewResult {
    correct_count: i64,
    wrong_count: i64,
    last_reviewed_at: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_flashcards).post(create_flashcard))
        .route(
            "/:id",
            get(get_flashcard).put(update_flashcard).delete(delete_flashcard),
        )
        .route("/:id/review", post(review_flashcard))
        .route("/subject/:subject_id", get(list_by_subject))
}

async fn create_flashcard(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(params): ApiJson<CreateFlashcardParams>,
) -> AppResult<Created<Flashcard>> {
    let card = FlashcardRepo::create(&state.db, auth.id(), &params)?;
    Ok(Created(ApiResponse::ok("Flashcard created successfully", card)))
}

async fn list_flashcards(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(filter): Query<SubjectFilter>,
) -> AppResult<ApiResponse<Vec<Flashcard>>> {
    let cards = FlashcardRepo::list(&state.db, auth.id(), filter.subject_id())?;
    Ok(ApiResponse::ok("Flashcards fetched successfully", cards))
}

async fn list_by_subject(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(subject_id): Path<String>,
) -> AppResult<ApiResponse<Vec<Flashcard>>> {
    let cards = FlashcardRepo::list(&state.db, auth.id(), Some(&subject_id))?;
    Ok(ApiResponse::ok("Flashcards fetched successfully", cards))
}

async fn get_flashcard(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Flashcard>> {
    let card = FlashcardRepo::find(&state.db, auth.id(), &id)?;
    Ok(ApiResponse::ok("Flashcard fetched successfully", card))
}

async fn update_flashcard(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    ApiJson(params): ApiJson<UpdateFlashcardParams>,
) -> AppResult<ApiResponse<Flashcard>> {
    let card = FlashcardRepo::update(&state.db, auth.id(), &id, &params)?;
    Ok(ApiResponse::ok("Flashcard updated successfully", card))
}

async fn delete_flashcard(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<()>> {
    FlashcardRepo::soft_delete(&state.db, auth.id(), &id)?;
    Ok(ApiResponse::message("Flashcard deleted successfully"))
}

async fn review_flashcard(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<ReviewRequest>,
) -> AppResult<ApiResponse<ReviewResult>> {
    let is_correct = req
        .is_correct
        .ok_or_else(|| AppError::validation("isCorrect is required"))?;
    let card = FlashcardRepo::record_review(&state.db, auth.id(), &id, is_correct)?;
    Ok(ApiResponse::ok(
        "Flashcard reviewed successfully",
        ReviewResult {
            correct_count: card.correct_count,
            wrong_count: card.wrong_count,
            last_reviewed_at: card.last_reviewed_at,
        },
    ))
}
