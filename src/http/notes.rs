use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Router,
};
use serde::Deserialize;

use super::{ApiJson, AppState, AuthUser};
use crate::error::AppResult;
use crate::models::{CreateNoteParams, Note, UpdateNoteParams};
use crate::repos::NoteRepo;
use crate::response::{ApiResponse, Created};

#[derive(Debug, Default, Deserialize)]
pub struct SubjectFilter {
    #[serde(default)]
    pub subject: Option<String>,
}

impl SubjectFilter {
    pub fn subject_id(&self) -> Option<&str> {
        self.subject.as_deref().filter(|s| !s.trim().is_empty())
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_notes).post(create_note))
        .route("/:id", get(get_note).put(update_note).delete(delete_note))
        .route("/:id/summarize", post(super::ai::summarize))
}

async fn create_note(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(params): ApiJson<CreateNoteParams>,
) -> AppResult<Created<Note>> {
    let note = NoteRepo::create(&state.db, auth.id(), &params)?;
    Ok(Created(ApiResponse::ok("Note created successfully", note)))
}

async fn list_notes(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(filter): Query<SubjectFilter>,
) -> AppResult<ApiResponse<Vec<Note>>> {
    let notes = NoteRepo::list(&state.db, auth.id(), filter.subject_id())?;
    Ok(ApiResponse::ok("Notes fetched successfully", notes))
}

async fn get_note(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Note>> {
    let note = NoteRepo::find_and_increment_views(&state.db, auth.id(), &id)?;
    Ok(ApiResponse::ok("Note fetched successfully", note))
}

async fn update_note(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    ApiJson(params): ApiJson<UpdateNoteParams>,
) -> AppResult<ApiResponse<Note>> {
    let note = NoteRepo::update(&state.db, auth.id(), &id, &params)?;
    Ok(ApiResponse::ok("Note updated successfully", note))
}

async fn delete_note(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<()>> {
    NoteRepo::soft_delete(&state.db, auth.id(), &id)?;
    Ok(ApiResponse::message("Note deleted successfully"))
}
