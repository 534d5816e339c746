use axum::{
    extract::{Path, State},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};

use super::{ApiJson, AppState, AuthUser};
use crate::database::StudyDatabase;
use crate::error::{AppError, AppResult};
use crate::models::{
    CreateSubjectParams, Flashcard, Note, Quiz, Subject, SubjectResourceKind, UpdateSubjectParams,
};
use crate::repos::{FlashcardRepo, NoteRepo, QuizRepo, SubjectRepo};
use crate::response::{ApiResponse, Created};

/// 科目及其下属资源（仅未删除的）
#[derive(Debug, Serialize)]
pub struct SubjectDetail {
    #[serde(flatten)]
    pub subject: Subject,
    pub notes: Vec<Note>,
    pub quizzes: Vec<Quiz>,
    pub flashcards: Vec<Flashcard>,
}

impl SubjectDetail {
    fn load(db: &StudyDatabase, user_id: &str, subject_id: &str) -> AppResult<Self> {
        let subject = SubjectRepo::find(db, user_id, subject_id)?;
        Ok(Self {
            notes: NoteRepo::list(db, user_id, Some(&subject.id))?,
            quizzes: QuizRepo::list(db, user_id, Some(&subject.id))?,
            flashcards: FlashcardRepo::list(db, user_id, Some(&subject.id))?,
            subject,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddResourceRequest {
    #[serde(default)]
    resource_id: Option<String>,
    #[serde(default)]
    resource_type: Option<SubjectResourceKind>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_subjects).post(create_subject))
        .route(
            "/:id",
            get(get_subject).put(update_subject).delete(delete_subject),
        )
        .route("/:id/resources", post(add_resource))
}

async fn create_subject(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(params): ApiJson<CreateSubjectParams>,
) -> AppResult<Created<Subject>> {
    let subject = SubjectRepo::create(&state.db, auth.id(), &params)?;
    Ok(Created(ApiResponse::ok("Subject created successfully", subject)))
}

async fn list_subjects(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<ApiResponse<Vec<Subject>>> {
    let subjects = SubjectRepo::list(&state.db, auth.id())?;
    Ok(ApiResponse::ok("Subjects fetched successfully", subjects))
}

async fn get_subject(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<SubjectDetail>> {
    let detail = SubjectDetail::load(&state.db, auth.id(), &id)?;
    Ok(ApiResponse::ok("Subject fetched successfully", detail))
}

async fn update_subject(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    ApiJson(params): ApiJson<UpdateSubjectParams>,
) -> AppResult<ApiResponse<Subject>> {
    let subject = SubjectRepo::update(&state.db, auth.id(), &id, &params)?;
    Ok(ApiResponse::ok("Subject updated successfully", subject))
}

async fn delete_subject(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<()>> {
    SubjectRepo::soft_delete(&state.db, auth.id(), &id)?;
    Ok(ApiResponse::message("Subject deleted successfully"))
}

async fn add_resource(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<AddResourceRequest>,
) -> AppResult<ApiResponse<SubjectDetail>> {
    let (Some(resource_id), Some(kind)) = (
        req.resource_id.filter(|r| !r.trim().is_empty()),
        req.resource_type,
    ) else {
        return Err(AppError::validation("Resource ID and type are required"));
    };
    SubjectRepo::attach_resource(&state.db, auth.id(), &id, kind, &resource_id)?;
    let detail = SubjectDetail::load(&state.db, auth.id(), &id)?;
    Ok(ApiResponse::ok("Resource added successfully", detail))
}
