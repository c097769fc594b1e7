//! Note API handlers
//!
//! Listing and reading are open to anonymous callers but viewer-aware:
//! private notes show up for their owner only.

use super::{clamp_u32, validate_image_url, MessageResponse, PageMetadata, SuccessResponse, ValidatedJson};
use crate::auth::AuthenticatedIdentity;
use crate::error::AppError;
use crate::services::NoteDraft;
use crate::state::AppState;
use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Extension,
};
use blanknotes_core::{Note, NoteChanges, NoteFilter, PageRequest, Visibility};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// Who can read a note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum NoteVisibility {
    Public,
    Private,
}

impl From<NoteVisibility> for Visibility {
    fn from(v: NoteVisibility) -> Self {
        match v {
            NoteVisibility::Public => Visibility::Public,
            NoteVisibility::Private => Visibility::Private,
        }
    }
}

impl From<Visibility> for NoteVisibility {
    fn from(v: Visibility) -> Self {
        match v {
            Visibility::Public => NoteVisibility::Public,
            Visibility::Private => NoteVisibility::Private,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthorResponse {
    pub id: Uuid,
    pub name: String,
    pub avatar_url: String,
}

/// Note with its author summary
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NoteResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub cover_url: String,
    pub content: String,
    pub visibility: NoteVisibility,
    pub author: AuthorResponse,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Note> for NoteResponse {
    fn from(note: Note) -> Self {
        Self {
            id: note.id,
            title: note.title,
            description: note.description,
            cover_url: note.cover_url,
            content: note.content,
            visibility: note.visibility.into(),
            author: AuthorResponse {
                id: note.author.id,
                name: note.author.name,
                avatar_url: note.author.avatar_url,
            },
            created_at: note.created_at,
            updated_at: note.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NoteListResponse {
    pub notes: Vec<NoteResponse>,
    pub metadata: PageMetadata,
}

/// New note
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateNoteRequest {
    #[validate(length(min = 1, max = 25, message = "title must be 1 to 25 characters"))]
    pub title: String,

    #[serde(default)]
    #[validate(length(max = 50, message = "description must be at most 50 characters"))]
    pub description: String,

    #[validate(
        url(message = "invalid url"),
        custom(function = "validate_image_url", message = "cover must be a .jpg or .png image")
    )]
    pub cover_url: String,

    #[validate(length(min = 1, message = "content is required"))]
    pub content: String,

    pub visibility: NoteVisibility,
}

impl From<CreateNoteRequest> for NoteDraft {
    fn from(req: CreateNoteRequest) -> Self {
        Self {
            title: req.title,
            description: req.description,
            cover_url: req.cover_url,
            content: req.content,
            visibility: req.visibility.into(),
        }
    }
}

/// Note edit; omitted fields stay unchanged
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateNoteRequest {
    #[validate(length(min = 1, max = 25, message = "title must be 1 to 25 characters"))]
    pub title: Option<String>,

    #[validate(length(max = 50, message = "description must be at most 50 characters"))]
    pub description: Option<String>,

    #[validate(
        url(message = "invalid url"),
        custom(function = "validate_image_url", message = "cover must be a .jpg or .png image")
    )]
    pub cover_url: Option<String>,

    #[validate(length(min = 1, message = "content must not be empty"))]
    pub content: Option<String>,

    pub visibility: Option<NoteVisibility>,
}

impl From<UpdateNoteRequest> for NoteChanges {
    fn from(req: UpdateNoteRequest) -> Self {
        Self {
            title: req.title,
            description: req.description,
            cover_url: req.cover_url,
            content: req.content,
            visibility: req.visibility.map(Into::into),
        }
    }
}

/// Query parameters for listing notes
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListNotesQuery {
    /// Exact match on the title
    pub title: Option<String>,
    /// Only notes owned by this user
    pub user_id: Option<Uuid>,
    pub visibility: Option<NoteVisibility>,
    /// One of `id`, `user_id`, `title`, `created_at`, `updated_at`
    pub sort: Option<String>,
    /// `asc` or `desc`
    pub order: Option<String>,
    pub limit: Option<i64>,
    pub page: Option<i64>,
}

impl ListNotesQuery {
    fn into_parts(self) -> (NoteFilter, PageRequest) {
        (
            NoteFilter {
                title: self.title.filter(|t| !t.is_empty()),
                user_id: self.user_id,
                visibility: self.visibility.map(Into::into),
                viewer: None,
            },
            PageRequest {
                sort: self.sort,
                order: self.order,
                limit: clamp_u32(self.limit),
                page: clamp_u32(self.page),
            },
        )
    }
}

fn viewer(identity: Option<Extension<AuthenticatedIdentity>>) -> Option<Uuid> {
    identity.map(|Extension(identity)| identity.user_id)
}

/// Create a note owned by the caller
#[utoipa::path(
    post,
    path = "/api/v1/notes",
    tag = "notes",
    request_body = CreateNoteRequest,
    responses(
        (status = 201, description = "Note created", body = crate::handlers::NoteEnvelope),
        (status = 400, description = "Invalid input or duplicate title", body = crate::error::ApiError),
        (status = 401, description = "Not authenticated", body = crate::error::ApiError),
    ),
    security(("cookie_auth" = []), ("bearer_auth" = []))
)]
pub async fn create_note(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<AuthenticatedIdentity>,
    ValidatedJson(request): ValidatedJson<CreateNoteRequest>,
) -> Result<impl IntoResponse, AppError> {
    let note = state.notes.create(&identity, request.into()).await?;
    Ok((
        StatusCode::CREATED,
        SuccessResponse::new("note created", NoteResponse::from(note)),
    ))
}

/// List notes visible to the caller
#[utoipa::path(
    get,
    path = "/api/v1/notes",
    tag = "notes",
    params(ListNotesQuery),
    responses(
        (status = 200, description = "Page of notes", body = crate::handlers::NoteListEnvelope),
        (status = 400, description = "Invalid query", body = crate::error::ApiError),
    )
)]
pub async fn list_notes(
    State(state): State<Arc<AppState>>,
    identity: Option<Extension<AuthenticatedIdentity>>,
    query: Result<Query<ListNotesQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(query) = query?;
    let (filter, page) = query.into_parts();

    let page = state.notes.list(filter, viewer(identity), &page).await?;
    let body = NoteListResponse {
        notes: page.items.into_iter().map(NoteResponse::from).collect(),
        metadata: page.metadata.into(),
    };

    Ok(SuccessResponse::new("notes retrieved", body))
}

/// Get a note by ID
#[utoipa::path(
    get,
    path = "/api/v1/notes/{id}",
    tag = "notes",
    params(("id" = Uuid, Path, description = "Note ID")),
    responses(
        (status = 200, description = "Note found", body = crate::handlers::NoteEnvelope),
        (status = 401, description = "Private note of another user", body = crate::error::ApiError),
        (status = 404, description = "Note not found", body = crate::error::ApiError),
    )
)]
pub async fn get_note(
    State(state): State<Arc<AppState>>,
    identity: Option<Extension<AuthenticatedIdentity>>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = id?;
    let note = state.notes.get(id, viewer(identity)).await?;
    Ok(SuccessResponse::new("note retrieved", NoteResponse::from(note)))
}

/// Update a note owned by the caller
#[utoipa::path(
    put,
    path = "/api/v1/notes/{id}",
    tag = "notes",
    params(("id" = Uuid, Path, description = "Note ID")),
    request_body = UpdateNoteRequest,
    responses(
        (status = 200, description = "Note updated", body = crate::handlers::NoteEnvelope),
        (status = 400, description = "Invalid input or duplicate title", body = crate::error::ApiError),
        (status = 401, description = "Not authenticated", body = crate::error::ApiError),
        (status = 403, description = "Not the note owner", body = crate::error::ApiError),
        (status = 404, description = "Note not found", body = crate::error::ApiError),
    ),
    security(("cookie_auth" = []), ("bearer_auth" = []))
)]
pub async fn update_note(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<AuthenticatedIdentity>,
    id: Result<Path<Uuid>, PathRejection>,
    ValidatedJson(request): ValidatedJson<UpdateNoteRequest>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = id?;
    let note = state.notes.update(id, request.into(), &identity).await?;
    Ok(SuccessResponse::new("note updated", NoteResponse::from(note)))
}

/// Delete a note owned by the caller
#[utoipa::path(
    delete,
    path = "/api/v1/notes/{id}",
    tag = "notes",
    params(("id" = Uuid, Path, description = "Note ID")),
    responses(
        (status = 200, description = "Note deleted", body = MessageResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ApiError),
        (status = 403, description = "Not the note owner", body = crate::error::ApiError),
        (status = 404, description = "Note not found", body = crate::error::ApiError),
    ),
    security(("cookie_auth" = []), ("bearer_auth" = []))
)]
pub async fn delete_note(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<AuthenticatedIdentity>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = id?;
    state.notes.delete(id, &identity).await?;
    Ok(MessageResponse::new("note deleted"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> serde_json::Value {
        serde_json::json!({
            "title": "groceries",
            "description": "weekly list",
            "cover_url": "https://cdn.example.com/cover.png",
            "content": "milk, eggs",
            "visibility": "public"
        })
    }

    #[test]
    fn test_create_request_valid() {
        let request: CreateNoteRequest = serde_json::from_value(request()).unwrap();
        assert!(request.validate().is_ok());
        assert_eq!(request.visibility, NoteVisibility::Public);
    }

    #[test]
    fn test_create_request_rules() {
        let mut body = request();
        body["title"] = serde_json::json!("a title that is far too long for a note");
        body["cover_url"] = serde_json::json!("https://cdn.example.com/cover.bmp");
        body["content"] = serde_json::json!("");

        let request: CreateNoteRequest = serde_json::from_value(body).unwrap();
        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("title"));
        assert!(fields.contains_key("cover_url"));
        assert!(fields.contains_key("content"));
    }

    #[test]
    fn test_unknown_visibility_rejected() {
        let mut body = request();
        body["visibility"] = serde_json::json!("friends");
        assert!(serde_json::from_value::<CreateNoteRequest>(body).is_err());
    }

    #[test]
    fn test_update_request_maps_to_changes() {
        let request: UpdateNoteRequest =
            serde_json::from_value(serde_json::json!({"visibility": "private"})).unwrap();
        let changes = NoteChanges::from(request);
        assert_eq!(changes.visibility, Some(Visibility::Private));
        assert!(changes.title.is_none());
    }
}
