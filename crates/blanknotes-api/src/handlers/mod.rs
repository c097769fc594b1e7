//! API handlers
//!
//! Successful responses share the `{"message", "data"}` envelope; failures
//! are rendered by [`crate::error::AppError`].

pub mod auth;
pub mod health;
pub mod notes;
pub mod users;

use crate::error::AppError;
use async_trait::async_trait;
use axum::{
    extract::{FromRequest, Request},
    http::{header, HeaderName},
    Json,
};
use blanknotes_core::Metadata;
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

/// Success envelope
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[aliases(
    UserEnvelope = SuccessResponse<users::UserResponse>,
    UserListEnvelope = SuccessResponse<users::UserListResponse>,
    LoginEnvelope = SuccessResponse<auth::LoginResponse>,
    RefreshEnvelope = SuccessResponse<auth::RefreshResponse>,
    NoteEnvelope = SuccessResponse<notes::NoteResponse>,
    NoteListEnvelope = SuccessResponse<notes::NoteListResponse>
)]
pub struct SuccessResponse<T> {
    pub message: String,
    pub data: T,
}

impl<T> SuccessResponse<T> {
    pub fn new(message: impl Into<String>, data: T) -> Json<Self> {
        Json(Self {
            message: message.into(),
            data,
        })
    }
}

/// Envelope for operations that return no data
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

/// Pagination block attached to every list response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PageMetadata {
    pub sort: String,
    pub order: String,
    pub total_records: u64,
    pub total_page: u32,
    pub limit: u32,
    pub page: u32,
}

impl From<Metadata> for PageMetadata {
    fn from(m: Metadata) -> Self {
        Self {
            sort: m.sort,
            order: m.order,
            total_records: m.total_records,
            total_page: m.total_page,
            limit: m.limit,
            page: m.page,
        }
    }
}

/// JSON body that has been deserialized and validated
///
/// Malformed JSON is a 400 with a message; rule violations are a 400 with
/// the per-field list.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

/// `Set-Cookie` header pairs for a response
pub(crate) fn set_cookies(cookies: Vec<String>) -> Vec<(HeaderName, String)> {
    cookies
        .into_iter()
        .map(|cookie| (header::SET_COOKIE, cookie))
        .collect()
}

/// Clamp a signed query number into the unsigned range; out-of-range values
/// fall back to the defaults during normalization.
pub(crate) fn clamp_u32(value: Option<i64>) -> Option<u32> {
    value.map(|v| v.clamp(0, i64::from(u32::MAX)) as u32)
}

pub(crate) fn trimmed_lowercase<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(raw.trim().to_lowercase())
}

/// Optional field where an empty string means "not provided"
pub(crate) fn non_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.trim().is_empty()))
}

pub(crate) fn non_empty_lowercase<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(non_empty(deserializer)?.map(|s| s.trim().to_lowercase()))
}

/// Accepts URLs whose path ends in `.jpg` or `.png`
pub(crate) fn validate_image_url(url: &str) -> Result<(), ValidationError> {
    let path = url.split(['?', '#']).next().unwrap_or_default().to_lowercase();
    if path.ends_with(".jpg") || path.ends_with(".png") {
        Ok(())
    } else {
        Err(ValidationError::new("image"))
    }
}
