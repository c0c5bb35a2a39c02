//! Contact tags.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
};
use serde::Deserialize;

use parley_core::TagId;

use super::required;
use crate::db::TagRepository;
use crate::error::AppError;
use crate::middleware::RequireTenant;
use crate::models::Tag;
use crate::state::AppState;

/// Color used when a tag is created without one.
pub const DEFAULT_TAG_COLOR: &str = "#64748b";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tags", get(index).post(create))
        .route("/tags/{id}", put(update).delete(destroy))
}

#[derive(Debug, Deserialize)]
pub struct TagRequest {
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

impl TagRequest {
    fn validated(&self) -> Result<(String, String), AppError> {
        let name = required("name", &self.name)?;
        let color = match self.color.as_deref().map(str::trim) {
            None | Some("") => DEFAULT_TAG_COLOR.to_owned(),
            Some(c) if is_hex_color(c) => c.to_owned(),
            Some(c) => {
                return Err(AppError::BadRequest(format!(
                    "color must look like #rrggbb, got {c:?}"
                )));
            }
        };
        Ok((name, color))
    }
}

fn is_hex_color(s: &str) -> bool {
    s.strip_prefix('#')
        .is_some_and(|hex| hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

/// GET /api/tags
///
/// # Errors
///
/// 500 if the database query fails.
pub async fn index(
    State(state): State<AppState>,
    RequireTenant(tenant): RequireTenant,
) -> Result<Json<Vec<Tag>>, AppError> {
    Ok(Json(TagRepository::new(state.pool()).list(tenant.id).await?))
}

/// POST /api/tags
///
/// # Errors
///
/// 400 for a blank name or bad color, 409 for a duplicate name.
pub async fn create(
    State(state): State<AppState>,
    RequireTenant(tenant): RequireTenant,
    Json(body): Json<TagRequest>,
) -> Result<(StatusCode, Json<Tag>), AppError> {
    let (name, color) = body.validated()?;
    let tag = TagRepository::new(state.pool())
        .create(tenant.id, &name, &color)
        .await?;
    Ok((StatusCode::CREATED, Json(tag)))
}

/// PUT /api/tags/{id}
///
/// # Errors
///
/// 404 for an unknown tag, 409 for a duplicate name.
pub async fn update(
    State(state): State<AppState>,
    RequireTenant(tenant): RequireTenant,
    Path(id): Path<TagId>,
    Json(body): Json<TagRequest>,
) -> Result<Json<Tag>, AppError> {
    let (name, color) = body.validated()?;
    let tag = TagRepository::new(state.pool())
        .update(tenant.id, id, &name, &color)
        .await?;
    Ok(Json(tag))
}

/// DELETE /api/tags/{id}
///
/// # Errors
///
/// 404 for an unknown tag.
pub async fn destroy(
    State(state): State<AppState>,
    RequireTenant(tenant): RequireTenant,
    Path(id): Path<TagId>,
) -> Result<StatusCode, AppError> {
    TagRepository::new(state.pool()).delete(tenant.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_color() {
        assert!(is_hex_color("#A1b2C3"));
        assert!(!is_hex_color("A1b2C3"));
        assert!(!is_hex_color("#abc"));
        assert!(!is_hex_color("#ggggggg"));
    }

    #[test]
    fn test_default_color() {
        let req = TagRequest {
            name: " VIP ".to_string(),
            color: None,
        };
        let (name, color) = req.validated().ok().unwrap_or_default();
        assert_eq!(name, "VIP");
        assert_eq!(color, DEFAULT_TAG_COLOR);
    }
}
