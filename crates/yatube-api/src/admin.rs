//! Operator actions behind `X-Admin-Token`.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use validator::Validate;

use yatube_types::api::CreateGroupRequest;
use yatube_types::models::Group;

use crate::auth::AppState;
use crate::error::AppError;
use crate::extract::PostId;
use crate::with_db;

/// DELETE /admin/cache
pub async fn clear_cache(State(state): State<AppState>) -> StatusCode {
    state.cache.clear();
    info!("Page cache cleared");
    StatusCode::NO_CONTENT
}

/// POST /admin/groups
pub async fn create_group(
    State(state): State<AppState>,
    Json(req): Json<CreateGroupRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate().map_err(|errors| AppError::validation(&req, &errors))?;

    let group = with_db(&state, move |db| {
        let id = db
            .create_group(&req.title, &req.slug, &req.description)?
            .ok_or(AppError::Conflict("slug is taken"))?;
        Ok(Group {
            id,
            title: req.title,
            slug: req.slug,
            description: req.description,
        })
    })
    .await?;

    info!("Group '{}' created", group.slug);
    Ok((StatusCode::CREATED, Json(group)))
}

/// DELETE /admin/groups/{slug}. Posts of the group remain, ungrouped.
pub async fn delete_group(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<StatusCode, AppError> {
    let target = slug.clone();
    let deleted = with_db(&state, move |db| Ok(db.delete_group(&target)?)).await?;
    if !deleted {
        return Err(AppError::NotFound);
    }

    info!("Group '{}' deleted", slug);
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /admin/posts/{post_id}. Comments go with the post.
pub async fn delete_post(
    State(state): State<AppState>,
    PostId(post_id): PostId,
) -> Result<StatusCode, AppError> {
    let deleted = with_db(&state, move |db| Ok(db.delete_post(post_id)?)).await?;
    if !deleted {
        return Err(AppError::NotFound);
    }

    info!("Post {} deleted", post_id);
    Ok(StatusCode::NO_CONTENT)
}
