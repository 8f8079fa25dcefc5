//! Post lifecycle: draft saves, publishing, listing, lookup and deletion.
//!
//! All authenticated users can see and change all posts. The caller's
//! [`Identity`] is threaded through every operation but never consulted.

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use axum_extra::extract::WithRejection;
use tracing::info;

use blogcraft_db::queries::PostWrite;
use blogcraft_types::api::{MessageResponse, SavePostRequest};
use blogcraft_types::models::{Post, PostStatus};

use crate::error::ApiError;
use crate::middleware::Identity;
use crate::{AppState, run_blocking};

// -- Operations --

/// Shared body of save-draft and publish. `status` is `None` for a draft
/// save (existing status kept, new posts are drafts) and `Some` to force it.
pub async fn save_post(
    state: &AppState,
    _identity: &Identity,
    req: SavePostRequest,
    status: Option<PostStatus>,
) -> Result<Post, ApiError> {
    let title = req
        .title
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Validation("Title is required".to_string()))?;

    // A missing id upserts against "", which never matches and so inserts.
    let key = req.id.unwrap_or_default();

    let state = state.clone();
    run_blocking(move || {
        let row = state.db.upsert_post(
            &key,
            PostWrite {
                title: &title,
                content: req.content.as_deref(),
                tags: req.tags.as_deref(),
                status,
            },
        )?;
        Ok(row.into_post()?)
    })
    .await
}

pub async fn list_posts(state: &AppState, _identity: &Identity) -> Result<Vec<Post>, ApiError> {
    let state = state.clone();
    run_blocking(move || {
        state
            .db
            .list_posts()?
            .into_iter()
            .map(|row| row.into_post().map_err(ApiError::from))
            .collect()
    })
    .await
}

pub async fn find_post(state: &AppState, _identity: &Identity, id: String) -> Result<Post, ApiError> {
    let state = state.clone();
    run_blocking(move || {
        let row = state.db.get_post(&id)?.ok_or(ApiError::NotFound)?;
        Ok(row.into_post()?)
    })
    .await
}

pub async fn remove_post(state: &AppState, _identity: &Identity, id: String) -> Result<(), ApiError> {
    let state = state.clone();
    run_blocking(move || {
        if state.db.delete_post(&id)? {
            Ok(())
        } else {
            Err(ApiError::NotFound)
        }
    })
    .await
}

// -- Handlers --

pub async fn save_draft(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    WithRejection(Json(req), _): WithRejection<Json<SavePostRequest>, ApiError>,
) -> Result<Json<Post>, ApiError> {
    let post = save_post(&state, &identity, req, None).await?;
    info!(post_id = %post.id, user_id = %identity.id, status = %post.status, "Draft saved");
    Ok(Json(post))
}

pub async fn publish(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    WithRejection(Json(req), _): WithRejection<Json<SavePostRequest>, ApiError>,
) -> Result<Json<Post>, ApiError> {
    let post = save_post(&state, &identity, req, Some(PostStatus::Published)).await?;
    info!(post_id = %post.id, user_id = %identity.id, "Post published");
    Ok(Json(post))
}

pub async fn list_blogs(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<Post>>, ApiError> {
    Ok(Json(list_posts(&state, &identity).await?))
}

pub async fn get_blog(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Post>, ApiError> {
    Ok(Json(find_post(&state, &identity, id).await?))
}

pub async fn delete_blog(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<MessageResponse>, ApiError> {
    remove_post(&state, &identity, id.clone()).await?;
    info!(post_id = %id, user_id = %identity.id, "Post deleted");
    Ok(Json(MessageResponse::new("Blog deleted successfully")))
}
