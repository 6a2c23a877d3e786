//! services/api/src/web/comments.rs
//!
//! Handlers for the append-only comment threads under each party.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use baliseboxd_core::domain::{Comment, NewComment};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::port_error;
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct AddCommentRequest {
    pub text: String,
}

#[derive(Serialize, ToSchema)]
pub struct CommentDto {
    pub id: Uuid,
    pub party_id: Uuid,
    pub user_id: Uuid,
    pub text: String,
    pub posted_at: DateTime<Utc>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
}

impl CommentDto {
    fn from_comment(comment: &Comment) -> Self {
        Self {
            id: comment.id,
            party_id: comment.party_id,
            user_id: comment.user_id,
            text: comment.text.clone(),
            posted_at: comment.posted_at,
            email: comment.email.clone(),
            avatar_url: comment.avatar_url.clone(),
        }
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Append a comment to a party.
#[utoipa::path(
    post,
    path = "/parties/{party_id}/comments",
    request_body = AddCommentRequest,
    responses(
        (status = 201, description = "Comment appended", body = CommentDto),
        (status = 400, description = "Empty comment"),
        (status = 404, description = "Party not found")
    ),
    params(("party_id" = Uuid, Path, description = "The party being commented on"))
)]
pub async fn add_comment_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(party_id): Path<Uuid>,
    Json(req): Json<AddCommentRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if req.text.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Comment text must not be empty".to_string(),
        ));
    }

    // The party must exist before anything is appended under it.
    state
        .parties
        .get_party(party_id)
        .await
        .map_err(|e| port_error("Failed to load party", e))?;

    // Denormalized author fields come along for display.
    let (email, avatar_url) = match state.profiles.get_profile(user_id).await {
        Ok(profile) => (profile.email, profile.avatar_url),
        Err(e) => {
            error!("Failed to load commenter profile: {:?}", e);
            (None, None)
        }
    };

    let comment = state
        .comments
        .add_comment(NewComment {
            party_id,
            user_id,
            text: req.text,
            email,
            avatar_url,
        })
        .await
        .map_err(|e| port_error("Failed to add comment", e))?;

    Ok((StatusCode::CREATED, Json(CommentDto::from_comment(&comment))))
}

/// List a party's comments, oldest first.
#[utoipa::path(
    get,
    path = "/parties/{party_id}/comments",
    responses(
        (status = 200, description = "The party's comments", body = [CommentDto]),
        (status = 404, description = "Party not found")
    ),
    params(("party_id" = Uuid, Path, description = "The party whose comments to list"))
)]
pub async fn list_comments_handler(
    State(state): State<Arc<AppState>>,
    Path(party_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let comments = state
        .comments
        .comments_for_party(party_id)
        .await
        .map_err(|e| port_error("Failed to list comments", e))?;
    let dtos: Vec<CommentDto> = comments.iter().map(CommentDto::from_comment).collect();
    Ok(Json(dtos))
}

/// Delete a comment. Allowed to the comment's author and to the creator
/// of the party it belongs to.
#[utoipa::path(
    delete,
    path = "/comments/{comment_id}",
    responses(
        (status = 204, description = "Comment deleted"),
        (status = 403, description = "Neither the author nor the party creator"),
        (status = 404, description = "Comment not found")
    ),
    params(("comment_id" = Uuid, Path, description = "The comment to delete"))
)]
pub async fn delete_comment_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(comment_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let comment = state
        .comments
        .get_comment(comment_id)
        .await
        .map_err(|e| port_error("Failed to load comment", e))?;

    let allowed = comment.user_id == user_id
        || state
            .parties
            .get_party(comment.party_id)
            .await
            .map(|party| party.created_by == user_id)
            .unwrap_or(false);
    if !allowed {
        return Err((
            StatusCode::FORBIDDEN,
            "Only the author or the party creator can delete a comment".to_string(),
        ));
    }

    state
        .comments
        .delete_comment(comment_id)
        .await
        .map_err(|e| port_error("Failed to delete comment", e))?;
    Ok(StatusCode::NO_CONTENT)
}
