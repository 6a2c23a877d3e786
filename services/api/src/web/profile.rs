//! services/api/src/web/profile.rs
//!
//! Profile endpoints: the caller's own record, and the recomputed
//! statistics block for any user. Statistics are never stored; every
//! request scans the current collections and runs the pure aggregators.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use baliseboxd_core::domain::Profile;
use baliseboxd_core::ratings::RatingScale;
use baliseboxd_core::user_stats;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::parties::PartySummary;
use crate::web::port_error;
use crate::web::protocol::RatingBucketDto;
use crate::web::state::AppState;

/// How many parties the top-rated and recently-attended lists carry.
const RANKED_LIST_LIMIT: usize = 5;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct ProfileDto {
    pub uid: Uuid,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub pseudo: Option<String>,
    pub avatar_url: Option<String>,
}

impl ProfileDto {
    fn from_profile(profile: &Profile) -> Self {
        Self {
            uid: profile.uid,
            email: profile.email.clone(),
            display_name: profile.display_name.clone(),
            pseudo: profile.pseudo.clone(),
            avatar_url: profile.avatar_url.clone(),
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub pseudo: Option<String>,
    pub avatar_url: Option<String>,
}

/// The statistics block a profile page renders, plus the two ranked
/// party lists shown beside it.
#[derive(Serialize, ToSchema)]
pub struct UserStatsResponse {
    pub user_id: Uuid,
    /// Parties the user created or attended (rating-only parties are not
    /// counted here, though they do feed the rating figures below).
    pub party_count: usize,
    pub comment_count: usize,
    pub average_rating_given: f64,
    pub rating_given_distribution: Vec<RatingBucketDto>,
    pub top_rated: Vec<PartySummary>,
    pub recent_participated: Vec<PartySummary>,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Fetch the caller's own profile.
#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "The caller's profile", body = ProfileDto),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn get_me_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let profile = state
        .profiles
        .get_profile(user_id)
        .await
        .map_err(|e| port_error("Failed to load profile", e))?;
    Ok(Json(ProfileDto::from_profile(&profile)))
}

/// Update the caller's profile fields. Omitted fields are left untouched.
#[utoipa::path(
    put,
    path = "/me",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "The updated profile", body = ProfileDto),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn update_me_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let profile = state
        .profiles
        .update_profile(
            user_id,
            req.display_name.as_deref(),
            req.pseudo.as_deref(),
            req.avatar_url.as_deref(),
        )
        .await
        .map_err(|e| port_error("Failed to update profile", e))?;
    Ok(Json(ProfileDto::from_profile(&profile)))
}

/// Recompute a user's statistics block from the current collections.
#[utoipa::path(
    get,
    path = "/users/{user_id}/stats",
    responses(
        (status = 200, description = "The user's recomputed statistics", body = UserStatsResponse),
        (status = 401, description = "Not authenticated")
    ),
    params(("user_id" = Uuid, Path, description = "The user the statistics are about"))
)]
pub async fn user_stats_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let scale = RatingScale::HALF_STARS;

    let parties = state
        .parties
        .list_parties()
        .await
        .map_err(|e| port_error("Failed to list parties", e))?;
    let comments = state
        .comments
        .comments_by_user(user_id)
        .await
        .map_err(|e| port_error("Failed to list comments", e))?;

    let stats = user_stats::profile_stats(&parties, &comments, user_id, &scale);
    let relevant = user_stats::relevant_parties(&parties, user_id);
    let top_rated = user_stats::top_rated_by_user(&relevant, user_id, RANKED_LIST_LIMIT)
        .into_iter()
        .map(PartySummary::from_party)
        .collect();
    let recent_participated =
        user_stats::recent_participated(&relevant, user_id, RANKED_LIST_LIMIT)
            .into_iter()
            .map(PartySummary::from_party)
            .collect();

    Ok(Json(UserStatsResponse {
        user_id,
        party_count: stats.party_count,
        comment_count: stats.comment_count,
        average_rating_given: stats.average_rating_given,
        rating_given_distribution: stats
            .rating_given_distribution
            .iter()
            .map(RatingBucketDto::from)
            .collect(),
        top_rated,
        recent_participated,
    }))
}
