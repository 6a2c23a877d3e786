//! services/api/src/web/parties.rs
//!
//! Contains the Axum handlers for the party REST endpoints and the master
//! definition for the OpenAPI specification.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use baliseboxd_core::domain::{NewParty, Party};
use baliseboxd_core::ratings::{self, RatingScale};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

use crate::web::port_error;
use crate::web::protocol::{RatingBucketDto, RatingSummary};
use crate::web::state::AppState;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::auth::signup_handler,
        crate::web::auth::login_handler,
        crate::web::auth::logout_handler,
        create_party_handler,
        list_parties_handler,
        party_detail_handler,
        rate_party_handler,
        join_party_handler,
        upload_cover_handler,
        upload_media_handler,
        delete_party_handler,
        crate::web::comments::add_comment_handler,
        crate::web::comments::list_comments_handler,
        crate::web::comments::delete_comment_handler,
        crate::web::profile::get_me_handler,
        crate::web::profile::update_me_handler,
        crate::web::profile::user_stats_handler,
    ),
    components(
        schemas(
            crate::web::auth::SignupRequest,
            crate::web::auth::LoginRequest,
            crate::web::auth::AuthResponse,
            CreatePartyRequest,
            RateRequest,
            PartySummary,
            PartyDetail,
            UploadResponse,
            MediaUploadResponse,
            RatingBucketDto,
            RatingSummary,
            crate::web::comments::AddCommentRequest,
            crate::web::comments::CommentDto,
            crate::web::profile::ProfileDto,
            crate::web::profile::UpdateProfileRequest,
            crate::web::profile::UserStatsResponse,
        )
    ),
    tags(
        (name = "BaliseBoxd API", description = "API endpoints for the social party log.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CreatePartyRequest {
    pub name: String,
    pub description: Option<String>,
    pub location: Option<String>,
    /// When the party happens (RFC 3339). Optional; undated parties are allowed.
    pub date: Option<DateTime<Utc>>,
}

#[derive(Deserialize, ToSchema)]
pub struct RateRequest {
    /// Rating on the half-star scale, 0.5 through 5.0.
    pub rating: f64,
}

/// The compact card shown in party lists.
#[derive(Serialize, ToSchema)]
pub struct PartySummary {
    pub id: Uuid,
    pub name: String,
    pub location: String,
    pub date: Option<DateTime<Utc>>,
    pub created_by: Uuid,
    pub creator_email: String,
    pub participant_count: usize,
    pub average_rating: f64,
    pub rating_count: usize,
    pub cover_photo_url: Option<String>,
}

impl PartySummary {
    pub fn from_party(party: &Party) -> Self {
        Self {
            id: party.id,
            name: party.name.clone(),
            location: party.location.clone(),
            date: party.date,
            created_by: party.created_by,
            creator_email: party.creator_email.clone(),
            participant_count: party.participants.len(),
            average_rating: ratings::average_rating(&party.ratings),
            rating_count: party.ratings.len(),
            cover_photo_url: party.cover_photo_url.clone(),
        }
    }
}

/// The full party page payload, including the computed rating block.
#[derive(Serialize, ToSchema)]
pub struct PartyDetail {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub location: String,
    pub date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub created_by: Uuid,
    pub creator_email: String,
    pub participants: Vec<Uuid>,
    pub rating_summary: RatingSummary,
    /// The requesting user's own rating, if they rated.
    pub my_rating: Option<f64>,
    pub cover_photo_url: Option<String>,
    pub media_urls: Vec<String>,
}

impl PartyDetail {
    fn from_party(party: &Party, viewer: Uuid, scale: &RatingScale) -> Self {
        Self {
            id: party.id,
            name: party.name.clone(),
            description: party.description.clone(),
            location: party.location.clone(),
            date: party.date,
            created_at: party.created_at,
            created_by: party.created_by,
            creator_email: party.creator_email.clone(),
            participants: party.participants.clone(),
            rating_summary: RatingSummary::compute(party, scale),
            my_rating: party.ratings.get(&viewer).copied(),
            cover_photo_url: party.cover_photo_url.clone(),
            media_urls: party.media_urls.clone(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct UploadResponse {
    pub url: String,
}

#[derive(Serialize, ToSchema)]
pub struct MediaUploadResponse {
    pub urls: Vec<String>,
}

/// Keeps uploaded file names path- and URL-safe.
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches('.').is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Create a new party.
#[utoipa::path(
    post,
    path = "/parties",
    request_body = CreatePartyRequest,
    responses(
        (status = 201, description = "Party created successfully", body = PartyDetail),
        (status = 401, description = "Not authenticated"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn create_party_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<CreatePartyRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // The creator's email is denormalized onto the party for display.
    let creator_email = match state.profiles.get_profile(user_id).await {
        Ok(profile) => profile.email.unwrap_or_default(),
        Err(e) => {
            error!("Failed to load creator profile: {:?}", e);
            String::new()
        }
    };

    let party = state
        .parties
        .create_party(NewParty {
            name: req.name,
            description: req.description.unwrap_or_default(),
            location: req.location.unwrap_or_default(),
            date: req.date,
            created_by: user_id,
            creator_email,
        })
        .await
        .map_err(|e| port_error("Failed to create party", e))?;

    let detail = PartyDetail::from_party(&party, user_id, &RatingScale::HALF_STARS);
    Ok((StatusCode::CREATED, Json(detail)))
}

/// List all parties, newest first, each with its computed average rating.
#[utoipa::path(
    get,
    path = "/parties",
    responses(
        (status = 200, description = "All parties", body = [PartySummary]),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_parties_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let parties = state
        .parties
        .list_parties()
        .await
        .map_err(|e| port_error("Failed to list parties", e))?;

    let summaries: Vec<PartySummary> = parties.iter().map(PartySummary::from_party).collect();
    Ok(Json(summaries))
}

/// Fetch one party with its full rating block.
#[utoipa::path(
    get,
    path = "/parties/{party_id}",
    responses(
        (status = 200, description = "The party", body = PartyDetail),
        (status = 404, description = "Party not found")
    ),
    params(("party_id" = Uuid, Path, description = "The party to fetch"))
)]
pub async fn party_detail_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(party_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let party = state
        .parties
        .get_party(party_id)
        .await
        .map_err(|e| port_error("Failed to load party", e))?;
    Ok(Json(PartyDetail::from_party(
        &party,
        user_id,
        &RatingScale::HALF_STARS,
    )))
}

/// Submit or update the caller's rating for a party.
///
/// The write is a single-key overwrite of the caller's entry in the
/// party's rating map; other users' entries are untouched.
#[utoipa::path(
    put,
    path = "/parties/{party_id}/rating",
    request_body = RateRequest,
    responses(
        (status = 200, description = "Recomputed rating block", body = RatingSummary),
        (status = 400, description = "Rating is off the half-star scale"),
        (status = 404, description = "Party not found")
    ),
    params(("party_id" = Uuid, Path, description = "The party being rated"))
)]
pub async fn rate_party_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(party_id): Path<Uuid>,
    Json(req): Json<RateRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let scale = RatingScale::HALF_STARS;
    // The aggregators tolerate off-scale values by dropping them, but the
    // write path refuses to persist one in the first place.
    if !scale.contains(req.rating) {
        return Err((
            StatusCode::BAD_REQUEST,
            format!(
                "Rating must be a half-star step between {} and {}",
                scale.min(),
                scale.max()
            ),
        ));
    }

    let party = state
        .parties
        .set_rating(party_id, user_id, req.rating)
        .await
        .map_err(|e| port_error("Failed to save rating", e))?;

    Ok(Json(RatingSummary::compute(&party, &scale)))
}

/// Join a party as a participant.
#[utoipa::path(
    post,
    path = "/parties/{party_id}/join",
    responses(
        (status = 200, description = "The updated party", body = PartyDetail),
        (status = 404, description = "Party not found")
    ),
    params(("party_id" = Uuid, Path, description = "The party to join"))
)]
pub async fn join_party_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(party_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let party = state
        .parties
        .add_participant(party_id, user_id)
        .await
        .map_err(|e| port_error("Failed to join party", e))?;
    Ok(Json(PartyDetail::from_party(
        &party,
        user_id,
        &RatingScale::HALF_STARS,
    )))
}

/// Upload the party's cover photo.
///
/// Accepts a multipart/form-data request with a single file part.
#[utoipa::path(
    post,
    path = "/parties/{party_id}/cover",
    request_body(content_type = "multipart/form-data", description = "The cover photo to upload."),
    responses(
        (status = 200, description = "Cover photo stored", body = UploadResponse),
        (status = 400, description = "Multipart form had no file"),
        (status = 404, description = "Party not found")
    ),
    params(("party_id" = Uuid, Path, description = "The party the cover belongs to"))
)]
pub async fn upload_cover_handler(
    State(state): State<Arc<AppState>>,
    Path(party_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // The party must exist before any bytes are stored for it; otherwise
    // a bad id would leave an orphan blob behind the 404.
    state
        .parties
        .get_party(party_id)
        .await
        .map_err(|e| port_error("Failed to load party", e))?;

    let field = multipart
        .next_field()
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to read multipart data: {}", e),
            )
        })?
        .ok_or((
            StatusCode::BAD_REQUEST,
            "Multipart form must include a file".to_string(),
        ))?;

    let file_name = sanitize_file_name(field.file_name().unwrap_or("cover.jpg"));
    let data = field.bytes().await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to read file bytes: {}", e),
        )
    })?;

    let blob_path = format!("parties/{}/cover/{}", party_id, file_name);
    let progress = |written: u64, total: u64| {
        debug!("Cover upload progress: {}/{} bytes", written, total);
    };
    let url = state
        .blobs
        .put(&blob_path, &data, Some(&progress))
        .await
        .map_err(|e| port_error("Failed to store cover photo", e))?;

    state
        .parties
        .set_cover_photo(party_id, &url)
        .await
        .map_err(|e| port_error("Failed to attach cover photo", e))?;

    Ok(Json(UploadResponse { url }))
}

/// Upload media souvenirs for a party.
///
/// Accepts a multipart/form-data request; every file part is stored and
/// appended to the party's media list.
#[utoipa::path(
    post,
    path = "/parties/{party_id}/media",
    request_body(content_type = "multipart/form-data", description = "The media files to upload."),
    responses(
        (status = 200, description = "Media stored", body = MediaUploadResponse),
        (status = 404, description = "Party not found")
    ),
    params(("party_id" = Uuid, Path, description = "The party the media belong to"))
)]
pub async fn upload_media_handler(
    State(state): State<Arc<AppState>>,
    Path(party_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // Same orphan-blob guard as the cover upload.
    state
        .parties
        .get_party(party_id)
        .await
        .map_err(|e| port_error("Failed to load party", e))?;

    let mut urls = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to read multipart data: {}", e),
        )
    })? {
        let file_name = sanitize_file_name(field.file_name().unwrap_or("souvenir"));
        let data = field.bytes().await.map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to read file bytes: {}", e),
            )
        })?;

        // A uuid prefix keeps two souvenirs with the same name apart.
        let blob_path = format!("parties/{}/media/{}-{}", party_id, Uuid::new_v4(), file_name);
        let progress = |written: u64, total: u64| {
            debug!("Media upload progress: {}/{} bytes", written, total);
        };
        let url = state
            .blobs
            .put(&blob_path, &data, Some(&progress))
            .await
            .map_err(|e| port_error("Failed to store media", e))?;

        state
            .parties
            .add_media_url(party_id, &url)
            .await
            .map_err(|e| port_error("Failed to attach media", e))?;
        urls.push(url);
    }

    if urls.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Multipart form must include at least one file".to_string(),
        ));
    }
    Ok(Json(MediaUploadResponse { urls }))
}

/// Delete a party. Only its creator may do this.
#[utoipa::path(
    delete,
    path = "/parties/{party_id}",
    responses(
        (status = 204, description = "Party deleted"),
        (status = 403, description = "Not the creator"),
        (status = 404, description = "Party not found")
    ),
    params(("party_id" = Uuid, Path, description = "The party to delete"))
)]
pub async fn delete_party_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(party_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let party = state
        .parties
        .get_party(party_id)
        .await
        .map_err(|e| port_error("Failed to load party", e))?;

    if party.created_by != user_id {
        return Err((
            StatusCode::FORBIDDEN,
            "Only the creator can delete a party".to_string(),
        ));
    }

    state
        .parties
        .delete_party(party_id)
        .await
        .map_err(|e| port_error("Failed to delete party", e))?;
    Ok(StatusCode::NO_CONTENT)
}

//=========================================================================================
// Tests
//=========================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::post;
    use axum::Router;
    use baliseboxd_core::domain::{Comment, Credentials, NewComment, Profile};
    use baliseboxd_core::ports::{
        BlobStore, CommentRepository, IdentityService, PartyFeed, PartyRepository, PortError,
        PortResult, ProfileRepository, ProgressFn,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    /// A party store with nothing in it: every lookup is a miss.
    struct NoParties;

    #[async_trait]
    impl PartyRepository for NoParties {
        async fn get_party(&self, party_id: Uuid) -> PortResult<Party> {
            Err(PortError::NotFound(format!("Party {} not found", party_id)))
        }
        async fn list_parties(&self) -> PortResult<Vec<Party>> {
            Ok(Vec::new())
        }
        async fn create_party(&self, _new_party: NewParty) -> PortResult<Party> {
            Err(PortError::Unexpected("not under test".to_string()))
        }
        async fn set_rating(&self, _: Uuid, _: Uuid, _: f64) -> PortResult<Party> {
            Err(PortError::Unexpected("not under test".to_string()))
        }
        async fn add_participant(&self, _: Uuid, _: Uuid) -> PortResult<Party> {
            Err(PortError::Unexpected("not under test".to_string()))
        }
        async fn set_cover_photo(&self, _: Uuid, _: &str) -> PortResult<Party> {
            Err(PortError::Unexpected("not under test".to_string()))
        }
        async fn add_media_url(&self, _: Uuid, _: &str) -> PortResult<Party> {
            Err(PortError::Unexpected("not under test".to_string()))
        }
        async fn delete_party(&self, _: Uuid) -> PortResult<()> {
            Err(PortError::Unexpected("not under test".to_string()))
        }
        async fn subscribe(&self, _: Uuid) -> PortResult<PartyFeed> {
            Err(PortError::Unexpected("not under test".to_string()))
        }
    }

    /// Counts writes so tests can assert nothing was stored.
    struct CountingBlobs(AtomicUsize);

    #[async_trait]
    impl BlobStore for CountingBlobs {
        async fn put(
            &self,
            path: &str,
            _data: &[u8],
            _progress: Option<&ProgressFn>,
        ) -> PortResult<String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(format!("http://localhost/blobs/{}", path))
        }
    }

    struct NoComments;

    #[async_trait]
    impl CommentRepository for NoComments {
        async fn add_comment(&self, _: NewComment) -> PortResult<Comment> {
            Err(PortError::Unexpected("not under test".to_string()))
        }
        async fn get_comment(&self, comment_id: Uuid) -> PortResult<Comment> {
            Err(PortError::NotFound(format!("Comment {} not found", comment_id)))
        }
        async fn comments_for_party(&self, _: Uuid) -> PortResult<Vec<Comment>> {
            Ok(Vec::new())
        }
        async fn comments_by_user(&self, _: Uuid) -> PortResult<Vec<Comment>> {
            Ok(Vec::new())
        }
        async fn delete_comment(&self, _: Uuid) -> PortResult<()> {
            Err(PortError::Unexpected("not under test".to_string()))
        }
    }

    struct NoProfiles;

    #[async_trait]
    impl ProfileRepository for NoProfiles {
        async fn get_profile(&self, uid: Uuid) -> PortResult<Profile> {
            Err(PortError::NotFound(format!("User {} not found", uid)))
        }
        async fn update_profile(
            &self,
            _: Uuid,
            _: Option<&str>,
            _: Option<&str>,
            _: Option<&str>,
        ) -> PortResult<Profile> {
            Err(PortError::Unexpected("not under test".to_string()))
        }
    }

    struct NoIdentity;

    #[async_trait]
    impl IdentityService for NoIdentity {
        async fn create_user_with_email(
            &self,
            _: &str,
            _: &str,
            _: Option<&str>,
        ) -> PortResult<Profile> {
            Err(PortError::Unexpected("not under test".to_string()))
        }
        async fn get_user_by_email(&self, email: &str) -> PortResult<Credentials> {
            Err(PortError::NotFound(format!("No account for {}", email)))
        }
        async fn create_auth_session(
            &self,
            _: &str,
            _: Uuid,
            _: DateTime<Utc>,
        ) -> PortResult<()> {
            Err(PortError::Unexpected("not under test".to_string()))
        }
        async fn validate_auth_session(&self, _: &str) -> PortResult<Uuid> {
            Err(PortError::Unauthorized)
        }
        async fn delete_auth_session(&self, _: &str) -> PortResult<()> {
            Err(PortError::Unexpected("not under test".to_string()))
        }
    }

    fn test_config() -> Config {
        Config {
            bind_address: "127.0.0.1:0".parse().unwrap(),
            database_url: String::new(),
            log_level: tracing::Level::INFO,
            blob_root: std::env::temp_dir(),
            public_base_url: "http://localhost:3000".to_string(),
            cors_origin: "http://localhost:5173".to_string(),
        }
    }

    fn upload_app(blobs: Arc<CountingBlobs>) -> Router {
        let state = Arc::new(AppState {
            parties: Arc::new(NoParties),
            comments: Arc::new(NoComments),
            profiles: Arc::new(NoProfiles),
            identity: Arc::new(NoIdentity),
            blobs,
            config: Arc::new(test_config()),
        });
        Router::new()
            .route("/parties/{party_id}/cover", post(upload_cover_handler))
            .route("/parties/{party_id}/media", post(upload_media_handler))
            .with_state(state)
    }

    fn multipart_request(uri: String) -> Request<Body> {
        let boundary = "cafebabe";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"photo.jpg\"\r\n\
             Content-Type: image/jpeg\r\n\r\nfake image bytes\r\n--{b}--\r\n",
            b = boundary
        );
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn cover_upload_to_a_missing_party_stores_nothing() {
        let blobs = Arc::new(CountingBlobs(AtomicUsize::new(0)));
        let app = upload_app(blobs.clone());

        let request = multipart_request(format!("/parties/{}/cover", Uuid::new_v4()));
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(blobs.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn media_upload_to_a_missing_party_stores_nothing() {
        let blobs = Arc::new(CountingBlobs(AtomicUsize::new(0)));
        let app = upload_app(blobs.clone());

        let request = multipart_request(format!("/parties/{}/media", Uuid::new_v4()));
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(blobs.0.load(Ordering::SeqCst), 0);
    }
}
