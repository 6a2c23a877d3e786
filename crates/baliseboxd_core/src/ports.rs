//! crates/baliseboxd_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or
//! blob storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use std::pin::Pin;
use uuid::Uuid;

use crate::domain::{Comment, Credentials, NewComment, NewParty, Party, Profile};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, filesystem).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// A live feed of full party snapshots. The store re-delivers the whole
/// current document on every mutation, so consumers recompute derived
/// values from scratch instead of patching state in place.
pub type PartyFeed = Pin<Box<dyn Stream<Item = Party> + Send>>;

/// Incremental upload progress callback: (bytes written, total bytes).
pub type ProgressFn = dyn Fn(u64, u64) + Send + Sync;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait PartyRepository: Send + Sync {
    async fn get_party(&self, party_id: Uuid) -> PortResult<Party>;

    /// All parties, newest creation first. This fetch order is the
    /// tie-break order for every ranking built on top of it.
    async fn list_parties(&self) -> PortResult<Vec<Party>>;

    async fn create_party(&self, new_party: NewParty) -> PortResult<Party>;

    /// Overwrites the single rating key for `user_id` without rewriting
    /// the rest of the map. Last write wins; no history is kept.
    /// Returns the fresh snapshot.
    async fn set_rating(&self, party_id: Uuid, user_id: Uuid, value: f64) -> PortResult<Party>;

    /// Adds `user_id` to the participant roster if not already present
    /// (set-union semantics). Returns the fresh snapshot.
    async fn add_participant(&self, party_id: Uuid, user_id: Uuid) -> PortResult<Party>;

    async fn set_cover_photo(&self, party_id: Uuid, url: &str) -> PortResult<Party>;

    async fn add_media_url(&self, party_id: Uuid, url: &str) -> PortResult<Party>;

    async fn delete_party(&self, party_id: Uuid) -> PortResult<()>;

    /// Subscribes to the party's change feed. Every mutation re-delivers
    /// the full current document.
    async fn subscribe(&self, party_id: Uuid) -> PortResult<PartyFeed>;
}

#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn add_comment(&self, new_comment: NewComment) -> PortResult<Comment>;

    async fn get_comment(&self, comment_id: Uuid) -> PortResult<Comment>;

    /// Comments for one party, oldest first.
    async fn comments_for_party(&self, party_id: Uuid) -> PortResult<Vec<Comment>>;

    /// Every comment a user has authored, newest first.
    async fn comments_by_user(&self, user_id: Uuid) -> PortResult<Vec<Comment>>;

    async fn delete_comment(&self, comment_id: Uuid) -> PortResult<()>;
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn get_profile(&self, uid: Uuid) -> PortResult<Profile>;

    /// Updates the given fields; `None` leaves a field untouched.
    async fn update_profile(
        &self,
        uid: Uuid,
        display_name: Option<&str>,
        pseudo: Option<&str>,
        avatar_url: Option<&str>,
    ) -> PortResult<Profile>;
}

#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
        pseudo: Option<&str>,
    ) -> PortResult<Profile>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<Credentials>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores `data` under `path` and returns a durable, fetchable URL.
    /// When a progress callback is supplied it is invoked after each
    /// written chunk with (bytes written, total bytes).
    async fn put(
        &self,
        path: &str,
        data: &[u8],
        progress: Option<&ProgressFn>,
    ) -> PortResult<String>;
}
