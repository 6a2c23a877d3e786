//! crates/baliseboxd_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.
//!
//! All instants are `chrono::DateTime<Utc>`. Whatever timestamp shape a
//! storage backend uses is converted exactly once, at the adapter
//! boundary; the aggregators never see anything else.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

/// A party: one user-created gathering, with its participant roster and
/// its sparse per-user rating map.
#[derive(Debug, Clone)]
pub struct Party {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub location: String,
    /// When the gathering happens, distinct from `created_at`. `None`
    /// when the stored value was absent or unparseable.
    pub date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub created_by: Uuid,
    /// Denormalized display copy of the creator's email.
    pub creator_email: String,
    /// Display order follows insertion order.
    pub participants: Vec<Uuid>,
    /// One entry per user who rated. Absence means "has not rated",
    /// never "rated zero". Writes are single-key, last-write-wins.
    pub ratings: HashMap<Uuid, f64>,
    pub cover_photo_url: Option<String>,
    pub media_urls: Vec<String>,
}

/// The payload for creating a party. The record starts with no
/// participants and an empty rating map.
#[derive(Debug, Clone)]
pub struct NewParty {
    pub name: String,
    pub description: String,
    pub location: String,
    pub date: Option<DateTime<Utc>>,
    pub created_by: Uuid,
    pub creator_email: String,
}

/// A comment on a party. Append-only; never edited.
#[derive(Debug, Clone)]
pub struct Comment {
    pub id: Uuid,
    pub party_id: Uuid,
    pub user_id: Uuid,
    pub text: String,
    pub posted_at: DateTime<Utc>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
}

/// The payload for appending a comment to a party.
#[derive(Debug, Clone)]
pub struct NewComment {
    pub party_id: Uuid,
    pub user_id: Uuid,
    pub text: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
}

// A user profile record, separate from the identity principal. The
// statistics a profile page shows (party count, comment count, average
// rating given, rating-given distribution) are always recomputed by
// `user_stats` and never stored here.
#[derive(Debug, Clone)]
pub struct Profile {
    pub uid: Uuid,
    pub email: Option<String>, // Optional because old users won't have it
    pub display_name: Option<String>,
    pub pseudo: Option<String>,
    pub avatar_url: Option<String>,
}

// Only used internally for login/signup - contains sensitive data.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub uid: Uuid,
    pub email: String,
    pub hashed_password: String,
}
