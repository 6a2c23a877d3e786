//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the repository and identity ports from the `core` crate. It handles all
//! interactions with the PostgreSQL database using `sqlx`, and it republishes a
//! full party snapshot on a broadcast channel after every party mutation so that
//! live subscribers always recompute from the current document.

use async_trait::async_trait;
use baliseboxd_core::domain::{Comment, Credentials, NewComment, NewParty, Party, Profile};
use baliseboxd_core::ports::{
    CommentRepository, IdentityService, PartyFeed, PartyRepository, PortError, PortResult,
    ProfileRepository,
};
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Column list shared by every query that materializes a full party row.
const PARTY_COLUMNS: &str = "id, name, description, location, date, created_at, created_by, \
     creator_email, participants, ratings, cover_photo_url, media_urls";

/// Column list shared by every query that materializes a profile row.
const PROFILE_COLUMNS: &str = "uid, email, display_name, pseudo, avatar_url";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the repository and identity ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
    party_events: broadcast::Sender<Party>,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        let (party_events, _) = broadcast::channel(64);
        Self { pool, party_events }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Republishes the current snapshot to live subscribers. Send only
    /// fails when nobody is listening, which is fine.
    fn publish(&self, party: &Party) {
        let _ = self.party_events.send(party.clone());
    }

    async fn fetch_party(&self, party_id: Uuid) -> PortResult<Party> {
        let sql = format!("SELECT {PARTY_COLUMNS} FROM parties WHERE id = $1");
        let record = sqlx::query_as::<_, PartyRecord>(&sql)
            .bind(party_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => {
                    PortError::NotFound(format!("Party {} not found", party_id))
                }
                _ => PortError::Unexpected(e.to_string()),
            })?;
        Ok(record.to_domain())
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct PartyRecord {
    id: Uuid,
    name: String,
    description: String,
    location: String,
    date: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    created_by: Uuid,
    creator_email: String,
    participants: Vec<Uuid>,
    // Raw JSON values so one malformed legacy entry degrades to
    // exclusion instead of failing the whole row.
    ratings: Json<HashMap<Uuid, serde_json::Value>>,
    cover_photo_url: Option<String>,
    media_urls: Vec<String>,
}

impl PartyRecord {
    fn to_domain(self) -> Party {
        let ratings = self
            .ratings
            .0
            .into_iter()
            .filter_map(|(user_id, value)| value.as_f64().map(|v| (user_id, v)))
            .collect();
        Party {
            id: self.id,
            name: self.name,
            description: self.description,
            location: self.location,
            date: self.date,
            created_at: self.created_at,
            created_by: self.created_by,
            creator_email: self.creator_email,
            participants: self.participants,
            ratings,
            cover_photo_url: self.cover_photo_url,
            media_urls: self.media_urls,
        }
    }
}

#[derive(FromRow)]
struct CommentRecord {
    id: Uuid,
    party_id: Uuid,
    user_id: Uuid,
    text: String,
    posted_at: DateTime<Utc>,
    email: Option<String>,
    avatar_url: Option<String>,
}

impl CommentRecord {
    fn to_domain(self) -> Comment {
        Comment {
            id: self.id,
            party_id: self.party_id,
            user_id: self.user_id,
            text: self.text,
            posted_at: self.posted_at,
            email: self.email,
            avatar_url: self.avatar_url,
        }
    }
}

#[derive(FromRow)]
struct ProfileRecord {
    uid: Uuid,
    email: Option<String>,
    display_name: Option<String>,
    pseudo: Option<String>,
    avatar_url: Option<String>,
}

impl ProfileRecord {
    fn to_domain(self) -> Profile {
        Profile {
            uid: self.uid,
            email: self.email,
            display_name: self.display_name,
            pseudo: self.pseudo,
            avatar_url: self.avatar_url,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    uid: Uuid,
    email: String,
    hashed_password: String,
}

impl CredentialsRecord {
    fn to_domain(self) -> Credentials {
        Credentials {
            uid: self.uid,
            email: self.email,
            hashed_password: self.hashed_password,
        }
    }
}

//=========================================================================================
// `PartyRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl PartyRepository for DbAdapter {
    async fn get_party(&self, party_id: Uuid) -> PortResult<Party> {
        self.fetch_party(party_id).await
    }

    async fn list_parties(&self) -> PortResult<Vec<Party>> {
        let sql = format!("SELECT {PARTY_COLUMNS} FROM parties ORDER BY created_at DESC");
        let records = sqlx::query_as::<_, PartyRecord>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn create_party(&self, new_party: NewParty) -> PortResult<Party> {
        let sql = format!(
            "INSERT INTO parties (id, name, description, location, date, created_by, creator_email) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {PARTY_COLUMNS}"
        );
        let record = sqlx::query_as::<_, PartyRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(&new_party.name)
            .bind(&new_party.description)
            .bind(&new_party.location)
            .bind(new_party.date)
            .bind(new_party.created_by)
            .bind(&new_party.creator_email)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        let party = record.to_domain();
        self.publish(&party);
        Ok(party)
    }

    async fn set_rating(&self, party_id: Uuid, user_id: Uuid, value: f64) -> PortResult<Party> {
        // Single-key overwrite: only this user's entry is touched.
        let sql = format!(
            "UPDATE parties \
             SET ratings = jsonb_set(ratings, ARRAY[$2::text], to_jsonb($3::float8), true) \
             WHERE id = $1 \
             RETURNING {PARTY_COLUMNS}"
        );
        let record = sqlx::query_as::<_, PartyRecord>(&sql)
            .bind(party_id)
            .bind(user_id.to_string())
            .bind(value)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => {
                    PortError::NotFound(format!("Party {} not found", party_id))
                }
                _ => PortError::Unexpected(e.to_string()),
            })?;
        let party = record.to_domain();
        self.publish(&party);
        Ok(party)
    }

    async fn add_participant(&self, party_id: Uuid, user_id: Uuid) -> PortResult<Party> {
        // Containment guard gives array-union semantics: appending an
        // existing participant is a no-op, not a duplicate.
        sqlx::query(
            "UPDATE parties \
             SET participants = array_append(participants, $2) \
             WHERE id = $1 AND NOT (participants @> ARRAY[$2])",
        )
        .bind(party_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let party = self.fetch_party(party_id).await?;
        self.publish(&party);
        Ok(party)
    }

    async fn set_cover_photo(&self, party_id: Uuid, url: &str) -> PortResult<Party> {
        let sql = format!(
            "UPDATE parties SET cover_photo_url = $2 WHERE id = $1 RETURNING {PARTY_COLUMNS}"
        );
        let record = sqlx::query_as::<_, PartyRecord>(&sql)
            .bind(party_id)
            .bind(url)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => {
                    PortError::NotFound(format!("Party {} not found", party_id))
                }
                _ => PortError::Unexpected(e.to_string()),
            })?;
        let party = record.to_domain();
        self.publish(&party);
        Ok(party)
    }

    async fn add_media_url(&self, party_id: Uuid, url: &str) -> PortResult<Party> {
        let sql = format!(
            "UPDATE parties SET media_urls = array_append(media_urls, $2) \
             WHERE id = $1 RETURNING {PARTY_COLUMNS}"
        );
        let record = sqlx::query_as::<_, PartyRecord>(&sql)
            .bind(party_id)
            .bind(url)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => {
                    PortError::NotFound(format!("Party {} not found", party_id))
                }
                _ => PortError::Unexpected(e.to_string()),
            })?;
        let party = record.to_domain();
        self.publish(&party);
        Ok(party)
    }

    async fn delete_party(&self, party_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM parties WHERE id = $1")
            .bind(party_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Party {} not found", party_id)));
        }
        Ok(())
    }

    async fn subscribe(&self, party_id: Uuid) -> PortResult<PartyFeed> {
        let mut rx = self.party_events.subscribe();
        let feed = async_stream::stream! {
            loop {
                match rx.recv().await {
                    Ok(party) => {
                        if party.id == party_id {
                            yield party;
                        }
                    }
                    // A lagged receiver skipped some snapshots; the next
                    // mutation re-delivers the full document anyway.
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        };
        Ok(Box::pin(feed))
    }
}

//=========================================================================================
// `CommentRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl CommentRepository for DbAdapter {
    async fn add_comment(&self, new_comment: NewComment) -> PortResult<Comment> {
        let record = sqlx::query_as::<_, CommentRecord>(
            "INSERT INTO comments (id, party_id, user_id, text, email, avatar_url) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id, party_id, user_id, text, posted_at, email, avatar_url",
        )
        .bind(Uuid::new_v4())
        .bind(new_comment.party_id)
        .bind(new_comment.user_id)
        .bind(&new_comment.text)
        .bind(&new_comment.email)
        .bind(&new_comment.avatar_url)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(record.to_domain())
    }

    async fn get_comment(&self, comment_id: Uuid) -> PortResult<Comment> {
        let record = sqlx::query_as::<_, CommentRecord>(
            "SELECT id, party_id, user_id, text, posted_at, email, avatar_url \
             FROM comments WHERE id = $1",
        )
        .bind(comment_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Comment {} not found", comment_id))
            }
            _ => PortError::Unexpected(e.to_string()),
        })?;
        Ok(record.to_domain())
    }

    async fn comments_for_party(&self, party_id: Uuid) -> PortResult<Vec<Comment>> {
        let records = sqlx::query_as::<_, CommentRecord>(
            "SELECT id, party_id, user_id, text, posted_at, email, avatar_url \
             FROM comments WHERE party_id = $1 ORDER BY posted_at ASC",
        )
        .bind(party_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn comments_by_user(&self, user_id: Uuid) -> PortResult<Vec<Comment>> {
        let records = sqlx::query_as::<_, CommentRecord>(
            "SELECT id, party_id, user_id, text, posted_at, email, avatar_url \
             FROM comments WHERE user_id = $1 ORDER BY posted_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn delete_comment(&self, comment_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(comment_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Comment {} not found",
                comment_id
            )));
        }
        Ok(())
    }
}

//=========================================================================================
// `ProfileRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl ProfileRepository for DbAdapter {
    async fn get_profile(&self, uid: Uuid) -> PortResult<Profile> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM users WHERE uid = $1");
        let record = sqlx::query_as::<_, ProfileRecord>(&sql)
            .bind(uid)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", uid)),
                _ => PortError::Unexpected(e.to_string()),
            })?;
        Ok(record.to_domain())
    }

    async fn update_profile(
        &self,
        uid: Uuid,
        display_name: Option<&str>,
        pseudo: Option<&str>,
        avatar_url: Option<&str>,
    ) -> PortResult<Profile> {
        let sql = format!(
            "UPDATE users SET \
                 display_name = COALESCE($2, display_name), \
                 pseudo = COALESCE($3, pseudo), \
                 avatar_url = COALESCE($4, avatar_url) \
             WHERE uid = $1 \
             RETURNING {PROFILE_COLUMNS}"
        );
        let record = sqlx::query_as::<_, ProfileRecord>(&sql)
            .bind(uid)
            .bind(display_name)
            .bind(pseudo)
            .bind(avatar_url)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", uid)),
                _ => PortError::Unexpected(e.to_string()),
            })?;
        Ok(record.to_domain())
    }
}

//=========================================================================================
// `IdentityService` Trait Implementation
//=========================================================================================

#[async_trait]
impl IdentityService for DbAdapter {
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
        pseudo: Option<&str>,
    ) -> PortResult<Profile> {
        let sql = format!(
            "INSERT INTO users (uid, email, hashed_password, pseudo) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {PROFILE_COLUMNS}"
        );
        let record = sqlx::query_as::<_, ProfileRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(email)
            .bind(hashed_password)
            .bind(pseudo)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if e.as_database_error()
                    .map_or(false, |db| db.is_unique_violation())
                {
                    PortError::Conflict(format!("Email {} is already registered", email))
                } else {
                    PortError::Unexpected(e.to_string())
                }
            })?;
        Ok(record.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<Credentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT uid, email, hashed_password FROM users \
             WHERE email = $1 AND hashed_password IS NOT NULL",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("No account for {}", email)),
            _ => PortError::Unexpected(e.to_string()),
        })?;
        Ok(record.to_domain())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let user_id: Option<Uuid> = sqlx::query_scalar(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > now()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        user_id.ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }
}
