//! services/api/src/web/protocol.rs
//!
//! Shared wire types for rating figures, plus the WebSocket message
//! protocol for the live rating feed. Every number here is produced by
//! the pure aggregators in `baliseboxd_core`; nothing is computed in the
//! transport layer.

use baliseboxd_core::domain::Party;
use baliseboxd_core::ratings::{self, RatingBucket, RatingScale};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// Rating Figures (shared by REST responses and the live feed)
//=========================================================================================

/// One histogram step as it goes over the wire.
#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct RatingBucketDto {
    /// The rating value this bucket stands for.
    pub rating: f64,
    /// How many ratings landed in it.
    pub votes: u32,
}

impl From<&RatingBucket> for RatingBucketDto {
    fn from(bucket: &RatingBucket) -> Self {
        Self {
            rating: bucket.value,
            votes: bucket.votes,
        }
    }
}

/// The full computed rating block for one party.
#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct RatingSummary {
    pub party_id: Uuid,
    pub average_rating: f64,
    /// Number of users with a rating entry on the party.
    pub rating_count: usize,
    pub distribution: Vec<RatingBucketDto>,
}

impl RatingSummary {
    /// Recomputes the summary from a full party snapshot.
    pub fn compute(party: &Party, scale: &RatingScale) -> Self {
        let distribution = ratings::rating_distribution(&party.ratings, scale)
            .iter()
            .map(RatingBucketDto::from)
            .collect();
        Self {
            party_id: party.id,
            average_rating: ratings::average_rating(&party.ratings),
            rating_count: party.ratings.len(),
            distribution,
        }
    }
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

/// Represents the structured text messages the live feed can push to a client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A fresh rating summary, sent once on connect and then after every
    /// mutation of the party document.
    RatingsUpdated { summary: RatingSummary },

    /// Reports a fatal error to the client, which should display an error message.
    Error { message: String },
}
