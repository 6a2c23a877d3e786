pub mod domain;
pub mod ports;
pub mod ratings;
pub mod user_stats;

pub use domain::{Comment, Credentials, NewComment, NewParty, Party, Profile};
pub use ports::{
    BlobStore, CommentRepository, IdentityService, PartyFeed, PartyRepository, PortError,
    PortResult, ProfileRepository,
};
pub use ratings::{average_rating, rating_distribution, RatingBucket, RatingScale};
pub use user_stats::ProfileStats;
