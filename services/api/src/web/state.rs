//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use baliseboxd_core::ports::{
    BlobStore, CommentRepository, IdentityService, PartyRepository, ProfileRepository,
};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub parties: Arc<dyn PartyRepository>,
    pub comments: Arc<dyn CommentRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub identity: Arc<dyn IdentityService>,
    pub blobs: Arc<dyn BlobStore>,
    pub config: Arc<Config>,
}
