// Common traits for scrobbling services

use crate::context::RequestContext;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Track information resolved from the library
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub duration: Option<u64>, // Duration in seconds
}

/// Common trait for all scrobbling services
///
/// One instance is built per dispatch by the factory registered for the
/// service, so implementations may hold per-call state freely.
#[async_trait]
pub trait Scrobbler: Send + Sync {
    /// Update "now playing" status
    async fn now_playing(&self, ctx: &RequestContext, track: &Track) -> Result<()>;

    /// Submit a completed play
    async fn scrobble(
        &self,
        ctx: &RequestContext,
        track: &Track,
        play_time: DateTime<Utc>,
    ) -> Result<()>;
}
