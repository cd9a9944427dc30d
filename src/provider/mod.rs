//! Music providers
//!
//! A provider turns opaque song/playlist ids into songs, audio URLs, covers and
//! lyrics. The traits here are the seams the service and the batcher work
//! against; `tencent` is the one concrete provider.

pub mod batch;
pub mod models;
pub mod tencent;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

pub use batch::{BatchPolicy, IdentifierBatcher};
pub use models::{LyricPair, RawSong, ResourceKind, SnapshotEntry, SnapshotPayload, SongRecord};

/// Errors raised while talking to an upstream provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Upstream answered with a non-success status
    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: &'static str, status: u16 },

    /// Upstream answered, but not with the shape we expect
    #[error("malformed {endpoint} response: {detail}")]
    Malformed {
        endpoint: &'static str,
        detail: String,
    },

    /// A payload field could not be decoded
    #[error("failed to decode {what}: {detail}")]
    Decode { what: &'static str, detail: String },
}

pub type Result<T> = std::result::Result<T, ProviderError>;

/// Resolves one batch of song ids into playable URLs.
///
/// The returned vector is index-aligned with `ids`; an empty string marks an
/// id that cannot be played right now.
#[async_trait]
pub trait BatchResolve: Send + Sync {
    async fn resolve_batch(&self, ids: &[String]) -> Result<Vec<String>>;
}

/// Lists the songs of a playlist in upstream order.
#[async_trait]
pub trait SongSource: Send + Sync {
    async fn playlist_songs(&self, playlist_id: &str) -> Result<Vec<RawSong>>;
}

#[async_trait]
pub trait Provider: Send + Sync {
    /// Value of the `server` query parameter selecting this provider.
    fn name(&self) -> &'static str;

    fn supports(&self, kind: ResourceKind) -> bool;

    fn songs(&self) -> Arc<dyn SongSource>;

    fn resolver(&self) -> Arc<dyn BatchResolve>;

    /// Metadata for a single song, with `url`/`lrc` left as the song id.
    async fn song(&self, id: &str) -> Result<Vec<SongRecord>>;

    /// Audio URL for a song, empty when it cannot be resolved.
    async fn url(&self, id: &str) -> Result<String>;

    async fn pic(&self, id: &str) -> Result<String>;

    async fn lyric(&self, id: &str) -> Result<LyricPair>;
}
