use super::snapshot::SnapshotCache;
use crate::provider::{IdentifierBatcher, SnapshotPayload, SongRecord, SongSource};
use std::sync::Arc;
use tracing::info;

/// A playlist, either served from its archive or resolved live.
#[derive(Debug, Clone)]
pub enum Assembled {
    Snapshot(Arc<SnapshotPayload>),
    Live(Vec<SongRecord>),
}

pub struct PlaylistAssembler {
    source: Arc<dyn SongSource>,
    batcher: IdentifierBatcher,
    snapshots: Option<Arc<SnapshotCache>>,
}

impl PlaylistAssembler {
    pub fn new(
        source: Arc<dyn SongSource>,
        batcher: IdentifierBatcher,
        snapshots: Option<Arc<SnapshotCache>>,
    ) -> Self {
        Self {
            source,
            batcher,
            snapshots,
        }
    }

    pub async fn assemble(&self, playlist_id: &str) -> crate::provider::Result<Assembled> {
        if let Some(cache) = &self.snapshots
            && let Some(payload) = cache.lookup(playlist_id).await
        {
            return Ok(Assembled::Snapshot(payload));
        }

        let songs = self.source.playlist_songs(playlist_id).await?;
        let ids: Vec<String> = songs.iter().map(|s| s.songmid.clone()).collect();
        let urls = self.batcher.resolve_all(&ids).await?;

        let resolved = urls.iter().filter(|u| !u.is_empty()).count();
        info!(playlist_id, resolved, total = ids.len(), "playlist resolved");

        Ok(Assembled::Live(
            songs
                .iter()
                .zip(urls)
                .map(|(song, url)| SongRecord::from_raw(song, url))
                .collect(),
        ))
    }
}
