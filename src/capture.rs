//! Snapshot capture.
//!
//! While the account credentials are still valid, download every resource of
//! a playlist into a directory laid out the way the snapshot cache expects:
//!
//! ```text
//! <out>/playlist.json
//! <out>/music/<songmid>.m4a
//! <out>/pic/<songmid>.jpg
//! <out>/lrc/<songmid>.lrc
//! ```
//!
//! Uploading the directory to object storage is left to other tools.

use crate::lyrics;
use crate::provider::models::COVER_URL_PREFIX;
use crate::provider::{BatchPolicy, IdentifierBatcher, Provider, RawSong, SnapshotEntry};
use anyhow::Context;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureReport {
    pub captured: usize,
    pub failed: usize,
    pub without_audio: usize,
    pub playlist_path: PathBuf,
}

pub struct Capture {
    http: reqwest::Client,
    base_url: String,
    out_dir: PathBuf,
    song_delay: Duration,
    cover_prefix: String,
}

impl Capture {
    pub fn new(http: reqwest::Client, base_url: &str, out_dir: PathBuf, song_delay: Duration) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            out_dir,
            song_delay,
            cover_prefix: COVER_URL_PREFIX.to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_cover_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cover_prefix = prefix.into();
        self
    }

    pub async fn run(
        &self,
        provider: &dyn Provider,
        policy: BatchPolicy,
        playlist_id: &str,
    ) -> anyhow::Result<CaptureReport> {
        for dir in ["music", "pic", "lrc"] {
            let path = self.out_dir.join(dir);
            tokio::fs::create_dir_all(&path)
                .await
                .with_context(|| format!("create dir {}", path.display()))?;
        }

        info!(playlist_id, "fetching playlist");
        let songs = provider
            .songs()
            .playlist_songs(playlist_id)
            .await
            .context("fetch playlist")?;
        info!("{} songs", songs.len());

        let ids: Vec<String> = songs.iter().map(|s| s.songmid.clone()).collect();
        let urls = IdentifierBatcher::new(provider.resolver(), policy)
            .resolve_all(&ids)
            .await
            .context("resolve audio urls")?;

        let without_audio = urls.iter().filter(|u| u.is_empty()).count();
        info!("{}/{} audio urls resolved", ids.len() - without_audio, ids.len());
        for (song, _) in songs.iter().zip(&urls).filter(|(_, u)| u.is_empty()) {
            warn!(
                songmid = %song.songmid,
                "no audio url for {} - {} (VIP only, delisted, or key expired)",
                song.songname,
                song.author()
            );
        }

        let total = songs.len();
        let mut playlist = Vec::with_capacity(total);
        let mut failed = 0;
        for (i, (song, url)) in songs.iter().zip(&urls).enumerate() {
            info!("[{}/{}] {} - {}", i + 1, total, song.songname, song.author());
            match self.capture_song(provider, song, url).await {
                Ok(entry) => playlist.push(entry),
                Err(e) => {
                    warn!(songmid = %song.songmid, "capture failed: {e:#}");
                    failed += 1;
                }
            }
            if i + 1 < total {
                tokio::time::sleep(self.song_delay).await;
            }
        }

        let playlist_path = self.out_dir.join("playlist.json");
        let raw = serde_json::to_string_pretty(&playlist).context("serialize playlist")?;
        tokio::fs::write(&playlist_path, raw)
            .await
            .with_context(|| format!("write {}", playlist_path.display()))?;

        info!(captured = playlist.len(), failed, "capture finished");
        Ok(CaptureReport {
            captured: playlist.len(),
            failed,
            without_audio,
            playlist_path,
        })
    }

    async fn capture_song(
        &self,
        provider: &dyn Provider,
        song: &RawSong,
        audio_url: &str,
    ) -> anyhow::Result<SnapshotEntry> {
        let mid = &song.songmid;

        if !audio_url.is_empty() {
            self.download(audio_url, &self.out_dir.join(format!("music/{mid}.m4a")))
                .await?;
        }

        let cover = format!("{}{}.jpg", self.cover_prefix, song.albummid);
        self.download(&cover, &self.out_dir.join(format!("pic/{mid}.jpg")))
            .await?;

        let pair = provider.lyric(mid).await.context("fetch lyric")?;
        let lrc_path = self.out_dir.join(format!("lrc/{mid}.lrc"));
        tokio::fs::write(&lrc_path, lyrics::merge(&pair.lyric, &pair.trans))
            .await
            .with_context(|| format!("write {}", lrc_path.display()))?;

        Ok(SnapshotEntry {
            author: song.author(),
            title: song.songname.clone(),
            pic: format!("{}/pic/{mid}.jpg", self.base_url),
            url: if audio_url.is_empty() {
                String::new()
            } else {
                format!("{}/music/{mid}.m4a", self.base_url)
            },
            lrc: format!("{}/lrc/{mid}.lrc", self.base_url),
        })
    }

    async fn download(&self, url: &str, path: &Path) -> anyhow::Result<()> {
        let bytes = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("fetch {url}"))?
            .error_for_status()
            .with_context(|| format!("download {url}"))?
            .bytes()
            .await
            .with_context(|| format!("read body of {url}"))?;
        tokio::fs::write(path, &bytes)
            .await
            .with_context(|| format!("write {}", path.display()))?;
        debug!(
            "saved {} ({:.2} MB)",
            path.display(),
            bytes.len() as f64 / 1024.0 / 1024.0
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{
        BatchResolve, LyricPair, ProviderError, ResourceKind, Result, SongRecord, SongSource,
    };
    use async_trait::async_trait;
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct FakeProvider {
        audio_base: String,
    }

    #[async_trait]
    impl SongSource for FakeProvider {
        async fn playlist_songs(&self, _playlist_id: &str) -> Result<Vec<RawSong>> {
            Ok(["m0", "m1", "bad"]
                .iter()
                .map(|mid| RawSong {
                    songmid: mid.to_string(),
                    songname: format!("Song {mid}"),
                    albummid: format!("alb_{mid}"),
                    singer: vec![],
                })
                .collect())
        }
    }

    #[async_trait]
    impl BatchResolve for FakeProvider {
        async fn resolve_batch(&self, ids: &[String]) -> Result<Vec<String>> {
            Ok(ids
                .iter()
                .map(|id| {
                    if id == "m1" {
                        String::new()
                    } else {
                        format!("{}/audio/{id}.m4a", self.audio_base)
                    }
                })
                .collect())
        }
    }

    struct Wrapped(Arc<FakeProvider>);

    #[async_trait]
    impl Provider for Wrapped {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn supports(&self, _kind: ResourceKind) -> bool {
            true
        }

        fn songs(&self) -> Arc<dyn SongSource> {
            self.0.clone()
        }

        fn resolver(&self) -> Arc<dyn BatchResolve> {
            self.0.clone()
        }

        async fn song(&self, _id: &str) -> Result<Vec<SongRecord>> {
            Ok(vec![])
        }

        async fn url(&self, _id: &str) -> Result<String> {
            Ok(String::new())
        }

        async fn pic(&self, _id: &str) -> Result<String> {
            Ok(String::new())
        }

        async fn lyric(&self, id: &str) -> Result<LyricPair> {
            if id == "bad" {
                return Err(ProviderError::Decode {
                    what: "lyric",
                    detail: "invalid base64".to_string(),
                });
            }
            Ok(LyricPair {
                lyric: "[00:01.00]Hello".to_string(),
                trans: "[00:01.00]你好".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_capture_writes_snapshot_layout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/audio/m0.m4a"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"AUDIO".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/audio/bad.m4a"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"AUDIO".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/cover/alb_m0.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"JPG0".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/cover/alb_m1.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"JPG1".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/cover/alb_bad.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"JPG2".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let provider = Wrapped(Arc::new(FakeProvider {
            audio_base: server.uri(),
        }));
        let capture = Capture::new(
            reqwest::Client::new(),
            "https://pub.r2.example/",
            dir.path().to_path_buf(),
            Duration::ZERO,
        )
        .with_cover_prefix(format!("{}/cover/", server.uri()));

        let report = capture
            .run(&provider, BatchPolicy::new(100, Duration::ZERO), "p")
            .await
            .unwrap();

        assert_eq!(report.captured, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.without_audio, 1);

        let out = dir.path();
        assert_eq!(std::fs::read(out.join("music/m0.m4a")).unwrap(), b"AUDIO");
        assert!(!out.join("music/m1.m4a").exists());
        assert_eq!(std::fs::read(out.join("pic/m1.jpg")).unwrap(), b"JPG1");
        assert_eq!(
            std::fs::read_to_string(out.join("lrc/m0.lrc")).unwrap(),
            "[00:01.000]Hello (你好)"
        );

        let raw = std::fs::read_to_string(&report.playlist_path).unwrap();
        let playlist: Vec<SnapshotEntry> = serde_json::from_str(&raw).unwrap();
        assert_eq!(
            playlist,
            vec![
                SnapshotEntry {
                    author: String::new(),
                    title: "Song m0".to_string(),
                    pic: "https://pub.r2.example/pic/m0.jpg".to_string(),
                    url: "https://pub.r2.example/music/m0.m4a".to_string(),
                    lrc: "https://pub.r2.example/lrc/m0.lrc".to_string(),
                },
                SnapshotEntry {
                    author: String::new(),
                    title: "Song m1".to_string(),
                    pic: "https://pub.r2.example/pic/m1.jpg".to_string(),
                    url: String::new(),
                    lrc: "https://pub.r2.example/lrc/m1.lrc".to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_capture_counts_failed_download() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let provider = Wrapped(Arc::new(FakeProvider {
            audio_base: server.uri(),
        }));
        let capture = Capture::new(
            reqwest::Client::new(),
            "https://pub.r2.example",
            dir.path().to_path_buf(),
            Duration::ZERO,
        )
        .with_cover_prefix(format!("{}/cover/", server.uri()));

        let report = capture
            .run(&provider, BatchPolicy::default(), "p")
            .await
            .unwrap();
        assert_eq!(report.captured, 0);
        assert_eq!(report.failed, 3);
        assert_eq!(std::fs::read_to_string(&report.playlist_path).unwrap(), "[]");
    }
}
