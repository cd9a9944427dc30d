use super::{fetch_json, with_query, Endpoints};
use crate::provider::models::{cover_url, join_artists, LyricPair, RawSong, Singer, SongRecord};
use crate::provider::{ProviderError, Result, SongSource};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::REFERER;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
struct PlaylistResponse {
    #[serde(default)]
    cdlist: Vec<PlaylistDetail>,
}

#[derive(Debug, Deserialize)]
struct PlaylistDetail {
    songlist: Vec<RawSong>,
}

#[derive(Debug, Deserialize)]
struct SongDetailResponse {
    songinfo: SongInfo,
}

#[derive(Debug, Deserialize)]
struct SongInfo {
    data: SongInfoData,
}

#[derive(Debug, Deserialize)]
struct SongInfoData {
    track_info: TrackInfo,
}

#[derive(Debug, Deserialize)]
struct TrackInfo {
    #[serde(default)]
    name: String,
    #[serde(default)]
    singer: Vec<Singer>,
    album: AlbumRef,
}

#[derive(Debug, Deserialize)]
struct AlbumRef {
    #[serde(default)]
    mid: String,
}

#[derive(Debug, Deserialize)]
struct LyricResponse {
    #[serde(default)]
    lyric: String,
    #[serde(default)]
    trans: String,
}

/// Plain (non-batched) QQ Music endpoints.
#[derive(Debug, Clone)]
pub struct TencentApi {
    http: reqwest::Client,
    endpoints: Endpoints,
}

impl TencentApi {
    pub fn new(http: reqwest::Client, endpoints: Endpoints) -> Self {
        Self { http, endpoints }
    }

    /// Song metadata. `url` and `lrc` are left as the song id for deferred
    /// resolution.
    pub async fn song_detail(&self, song_mid: &str) -> Result<SongRecord> {
        let data = json!({
            "songinfo": {
                "method": "get_song_detail_yqq",
                "module": "music.pf_song_detail_svr",
                "param": { "song_mid": song_mid },
            }
        })
        .to_string();
        let url = with_query(&self.endpoints.song_detail, &[("data", data.as_str())]);

        let resp: SongDetailResponse = fetch_json(self.http.get(url), "song detail").await?;
        let track = resp.songinfo.data.track_info;

        Ok(SongRecord {
            author: join_artists(&track.singer),
            title: track.name,
            pic: cover_url(&track.album.mid),
            url: song_mid.to_string(),
            lrc: song_mid.to_string(),
            songmid: song_mid.to_string(),
        })
    }

    /// Original and translated lyric text. Either may be empty.
    pub async fn lyric(&self, song_mid: &str) -> Result<LyricPair> {
        let now_ms = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis()
            .to_string();
        let url = with_query(
            &self.endpoints.lyric,
            &[
                ("songmid", song_mid),
                ("pcachetime", now_ms.as_str()),
                ("g_tk", "5381"),
                ("loginUin", "0"),
                ("hostUin", "0"),
                ("inCharset", "utf8"),
                ("outCharset", "utf-8"),
                ("notice", "0"),
                ("platform", "yqq"),
                ("needNewCode", "0"),
                ("format", "json"),
            ],
        );

        let resp: LyricResponse = fetch_json(
            self.http.get(url).header(REFERER, "https://y.qq.com"),
            "lyric",
        )
        .await?;

        Ok(LyricPair {
            lyric: decode_lyric(&resp.lyric, "lyric")?,
            trans: decode_lyric(&resp.trans, "translated lyric")?,
        })
    }
}

#[async_trait]
impl SongSource for TencentApi {
    async fn playlist_songs(&self, playlist_id: &str) -> Result<Vec<RawSong>> {
        let url = with_query(
            &self.endpoints.playlist,
            &[
                ("type", "1"),
                ("utf8", "1"),
                ("disstid", playlist_id),
                ("loginUin", "0"),
                ("format", "json"),
            ],
        );

        let resp: PlaylistResponse = fetch_json(
            self.http
                .get(url)
                .header(REFERER, "https://y.qq.com/n/yqq/playlist"),
            "playlist",
        )
        .await?;

        resp.cdlist
            .into_iter()
            .next()
            .map(|d| d.songlist)
            .ok_or_else(|| ProviderError::Malformed {
                endpoint: "playlist",
                detail: "empty cdlist".to_string(),
            })
    }
}

/// Lyric payloads arrive as base64 encoded UTF-8.
fn decode_lyric(encoded: &str, what: &'static str) -> Result<String> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| ProviderError::Decode {
            what,
            detail: e.to_string(),
        })?;
    String::from_utf8(bytes).map_err(|e| ProviderError::Decode {
        what,
        detail: e.to_string(),
    })
}
