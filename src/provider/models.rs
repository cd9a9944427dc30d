use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The resource a request asks for (the `type` query parameter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Playlist,
    Song,
    Url,
    Pic,
    Lrc,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Playlist => "playlist",
            Self::Song => "song",
            Self::Url => "url",
            Self::Pic => "pic",
            Self::Lrc => "lrc",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "playlist" => Ok(Self::Playlist),
            "song" => Ok(Self::Song),
            "url" => Ok(Self::Url),
            "pic" => Ok(Self::Pic),
            "lrc" => Ok(Self::Lrc),
            other => Err(format!("unknown resource type `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Singer {
    #[serde(default)]
    pub name: String,
}

/// One entry of the upstream playlist song list.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSong {
    pub songmid: String,
    #[serde(default)]
    pub songname: String,
    #[serde(default)]
    pub albummid: String,
    #[serde(default)]
    pub singer: Vec<Singer>,
}

impl RawSong {
    pub fn author(&self) -> String {
        join_artists(&self.singer)
    }

    pub fn cover_url(&self) -> String {
        cover_url(&self.albummid)
    }
}

/// A song as handed to clients.
///
/// `url`, `pic` and `lrc` hold either an absolute URL or an opaque id that a
/// later request can resolve; an empty `url` means no audio is available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongRecord {
    pub author: String,
    pub title: String,
    pub pic: String,
    pub url: String,
    pub lrc: String,
    pub songmid: String,
}

impl SongRecord {
    /// Build a record from a playlist entry and its resolved audio URL.
    ///
    /// An unresolved (empty) URL falls back to the song id so the client can
    /// ask for it again later.
    pub fn from_raw(song: &RawSong, resolved_url: String) -> Self {
        let url = if resolved_url.is_empty() {
            song.songmid.clone()
        } else {
            resolved_url
        };
        Self {
            author: song.author(),
            title: song.songname.clone(),
            pic: song.cover_url(),
            url,
            lrc: song.songmid.clone(),
            songmid: song.songmid.clone(),
        }
    }
}

/// One song as `capture` writes it into an archived playlist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotEntry {
    pub author: String,
    pub title: String,
    pub pic: String,
    pub url: String,
    pub lrc: String,
}

/// An archived playlist as read back from storage. Entries are kept as raw
/// JSON objects so fields are served exactly as archived.
pub type SnapshotPayload = Vec<serde_json::Map<String, serde_json::Value>>;

/// Raw lyric texts of one song: the original and its translation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LyricPair {
    pub lyric: String,
    pub trans: String,
}

pub fn join_artists(singers: &[Singer]) -> String {
    singers
        .iter()
        .map(|s| s.name.as_str())
        .collect::<Vec<_>>()
        .join(" / ")
}

/// 300x300 album cover, addressed by album id.
pub const COVER_URL_PREFIX: &str = "https://y.gtimg.cn/music/photo_new/T002R300x300M000";

pub fn cover_url(albummid: &str) -> String {
    format!("{COVER_URL_PREFIX}{albummid}.jpg")
}
