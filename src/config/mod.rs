use crate::provider::BatchPolicy;
use anyhow::Context;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tencent: TencentConfig,
    pub snapshot: SnapshotConfig,
    pub batch: BatchConfig,
    pub server: ServerConfig,
    pub capture: CaptureConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TencentConfig {
    /// QQ account number.
    pub uin: String,
    /// `qqmusic_key` cookie value; needed for VIP songs.
    pub music_key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Public base URL of the archive bucket. Empty disables snapshots.
    pub base_url: String,
    /// Playlists served from the archive instead of live.
    pub playlist_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Ids per vkey request (at most 100).
    pub size: usize,
    /// Pause between vkey requests.
    pub delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Public URL of the API endpoint, used for deferred-resolution links.
    pub callback_base: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Pause between songs while capturing a snapshot.
    pub song_delay_ms: u64,
}

impl BatchConfig {
    pub fn policy(&self) -> BatchPolicy {
        BatchPolicy::new(self.size, Duration::from_millis(self.delay_ms))
    }
}

impl CaptureConfig {
    pub fn song_delay(&self) -> Duration {
        Duration::from_millis(self.song_delay_ms)
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            size: BatchPolicy::MAX_BATCH_SIZE,
            delay_ms: 2000,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            callback_base: "http://localhost:3000/api".to_string(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self { song_delay_ms: 600 }
    }
}

/// Overlay values from environment-style variables.
///
/// `lookup` is usually `std::env::var(..).ok()`; empty values are ignored.
pub fn apply_env<F>(cfg: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("QQ_UIN") {
        cfg.tencent.uin = v.trim().to_string();
    }
    if let Some(v) = get("QQ_MUSIC_KEY") {
        cfg.tencent.music_key = v.trim().to_string();
    }
    if let Some(v) = get("R2_BASE_URL") {
        cfg.snapshot.base_url = v.trim().to_string();
    }
    if let Some(v) = get("SNAPSHOT_PLAYLIST_ID") {
        cfg.snapshot.playlist_ids = v
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
    }
    cfg.snapshot.base_url = cfg.snapshot.base_url.trim_end_matches('/').to_string();
}

pub fn save(cfg: &Config, override_path: Option<&Path>) -> anyhow::Result<()> {
    let path = match override_path {
        Some(p) => p.to_path_buf(),
        None => default_config_path()?,
    };
    write_config(cfg, &path)
}

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    let proj = ProjectDirs::from("dev", "playlist-relay", "playlist-relay")
        .context("ProjectDirs unavailable")?;
    Ok(proj.config_dir().join("config.toml"))
}

pub fn load(override_path: Option<&Path>) -> anyhow::Result<Config> {
    let path = match override_path {
        Some(p) => p.to_path_buf(),
        None => default_config_path()?,
    };

    if !path.exists() {
        let cfg = Config::default();
        write_config(&cfg, &path)?;
        return Ok(cfg);
    }

    let raw = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let cfg = toml::from_str::<Config>(&raw).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}

fn write_config(cfg: &Config, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create dir {}", parent.display()))?;
    }
    let raw = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(path, raw).with_context(|| format!("write {}", path.display()))?;
    // Holds account credentials.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));
    }
    Ok(())
}
