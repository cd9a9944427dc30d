//! Request handling in front of the providers.
//!
//! `Service::handle` takes the `server`, `type` and `id` query values of an
//! incoming request and produces a [`Response`] for the HTTP layer to send.

pub mod playlist;
pub mod snapshot;
pub mod template;

use crate::config::Config;
use crate::lyrics;
use crate::provider::tencent::{self, TencentCredentials, TencentProvider};
use crate::provider::{BatchPolicy, IdentifierBatcher, Provider, ResourceKind, SongRecord};
use anyhow::Context;
use playlist::{Assembled, PlaylistAssembler};
use snapshot::{HttpSnapshotStore, SnapshotCache};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_SERVER: &str = tencent::NAME;
pub const DEFAULT_TYPE: &str = "playlist";
pub const DEFAULT_ID: &str = "7326220405";

/// The only server whose playlists can be served from a snapshot.
const SNAPSHOT_SERVER: &str = tencent::NAME;

/// What the HTTP layer should send back.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Json(serde_json::Value),
    Redirect(String),
    Text(String),
    Error { status: u16, message: String },
}

impl Response {
    pub fn status(&self) -> u16 {
        match self {
            Self::Json(_) | Self::Text(_) => 200,
            Self::Redirect(_) => 302,
            Self::Error { status, .. } => *status,
        }
    }
}

struct Route {
    provider: Arc<dyn Provider>,
    assembler: PlaylistAssembler,
}

pub struct Service {
    routes: HashMap<&'static str, Route>,
    callback_base: String,
}

impl Service {
    pub fn new(
        providers: Vec<Arc<dyn Provider>>,
        policy: BatchPolicy,
        snapshots: Option<Arc<SnapshotCache>>,
        callback_base: impl Into<String>,
    ) -> Self {
        let routes = providers
            .into_iter()
            .map(|provider| {
                let batcher = IdentifierBatcher::new(provider.resolver(), policy);
                let snapshots = snapshots
                    .as_ref()
                    .filter(|_| provider.name() == SNAPSHOT_SERVER)
                    .cloned();
                let assembler = PlaylistAssembler::new(provider.songs(), batcher, snapshots);
                (provider.name(), Route { provider, assembler })
            })
            .collect();

        Self {
            routes,
            callback_base: callback_base.into(),
        }
    }

    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let tencent = TencentProvider::new(
            TencentCredentials {
                uin: cfg.tencent.uin.clone(),
                music_key: cfg.tencent.music_key.clone(),
            },
            Default::default(),
        )
        .context("init tencent provider")?;

        let snapshots = if cfg.snapshot.base_url.is_empty() {
            None
        } else {
            let http = reqwest::Client::builder()
                .build()
                .context("build reqwest client")?;
            let store = HttpSnapshotStore::new(http, &cfg.snapshot.base_url);
            Some(Arc::new(SnapshotCache::new(
                Arc::new(store),
                cfg.snapshot.playlist_ids.iter().cloned(),
            )))
        };

        Ok(Self::new(
            vec![Arc::new(tencent)],
            cfg.batch.policy(),
            snapshots,
            cfg.server.callback_base.clone(),
        ))
    }

    pub fn provider(&self, server: &str) -> Option<Arc<dyn Provider>> {
        self.routes.get(server).map(|r| r.provider.clone())
    }

    pub async fn handle(&self, server: &str, kind: &str, id: &str) -> anyhow::Result<Response> {
        let route = self.routes.get(server);
        let parsed = kind.parse::<ResourceKind>().ok();
        let (Some(route), Some(kind)) = (route, parsed) else {
            return Ok(invalid_request(server, kind, id));
        };
        if !route.provider.supports(kind) {
            return Ok(invalid_request(server, kind.as_str(), id));
        }
        debug!(server, %kind, id, "handling request");

        let provider = &route.provider;
        let response = match kind {
            ResourceKind::Playlist => match route.assembler.assemble(id).await? {
                Assembled::Snapshot(payload) => Response::Json(serde_json::Value::Array(
                    payload.iter().cloned().map(serde_json::Value::Object).collect(),
                )),
                Assembled::Live(records) => self.templated(records, server)?,
            },
            ResourceKind::Song => self.templated(provider.song(id).await?, server)?,
            ResourceKind::Url => {
                let url = provider.url(id).await?;
                if url.is_empty() {
                    Response::Error {
                        status: 403,
                        message: "no url".to_string(),
                    }
                } else if url.starts_with('@') {
                    Response::Text(url)
                } else {
                    Response::Redirect(url)
                }
            }
            ResourceKind::Pic => Response::Redirect(provider.pic(id).await?),
            ResourceKind::Lrc => {
                let pair = provider.lyric(id).await?;
                Response::Text(lyrics::merge(&pair.lyric, &pair.trans))
            }
        };
        Ok(response)
    }

    fn templated(&self, records: Vec<SongRecord>, server: &str) -> anyhow::Result<Response> {
        let records: Vec<_> = records
            .into_iter()
            .map(|r| template::template_record(r, &self.callback_base, server))
            .collect();
        Ok(Response::Json(
            serde_json::to_value(records).context("serialize songs")?,
        ))
    }
}

fn invalid_request(server: &str, kind: &str, id: &str) -> Response {
    Response::Error {
        status: 400,
        message: format!("invalid server parameter (server={server}, type={kind}, id={id})"),
    }
}
