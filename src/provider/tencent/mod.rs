//! QQ Music ("tencent") provider.

pub mod api;
pub mod vkey;

use super::models::{LyricPair, ResourceKind, SongRecord};
use super::{BatchResolve, Provider, ProviderError, Result, SongSource};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;
use std::sync::Arc;

pub use api::TencentApi;
pub use vkey::VkeyResolver;

pub const NAME: &str = "tencent";

const SUPPORTED: [ResourceKind; 5] = [
    ResourceKind::Playlist,
    ResourceKind::Song,
    ResourceKind::Url,
    ResourceKind::Pic,
    ResourceKind::Lrc,
];

/// Account credentials forwarded to the vkey endpoint.
///
/// Without them only free songs resolve to a URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TencentCredentials {
    pub uin: String,
    pub music_key: String,
}

/// Upstream endpoint URLs. Overridable so tests can point at a mock server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub playlist: String,
    pub vkey: String,
    pub song_detail: String,
    pub lyric: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            playlist: "http://c.y.qq.com/qzone/fcg-bin/fcg_ucc_getcdinfo_byids_cp.fcg".to_string(),
            vkey: "https://u.y.qq.com/cgi-bin/musicu.fcg".to_string(),
            song_detail: "http://u.y.qq.com/cgi-bin/musicu.fcg".to_string(),
            lyric: "http://c.y.qq.com/lyric/fcgi-bin/fcg_query_lyric_new.fcg".to_string(),
        }
    }
}

pub struct TencentProvider {
    api: Arc<TencentApi>,
    vkey: Arc<VkeyResolver>,
}

impl TencentProvider {
    pub fn new(credentials: TencentCredentials, endpoints: Endpoints) -> Result<Self> {
        let http = build_http_client()?;
        Ok(Self {
            vkey: Arc::new(VkeyResolver::new(
                http.clone(),
                credentials,
                endpoints.vkey.clone(),
            )),
            api: Arc::new(TencentApi::new(http, endpoints)),
        })
    }
}

#[async_trait]
impl Provider for TencentProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    fn supports(&self, kind: ResourceKind) -> bool {
        SUPPORTED.contains(&kind)
    }

    fn songs(&self) -> Arc<dyn SongSource> {
        self.api.clone()
    }

    fn resolver(&self) -> Arc<dyn BatchResolve> {
        self.vkey.clone()
    }

    async fn song(&self, id: &str) -> Result<Vec<SongRecord>> {
        Ok(vec![self.api.song_detail(id).await?])
    }

    async fn url(&self, id: &str) -> Result<String> {
        let ids: Vec<String> = id.split(',').map(str::to_string).collect();
        let urls = self.vkey.resolve_batch(&ids).await?;
        Ok(urls.into_iter().next().unwrap_or_default())
    }

    async fn pic(&self, id: &str) -> Result<String> {
        Ok(self.api.song_detail(id).await?.pic)
    }

    async fn lyric(&self, id: &str) -> Result<LyricPair> {
        self.api.lyric(id).await
    }
}

pub(crate) fn build_http_client() -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_static("Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36"),
    );
    Ok(reqwest::Client::builder().default_headers(headers).build()?)
}

/// Append `params` to `base` as a percent-encoded query string.
pub(crate) fn with_query(base: &str, params: &[(&str, &str)]) -> String {
    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    format!("{base}?{query}")
}

/// Send a request and decode its JSON body.
///
/// A body that does not match `T` is reported as `Malformed` rather than as a
/// transport error.
pub(crate) async fn fetch_json<T: DeserializeOwned>(
    rb: reqwest::RequestBuilder,
    endpoint: &'static str,
) -> Result<T> {
    let resp = rb.send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(ProviderError::Status {
            endpoint,
            status: status.as_u16(),
        });
    }
    let body = resp.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| ProviderError::Malformed {
        endpoint,
        detail: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_query_encodes() {
        let url = with_query("https://x.example/a", &[("-", "get"), ("data", "{\"a\":1}")]);
        assert_eq!(url, "https://x.example/a?-=get&data=%7B%22a%22%3A1%7D");
    }

    #[test]
    fn test_supports_every_kind() {
        let p = TencentProvider::new(TencentCredentials::default(), Endpoints::default()).unwrap();
        assert_eq!(p.name(), "tencent");
        assert!(p.supports(ResourceKind::Playlist));
        assert!(p.supports(ResourceKind::Lrc));
    }
}
