//! Vkey resolution: exchanges song ids for short-lived playable URLs.

use super::{fetch_json, with_query, TencentCredentials};
use crate::provider::{BatchResolve, ProviderError, Result};
use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Delivery hosts with this prefix are only used when nothing else is offered.
const LOW_PRIORITY_DOMAIN: &str = "http://ws";

#[derive(Debug, Serialize)]
struct VkeyEnvelope<'a> {
    req_0: VkeyRequest<'a>,
    comm: VkeyComm<'a>,
}

#[derive(Debug, Serialize)]
struct VkeyRequest<'a> {
    module: &'static str,
    method: &'static str,
    param: VkeyParam<'a>,
}

#[derive(Debug, Serialize)]
struct VkeyParam<'a> {
    guid: String,
    songmid: &'a [String],
    songtype: [u8; 1],
    uin: &'a str,
    loginflag: u8,
    platform: &'static str,
}

#[derive(Debug, Serialize)]
struct VkeyComm<'a> {
    uin: &'a str,
    format: &'static str,
    ct: u32,
    cv: u32,
    authst: &'a str,
}

#[derive(Debug, Deserialize)]
struct VkeyResponse {
    req_0: Option<VkeyResponseReq>,
}

#[derive(Debug, Deserialize)]
struct VkeyResponseReq {
    data: Option<VkeyData>,
}

#[derive(Debug, Deserialize)]
struct VkeyData {
    sip: Option<Vec<String>>,
    midurlinfo: Option<Vec<MidUrlInfo>>,
}

#[derive(Debug, Deserialize)]
struct MidUrlInfo {
    #[serde(default)]
    purl: String,
}

#[derive(Debug, Clone)]
pub struct VkeyResolver {
    http: reqwest::Client,
    credentials: TencentCredentials,
    endpoint: String,
}

impl VkeyResolver {
    pub fn new(http: reqwest::Client, credentials: TencentCredentials, endpoint: String) -> Self {
        Self {
            http,
            credentials,
            endpoint,
        }
    }

    fn request_url(&self, ids: &[String], guid: String) -> Result<String> {
        let uin = self.credentials.uin.as_str();
        let data = VkeyEnvelope {
            req_0: VkeyRequest {
                module: "vkey.GetVkeyServer",
                method: "CgiGetVkey",
                param: VkeyParam {
                    guid,
                    songmid: ids,
                    songtype: [0],
                    uin,
                    loginflag: 1,
                    platform: "20",
                },
            },
            comm: VkeyComm {
                uin,
                format: "json",
                ct: 19,
                cv: 0,
                authst: &self.credentials.music_key,
            },
        };
        let data = serde_json::to_string(&data).map_err(|e| ProviderError::Decode {
            what: "vkey request",
            detail: e.to_string(),
        })?;

        Ok(with_query(
            &self.endpoint,
            &[
                ("-", "getplaysongvkey"),
                ("g_tk", "5381"),
                ("loginUin", uin),
                ("hostUin", "0"),
                ("format", "json"),
                ("inCharset", "utf8"),
                // Upstream expects this value verbatim, mangled entity and all.
                ("outCharset", "utf-8\u{ac}ice=0"),
                ("platform", "yqq.json"),
                ("needNewCode", "0"),
                ("data", data.as_str()),
            ],
        ))
    }
}

#[async_trait]
impl BatchResolve for VkeyResolver {
    async fn resolve_batch(&self, ids: &[String]) -> Result<Vec<String>> {
        let guid = rand::rng().random_range(0..10_000_000u32).to_string();
        let url = self.request_url(ids, guid)?;
        let resp: VkeyResponse = fetch_json(self.http.get(url), "vkey").await?;
        urls_from_response(resp, ids.len())
    }
}

/// Pick the delivery host: the first one without the low-priority prefix, or
/// the first one overall when every host carries it.
pub fn select_domain(sip: &[String]) -> Option<&str> {
    sip.iter()
        .find(|d| !d.starts_with(LOW_PRIORITY_DOMAIN))
        .or_else(|| sip.first())
        .map(String::as_str)
}

/// Join a host and a path, forcing https. An empty path yields an empty URL.
pub fn build_url(domain: &str, purl: &str) -> String {
    if purl.is_empty() {
        return String::new();
    }
    let joined = format!("{domain}{purl}");
    match joined.strip_prefix("http://") {
        Some(rest) => format!("https://{rest}"),
        None => joined,
    }
}

fn urls_from_response(resp: VkeyResponse, expected: usize) -> Result<Vec<String>> {
    let malformed = |detail: &str| ProviderError::Malformed {
        endpoint: "vkey",
        detail: detail.to_string(),
    };

    let data = resp
        .req_0
        .and_then(|r| r.data)
        .ok_or_else(|| malformed("missing req_0.data"))?;
    let sip = data.sip.ok_or_else(|| malformed("missing sip"))?;
    let infos = data
        .midurlinfo
        .ok_or_else(|| malformed("missing midurlinfo"))?;
    let domain = select_domain(&sip).ok_or_else(|| malformed("empty sip"))?;

    if infos.len() != expected {
        return Err(malformed(&format!(
            "expected {expected} midurlinfo entries, got {}",
            infos.len()
        )));
    }

    debug!(domain, count = infos.len(), "vkey batch resolved");
    Ok(infos.iter().map(|i| build_url(domain, &i.purl)).collect())
}
