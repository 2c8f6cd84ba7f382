use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use orbis_types::{ContentId, ContentPath};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::node::{DirectoryNode, Link};
use crate::traits::{ProgressFn, StorageService};

/// Upper bound on buffer preallocation from an advertised content length.
const MAX_PREALLOC: u64 = 64 * 1024 * 1024;

/// Connection settings for a Kubo RPC endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct KuboConfig {
    /// Base URL of the RPC API, without the `/api/v0` suffix.
    pub api_url: String,
    /// Timeout for small RPC calls (resolve, stat, ls). Streaming fetches
    /// are bounded by `connect_timeout_secs` only.
    pub request_timeout_secs: u64,
    /// TCP connect timeout.
    pub connect_timeout_secs: u64,
}

impl Default for KuboConfig {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:5001".into(),
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

/// [`StorageService`] backed by the HTTP RPC API of a running Kubo node.
///
/// Endpoints used: `resolve`, `files/stat`, `ls`, `cat`. All RPC calls are
/// `POST` with the argument in the `arg` query parameter, as Kubo requires.
pub struct KuboStorage {
    client: reqwest::Client,
    config: KuboConfig,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ResolveResponse {
    path: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StatResponse {
    #[serde(rename = "Type")]
    kind: String,
    #[serde(default)]
    size: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LsResponse {
    #[serde(default)]
    objects: Vec<LsObject>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LsObject {
    #[serde(default)]
    links: Vec<LsLink>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LsLink {
    name: String,
    hash: String,
    #[serde(default)]
    size: Option<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ErrorResponse {
    message: String,
}

impl KuboStorage {
    /// Build a client for the configured endpoint.
    pub fn new(config: KuboConfig) -> StoreResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// The active configuration.
    pub fn config(&self) -> &KuboConfig {
        &self.config
    }

    fn endpoint(&self, command: &str) -> String {
        format!(
            "{}/api/v0/{}",
            self.config.api_url.trim_end_matches('/'),
            command
        )
    }

    /// Issue one RPC call; non-success statuses become `Remote` errors
    /// carrying Kubo's own message.
    async fn rpc(&self, command: &str, arg: &str, bounded: bool) -> StoreResult<reqwest::Response> {
        let mut request = self
            .client
            .post(self.endpoint(command))
            .query(&[("arg", arg)]);
        if bounded {
            request = request.timeout(Duration::from_secs(self.config.request_timeout_secs));
        }
        debug!(command, arg, "kubo rpc");

        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| e.message)
            .unwrap_or(body);
        warn!(command, arg, %status, %message, "kubo rpc failed");
        Err(StoreError::Remote(message))
    }

    async fn rpc_json<T: serde::de::DeserializeOwned>(&self, command: &str, arg: &str) -> StoreResult<T> {
        let response = self.rpc(command, arg, true).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| StoreError::Decode(format!("{command}: {e}")))
    }

    async fn stat(&self, id: &ContentId) -> StoreResult<StatResponse> {
        self.rpc_json::<StatResponse>("files/stat", &format!("/ipfs/{id}"))
            .await
            .map_err(|e| missing_block(e, id))
    }
}

/// Kubo reports a missing child link as "no link named ...".
fn is_missing_link(message: &str) -> bool {
    message.contains("no link named")
}

fn missing_block(err: StoreError, id: &ContentId) -> StoreError {
    match err {
        StoreError::Remote(message)
            if message.contains("not found") || message.contains("could not resolve") =>
        {
            StoreError::NotFound(id.clone())
        }
        other => other,
    }
}

fn missing_segment(message: &str, path: &ContentPath) -> String {
    // "no link named \"X\" under ..." -> X
    message
        .split('"')
        .nth(1)
        .map(str::to_string)
        .or_else(|| path.segments().last().cloned())
        .unwrap_or_default()
}

#[async_trait]
impl StorageService for KuboStorage {
    async fn resolve_path(&self, path: &ContentPath) -> StoreResult<ContentId> {
        if path.is_bare() {
            return Ok(path.root().clone());
        }
        let response = match self
            .rpc_json::<ResolveResponse>("resolve", &path.to_ipfs_path())
            .await
        {
            Ok(r) => r,
            Err(StoreError::Remote(message)) if is_missing_link(&message) => {
                return Err(StoreError::PathNotFound {
                    root: path.root().clone(),
                    segment: missing_segment(&message, path),
                });
            }
            Err(e) => return Err(missing_block(e, path.root())),
        };

        let resolved = response
            .path
            .trim_start_matches("/ipfs/")
            .split('/')
            .next()
            .unwrap_or_default();
        ContentId::parse(resolved).map_err(|e| StoreError::Decode(e.to_string()))
    }

    async fn list_node(&self, id: &ContentId) -> StoreResult<DirectoryNode> {
        let stat = self.stat(id).await?;
        if stat.kind != "directory" {
            return Ok(DirectoryNode::file());
        }

        let ls: LsResponse = self
            .rpc_json("ls", id.as_str())
            .await
            .map_err(|e| missing_block(e, id))?;
        let mut links = Vec::new();
        for object in ls.objects {
            for link in object.links {
                let child = ContentId::parse(&link.hash)
                    .map_err(|e| StoreError::Decode(format!("ls {id}: {e}")))?;
                let mut entry = Link::new(link.name, child);
                entry.size = link.size;
                links.push(entry);
            }
        }
        Ok(DirectoryNode::directory(links))
    }

    async fn fetch_bytes(&self, id: &ContentId, progress: &ProgressFn<'_>) -> StoreResult<Bytes> {
        let stat = self.stat(id).await?;
        if stat.kind == "directory" {
            return Err(StoreError::IsDirectory(id.clone()));
        }

        let mut response = self
            .rpc("cat", id.as_str(), false)
            .await
            .map_err(|e| missing_block(e, id))?;
        let total = response
            .headers()
            .get("X-Content-Length")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .or_else(|| response.content_length())
            .unwrap_or(stat.size);

        let mut buf = BytesMut::with_capacity(total.min(MAX_PREALLOC) as usize);
        progress(0, total);
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?
        {
            buf.extend_from_slice(&chunk);
            let done = buf.len() as u64;
            progress(done, total.max(done));
        }
        debug!(id = %id, bytes = buf.len(), "fetched");
        Ok(buf.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT: &str = "bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi";

    #[test]
    fn endpoint_strips_trailing_slash() {
        let store = KuboStorage::new(KuboConfig {
            api_url: "http://node:5001/".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(store.endpoint("ls"), "http://node:5001/api/v0/ls");
    }

    #[test]
    fn missing_segment_from_message() {
        let path = ContentPath::parse(&format!("{ROOT}/AssetBundles")).unwrap();
        let msg = format!("no link named \"AssetBundles\" under {ROOT}");
        assert!(is_missing_link(&msg));
        assert_eq!(missing_segment(&msg, &path), "AssetBundles");
        assert_eq!(missing_segment("no link named", &path), "AssetBundles");
    }

    #[test]
    fn missing_block_maps_not_found() {
        let id = ContentId::parse(ROOT).unwrap();
        let err = missing_block(StoreError::Remote("block was not found locally".into()), &id);
        assert!(matches!(err, StoreError::NotFound(_)));
        let err = missing_block(StoreError::Remote("permission denied".into()), &id);
        assert!(matches!(err, StoreError::Remote(_)));
    }

    #[test]
    fn decodes_ls_response() {
        let json = format!(
            r#"{{"Objects":[{{"Hash":"{ROOT}","Links":[{{"Name":"Template","Hash":"{ROOT}","Size":12,"Type":1,"Target":""}}]}}]}}"#
        );
        let ls: LsResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(ls.objects[0].links[0].name, "Template");
        assert_eq!(ls.objects[0].links[0].size, Some(12));
    }

    #[test]
    fn decodes_stat_response() {
        let json = format!(
            r#"{{"Hash":"{ROOT}","Size":0,"CumulativeSize":1024,"Blocks":2,"Type":"directory"}}"#
        );
        let stat: StatResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(stat.kind, "directory");
    }

    #[test]
    fn config_defaults() {
        let c = KuboConfig::default();
        assert_eq!(c.api_url, "http://127.0.0.1:5001");
        assert_eq!(c.request_timeout_secs, 30);
    }
}
