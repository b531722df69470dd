//! Off-chain metadata document fetching

use super::RpcError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Off-chain JSON metadata document referenced by an asset's URI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct JsonMetadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub external_url: Option<String>,
    #[serde(default)]
    pub attributes: Vec<serde_json::Value>,
}

#[async_trait]
pub trait MetadataFetcher: Send + Sync {
    async fn fetch_json(&self, uri: &str) -> Result<JsonMetadata, RpcError>;
}

pub struct HttpMetadataFetcher {
    client: reqwest::Client,
}

impl HttpMetadataFetcher {
    pub fn new(timeout: Duration) -> Result<Self, RpcError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcError::Transport {
                endpoint: "metadata".to_string(),
                message: e.to_string(),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl MetadataFetcher for HttpMetadataFetcher {
    async fn fetch_json(&self, uri: &str) -> Result<JsonMetadata, RpcError> {
        let response = self.client.get(uri).send().await.map_err(|e| {
            if e.is_timeout() {
                RpcError::Timeout {
                    endpoint: uri.to_string(),
                    timeout_ms: 0,
                }
            } else {
                RpcError::Transport {
                    endpoint: uri.to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::RpcResponse {
                endpoint: uri.to_string(),
                message: format!("metadata request returned {status}"),
                code: Some(status.as_u16() as i64),
            });
        }

        response
            .json::<JsonMetadata>()
            .await
            .map_err(|e| RpcError::Decode {
                account: uri.to_string(),
                message: e.to_string(),
            })
    }
}
