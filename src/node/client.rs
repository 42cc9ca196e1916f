use super::{Block, HeightResponse, NodeApi, Origin, OriginResponse};
use crate::error::{AppError, OriginError};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;

/// HTTP client for one node, shared by the proxy and the block poller
#[derive(Clone)]
pub struct NodeClient {
    http: reqwest::Client,
    base_url: String,
}

impl NodeClient {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn relay(response: reqwest::Response) -> Result<OriginResponse, OriginError> {
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?;
        Ok(OriginResponse {
            status,
            content_type,
            body,
        })
    }
}

#[async_trait]
impl Origin for NodeClient {
    async fn get(&self, path: &str) -> Result<OriginResponse, OriginError> {
        let response = self.http.get(self.url(path)).send().await?;
        Self::relay(response).await
    }

    async fn post(
        &self,
        path: &str,
        body: Bytes,
        content_type: Option<&str>,
    ) -> Result<OriginResponse, OriginError> {
        let mut request = self.http.post(self.url(path)).body(body);
        if let Some(content_type) = content_type {
            request = request.header(CONTENT_TYPE, content_type);
        }
        let response = request.send().await?;
        Self::relay(response).await
    }
}

#[async_trait]
impl NodeApi for NodeClient {
    async fn height(&self) -> Result<u64, OriginError> {
        let response = self
            .http
            .get(self.url("blocks/height"))
            .send()
            .await?
            .error_for_status()?;
        let height: HeightResponse = response.json().await?;
        Ok(height.height)
    }

    async fn block_at(&self, height: u64) -> Result<Block, OriginError> {
        let response = self
            .http
            .get(self.url(&format!("blocks/at/{}", height)))
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}
