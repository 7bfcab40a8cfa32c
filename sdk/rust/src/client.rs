//! Small typed client for the bus gateway.

use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};

/// Outcome of a bus post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusReply {
    pub status: u16,
    pub body: String,
}

impl BusReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body parsed as JSON, when it is JSON.
    pub fn json(&self) -> Option<serde_json::Value> {
        serde_json::from_str(&self.body).ok()
    }
}

/// Client bound to one gateway. Keeps its session cookie between calls.
pub struct GatewayClient {
    client: Client,
    base_url: String,
}

impl GatewayClient {
    pub fn new(base_url: &str) -> Self {
        let client = Client::builder()
            .cookie_store(true)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /status`.
    pub async fn status(&self) -> Result<Response, reqwest::Error> {
        self.client
            .get(format!("{}/status", self.base_url))
            .send()
            .await
    }

    /// `GET /static/<path>`.
    pub async fn fetch_static(&self, path: &str) -> Result<Response, reqwest::Error> {
        self.client
            .get(format!("{}/static/{}", self.base_url, path.trim_start_matches('/')))
            .send()
            .await
    }

    /// `POST /bus/<address>` with the parameters form-encoded.
    pub async fn post_bus(
        &self,
        address: &str,
        params: &[(&str, &str)],
    ) -> Result<BusReply, reqwest::Error> {
        let resp = self
            .client
            .post(format!("{}/bus/{}", self.base_url, address))
            .form(params)
            .send()
            .await?;
        let status: StatusCode = resp.status();
        let body = resp.text().await?;
        Ok(BusReply {
            status: status.as_u16(),
            body,
        })
    }

    /// Raw request against any gateway path, for cases the helpers don't cover.
    pub async fn get(&self, path: &str) -> Result<Response, reqwest::Error> {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
    }
}
