use reqwest::{Client, Method, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

/// Error reported by the router's `ApiError` envelope
#[derive(Debug, thiserror::Error)]
#[error("{message} ({code}, HTTP {status})")]
pub struct RemoteError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
}

/// HTTP client for the service management routes
pub struct AdminClient {
    client: Client,
    base_url: url::Url,
}

impl AdminClient {
    pub fn new(server: &str) -> anyhow::Result<Self> {
        let base_url = url::Url::parse(server)
            .map_err(|e| anyhow::anyhow!("Invalid server URL '{}': {}", server, e))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self { client, base_url })
    }

    pub async fn list(&self) -> anyhow::Result<Value> {
        self.send(Method::GET, "/api/v2/integrated-cms/services", None).await
    }

    pub async fn show(&self, service_id: &str) -> anyhow::Result<Value> {
        self.send(Method::GET, &service_path(service_id, ""), None).await
    }

    pub async fn create(&self, service_id: &str, url: &str, username: &str, password: &str) -> anyhow::Result<Value> {
        let body = json!({ "url": url, "username": username, "password": password });
        self.send(Method::POST, &service_path(service_id, ""), Some(body)).await
    }

    pub async fn remove(&self, service_id: &str) -> anyhow::Result<Value> {
        self.send(Method::DELETE, &service_path(service_id, ""), None).await
    }

    pub async fn auto_detect(&self, service_id: &str) -> anyhow::Result<Value> {
        self.send(Method::POST, &service_path(service_id, "/auto-detect"), None).await
    }

    pub async fn health(&self) -> anyhow::Result<Value> {
        let url = self.base_url.join("/health")?;
        let response = self.client.get(url).timeout(Duration::from_secs(5)).send().await?;
        Ok(response.json().await?)
    }

    /// Send a request and unwrap the `{"success": true, "data": ...}` envelope
    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> anyhow::Result<Value> {
        let url = self.base_url.join(path)?;
        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        let payload: Value = response.json().await.unwrap_or(Value::Null);

        if !status.is_success() {
            return Err(RemoteError {
                status,
                code: payload["code"].as_str().unwrap_or("UNKNOWN").to_string(),
                message: payload["message"].as_str().unwrap_or("request failed").to_string(),
            }
            .into());
        }

        Ok(payload.get("data").cloned().unwrap_or(payload))
    }
}

fn service_path(service_id: &str, suffix: &str) -> String {
    format!("/api/v2/integrated-cms/services/{}{}", service_id, suffix)
}
