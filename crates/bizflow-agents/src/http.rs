//! Outbound HTTP collaborator backed by reqwest.
//!
//! Never fails: a transport error (DNS, refused connection, timeout) comes
//! back as a synthetic status-500 response carrying the error text, so the
//! interpreter's status comparisons stay uniform.

use async_trait::async_trait;
use bizflow_core::config::HttpConfig;
use bizflow_core::traits::HttpFetcher;
use bizflow_core::types::HttpResponse;

pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new(config: &HttpConfig) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self { client }
    }

    async fn finish(response: Result<reqwest::Response, reqwest::Error>) -> HttpResponse {
        match response {
            Ok(resp) => {
                let status = resp.status().as_u16();
                let data = resp.text().await.unwrap_or_default();
                HttpResponse { status, data }
            }
            Err(e) => HttpResponse { status: 500, data: e.to_string() },
        }
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn get(&self, url: &str) -> HttpResponse {
        Self::finish(self.client.get(url).send().await).await
    }

    async fn post(&self, url: &str, body: &str) -> HttpResponse {
        let request = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .body(body.to_string());
        Self::finish(request.send().await).await
    }
}
