use crate::ssrf::UrlGuard;
use anyhow::{Context, Result};
use async_trait::async_trait;
use glimpse_core::{Config, PipelineError, PipelineResult};
use reqwest::{Client, ClientBuilder};
use serde_json::Value;
use std::time::Duration;

/// Configuration for callback delivery
#[derive(Clone, Debug)]
pub struct NotifierConfig {
    pub timeout_seconds: u64,
    pub guard: UrlGuard,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            guard: UrlGuard::default(),
        }
    }
}

impl From<&Config> for NotifierConfig {
    fn from(config: &Config) -> Self {
        Self {
            timeout_seconds: config.http_timeout_secs(),
            guard: UrlGuard::new(
                config.allow_private_urls(),
                config.url_allowlist().map(<[String]>::to_vec),
            ),
        }
    }
}

/// Delivery of job results to a caller-supplied callback
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `payload` once; no retries
    async fn notify(&self, callback_url: &str, payload: &Value) -> PipelineResult<()>;
}

/// Notifier posting JSON over HTTP
#[derive(Clone)]
pub struct HttpNotifier {
    http_client: Client,
    config: NotifierConfig,
}

impl HttpNotifier {
    pub fn new(config: NotifierConfig) -> Result<Self> {
        let http_client = client_builder(&config)
            .build()
            .context("Failed to create HTTP client for callbacks")?;

        Ok(Self {
            http_client,
            config,
        })
    }
}

fn client_builder(config: &NotifierConfig) -> ClientBuilder {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .redirect(config.guard.redirect_policy())
}

#[async_trait]
impl Notifier for HttpNotifier {
    #[tracing::instrument(skip(self, payload))]
    async fn notify(&self, callback_url: &str, payload: &Value) -> PipelineResult<()> {
        let unreachable = |reason: String| PipelineError::CallbackUnreachable {
            url: callback_url.to_string(),
            reason,
        };

        let checked = self
            .config
            .guard
            .check_resolved(callback_url)
            .await
            .map_err(|e| unreachable(format!("invalid callback url: {}", e)))?;

        let client = match checked.pin() {
            Some((host, addr)) => client_builder(&self.config)
                .resolve(host, addr)
                .build()
                .map_err(|e| unreachable(e.to_string()))?,
            None => self.http_client.clone(),
        };

        let response = client
            .post(checked.url.clone())
            .header("User-Agent", "Glimpse-Callback/1.0")
            .json(payload)
            .send()
            .await
            .map_err(|e| unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("Failed to read response body"));
            return Err(unreachable(format!(
                "callback returned non-2xx status: {} - {}",
                status, body
            )));
        }

        tracing::info!(status = status.as_u16(), "Callback delivered");
        Ok(())
    }
}
