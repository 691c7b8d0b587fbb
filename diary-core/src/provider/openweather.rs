use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;

use crate::{RawResponse, config::DEFAULT_BASE_URL};

use super::WeatherClient;

/// OpenWeather "current weather" client.
///
/// Sends no `units` parameter, so temperatures come back in Kelvin.
#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    api_key: String,
    base_url: String,
    http: Client,
}

#[derive(Debug)]
pub struct OpenWeatherClientBuilder {
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl OpenWeatherClient {
    pub fn new(api_key: String) -> Result<Self> {
        Self::builder(api_key).build()
    }

    pub fn builder(api_key: String) -> OpenWeatherClientBuilder {
        OpenWeatherClientBuilder {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/weather", self.base_url.trim_end_matches('/'))
    }
}

impl OpenWeatherClientBuilder {
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Connect + read timeout for the single request.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<OpenWeatherClient> {
        let http = Client::builder()
            .timeout(self.timeout)
            .build()
            .context("Failed to build OpenWeather HTTP client")?;

        Ok(OpenWeatherClient { api_key: self.api_key, base_url: self.base_url, http })
    }
}

#[async_trait]
impl WeatherClient for OpenWeatherClient {
    async fn fetch_current(&self, location: &str) -> RawResponse {
        let res = match self
            .http
            .get(self.endpoint())
            .query(&[("q", location), ("appid", self.api_key.as_str())])
            .send()
            .await
        {
            Ok(res) => res,
            Err(err) => {
                tracing::warn!(error = %err, location, "OpenWeather request failed");
                return RawResponse::Unavailable(format!("request failed: {err}"));
            }
        };

        let status = res.status();
        let body = match res.text().await {
            Ok(body) => body,
            Err(err) => {
                tracing::warn!(error = %err, %status, "Failed to read OpenWeather response body");
                return RawResponse::Unavailable(format!("failed to read response body: {err}"));
            }
        };

        if status == StatusCode::OK {
            tracing::debug!(location, bytes = body.len(), "OpenWeather current weather received");
            RawResponse::Success(body)
        } else {
            tracing::warn!(
                %status,
                body = %truncate_body(&body),
                "OpenWeather returned an error status"
            );
            RawResponse::ProviderError { status: status.as_u16(), body }
        }
    }
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.chars().count() > MAX {
        format!("{}...", body.chars().take(MAX).collect::<String>())
    } else {
        body.to_string()
    }
}
