use crate::{Config, RawResponse, provider::openweather::OpenWeatherClient};
use async_trait::async_trait;
use std::fmt::Debug;

pub mod openweather;

/// Outbound call to the weather provider's current-weather endpoint.
///
/// Implementations never fail: transport problems come back as
/// [`RawResponse::Unavailable`] and non-200 answers as
/// [`RawResponse::ProviderError`]. No retries happen here.
#[async_trait]
pub trait WeatherClient: Send + Sync + Debug {
    async fn fetch_current(&self, location: &str) -> RawResponse;
}

/// Construct the configured weather client.
pub fn client_from_config(config: &Config) -> anyhow::Result<Box<dyn WeatherClient>> {
    let api_key = config.api_key().ok_or_else(|| {
        anyhow::anyhow!(
            "No API key configured for provider 'openweather'.\n\
                 Hint: run `weather-diary configure` or set {}.",
            crate::config::API_KEY_ENV,
        )
    })?;

    let client = OpenWeatherClient::builder(api_key)
        .base_url(config.base_url.clone())
        .timeout(config.timeout())
        .build()?;

    Ok(Box::new(client))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_from_config_works_with_stored_key() {
        let cfg = Config { api_key: Some("KEY".to_string()), ..Config::default() };
        assert!(client_from_config(&cfg).is_ok());
    }
}
