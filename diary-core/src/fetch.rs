use std::sync::Arc;

use crate::{Clock, ParseFailure, WeatherClient, WeatherRecord, parser};

/// One live weather attempt: a single client call followed by a single parse.
///
/// Shared by the daily refresh and the resolver's on-demand path. It never
/// retries; each caller decides what a failure means for it.
#[derive(Debug, Clone)]
pub struct WeatherFetcher {
    client: Arc<dyn WeatherClient>,
    clock: Arc<dyn Clock>,
    location: String,
}

impl WeatherFetcher {
    pub fn new(
        client: Arc<dyn WeatherClient>,
        clock: Arc<dyn Clock>,
        location: impl Into<String>,
    ) -> Self {
        Self { client, clock, location: location.into() }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Fetch current conditions, stamped with today's date.
    pub async fn fetch_today(&self) -> Result<WeatherRecord, ParseFailure> {
        let raw = self.client.fetch_current(&self.location).await;
        parser::parse(&raw, self.clock.today())
    }
}
