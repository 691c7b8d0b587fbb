use chrono::NaiveDate;
use std::sync::Arc;

use crate::{ResolutionFailure, WeatherCache, WeatherFetcher, WeatherRecord};

/// What the resolver does with weather it had to fetch on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnDemandPolicy {
    /// Hand the record to the caller only. The daily refresh stays the sole
    /// regular writer, so the cache does not collect a row per diary write.
    #[default]
    Transient,
    /// Also append the record to the cache, but only when it describes the
    /// requested date. A live fetch always reports today's weather, so a
    /// backdated entry gets it attached without it being cached under today.
    Persist,
}

/// Picks the weather to attach to a diary entry.
///
/// Cached rows win (oldest first); with nothing cached for the date one live
/// fetch is attempted.
#[derive(Debug, Clone)]
pub struct DiaryWeatherResolver {
    cache: Arc<dyn WeatherCache>,
    fetcher: WeatherFetcher,
    policy: OnDemandPolicy,
}

impl DiaryWeatherResolver {
    pub fn new(cache: Arc<dyn WeatherCache>, fetcher: WeatherFetcher) -> Self {
        Self { cache, fetcher, policy: OnDemandPolicy::default() }
    }

    pub fn with_policy(mut self, policy: OnDemandPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub async fn resolve(&self, date: NaiveDate) -> Result<WeatherRecord, ResolutionFailure> {
        let cached = self
            .cache
            .find_all(date)
            .await
            .map_err(|source| ResolutionFailure::CacheUnavailable { date, source })?;

        if let Some(first) = cached.into_iter().next() {
            tracing::debug!(%date, "Using cached weather");
            return Ok(first);
        }

        tracing::info!(
            %date,
            location = self.fetcher.location(),
            "No cached weather, fetching on demand"
        );

        let record = self.fetcher.fetch_today().await.map_err(|source| {
            tracing::warn!(%date, error = %source, "On-demand weather fetch failed");
            ResolutionFailure::Fetch { date, source }
        })?;

        if self.policy == OnDemandPolicy::Persist && record.date == date {
            if let Err(err) = self.cache.store(record.clone()).await {
                tracing::warn!(%date, error = %err, "Failed to cache on-demand weather");
            }
        }

        Ok(record)
    }
}
