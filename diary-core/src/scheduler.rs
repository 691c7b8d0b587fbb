//! Daily weather refresh.
//!
//! [`DailyTrigger`] only knows how to call something once a day;
//! [`WeatherScheduler`] is the job it calls: fetch, parse, store.

use chrono::{Duration as ChronoDuration, NaiveDateTime, NaiveTime};
use std::{future::Future, sync::Arc, time::Duration};
use tokio::task::JoinHandle;

use crate::{Clock, WeatherCache, WeatherFetcher, WeatherRecord};

/// Result of one refresh run.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Stored(WeatherRecord),
    /// Nothing was written for the day; the reason is already logged.
    Skipped(String),
}

/// Invokes a job once per day at a fixed local wall-clock time.
#[derive(Debug, Clone)]
pub struct DailyTrigger {
    at: NaiveTime,
    clock: Arc<dyn Clock>,
}

impl DailyTrigger {
    pub fn new(at: NaiveTime, clock: Arc<dyn Clock>) -> Self {
        Self { at, clock }
    }

    /// Run `job` forever, once per day. The job's own result is its business.
    pub fn spawn<F, Fut>(self, mut job: F) -> JoinHandle<()>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(async move {
            let mut last = None;
            loop {
                let now = self.clock.now();
                let target = next_run(now, self.at, last);
                let delay = (target - now).to_std().unwrap_or(Duration::ZERO);
                tracing::debug!(
                    at = %self.at,
                    %target,
                    delay_secs = delay.as_secs(),
                    "Waiting for next daily run"
                );
                tokio::time::sleep(delay).await;
                last = Some(target);
                job().await;
            }
        })
    }
}

/// The next `at` strictly after `now`, and strictly after the `last` run.
///
/// Timers may wake slightly before the wall clock reaches the target; `last`
/// keeps such an early wake-up from scheduling the same day again.
pub fn next_run(now: NaiveDateTime, at: NaiveTime, last: Option<NaiveDateTime>) -> NaiveDateTime {
    let today = now.date().and_time(at);
    let next = if today > now { today } else { today + ChronoDuration::days(1) };

    match last {
        Some(last) if next <= last => last + ChronoDuration::days(1),
        _ => next,
    }
}

#[derive(Debug, Clone)]
pub struct WeatherScheduler {
    fetcher: WeatherFetcher,
    cache: Arc<dyn WeatherCache>,
}

impl WeatherScheduler {
    pub fn new(fetcher: WeatherFetcher, cache: Arc<dyn WeatherCache>) -> Self {
        Self { fetcher, cache }
    }

    /// One refresh: fetch today's weather and append it to the cache.
    ///
    /// Never fails; a failed day is simply left without a scheduled row and
    /// diary writes fall back to on-demand fetches.
    pub async fn run_once(&self) -> RefreshOutcome {
        let record = match self.fetcher.fetch_today().await {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    location = self.fetcher.location(),
                    "Daily weather refresh skipped"
                );
                return RefreshOutcome::Skipped(err.to_string());
            }
        };

        match self.cache.store(record.clone()).await {
            Ok(()) => {
                tracing::info!(
                    date = %record.date,
                    condition = %record.condition,
                    "Saved daily weather"
                );
                RefreshOutcome::Stored(record)
            }
            Err(err) => {
                tracing::error!(error = %err, date = %record.date, "Failed to store daily weather");
                RefreshOutcome::Skipped(format!("{err:#}"))
            }
        }
    }

    /// Run [`Self::run_once`] every day at `at`, detached from any caller.
    pub fn spawn(self, at: NaiveTime) -> JoinHandle<()> {
        let trigger = DailyTrigger::new(at, self.fetcher.clock().clone());
        let scheduler = Arc::new(self);

        trigger.spawn(move || {
            let scheduler = scheduler.clone();
            async move {
                scheduler.run_once().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        DiaryWeatherResolver, MemoryWeatherCache,
        clock::FixedClock,
        testing::{CLEAR_PAYLOAD, StubClient, day},
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn next_run_later_today() {
        let now = day(2022, 7, 27).and_time(at(0, 30));
        assert_eq!(next_run(now, at(1, 0), None), day(2022, 7, 27).and_time(at(1, 0)));
    }

    #[test]
    fn next_run_rolls_over_to_tomorrow() {
        let now = day(2022, 7, 27).and_time(at(1, 0));
        assert_eq!(next_run(now, at(1, 0), None), day(2022, 7, 28).and_time(at(1, 0)));

        let now = day(2022, 7, 27).and_time(at(23, 0));
        assert_eq!(next_run(now, at(1, 0), None), day(2022, 7, 28).and_time(at(1, 0)));
    }

    #[test]
    fn early_wake_up_does_not_repeat_the_day() {
        let last = day(2022, 7, 27).and_time(at(1, 0));
        let now = last - ChronoDuration::milliseconds(100);

        assert_eq!(next_run(now, at(1, 0), Some(last)), day(2022, 7, 28).and_time(at(1, 0)));
    }

    #[tokio::test]
    async fn run_once_stores_todays_weather() {
        let today = day(2022, 7, 27);
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::on(today));
        let cache = Arc::new(MemoryWeatherCache::new());
        let client = Arc::new(StubClient::success(CLEAR_PAYLOAD));
        let fetcher = WeatherFetcher::new(client.clone(), clock, "seoul");

        let outcome = WeatherScheduler::new(fetcher.clone(), cache.clone()).run_once().await;

        let stored = cache.find_all(today).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(outcome, RefreshOutcome::Stored(stored[0].clone()));
        assert_eq!(client.calls(), 1);

        // A diary write for today now uses the stored row without another call.
        let resolved = DiaryWeatherResolver::new(cache, fetcher).resolve(today).await.unwrap();
        assert_eq!(resolved, stored[0]);
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn run_once_skips_on_parse_failure() {
        let today = day(2022, 7, 27);
        let cache = Arc::new(MemoryWeatherCache::new());
        let client = Arc::new(StubClient::success(r#"{"main":{"temp":290.0},"weather":[]}"#));
        let fetcher = WeatherFetcher::new(client, Arc::new(FixedClock::on(today)), "seoul");

        let outcome = WeatherScheduler::new(fetcher, cache.clone()).run_once().await;

        assert!(matches!(outcome, RefreshOutcome::Skipped(_)));
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn run_once_skips_when_provider_unreachable() {
        let cache = Arc::new(MemoryWeatherCache::new());
        let client = Arc::new(StubClient::unavailable());
        let fetcher =
            WeatherFetcher::new(client, Arc::new(FixedClock::on(day(2022, 7, 27))), "seoul");

        let outcome = WeatherScheduler::new(fetcher, cache.clone()).run_once().await;

        match outcome {
            RefreshOutcome::Skipped(reason) => assert!(reason.contains("unavailable")),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn repeated_runs_append_rows() {
        let today = day(2022, 7, 27);
        let cache = Arc::new(MemoryWeatherCache::new());
        let client = Arc::new(StubClient::success(CLEAR_PAYLOAD));
        let fetcher = WeatherFetcher::new(client, Arc::new(FixedClock::on(today)), "seoul");
        let scheduler = WeatherScheduler::new(fetcher, cache.clone());

        scheduler.run_once().await;
        scheduler.run_once().await;

        assert_eq!(cache.find_all(today).await.unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_fires_at_configured_time() {
        let clock: Arc<dyn Clock> =
            Arc::new(FixedClock::new(day(2022, 7, 27).and_time(at(0, 0))));
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = fired.clone();
        let handle = DailyTrigger::new(at(1, 0), clock).spawn(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_secs(59 * 60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2 * 60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // The clock never moves, so only the previous run keeps the next one a day out.
        tokio::time::sleep(Duration::from_secs(3 * 3600)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        handle.abort();
    }
}
