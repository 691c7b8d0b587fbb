//! Diary entries and the service that attaches weather to them.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::{OptionalExtension, TransactionBehavior, params};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::{DiaryEntry, DiaryError, DiaryWeatherResolver, storage::Database};

/// Date-keyed diary storage. Several entries may share a date.
#[async_trait]
pub trait DiaryStore: Send + Sync + std::fmt::Debug {
    async fn insert(&self, entry: DiaryEntry) -> Result<()>;

    /// Entries for `date`, in insertion order.
    async fn find_by_date(&self, date: NaiveDate) -> Result<Vec<DiaryEntry>>;

    /// Entries with `start <= date <= end`, by date then insertion order.
    async fn find_between(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<DiaryEntry>>;

    /// Replace the text of the first entry for `date`.
    async fn update_first(&self, date: NaiveDate, text: String) -> Result<Option<DiaryEntry>>;

    /// Remove every entry for `date`, returning how many went.
    async fn delete_by_date(&self, date: NaiveDate) -> Result<usize>;
}

fn between(entries: &[DiaryEntry], start: NaiveDate, end: NaiveDate) -> Vec<DiaryEntry> {
    let mut found: Vec<DiaryEntry> =
        entries.iter().filter(|e| e.date >= start && e.date <= end).cloned().collect();
    // stable sort keeps insertion order within a day
    found.sort_by_key(|e| e.date);
    found
}

fn update_first(entries: &mut [DiaryEntry], date: NaiveDate, text: String) -> Option<DiaryEntry> {
    let entry = entries.iter_mut().find(|e| e.date == date)?;
    entry.text = text;
    Some(entry.clone())
}

fn delete_by_date(entries: &mut Vec<DiaryEntry>, date: NaiveDate) -> usize {
    let before = entries.len();
    entries.retain(|e| e.date != date);
    before - entries.len()
}

#[derive(Debug, Default)]
pub struct MemoryDiaryStore {
    entries: RwLock<Vec<DiaryEntry>>,
}

impl MemoryDiaryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DiaryStore for MemoryDiaryStore {
    async fn insert(&self, entry: DiaryEntry) -> Result<()> {
        self.entries.write().await.push(entry);
        Ok(())
    }

    async fn find_by_date(&self, date: NaiveDate) -> Result<Vec<DiaryEntry>> {
        let entries = self.entries.read().await;
        Ok(entries.iter().filter(|e| e.date == date).cloned().collect())
    }

    async fn find_between(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<DiaryEntry>> {
        Ok(between(&self.entries.read().await, start, end))
    }

    async fn update_first(&self, date: NaiveDate, text: String) -> Result<Option<DiaryEntry>> {
        Ok(update_first(&mut self.entries.write().await, date, text))
    }

    async fn delete_by_date(&self, date: NaiveDate) -> Result<usize> {
        Ok(delete_by_date(&mut *self.entries.write().await, date))
    }
}

/// Diary entries in the `diary` table; row id order is insertion order.
#[derive(Debug, Clone)]
pub struct SqliteDiaryStore {
    db: Arc<Database>,
}

impl SqliteDiaryStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

const DIARY_COLUMNS: &str = "date, text, condition, icon_code, temperature_kelvin";

fn entry_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DiaryEntry> {
    Ok(DiaryEntry {
        date: row.get(0)?,
        text: row.get(1)?,
        condition: row.get(2)?,
        icon_code: row.get(3)?,
        temperature_kelvin: row.get(4)?,
    })
}

#[async_trait]
impl DiaryStore for SqliteDiaryStore {
    async fn insert(&self, entry: DiaryEntry) -> Result<()> {
        self.db
            .call(move |conn| {
                conn.execute(
                    &format!("INSERT INTO diary ({DIARY_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5)"),
                    params![
                        entry.date,
                        entry.text,
                        entry.condition,
                        entry.icon_code,
                        entry.temperature_kelvin
                    ],
                )
            })
            .await?;
        Ok(())
    }

    async fn find_by_date(&self, date: NaiveDate) -> Result<Vec<DiaryEntry>> {
        self.db
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {DIARY_COLUMNS} FROM diary WHERE date = ?1 ORDER BY id"
                ))?;
                let rows = stmt.query_map(params![date], entry_from_row)?;
                rows.collect()
            })
            .await
    }

    async fn find_between(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<DiaryEntry>> {
        self.db
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {DIARY_COLUMNS} FROM diary \
                     WHERE date BETWEEN ?1 AND ?2 ORDER BY date, id"
                ))?;
                let rows = stmt.query_map(params![start, end], entry_from_row)?;
                rows.collect()
            })
            .await
    }

    async fn update_first(&self, date: NaiveDate, text: String) -> Result<Option<DiaryEntry>> {
        self.db
            .call(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let id: Option<i64> = tx
                    .query_row(
                        "SELECT id FROM diary WHERE date = ?1 ORDER BY id LIMIT 1",
                        params![date],
                        |row| row.get(0),
                    )
                    .optional()?;
                let Some(id) = id else {
                    return Ok(None);
                };

                tx.execute("UPDATE diary SET text = ?1 WHERE id = ?2", params![text, id])?;
                let entry = tx.query_row(
                    &format!("SELECT {DIARY_COLUMNS} FROM diary WHERE id = ?1"),
                    params![id],
                    entry_from_row,
                )?;
                tx.commit()?;
                Ok(Some(entry))
            })
            .await
    }

    async fn delete_by_date(&self, date: NaiveDate) -> Result<usize> {
        self.db
            .call(move |conn| conn.execute("DELETE FROM diary WHERE date = ?1", params![date]))
            .await
    }
}

/// Create, read, update and delete diary entries.
///
/// Only creation needs weather: it asks the given resolver for the day's
/// weather first and refuses to write an entry without it.
#[derive(Debug, Clone)]
pub struct DiaryService {
    store: Arc<dyn DiaryStore>,
}

impl DiaryService {
    pub fn new(store: Arc<dyn DiaryStore>) -> Self {
        Self { store }
    }

    pub async fn create(
        &self,
        resolver: &DiaryWeatherResolver,
        date: NaiveDate,
        text: &str,
    ) -> Result<DiaryEntry, DiaryError> {
        tracing::info!(%date, "Creating diary entry");

        let weather = resolver.resolve(date).await.map_err(|source| {
            tracing::warn!(%date, error = %source, "No weather for diary entry");
            DiaryError::WeatherUnavailable { date, source }
        })?;

        let entry = DiaryEntry::new(date, &weather, text);
        self.store.insert(entry.clone()).await?;

        tracing::info!(%date, condition = %entry.condition, "Diary entry created");
        Ok(entry)
    }

    pub async fn read(&self, date: NaiveDate) -> Result<Vec<DiaryEntry>, DiaryError> {
        tracing::debug!(%date, "Reading diary");
        Ok(self.store.find_by_date(date).await?)
    }

    pub async fn read_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DiaryEntry>, DiaryError> {
        if start > end {
            return Err(DiaryError::InvalidRange { start, end });
        }
        Ok(self.store.find_between(start, end).await?)
    }

    /// Rewrite the text of the first entry on `date`. Weather is left as it was.
    pub async fn update(&self, date: NaiveDate, text: &str) -> Result<DiaryEntry, DiaryError> {
        let updated = self.store.update_first(date, text.to_string()).await?;
        let entry = updated.ok_or(DiaryError::NotFound(date))?;
        tracing::info!(%date, "Diary entry updated");
        Ok(entry)
    }

    pub async fn delete(&self, date: NaiveDate) -> Result<usize, DiaryError> {
        let removed = self.store.delete_by_date(date).await?;
        tracing::info!(%date, removed, "Diary entries deleted");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        MemoryWeatherCache, ResolutionFailure, WeatherCache, WeatherFetcher, WeatherRecord,
        clock::FixedClock,
        testing::{CLEAR_PAYLOAD, StubClient, day},
    };

    struct Fixture {
        service: DiaryService,
        resolver: DiaryWeatherResolver,
        store: Arc<MemoryDiaryStore>,
        cache: Arc<MemoryWeatherCache>,
        client: Arc<StubClient>,
    }

    fn fixture(client: StubClient, today: NaiveDate) -> Fixture {
        let store = Arc::new(MemoryDiaryStore::new());
        let cache = Arc::new(MemoryWeatherCache::new());
        let client = Arc::new(client);
        let fetcher = WeatherFetcher::new(client.clone(), Arc::new(FixedClock::on(today)), "seoul");
        let resolver = DiaryWeatherResolver::new(cache.clone(), fetcher);

        Fixture { service: DiaryService::new(store.clone()), resolver, store, cache, client }
    }

    #[tokio::test]
    async fn create_attaches_cached_weather() {
        let date = day(2022, 7, 20);
        let f = fixture(StubClient::success(CLEAR_PAYLOAD), day(2022, 7, 27));
        let rain = WeatherRecord {
            date,
            condition: "Rain".into(),
            icon_code: "10d".into(),
            temperature_kelvin: 293.2,
        };
        f.cache.store(rain).await.unwrap();

        let entry = f.service.create(&f.resolver, date, "wet").await.unwrap();

        assert_eq!(entry.date, date);
        assert_eq!(entry.condition, "Rain");
        assert_eq!(entry.icon_code, "10d");
        assert_eq!(entry.temperature_kelvin, 293.2);
        assert_eq!(f.client.calls(), 0);
        assert_eq!(f.store.find_by_date(date).await.unwrap(), vec![entry]);
    }

    #[tokio::test]
    async fn create_falls_back_to_live_weather() {
        let date = day(2022, 7, 27);
        let f = fixture(StubClient::success(CLEAR_PAYLOAD), date);

        let entry = f.service.create(&f.resolver, date, "sunny").await.unwrap();

        assert_eq!(entry.condition, "Clear");
        assert_eq!(entry.temperature_kelvin, 301.5);
        assert_eq!(f.client.calls(), 1);
    }

    #[tokio::test]
    async fn create_without_weather_is_explicit_failure() {
        let date = day(2022, 7, 27);
        let f = fixture(StubClient::success("not json"), date);

        let err = f.service.create(&f.resolver, date, "lost").await.unwrap_err();

        assert!(matches!(
            err,
            DiaryError::WeatherUnavailable { source: ResolutionFailure::Fetch { .. }, .. }
        ));
        assert!(f.store.find_by_date(date).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_changes_first_entry_only() {
        let date = day(2022, 7, 27);
        let f = fixture(StubClient::success(CLEAR_PAYLOAD), date);
        f.service.create(&f.resolver, date, "one").await.unwrap();
        f.service.create(&f.resolver, date, "two").await.unwrap();

        let updated = f.service.update(date, "edited").await.unwrap();

        assert_eq!(updated.text, "edited");
        let texts: Vec<String> =
            f.service.read(date).await.unwrap().into_iter().map(|e| e.text).collect();
        assert_eq!(texts, vec!["edited", "two"]);
    }

    #[tokio::test]
    async fn update_missing_date_is_not_found() {
        let f = fixture(StubClient::success(CLEAR_PAYLOAD), day(2022, 7, 27));
        let err = f.service.update(day(2022, 7, 1), "nothing").await.unwrap_err();
        assert!(matches!(err, DiaryError::NotFound(d) if d == day(2022, 7, 1)));
    }

    #[tokio::test]
    async fn read_range_is_inclusive_and_ordered() {
        let f = fixture(StubClient::success(CLEAR_PAYLOAD), day(2022, 7, 27));
        for (d, text) in [(3, "c"), (1, "a"), (5, "out"), (1, "b"), (2, "x")] {
            let weather = WeatherRecord {
                date: day(2022, 7, d),
                condition: "Clear".into(),
                icon_code: "01d".into(),
                temperature_kelvin: 300.0,
            };
            f.store.insert(DiaryEntry::new(weather.date, &weather, text)).await.unwrap();
        }

        let texts: Vec<String> = f
            .service
            .read_range(day(2022, 7, 1), day(2022, 7, 3))
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.text)
            .collect();

        assert_eq!(texts, vec!["a", "b", "x", "c"]);
    }

    #[tokio::test]
    async fn read_range_rejects_reversed_dates() {
        let f = fixture(StubClient::success(CLEAR_PAYLOAD), day(2022, 7, 27));
        let err = f.service.read_range(day(2022, 7, 27), day(2022, 7, 1)).await.unwrap_err();
        assert!(matches!(err, DiaryError::InvalidRange { .. }));
    }

    #[tokio::test]
    async fn delete_removes_every_entry_for_date() {
        let date = day(2022, 7, 27);
        let f = fixture(StubClient::success(CLEAR_PAYLOAD), date);
        f.service.create(&f.resolver, date, "one").await.unwrap();
        f.service.create(&f.resolver, date, "two").await.unwrap();

        assert_eq!(f.service.delete(date).await.unwrap(), 2);
        assert!(f.service.read(date).await.unwrap().is_empty());
        assert_eq!(f.service.delete(date).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn sqlite_store_supports_full_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("diary.db");
        let store = SqliteDiaryStore::new(Database::open(&path).unwrap());
        let weather = WeatherRecord {
            date: day(2022, 7, 27),
            condition: "Clear".into(),
            icon_code: "01d".into(),
            temperature_kelvin: 301.5,
        };

        store.insert(DiaryEntry::new(weather.date, &weather, "first")).await.unwrap();
        store.insert(DiaryEntry::new(weather.date, &weather, "again")).await.unwrap();
        store.insert(DiaryEntry::new(day(2022, 7, 28), &weather, "second")).await.unwrap();

        let updated = store.update_first(weather.date, "changed".into()).await.unwrap();
        assert_eq!(updated.map(|e| e.text), Some("changed".to_string()));
        assert_eq!(store.update_first(day(2022, 1, 1), "x".into()).await.unwrap(), None);

        let texts: Vec<String> = store
            .find_between(day(2022, 7, 1), day(2022, 7, 31))
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.text)
            .collect();
        assert_eq!(texts, vec!["changed", "again", "second"]);

        assert_eq!(store.delete_by_date(weather.date).await.unwrap(), 2);
        let reopened = SqliteDiaryStore::new(Database::open(&path).unwrap());
        let left = reopened.find_between(day(2022, 7, 1), day(2022, 7, 31)).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].text, "second");
    }

    #[tokio::test]
    async fn sqlite_range_orders_by_date_then_insertion() {
        let store = SqliteDiaryStore::new(Database::open_in_memory().unwrap());
        for (d, text) in [(3, "c"), (1, "a"), (5, "out"), (1, "b"), (2, "x")] {
            let weather = WeatherRecord {
                date: day(2022, 7, d),
                condition: "Clear".into(),
                icon_code: "01d".into(),
                temperature_kelvin: 300.0,
            };
            store.insert(DiaryEntry::new(weather.date, &weather, text)).await.unwrap();
        }

        let texts: Vec<String> = store
            .find_between(day(2022, 7, 1), day(2022, 7, 3))
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.text)
            .collect();

        assert_eq!(texts, vec!["a", "b", "x", "c"]);
    }
}
