//! Per-day weather cache.
//!
//! The cache is append-only and does not enforce one row per date: the daily
//! refresh and on-demand fetches may both write the same day. Reads resolve
//! that by insertion order, the oldest row wins.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::params;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::{WeatherRecord, storage::Database};

#[async_trait]
pub trait WeatherCache: Send + Sync + std::fmt::Debug {
    /// Append a row. Never replaces an existing row for the same date.
    async fn store(&self, record: WeatherRecord) -> Result<()>;

    /// Every row for `date`, in insertion order.
    async fn find_all(&self, date: NaiveDate) -> Result<Vec<WeatherRecord>>;

    /// The first row stored for `date`, if any.
    async fn find_one(&self, date: NaiveDate) -> Result<Option<WeatherRecord>> {
        Ok(self.find_all(date).await?.into_iter().next())
    }
}

#[derive(Debug, Default)]
pub struct MemoryWeatherCache {
    rows: RwLock<Vec<WeatherRecord>>,
}

impl MemoryWeatherCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

#[async_trait]
impl WeatherCache for MemoryWeatherCache {
    async fn store(&self, record: WeatherRecord) -> Result<()> {
        self.rows.write().await.push(record);
        Ok(())
    }

    async fn find_all(&self, date: NaiveDate) -> Result<Vec<WeatherRecord>> {
        let rows = self.rows.read().await;
        Ok(rows.iter().filter(|r| r.date == date).cloned().collect())
    }
}

/// Weather rows in the `weather` table; row id order is insertion order.
#[derive(Debug, Clone)]
pub struct SqliteWeatherCache {
    db: Arc<Database>,
}

impl SqliteWeatherCache {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl WeatherCache for SqliteWeatherCache {
    async fn store(&self, record: WeatherRecord) -> Result<()> {
        self.db
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO weather (date, condition, icon_code, temperature_kelvin) \
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        record.date,
                        record.condition,
                        record.icon_code,
                        record.temperature_kelvin
                    ],
                )
            })
            .await?;
        Ok(())
    }

    async fn find_all(&self, date: NaiveDate) -> Result<Vec<WeatherRecord>> {
        self.db
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT date, condition, icon_code, temperature_kelvin \
                     FROM weather WHERE date = ?1 ORDER BY id",
                )?;
                let rows = stmt.query_map(params![date], |row| {
                    Ok(WeatherRecord {
                        date: row.get(0)?,
                        condition: row.get(1)?,
                        icon_code: row.get(2)?,
                        temperature_kelvin: row.get(3)?,
                    })
                })?;
                rows.collect()
            })
            .await
    }
}
