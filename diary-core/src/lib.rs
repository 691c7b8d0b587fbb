//! Core library for the weather diary.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The OpenWeather client and payload parser
//! - The per-day weather cache and its daily refresh
//! - Weather resolution for diary entries, and the diary itself
//!
//! It is used by `diary-cli`, but can also be embedded in other binaries or services.

pub mod cache;
pub mod clock;
pub mod config;
pub mod diary;
pub mod error;
pub mod fetch;
pub mod model;
pub mod parser;
pub mod provider;
pub mod resolver;
pub mod scheduler;

mod storage;

pub use cache::{MemoryWeatherCache, SqliteWeatherCache, WeatherCache};
pub use clock::{Clock, SystemClock};
pub use config::Config;
pub use diary::{DiaryService, DiaryStore, MemoryDiaryStore, SqliteDiaryStore};
pub use error::{DiaryError, ParseFailure, ResolutionFailure};
pub use fetch::WeatherFetcher;
pub use model::{DiaryEntry, RawResponse, WeatherRecord};
pub use provider::WeatherClient;
pub use resolver::{DiaryWeatherResolver, OnDemandPolicy};
pub use scheduler::{DailyTrigger, RefreshOutcome, WeatherScheduler};
pub use storage::Database;
