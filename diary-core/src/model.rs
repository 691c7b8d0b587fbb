use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One day's weather as reported by the provider.
///
/// `temperature_kelvin` is the provider value as-is; nothing in this crate
/// converts units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub date: NaiveDate,
    pub condition: String,
    pub icon_code: String,
    pub temperature_kelvin: f64,
}

/// A diary entry with the weather copied in at creation time.
///
/// The copy is a snapshot; the entry never points back at the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiaryEntry {
    pub date: NaiveDate,
    pub text: String,
    pub condition: String,
    pub icon_code: String,
    pub temperature_kelvin: f64,
}

impl DiaryEntry {
    pub fn new(date: NaiveDate, weather: &WeatherRecord, text: impl Into<String>) -> Self {
        Self {
            date,
            text: text.into(),
            condition: weather.condition.clone(),
            icon_code: weather.icon_code.clone(),
            temperature_kelvin: weather.temperature_kelvin,
        }
    }
}

/// What came back from the provider's current-weather endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawResponse {
    /// HTTP 200 body.
    Success(String),
    /// Any other status; the body is kept so the parser can still report it.
    ProviderError { status: u16, body: String },
    /// The provider could not be reached at all (DNS, connect, timeout, I/O).
    Unavailable(String),
}
