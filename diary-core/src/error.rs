use chrono::NaiveDate;

/// Why a provider response could not be turned into a [`crate::WeatherRecord`].
#[derive(Debug, thiserror::Error)]
pub enum ParseFailure {
    #[error("weather provider unavailable: {0}")]
    Unavailable(String),

    #[error("weather provider returned status {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("malformed weather payload: {0}")]
    Malformed(String),

    #[error("weather payload has an empty `weather` list")]
    MissingCondition,
}

/// No cached weather for the date and the on-demand fetch failed too.
#[derive(Debug, thiserror::Error)]
pub enum ResolutionFailure {
    #[error("no weather available for {date}: {source}")]
    Fetch {
        date: NaiveDate,
        #[source]
        source: ParseFailure,
    },

    #[error("weather cache could not be read for {date}: {source}")]
    CacheUnavailable {
        date: NaiveDate,
        #[source]
        source: anyhow::Error,
    },
}

impl ResolutionFailure {
    pub fn date(&self) -> NaiveDate {
        match self {
            Self::Fetch { date, .. } | Self::CacheUnavailable { date, .. } => *date,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DiaryError {
    #[error("weather unavailable for {date}, diary entry not created")]
    WeatherUnavailable {
        date: NaiveDate,
        #[source]
        source: ResolutionFailure,
    },

    #[error("no diary entry for {0}")]
    NotFound(NaiveDate),

    #[error("invalid date range: {start} is after {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("diary storage error: {0}")]
    Storage(#[from] anyhow::Error),
}
