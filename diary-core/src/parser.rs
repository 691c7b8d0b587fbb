//! Decoding of OpenWeather current-weather payloads into [`WeatherRecord`]s.

use chrono::NaiveDate;
use serde::Deserialize;

use crate::{ParseFailure, RawResponse, WeatherRecord, provider::openweather::truncate_body};

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    main: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    main: OwMain,
    weather: Vec<OwWeather>,
}

#[derive(Debug, Deserialize)]
struct OwErrorResponse {
    message: String,
}

/// Turn a raw provider response into a record dated `today`.
///
/// The provider only reports current conditions, so the date never comes from
/// the payload. Error-status bodies are still decoded in case they carry a
/// usable payload; otherwise the provider's message is reported.
pub fn parse(raw: &RawResponse, today: NaiveDate) -> Result<WeatherRecord, ParseFailure> {
    match raw {
        RawResponse::Success(body) => parse_body(body, today),
        RawResponse::ProviderError { status, body } => {
            parse_body(body, today).map_err(|_| provider_failure(*status, body))
        }
        RawResponse::Unavailable(reason) => Err(ParseFailure::Unavailable(reason.clone())),
    }
}

fn parse_body(body: &str, today: NaiveDate) -> Result<WeatherRecord, ParseFailure> {
    let parsed: OwCurrentResponse =
        serde_json::from_str(body).map_err(|err| ParseFailure::Malformed(err.to_string()))?;

    let weather = parsed.weather.into_iter().next().ok_or(ParseFailure::MissingCondition)?;

    Ok(WeatherRecord {
        date: today,
        condition: weather.main,
        icon_code: weather.icon,
        temperature_kelvin: parsed.main.temp,
    })
}

fn provider_failure(status: u16, body: &str) -> ParseFailure {
    let message = serde_json::from_str::<OwErrorResponse>(body)
        .map(|err| err.message)
        .unwrap_or_else(|_| truncate_body(body));

    ParseFailure::Provider { status, message }
}
