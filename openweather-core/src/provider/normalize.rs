//! Decoding of raw payloads into [`Weather`] / [`Forecast`].
//!
//! Two wire shapes are understood:
//! - the clean shape produced by serializing [`Weather`] itself;
//! - the OpenWeatherMap shape (`dt`, `main.{temp,temp_min,temp_max}`, `weather[]`).
//!
//! The clean decoder is tried first. Only a schema mismatch falls through to the
//! OpenWeatherMap decoder; malformed JSON fails straight away.

use chrono::DateTime;
use serde::Deserialize;
use serde_json::{error::Category, value::RawValue};
use thiserror::Error;

use crate::{
    error::WeatherError,
    model::{Condition, Forecast, Weather},
};

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed JSON: {0}")]
    Malformed(serde_json::Error),

    #[error("payload does not match the expected schema: {0}")]
    Mismatch(serde_json::Error),

    #[error("weather condition list is empty")]
    NoConditions,

    #[error("timestamp {0} is out of range")]
    InvalidTimestamp(i64),
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        match err.classify() {
            Category::Data => DecodeError::Mismatch(err),
            Category::Syntax | Category::Eof | Category::Io => DecodeError::Malformed(err),
        }
    }
}

impl From<DecodeError> for WeatherError {
    fn from(err: DecodeError) -> Self {
        WeatherError::InvalidData(err.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    temp_min: f64,
    temp_max: f64,
}

#[derive(Debug, Deserialize)]
struct OwInfo {
    description: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct OwEntry {
    dt: i64,
    main: OwMain,
    weather: Vec<OwInfo>,
}

#[derive(Debug, Deserialize)]
struct OwForecast {
    list: Vec<Box<RawValue>>,
}

impl TryFrom<OwEntry> for Weather {
    type Error = DecodeError;

    fn try_from(entry: OwEntry) -> Result<Self, Self::Error> {
        let date = DateTime::from_timestamp(entry.dt, 0)
            .ok_or(DecodeError::InvalidTimestamp(entry.dt))?;

        let info = entry.weather.into_iter().next().ok_or(DecodeError::NoConditions)?;

        Ok(Weather {
            date,
            temp: entry.main.temp,
            min_temp: entry.main.temp_min,
            max_temp: entry.main.temp_max,
            is_day: info.icon.ends_with('d'),
            condition: Condition::from_icon(&info.icon),
            title: info.description,
        })
    }
}

pub fn decode_clean(bytes: &[u8]) -> Result<Weather, DecodeError> {
    Ok(serde_json::from_slice(bytes)?)
}

pub fn decode_openweather(bytes: &[u8]) -> Result<Weather, DecodeError> {
    let entry: OwEntry = serde_json::from_slice(bytes)?;
    entry.try_into()
}

pub fn normalize_weather(bytes: &[u8]) -> Result<Weather, WeatherError> {
    match decode_clean(bytes) {
        Ok(weather) => Ok(weather),
        Err(DecodeError::Mismatch(_)) => Ok(decode_openweather(bytes)?),
        Err(err) => Err(err.into()),
    }
}

/// Decode every element of the top-level `list` array, keeping source order.
pub fn normalize_forecast(bytes: &[u8]) -> Result<Forecast, WeatherError> {
    let envelope: OwForecast = serde_json::from_slice(bytes).map_err(DecodeError::from)?;

    envelope
        .list
        .iter()
        .map(|item| normalize_weather(item.get().as_bytes()))
        .collect()
}
