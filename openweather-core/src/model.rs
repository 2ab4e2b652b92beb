use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, time::Duration};

/// Weather state category derived from OpenWeatherMap icon codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Condition {
    ClearSky,
    FewClouds,
    ScatteredClouds,
    BrokenClouds,
    ShowerRain,
    Rain,
    Thunderstorm,
    Snow,
    Mist,
    Unknown,
}

impl Condition {
    /// Map an icon code such as `"10d"` to a condition by its numeric prefix.
    ///
    /// See: https://openweathermap.org/weather-conditions#Icon-list
    pub fn from_icon(icon: &str) -> Self {
        match icon.get(..2) {
            Some("01") => Self::ClearSky,
            Some("02") => Self::FewClouds,
            Some("03") => Self::ScatteredClouds,
            Some("04") => Self::BrokenClouds,
            Some("09") => Self::ShowerRain,
            Some("10") => Self::Rain,
            Some("11") => Self::Thunderstorm,
            Some("13") => Self::Snow,
            Some("50") => Self::Mist,
            _ => Self::Unknown,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::ClearSky => "Clear sky",
            Self::FewClouds => "Few clouds",
            Self::ScatteredClouds => "Scattered clouds",
            Self::BrokenClouds => "Broken clouds",
            Self::ShowerRain => "Shower rain",
            Self::Rain => "Rain",
            Self::Thunderstorm => "Thunderstorm",
            Self::Snow => "Snow",
            Self::Mist => "Mist",
            Self::Unknown => "Unknown",
        }
    }
}

/// Normalized weather observation or forecast step.
///
/// Serializes to the clean wire shape, so a value written out can be read back
/// by [`crate::provider::normalize::decode_clean`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Weather {
    pub date: DateTime<Utc>,
    pub temp: f64,
    pub min_temp: f64,
    pub max_temp: f64,
    pub title: String,
    pub is_day: bool,
    pub condition: Condition,
}

/// Forecast steps in the order the source returned them.
pub type Forecast = Vec<Weather>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Units {
    #[default]
    Metric,
    Imperial,
}

impl Units {
    pub fn as_str(&self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
        }
    }

    /// Lenient parse: absent or unknown codes fall back to [`Units::Metric`].
    pub fn from_code(code: Option<&str>) -> Self {
        code.and_then(|c| c.parse().ok()).unwrap_or_default()
    }

    pub fn temperature_symbol(&self) -> &'static str {
        match self {
            Units::Metric => "°C",
            Units::Imperial => "°F",
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Units {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "metric" => Ok(Units::Metric),
            "imperial" => Ok(Units::Imperial),
            _ => Err(anyhow::anyhow!(
                "Unknown units '{value}'. Supported units: metric, imperial."
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Language {
    #[default]
    En,
    Pt,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Pt => "pt",
        }
    }

    /// Lenient parse: absent or unknown codes fall back to [`Language::En`].
    pub fn from_code(code: Option<&str>) -> Self {
        code.and_then(|c| c.parse().ok()).unwrap_or_default()
    }

    pub const fn all() -> &'static [Language] {
        &[Language::En, Language::Pt]
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "en" => Ok(Language::En),
            "pt" => Ok(Language::Pt),
            _ => Err(anyhow::anyhow!(
                "Unknown language '{value}'. Supported languages: en, pt."
            )),
        }
    }
}

/// Parameters of a single fetch call.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub latitude: f64,
    pub longitude: f64,
    pub units: Units,
    pub language: Language,
    /// How long a fresh network response stays cached. Zero disables caching.
    pub cache_duration: Duration,
}

impl FetchRequest {
    pub fn new(
        latitude: f64,
        longitude: f64,
        units: Units,
        language: Language,
        cache_duration: Duration,
    ) -> Self {
        Self { latitude, longitude, units, language, cache_duration }
    }

    /// Request with default units and language and no caching.
    pub fn at(latitude: f64, longitude: f64) -> Self {
        Self::new(latitude, longitude, Units::default(), Language::default(), Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn icon_prefix_maps_to_condition() {
        assert_eq!(Condition::from_icon("01d"), Condition::ClearSky);
        assert_eq!(Condition::from_icon("01n"), Condition::ClearSky);
        assert_eq!(Condition::from_icon("02n"), Condition::FewClouds);
        assert_eq!(Condition::from_icon("03d"), Condition::ScatteredClouds);
        assert_eq!(Condition::from_icon("04d"), Condition::BrokenClouds);
        assert_eq!(Condition::from_icon("09n"), Condition::ShowerRain);
        assert_eq!(Condition::from_icon("10d"), Condition::Rain);
        assert_eq!(Condition::from_icon("11d"), Condition::Thunderstorm);
        assert_eq!(Condition::from_icon("13n"), Condition::Snow);
        assert_eq!(Condition::from_icon("50d"), Condition::Mist);
    }

    #[test]
    fn unrecognized_icon_is_unknown() {
        assert_eq!(Condition::from_icon("99x"), Condition::Unknown);
        assert_eq!(Condition::from_icon(""), Condition::Unknown);
        assert_eq!(Condition::from_icon("1"), Condition::Unknown);
    }

    #[test]
    fn units_fall_back_to_metric() {
        assert_eq!(Units::from_code(None), Units::Metric);
        assert_eq!(Units::from_code(Some("kelvin")), Units::Metric);
        assert_eq!(Units::from_code(Some("Imperial")), Units::Imperial);
    }

    #[test]
    fn language_falls_back_to_english() {
        assert_eq!(Language::from_code(None), Language::En);
        assert_eq!(Language::from_code(Some("xx")), Language::En);
        assert_eq!(Language::from_code(Some("pt")), Language::Pt);
    }

    #[test]
    fn strict_parse_reports_unknown_codes() {
        let err = "kelvin".parse::<Units>().unwrap_err();
        assert!(err.to_string().contains("Unknown units"));

        for lang in Language::all() {
            assert_eq!(lang.as_str().parse::<Language>().unwrap(), *lang);
        }
    }

    #[test]
    fn weather_serializes_to_clean_shape() {
        let weather = Weather {
            date: DateTime::from_timestamp(1_609_459_200, 0).unwrap(),
            temp: 21.5,
            min_temp: 18.0,
            max_temp: 24.0,
            title: "clear".into(),
            is_day: true,
            condition: Condition::ClearSky,
        };

        let json = serde_json::to_value(&weather).unwrap();
        assert_eq!(json["minTemp"], 18.0);
        assert_eq!(json["isDay"], true);
        assert_eq!(json["condition"], "clearSky");
        assert_eq!(json["date"], "2021-01-01T00:00:00Z");
    }
}
