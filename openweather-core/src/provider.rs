use async_trait::async_trait;
use reqwest::Url;
use std::fmt::{self, Debug};

use crate::{
    error::WeatherError,
    model::{FetchRequest, Forecast, Language, Units, Weather},
};

pub mod normalize;
pub mod openweather;

pub use openweather::{DEFAULT_BASE_URL, OpenWeatherProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Weather,
    Forecast,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Weather => "weather",
            Operation::Forecast => "forecast",
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Operation::Weather => "/weather",
            Operation::Forecast => "/forecast",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully resolved request for one operation, built fresh per call.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    pub operation: Operation,
    pub latitude: f64,
    pub longitude: f64,
    pub units: Units,
    pub language: Language,
    /// Query parameters in wire order.
    pub params: Vec<(&'static str, String)>,
}

impl RequestDescriptor {
    pub fn new(operation: Operation, app_id: &str, request: &FetchRequest) -> Self {
        let params = vec![
            ("appid", app_id.to_string()),
            ("units", request.units.as_str().to_string()),
            ("lang", request.language.as_str().to_string()),
            ("lat", format_coordinate(request.latitude)),
            ("lon", format_coordinate(request.longitude)),
        ];

        Self {
            operation,
            latitude: request.latitude,
            longitude: request.longitude,
            units: request.units,
            language: request.language,
            params,
        }
    }

    /// `"<op>:<lat>;<lon>;<lang>;<units>"`
    pub fn cache_key(&self) -> String {
        format!(
            "{}:{};{};{};{}",
            self.operation,
            format_coordinate(self.latitude),
            format_coordinate(self.longitude),
            self.language,
            self.units,
        )
    }

    pub fn url(&self, base_url: &str) -> Result<Url, WeatherError> {
        let endpoint = format!("{}{}", base_url.trim_end_matches('/'), self.operation.path());

        Url::parse_with_params(&endpoint, &self.params)
            .map_err(|err| WeatherError::InvalidUrl(format!("{endpoint}: {err}")))
    }
}

/// Shortest round-trip digits in fixed notation, always with a decimal point
/// (`10.0`, `-3.25`, `0.0000001`).
fn format_coordinate(value: f64) -> String {
    let text = value.to_string();
    if value.is_finite() && !text.contains('.') {
        format!("{text}.0")
    } else {
        text
    }
}

#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn fetch_weather(&self, request: &FetchRequest) -> Result<Weather, WeatherError>;

    async fn fetch_forecast(&self, request: &FetchRequest) -> Result<Forecast, WeatherError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn request(lat: f64, lon: f64, units: Units, language: Language) -> FetchRequest {
        FetchRequest::new(lat, lon, units, language, Duration::from_secs(60))
    }

    #[test]
    fn cache_key_has_exact_format() {
        let req = request(10.0, 20.0, Units::Metric, Language::En);

        let weather = RequestDescriptor::new(Operation::Weather, "KEY", &req);
        let forecast = RequestDescriptor::new(Operation::Forecast, "KEY", &req);

        assert_eq!(weather.cache_key(), "weather:10.0;20.0;en;metric");
        assert_eq!(forecast.cache_key(), "forecast:10.0;20.0;en;metric");
    }

    #[test]
    fn cache_key_is_deterministic() {
        let a = RequestDescriptor::new(Operation::Weather, "A", &request(-23.5505, -46.6333, Units::Imperial, Language::Pt));
        let b = RequestDescriptor::new(Operation::Weather, "B", &request(-23.5505, -46.6333, Units::Imperial, Language::Pt));

        // The credential is not part of the key.
        assert_eq!(a.cache_key(), b.cache_key());
        assert_eq!(a.cache_key(), "weather:-23.5505;-46.6333;pt;imperial");
    }

    #[test]
    fn cache_key_changes_with_every_field() {
        let base = RequestDescriptor::new(Operation::Weather, "K", &request(1.0, 2.0, Units::Metric, Language::En)).cache_key();

        let variants = [
            request(1.5, 2.0, Units::Metric, Language::En),
            request(1.0, 2.5, Units::Metric, Language::En),
            request(1.0, 2.0, Units::Imperial, Language::En),
            request(1.0, 2.0, Units::Metric, Language::Pt),
        ];

        for variant in &variants {
            let key = RequestDescriptor::new(Operation::Weather, "K", variant).cache_key();
            assert_ne!(key, base, "{variant:?} should change the key");
        }

        let other_op = RequestDescriptor::new(Operation::Forecast, "K", &request(1.0, 2.0, Units::Metric, Language::En));
        assert_ne!(other_op.cache_key(), base);
    }

    #[test]
    fn url_carries_query_in_order() {
        let req = request(10.0, 20.0, Units::Metric, Language::En);
        let url = RequestDescriptor::new(Operation::Forecast, "KEY", &req)
            .url("https://api.openweathermap.org/data/2.5/")
            .unwrap();

        assert_eq!(
            url.as_str(),
            "https://api.openweathermap.org/data/2.5/forecast?appid=KEY&units=metric&lang=en&lat=10.0&lon=20.0"
        );
    }

    #[test]
    fn bad_base_url_is_invalid_url() {
        let req = request(10.0, 20.0, Units::Metric, Language::En);
        let err = RequestDescriptor::new(Operation::Weather, "KEY", &req)
            .url("not a url")
            .unwrap_err();

        assert!(matches!(err, WeatherError::InvalidUrl(_)));
    }

    #[test]
    fn coordinates_never_use_exponent_notation() {
        assert_eq!(format_coordinate(10.0), "10.0");
        assert_eq!(format_coordinate(-3.25), "-3.25");
        assert_eq!(format_coordinate(1e-7), "0.0000001");
        assert_eq!(format_coordinate(1e16), "10000000000000000.0");

        let req = request(1e-7, 20.0, Units::Metric, Language::En);
        let descriptor = RequestDescriptor::new(Operation::Weather, "K", &req);
        assert_eq!(descriptor.cache_key(), "weather:0.0000001;20.0;en;metric");
    }

    #[test]
    fn operation_names() {
        assert_eq!(Operation::Weather.to_string(), "weather");
        assert_eq!(Operation::Forecast.path(), "/forecast");
    }
}
