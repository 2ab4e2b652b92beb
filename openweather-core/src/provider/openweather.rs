use async_trait::async_trait;
use std::sync::Arc;

use crate::{
    cache::{Cache, Expiry},
    error::WeatherError,
    model::{FetchRequest, Forecast, Weather},
    provider::{
        Operation, RequestDescriptor, WeatherProvider,
        normalize::{normalize_forecast, normalize_weather},
    },
    transport::{HttpMethod, Transport},
};

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

/// OpenWeatherMap "current weather" and "5 day / 3 hour forecast" endpoints.
///
/// Every fetch checks the cache first; a miss issues exactly one GET and, when
/// the request asks for it, stores the raw response body before decoding.
#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    app_id: String,
    base_url: String,
    transport: Arc<dyn Transport>,
    cache: Arc<Cache>,
}

impl OpenWeatherProvider {
    pub fn new(app_id: String, transport: Arc<dyn Transport>, cache: Arc<Cache>) -> Self {
        Self {
            app_id,
            base_url: DEFAULT_BASE_URL.to_string(),
            transport,
            cache,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn cache(&self) -> &Arc<Cache> {
        &self.cache
    }

    /// Raw body for `operation`, from the cache when possible.
    async fn fetch_raw(
        &self,
        operation: Operation,
        request: &FetchRequest,
    ) -> Result<Vec<u8>, WeatherError> {
        let descriptor = RequestDescriptor::new(operation, &self.app_id, request);
        let key = descriptor.cache_key();

        if let Some(bytes) = self.cache.get(&key) {
            tracing::debug!("Cache hit for {key}");
            return Ok(bytes);
        }
        tracing::debug!("Cache miss for {key}");

        let url = descriptor.url(&self.base_url)?;

        tracing::info!(
            "Fetching {operation} from OpenWeather for ({}, {})",
            request.latitude,
            request.longitude
        );
        let bytes = self.transport.perform_request(&url, HttpMethod::Get, None, &[]).await?;

        if !request.cache_duration.is_zero() {
            self.cache.put(&key, bytes.clone(), Expiry::After(request.cache_duration));
            tracing::debug!("Cached {key} for {:?}", request.cache_duration);
        }

        Ok(bytes)
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn fetch_weather(&self, request: &FetchRequest) -> Result<Weather, WeatherError> {
        let bytes = self.fetch_raw(Operation::Weather, request).await?;
        normalize_weather(&bytes)
    }

    async fn fetch_forecast(&self, request: &FetchRequest) -> Result<Forecast, WeatherError> {
        let bytes = self.fetch_raw(Operation::Forecast, request).await?;
        normalize_forecast(&bytes)
    }
}
