//! Public entry point: [`OpenWeatherClient`].

use anyhow::{Context, Result, bail};
use std::{path::PathBuf, sync::Arc};
use tokio::runtime::Handle;

use crate::{
    cache::{Cache, Strategy},
    config::Config,
    error::WeatherError,
    model::{FetchRequest, Forecast, Weather},
    orchestrator::{DEFAULT_MAX_CONCURRENCY, FetchHandle, Orchestrator, UnitHandle},
    provider::{DEFAULT_BASE_URL, OpenWeatherProvider, WeatherProvider},
    transport::{HttpTransport, Transport},
};

/// Fetches current weather and forecasts, one unit of work per call.
///
/// Must be built inside a tokio runtime (or given a runtime handle).
#[derive(Debug)]
pub struct OpenWeatherClient {
    provider: Arc<dyn WeatherProvider>,
    orchestrator: Orchestrator,
}

impl OpenWeatherClient {
    pub fn builder(app_id: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(app_id.into())
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let mut builder = Self::builder(config.app_id()?);

        if let Some(base_url) = &config.base_url {
            builder = builder.base_url(base_url.clone());
        }
        if let Some(max) = config.max_concurrency {
            builder = builder.max_concurrency(max);
        }
        if config.cache_strategy()? == Strategy::Ephemeral {
            builder = builder.ephemeral_cache();
        }

        builder.build()
    }

    pub fn new(provider: Arc<dyn WeatherProvider>, orchestrator: Orchestrator) -> Self {
        Self { provider, orchestrator }
    }

    pub fn fetch_weather(&self, request: FetchRequest) -> FetchHandle<Weather> {
        let provider = Arc::clone(&self.provider);
        self.orchestrator
            .submit_future(move || async move { provider.fetch_weather(&request).await })
    }

    pub fn fetch_forecast(&self, request: FetchRequest) -> FetchHandle<Forecast> {
        let provider = Arc::clone(&self.provider);
        self.orchestrator
            .submit_future(move || async move { provider.fetch_forecast(&request).await })
    }

    /// Callback flavour of [`OpenWeatherClient::fetch_weather`].
    ///
    /// `callback` runs on the client's dispatcher, never concurrently with
    /// another callback of the same client.
    pub fn fetch_weather_with<C>(&self, request: FetchRequest, callback: C) -> UnitHandle
    where
        C: FnOnce(Result<Weather, WeatherError>) + Send + 'static,
    {
        let provider = Arc::clone(&self.provider);
        self.orchestrator.submit(
            move || async move { provider.fetch_weather(&request).await },
            callback,
        )
    }

    /// Callback flavour of [`OpenWeatherClient::fetch_forecast`].
    pub fn fetch_forecast_with<C>(&self, request: FetchRequest, callback: C) -> UnitHandle
    where
        C: FnOnce(Result<Forecast, WeatherError>) + Send + 'static,
    {
        let provider = Arc::clone(&self.provider);
        self.orchestrator.submit(
            move || async move { provider.fetch_forecast(&request).await },
            callback,
        )
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Cancel pending fetches and drop results of running ones.
    pub fn shutdown(&self) {
        self.orchestrator.shutdown();
    }
}

#[derive(Debug)]
enum CacheChoice {
    DefaultPersistent,
    Ephemeral,
    Persistent(PathBuf),
    Shared(Arc<Cache>),
}

#[derive(Debug)]
pub struct ClientBuilder {
    app_id: String,
    base_url: String,
    cache: CacheChoice,
    transport: Option<Arc<dyn Transport>>,
    max_concurrency: usize,
    runtime: Option<Handle>,
}

impl ClientBuilder {
    fn new(app_id: String) -> Self {
        Self {
            app_id,
            base_url: DEFAULT_BASE_URL.to_string(),
            cache: CacheChoice::DefaultPersistent,
            transport: None,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            runtime: None,
        }
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Keep responses in memory only.
    pub fn ephemeral_cache(mut self) -> Self {
        self.cache = CacheChoice::Ephemeral;
        self
    }

    /// Keep responses in a JSON document at `path`.
    pub fn persistent_cache(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache = CacheChoice::Persistent(path.into());
        self
    }

    /// Share an existing cache instance, e.g. between several clients.
    pub fn cache(mut self, cache: Arc<Cache>) -> Self {
        self.cache = CacheChoice::Shared(cache);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn build(self) -> Result<OpenWeatherClient> {
        if self.app_id.trim().is_empty() {
            bail!(
                "OpenWeather app id is empty.\n\
                 Hint: run `openweather configure` and enter your API key."
            );
        }

        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current()
                .context("OpenWeatherClient must be built inside a tokio runtime")?,
        };

        let cache = match self.cache {
            CacheChoice::DefaultPersistent => Arc::new(Cache::persistent(Config::cache_file_path()?)),
            CacheChoice::Ephemeral => Arc::new(Cache::ephemeral()),
            CacheChoice::Persistent(path) => Arc::new(Cache::persistent(path)),
            CacheChoice::Shared(cache) => cache,
        };

        let transport = self.transport.unwrap_or_else(|| Arc::new(HttpTransport::new()));

        tracing::debug!(
            "Building OpenWeather client: base_url={}, cache={}, max_concurrency={}",
            self.base_url,
            cache.strategy().as_str(),
            self.max_concurrency
        );

        let provider = OpenWeatherProvider::new(self.app_id, transport, cache)
            .with_base_url(self.base_url);

        Ok(OpenWeatherClient::new(
            Arc::new(provider),
            Orchestrator::new(runtime, self.max_concurrency),
        ))
    }
}
