//! Cached OpenWeatherMap client.
//!
//! This crate defines:
//! - The fetch facade ([`OpenWeatherClient`]) and its unit-of-work orchestrator
//! - A key/value cache with per-key expiration, in memory or on disk
//! - The HTTP transport and the payload normalizer for both wire shapes
//! - Configuration & credentials handling
//!
//! It is used by `openweather-cli`, but can also be reused by other binaries or services.

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod provider;
pub mod transport;

pub use cache::{Cache, Expiry, Strategy};
pub use client::{ClientBuilder, OpenWeatherClient};
pub use config::Config;
pub use error::WeatherError;
pub use model::{Condition, FetchRequest, Forecast, Language, Units, Weather};
pub use orchestrator::{FetchHandle, Orchestrator, UnitHandle, UnitState};
pub use provider::{OpenWeatherProvider, WeatherProvider};
pub use transport::{HttpTransport, Transport};
