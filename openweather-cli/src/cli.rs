use anyhow::{Context, Result, anyhow};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use inquire::{CustomType, Password, PasswordDisplayMode, Select};
use std::time::Duration;

use openweather_core::{
    Config, FetchRequest, Language, OpenWeatherClient, Units, Weather,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "openweather", version, about = "Cached OpenWeatherMap CLI")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the API key and default units/language.
    Configure,

    /// Show current weather for a coordinate.
    Weather(Location),

    /// Show the 5 day / 3 hour forecast for a coordinate.
    Forecast {
        #[command(flatten)]
        location: Location,

        /// Print at most this many steps.
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[derive(Debug, Args)]
pub struct Location {
    #[arg(long, allow_hyphen_values = true)]
    pub lat: f64,

    #[arg(long, allow_hyphen_values = true)]
    pub lon: f64,

    /// "metric" or "imperial"; defaults to the configured value.
    #[arg(long)]
    pub units: Option<Units>,

    /// "en" or "pt"; defaults to the configured value.
    #[arg(long)]
    pub lang: Option<Language>,

    /// How long to cache a fresh response; 0 disables caching.
    #[arg(long)]
    pub cache_seconds: Option<u64>,
}

impl Location {
    fn into_request(self, cfg: &Config) -> FetchRequest {
        let cache_duration = self
            .cache_seconds
            .map(Duration::from_secs)
            .unwrap_or_else(|| cfg.cache_duration());

        FetchRequest::new(
            self.lat,
            self.lon,
            self.units.unwrap_or_else(|| cfg.default_units()),
            self.lang.unwrap_or_else(|| cfg.default_language()),
            cache_duration,
        )
    }
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Weather(location) => {
                let cfg = Config::load()?;
                let request = location.into_request(&cfg);
                let units = request.units;

                let client = OpenWeatherClient::from_config(&cfg)?;
                let weather = client
                    .fetch_weather(request)
                    .await
                    .ok_or_else(|| anyhow!("Weather request was cancelled"))?
                    .context("Failed to fetch current weather")?;

                println!("{}", format_weather(&weather, units));
                Ok(())
            }
            Command::Forecast { location, limit } => {
                let cfg = Config::load()?;
                let request = location.into_request(&cfg);
                let units = request.units;

                let client = OpenWeatherClient::from_config(&cfg)?;
                let forecast = client
                    .fetch_forecast(request)
                    .await
                    .ok_or_else(|| anyhow!("Forecast request was cancelled"))?
                    .context("Failed to fetch forecast")?;

                if forecast.is_empty() {
                    println!("No forecast data returned.");
                }
                for step in forecast.iter().take(limit.unwrap_or(usize::MAX)) {
                    println!("{}", format_weather(step, units));
                }
                Ok(())
            }
        }
    }
}

fn configure() -> Result<()> {
    let mut cfg = Config::load()?;

    let app_id = Password::new("OpenWeather API key:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;
    cfg.set_app_id(app_id.trim().to_string());

    let units = Select::new("Default units:", vec![Units::Metric, Units::Imperial])
        .with_starting_cursor(if cfg.default_units() == Units::Imperial { 1 } else { 0 })
        .prompt()
        .context("Failed to read units")?;
    cfg.units = Some(units.as_str().to_string());

    let language = Select::new("Default language:", Language::all().to_vec())
        .prompt()
        .context("Failed to read language")?;
    cfg.language = Some(language.as_str().to_string());

    let cache_seconds = CustomType::<u64>::new("Cache responses for (seconds):")
        .with_default(cfg.cache_duration().as_secs())
        .prompt()
        .context("Failed to read cache duration")?;
    cfg.cache_seconds = Some(cache_seconds);

    cfg.save()?;
    println!("Saved configuration to {}", Config::config_file_path()?.display());

    Ok(())
}

fn format_weather(weather: &Weather, units: Units) -> String {
    let date = weather.date.with_timezone(&Local).format("%a %d %b %H:%M");
    let period = if weather.is_day { "day" } else { "night" };

    format!(
        "{date}  {temp:.1}{sym} (min {min:.1}{sym}, max {max:.1}{sym})  {title} [{condition}, {period}]",
        temp = weather.temp,
        min = weather.min_temp,
        max = weather.max_temp,
        sym = units.temperature_symbol(),
        title = weather.title,
        condition = weather.condition.description(),
    )
}
