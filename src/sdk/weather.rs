//! `get_weather`: current conditions for a place name via Open-Meteo.

use super::tools::ToolRegistry;
use crate::{Error, Result};
use reqwest::Client;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub const GEOCODING_BASE_URL: &str = "https://geocoding-api.open-meteo.com";
pub const FORECAST_BASE_URL: &str = "https://api.open-meteo.com";
pub const WEATHER_TOOL_NAME: &str = "get_weather";

const CURRENT_FIELDS: &str = "temperature_2m,relative_humidity_2m,apparent_temperature,weather_code,wind_speed_10m";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct WeatherArgs {
    /// City or place name, e.g. "Paris".
    pub location: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeatherReport {
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,
    pub temperature_c: f64,
    pub apparent_temperature_c: f64,
    pub relative_humidity: f64,
    pub wind_speed_kmh: f64,
    pub weather_code: u16,
}

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Vec<Place>,
}

#[derive(Debug, Deserialize)]
struct Place {
    name: String,
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: CurrentConditions,
}

#[derive(Debug, Deserialize)]
struct CurrentConditions {
    temperature_2m: f64,
    apparent_temperature: f64,
    relative_humidity_2m: f64,
    wind_speed_10m: f64,
    weather_code: u16,
}

/// Two-step lookup: geocode the place, then fetch its current forecast.
#[derive(Debug, Clone)]
pub struct WeatherTool {
    client: Client,
    geocoding_base: String,
    forecast_base: String,
}

impl WeatherTool {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    #[allow(clippy::result_large_err)]
    pub fn new() -> Result<Self> {
        Self::with_base_urls(GEOCODING_BASE_URL, FORECAST_BASE_URL)
    }

    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    #[allow(clippy::result_large_err)]
    pub fn with_base_urls(geocoding_base: &str, forecast_base: &str) -> Result<Self> {
        let client = Client::builder().timeout(DEFAULT_TIMEOUT).build()?;
        Ok(Self {
            client,
            geocoding_base: geocoding_base.trim_end_matches('/').to_string(),
            forecast_base: forecast_base.trim_end_matches('/').to_string(),
        })
    }

    /// Add `get_weather` to `registry`.
    pub fn register(self, registry: &mut ToolRegistry) {
        let tool = Arc::new(self);
        registry.tool_with_description(
            WEATHER_TOOL_NAME,
            "Get the current weather for a location",
            move |args: WeatherArgs| {
                let tool = Arc::clone(&tool);
                async move { tool.lookup(&args.location).await }
            },
        );
    }

    /// # Errors
    /// Returns `Error::Tool` if the place is unknown or either lookup fails.
    pub async fn lookup(&self, location: &str) -> Result<WeatherReport> {
        let place = self.geocode(location).await?;
        tracing::debug!(%location, lat = place.latitude, lon = place.longitude, "Resolved location");

        let url = format!("{}/v1/forecast", self.forecast_base);
        let forecast: ForecastResponse = self
            .client
            .get(url)
            .query(&[
                ("latitude", place.latitude.to_string()),
                ("longitude", place.longitude.to_string()),
                ("current", CURRENT_FIELDS.to_string()),
            ])
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Error::Tool(format!("forecast lookup failed: {e}")))?
            .json()
            .await
            .map_err(|e| Error::Tool(format!("malformed forecast: {e}")))?;

        let current = forecast.current;
        let location = match place.country {
            Some(country) => format!("{}, {country}", place.name),
            None => place.name,
        };
        Ok(WeatherReport {
            location,
            latitude: place.latitude,
            longitude: place.longitude,
            temperature_c: current.temperature_2m,
            apparent_temperature_c: current.apparent_temperature,
            relative_humidity: current.relative_humidity_2m,
            wind_speed_kmh: current.wind_speed_10m,
            weather_code: current.weather_code,
        })
    }

    async fn geocode(&self, location: &str) -> Result<Place> {
        let url = format!("{}/v1/search", self.geocoding_base);
        let body: GeocodingResponse = self
            .client
            .get(url)
            .query(&[("name", location), ("count", "1")])
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Error::Tool(format!("geocoding failed: {e}")))?
            .json()
            .await
            .map_err(|e| Error::Tool(format!("malformed geocoding response: {e}")))?;
        body.results
            .into_iter()
            .next()
            .ok_or_else(|| Error::Tool(format!("no location found for {location:?}")))
    }
}
