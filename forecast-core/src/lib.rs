//! Core library for the `forecast` CLI.
//!
//! This crate defines:
//! - Configuration of upstream endpoints, caching and retries
//! - Location resolution (geocoding and reverse geocoding)
//! - Raw forecast retrieval and normalization into typed daily/hourly data
//! - Search history and per-city query counts
//!
//! [`ForecastService`] ties these together. It is used by `forecast-cli`,
//! but can also sit behind an HTTP API or any other front end.

use std::sync::Arc;

pub mod config;
pub mod error;
pub mod gateway;
pub mod geo;
pub mod history;
pub mod http;
pub mod model;
pub mod normalize;
pub mod repository;
pub mod service;

pub use config::Config;
pub use error::{ClientSignal, ForecastError};
pub use gateway::{ForecastGateway, OpenMeteoGateway};
pub use geo::{GeoResolver, NominatimReverseGeocoder, OpenMeteoGeoResolver, ReverseGeocoder};
pub use history::{SearchHistory, SessionHistory};
pub use indexmap::IndexMap;
pub use http::HttpClient;
pub use model::{
    Amount, CityCount, Coordinates, DailyForecast, DailyWeather, GeoData, HourlyForecast,
    HourlyWeather, LocationQuery,
};
pub use repository::{CityCountRepository, InMemoryCityCounts, SqliteCityCounts};
pub use service::ForecastService;

/// Wire the Open-Meteo/Nominatim stack from `config` around `counts`.
///
/// One [`HttpClient`] (and so one response cache) is shared by all upstream calls.
pub fn service_from_config(
    config: &Config,
    counts: Arc<dyn CityCountRepository>,
) -> anyhow::Result<ForecastService> {
    let http = Arc::new(HttpClient::from_config(config)?);
    let reverse = Arc::new(NominatimReverseGeocoder::new(Arc::clone(&http), &config.reverse_geocode_url));
    let geo = Arc::new(OpenMeteoGeoResolver::new(Arc::clone(&http), &config.geodata_url, reverse));
    let gateway = Arc::new(OpenMeteoGateway::new(http, &config.forecast_url));
    Ok(ForecastService::new(geo, gateway, counts))
}
