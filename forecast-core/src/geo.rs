use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::{
    error::{ForecastError, Result},
    http::{HttpClient, HttpError},
    model::{Coordinates, GeoData, LocationQuery},
};

pub mod nominatim;

pub use nominatim::NominatimReverseGeocoder;

/// Turns a [`LocationQuery`] into coordinates plus the name to record it under.
#[async_trait]
pub trait GeoResolver: Send + Sync + Debug {
    async fn resolve(&self, query: &LocationQuery) -> Result<(GeoData, String)>;
}

/// Coordinates → locality name.
#[async_trait]
pub trait ReverseGeocoder: Send + Sync + Debug {
    async fn locality(&self, coords: Coordinates) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct GeocodingHit {
    latitude: f64,
    longitude: f64,
    timezone: String,
}

/// Open-Meteo geocoding search, with reverse lookups delegated.
#[derive(Debug, Clone)]
pub struct OpenMeteoGeoResolver {
    http: Arc<HttpClient>,
    geodata_url: String,
    reverse: Arc<dyn ReverseGeocoder>,
}

impl OpenMeteoGeoResolver {
    pub fn new(
        http: Arc<HttpClient>,
        geodata_url: impl Into<String>,
        reverse: Arc<dyn ReverseGeocoder>,
    ) -> Self {
        Self { http, geodata_url: geodata_url.into(), reverse }
    }

    pub async fn geodata_by_city(&self, city_name: &str) -> Result<GeoData> {
        let city_name = city_name.trim();
        tracing::debug!(city = city_name, "Geocoding city");

        let params = [("format", "json"), ("name", city_name), ("count", "1")]
            .map(|(k, v)| (k.to_string(), v.to_string()));

        let response = self.http.get_json(&self.geodata_url, &params).await.map_err(|e| {
            tracing::error!(city = city_name, "Geocoding request failed: {}", e);
            ForecastError::coordinates(format!("geocoding request for '{city_name}' failed"), e)
        })?;

        let first = first_result(&response).ok_or_else(|| {
            tracing::warn!(city = city_name, "Geocoding returned no results: {}", response);
            ForecastError::CoordinatesNotFound(city_name.to_string())
        })?;

        let hit: GeocodingHit = serde_json::from_value(first.clone()).map_err(|e| {
            ForecastError::coordinates("unexpected geocoding result", HttpError::Decode(e))
        })?;

        tracing::debug!(city = city_name, ?hit, "Geocoded");
        Ok(GeoData::new(hit.latitude, hit.longitude, hit.timezone))
    }
}

fn first_result(response: &Value) -> Option<&Value> {
    response.get("results")?.as_array()?.first()
}

#[async_trait]
impl GeoResolver for OpenMeteoGeoResolver {
    async fn resolve(&self, query: &LocationQuery) -> Result<(GeoData, String)> {
        match (query.trimmed_city(), query.coords) {
            (city, Some(coords)) => {
                coords.validate()?;
                // A caller-supplied name is authoritative over the reverse lookup.
                let name = match city {
                    Some(name) => name.to_string(),
                    None => self.reverse.locality(coords).await?,
                };
                Ok((GeoData::from(coords), name))
            }
            (Some(city), None) => Ok((self.geodata_by_city(city).await?, city.to_string())),
            (None, None) => Err(ForecastError::InvalidRequest(
                "Either city_name or coords must be provided".into(),
            )),
        }
    }
}
