//! Reverse geocoding through Nominatim (OpenStreetMap).

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use super::ReverseGeocoder;
use crate::{
    error::{ForecastError, Result},
    http::{HttpClient, HttpError},
    model::Coordinates,
};

#[derive(Debug, Deserialize)]
struct NominatimResponse {
    address: Option<NominatimAddress>,
}

#[derive(Debug, Deserialize)]
struct NominatimAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    municipality: Option<String>,
}

impl NominatimAddress {
    fn locality(self) -> Option<String> {
        self.city.or(self.town).or(self.village).or(self.municipality)
    }
}

#[derive(Debug, Clone)]
pub struct NominatimReverseGeocoder {
    http: Arc<HttpClient>,
    url: String,
}

impl NominatimReverseGeocoder {
    pub fn new(http: Arc<HttpClient>, url: impl Into<String>) -> Self {
        Self { http, url: url.into() }
    }
}

#[async_trait]
impl ReverseGeocoder for NominatimReverseGeocoder {
    async fn locality(&self, coords: Coordinates) -> Result<String> {
        let params = vec![
            ("format".to_string(), "json".to_string()),
            ("lat".to_string(), coords.latitude.to_string()),
            ("lon".to_string(), coords.longitude.to_string()),
            ("accept-language".to_string(), "en".to_string()),
        ];

        let response = self.http.get_json(&self.url, &params).await.map_err(|e| {
            tracing::error!(?coords, "Reverse geocode request failed: {}", e);
            ForecastError::coordinates("reverse geocoding request failed", e)
        })?;

        let body: NominatimResponse = serde_json::from_value(response).map_err(|e| {
            ForecastError::coordinates("unexpected reverse geocoding response", HttpError::Decode(e))
        })?;

        let locality = body.address.and_then(NominatimAddress::locality).ok_or_else(|| {
            tracing::warn!(?coords, "No address found");
            ForecastError::GettingCoordinates {
                message: format!("no address found for {}, {}", coords.latitude, coords.longitude),
                source: None,
            }
        })?;

        tracing::info!("Reverse geocoded to: {}", locality);
        Ok(locality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn address(value: serde_json::Value) -> NominatimAddress {
        serde_json::from_value(value).expect("address")
    }

    #[test]
    fn prefers_city_over_smaller_places() {
        let addr = address(json!({"city": "Paris", "town": "Other", "country": "France"}));
        assert_eq!(addr.locality().as_deref(), Some("Paris"));
    }

    #[test]
    fn falls_back_to_town_then_village() {
        assert_eq!(address(json!({"town": "Hay"})).locality().as_deref(), Some("Hay"));
        assert_eq!(address(json!({"village": "Lyme"})).locality().as_deref(), Some("Lyme"));
        assert_eq!(address(json!({"country": "Norway"})).locality(), None);
    }

    #[test]
    fn error_payload_has_no_address() {
        let body: NominatimResponse =
            serde_json::from_value(json!({"error": "Unable to geocode"})).expect("parse");
        assert!(body.address.is_none());
    }
}
