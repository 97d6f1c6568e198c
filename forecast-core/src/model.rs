use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};

pub const DEFAULT_TIMEZONE: &str = "UTC";

/// A measured quantity with the unit upstream reported for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Amount {
    pub value: Option<f64>,
    pub unit: Option<String>,
}

impl Amount {
    pub fn new(value: Option<f64>, unit: Option<&str>) -> Self {
        Self { value, unit: unit.map(str::to_owned) }
    }
}

/// Raw lat/lon supplied by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    pub fn validate(&self) -> Result<()> {
        let lat_ok = self.latitude.is_finite() && (-90.0..=90.0).contains(&self.latitude);
        let lon_ok = self.longitude.is_finite() && (-180.0..=180.0).contains(&self.longitude);
        if lat_ok && lon_ok {
            Ok(())
        } else {
            Err(ForecastError::InvalidRequest(format!(
                "Coordinates out of range: lat={}, lon={}",
                self.latitude, self.longitude
            )))
        }
    }
}

/// Location selector for a forecast request: a city name, coordinates, or both.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationQuery {
    pub city_name: Option<String>,
    pub coords: Option<Coordinates>,
}

impl LocationQuery {
    pub fn city(name: impl Into<String>) -> Self {
        Self { city_name: Some(name.into()), coords: None }
    }

    pub fn coords(latitude: f64, longitude: f64) -> Self {
        Self { city_name: None, coords: Some(Coordinates::new(latitude, longitude)) }
    }

    pub fn with_city_name(mut self, name: impl Into<String>) -> Self {
        self.city_name = Some(name.into());
        self
    }

    /// Trimmed city name, or `None` when absent or blank.
    pub fn trimmed_city(&self) -> Option<&str> {
        self.city_name.as_deref().map(str::trim).filter(|name| !name.is_empty())
    }
}

/// Geocoded location used to query the forecast endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoData {
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
}

impl GeoData {
    pub fn new(latitude: f64, longitude: f64, timezone: impl Into<String>) -> Self {
        Self { latitude, longitude, timezone: timezone.into() }
    }

    pub fn query_params(&self) -> Vec<(String, String)> {
        vec![
            ("latitude".into(), self.latitude.to_string()),
            ("longitude".into(), self.longitude.to_string()),
            ("timezone".into(), self.timezone.clone()),
        ]
    }
}

impl From<Coordinates> for GeoData {
    fn from(coords: Coordinates) -> Self {
        Self::new(coords.latitude, coords.longitude, DEFAULT_TIMEZONE)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyWeather {
    pub temp: Amount,
    pub temp_feels_like: Amount,
    pub rain: Option<f64>,
    pub precipitation_probability: Amount,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyWeather {
    pub temp_min: Amount,
    pub temp_max: Amount,
    pub rain_sum: Amount,
    pub precipitation_probability: Amount,
    /// Hours of this day, filled only for detailed forecasts.
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub hourly: IndexMap<String, HourlyWeather>,
}

/// Day → weather, in upstream order.
pub type DailyForecast = IndexMap<String, DailyWeather>;

/// Hourly breakdown for a single requested day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyForecast {
    pub hourly: IndexMap<String, HourlyWeather>,
    pub temp_min: Amount,
    pub temp_max: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityCount {
    pub name: String,
    pub count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinates_out_of_range_are_rejected() {
        assert!(Coordinates::new(51.5, -0.12).validate().is_ok());
        assert!(Coordinates::new(91.0, 0.0).validate().is_err());
        assert!(Coordinates::new(0.0, -181.0).validate().is_err());
        assert!(Coordinates::new(f64::NAN, 0.0).validate().is_err());
    }

    #[test]
    fn geo_data_from_coordinates_defaults_to_utc() {
        let geo = GeoData::from(Coordinates::new(1.0, 2.0));
        assert_eq!(geo.timezone, "UTC");
    }

    #[test]
    fn blank_city_name_is_treated_as_absent() {
        assert_eq!(LocationQuery::city("   ").trimmed_city(), None);
        assert_eq!(LocationQuery::city("  Oslo ").trimmed_city(), Some("Oslo"));
    }

    fn day(max: f64) -> DailyWeather {
        DailyWeather {
            temp_min: Amount::new(Some(1.0), Some("°C")),
            temp_max: Amount::new(Some(max), Some("°C")),
            rain_sum: Amount::new(None, None),
            precipitation_probability: Amount::new(Some(0.0), Some("%")),
            hourly: IndexMap::new(),
        }
    }

    #[test]
    fn daily_forecast_serializes_days_in_insertion_order() {
        let mut forecast = DailyForecast::new();
        forecast.insert("2024-05-02".into(), day(12.0));
        forecast.insert("2024-05-01".into(), day(10.0));

        let json = serde_json::to_string(&forecast).expect("serialize");
        let second = json.find("\"2024-05-02\"").expect("second day");
        let first = json.find("\"2024-05-01\"").expect("first day");
        assert!(second < first);
        assert!(!json.contains("hourly"));
    }

    #[test]
    fn reinserting_a_day_replaces_it_in_place() {
        let mut forecast = DailyForecast::new();
        forecast.insert("2024-05-01".into(), day(10.0));
        forecast.insert("2024-05-02".into(), day(12.0));
        forecast.insert("2024-05-01".into(), day(15.0));

        assert_eq!(forecast.len(), 2);
        assert_eq!(forecast.get_index(0).map(|(k, _)| k.as_str()), Some("2024-05-01"));
        assert_eq!(forecast["2024-05-01"].temp_max.value, Some(15.0));
    }
}
