use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;

use crate::{
    error::{ForecastError, Result},
    http::HttpClient,
    model::GeoData,
};

/// Daily variables requested for a multi-day forecast.
pub const DAILY_VARIABLES: &[&str] = &[
    "temperature_2m_max",
    "temperature_2m_min",
    "rain_sum",
    "precipitation_probability_max",
    "apparent_temperature_max",
    "apparent_temperature_min",
];

pub const HOURLY_VARIABLES: &[&str] =
    &["temperature_2m", "rain", "precipitation_probability", "apparent_temperature"];

/// Daily variables requested next to an hourly breakdown.
pub const DAY_RANGE_VARIABLES: &[&str] = &["temperature_2m_max", "temperature_2m_min"];

/// Raw, unvalidated forecast payloads. Shape checks belong to the normalizer.
#[async_trait]
pub trait ForecastGateway: Send + Sync + Debug {
    async fn fetch_daily(&self, geo: &GeoData, days: u32, extra: &[(String, String)]) -> Result<Value>;

    async fn fetch_hourly_for_date(&self, geo: &GeoData, date: NaiveDate) -> Result<Value>;
}

/// Extra parameters that add the hourly variables to a daily request.
pub fn hourly_extra() -> Vec<(String, String)> {
    vec![("hourly".into(), HOURLY_VARIABLES.join(","))]
}

#[derive(Debug, Clone)]
pub struct OpenMeteoGateway {
    http: Arc<HttpClient>,
    forecast_url: String,
}

impl OpenMeteoGateway {
    pub fn new(http: Arc<HttpClient>, forecast_url: impl Into<String>) -> Self {
        Self { http, forecast_url: forecast_url.into() }
    }

    async fn fetch(&self, params: &[(String, String)]) -> Result<Value> {
        self.http.get_json(&self.forecast_url, params).await.map_err(|e| {
            tracing::error!("Forecast request failed: {}", e);
            ForecastError::GettingForecast(e)
        })
    }
}

pub(crate) fn daily_params(geo: &GeoData, days: u32, extra: &[(String, String)]) -> Vec<(String, String)> {
    let mut params = geo.query_params();
    params.push(("daily".into(), DAILY_VARIABLES.join(",")));
    params.push(("forecast_days".into(), days.to_string()));
    params.extend(extra.iter().cloned());
    params
}

pub(crate) fn hourly_params(geo: &GeoData, date: NaiveDate) -> Vec<(String, String)> {
    let day = date.format("%Y-%m-%d").to_string();
    let mut params = geo.query_params();
    params.push(("start_date".into(), day.clone()));
    params.push(("end_date".into(), day));
    params.push(("hourly".into(), HOURLY_VARIABLES.join(",")));
    params.push(("daily".into(), DAY_RANGE_VARIABLES.join(",")));
    params
}

#[async_trait]
impl ForecastGateway for OpenMeteoGateway {
    async fn fetch_daily(&self, geo: &GeoData, days: u32, extra: &[(String, String)]) -> Result<Value> {
        tracing::debug!(?geo, days, "Fetching daily forecast");
        self.fetch(&daily_params(geo, days, extra)).await
    }

    async fn fetch_hourly_for_date(&self, geo: &GeoData, date: NaiveDate) -> Result<Value> {
        tracing::debug!(?geo, %date, "Fetching hourly forecast");
        self.fetch(&hourly_params(geo, date)).await
    }
}
