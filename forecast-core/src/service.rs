use std::sync::Arc;

use chrono::NaiveDate;

use crate::{
    error::{ForecastError, Result},
    gateway::{self, ForecastGateway},
    geo::GeoResolver,
    history::SearchHistory,
    model::{CityCount, DailyForecast, GeoData, HourlyForecast, LocationQuery},
    normalize,
    repository::CityCountRepository,
};

/// Upper bound the forecast endpoint accepts for `forecast_days`.
pub const MAX_FORECAST_DAYS: u32 = 16;

/// Resolve → fetch → normalize → record.
///
/// History and counts are only touched once the whole chain has succeeded.
#[derive(Debug, Clone)]
pub struct ForecastService {
    geo: Arc<dyn GeoResolver>,
    gateway: Arc<dyn ForecastGateway>,
    counts: Arc<dyn CityCountRepository>,
}

impl ForecastService {
    pub fn new(
        geo: Arc<dyn GeoResolver>,
        gateway: Arc<dyn ForecastGateway>,
        counts: Arc<dyn CityCountRepository>,
    ) -> Self {
        Self { geo, gateway, counts }
    }

    pub async fn get_daily_forecast(
        &self,
        forecast_days: u32,
        history: &mut dyn SearchHistory,
        query: &LocationQuery,
    ) -> Result<(DailyForecast, String)> {
        check_days(forecast_days)?;
        let (geo, city) = self.resolve(query).await?;

        let raw = self.gateway.fetch_daily(&geo, forecast_days, &[]).await?;
        let forecast = normalize::normalize_daily(&raw)?;

        self.record(history, &city).await?;
        Ok((forecast, city))
    }

    /// Daily forecast with every day's hours nested under it.
    pub async fn get_detailed_forecast(
        &self,
        forecast_days: u32,
        history: &mut dyn SearchHistory,
        query: &LocationQuery,
    ) -> Result<(DailyForecast, String)> {
        check_days(forecast_days)?;
        let (geo, city) = self.resolve(query).await?;

        let raw = self.gateway.fetch_daily(&geo, forecast_days, &gateway::hourly_extra()).await?;
        let forecast = normalize::normalize_daily_with_hourly(&raw)?;

        self.record(history, &city).await?;
        Ok((forecast, city))
    }

    pub async fn get_hourly_forecast_for_date(
        &self,
        date: NaiveDate,
        history: &mut dyn SearchHistory,
        query: &LocationQuery,
    ) -> Result<(HourlyForecast, String)> {
        let (geo, city) = self.resolve(query).await?;

        let raw = self.gateway.fetch_hourly_for_date(&geo, date).await?;
        let forecast = normalize::normalize_hourly(&raw, date)?;

        self.record(history, &city).await?;
        Ok((forecast, city))
    }

    pub async fn get_cities_count(&self) -> Result<Vec<CityCount>> {
        self.counts.get_all().await.map_err(ForecastError::Repository)
    }

    pub fn get_last_viewed_city(&self, history: &dyn SearchHistory) -> Result<String> {
        history.last().map(str::to_string).ok_or_else(|| {
            tracing::info!("Attempt to get last viewed city, but history is empty");
            ForecastError::NotFound("No city has been viewed yet.".into())
        })
    }

    pub fn get_search_history(&self, history: &dyn SearchHistory) -> Vec<String> {
        history.names().to_vec()
    }

    async fn resolve(&self, query: &LocationQuery) -> Result<(GeoData, String)> {
        self.geo.resolve(query).await.inspect_err(|e| match e {
            ForecastError::CoordinatesNotFound(city) => {
                tracing::warn!(city = city.as_str(), "Coordinates not found")
            }
            other => tracing::error!("Resolving location failed: {}", other),
        })
    }

    async fn record(&self, history: &mut dyn SearchHistory, city: &str) -> Result<()> {
        self.counts.create_or_incr(city).await.map_err(ForecastError::Repository)?;
        history.push(city);
        Ok(())
    }
}

fn check_days(forecast_days: u32) -> Result<()> {
    if (1..=MAX_FORECAST_DAYS).contains(&forecast_days) {
        Ok(())
    } else {
        Err(ForecastError::InvalidRequest(format!(
            "forecast_days must be between 1 and {MAX_FORECAST_DAYS}, got {forecast_days}"
        )))
    }
}
