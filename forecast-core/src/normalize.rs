//! Reshapes raw forecast payloads into [`DailyForecast`] / [`HourlyForecast`].
//!
//! Payloads are column-oriented: each section has a `time` array and one
//! array per variable, with units in a sibling `<section>_units` object.
//! Short columns, `null` entries and absent units become `None`; a missing
//! section or a column of the wrong type is a [`ForecastError::ParsingForecast`].

use std::collections::HashMap;

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

use crate::{
    error::{ForecastError, Result},
    model::{Amount, DailyForecast, DailyWeather, HourlyForecast, HourlyWeather},
};

/// Upstream daily variable for each [`DailyWeather`] attribute.
struct DailyFieldMap {
    temp_min: &'static str,
    temp_max: &'static str,
    rain_sum: &'static str,
    precipitation_probability: &'static str,
}

const DAILY_FIELDS: DailyFieldMap = DailyFieldMap {
    temp_min: "temperature_2m_min",
    temp_max: "temperature_2m_max",
    rain_sum: "rain_sum",
    precipitation_probability: "precipitation_probability_max",
};

/// Upstream hourly variable for each [`HourlyWeather`] attribute.
struct HourlyFieldMap {
    temp: &'static str,
    temp_feels_like: &'static str,
    rain: &'static str,
    precipitation_probability: &'static str,
}

const HOURLY_FIELDS: HourlyFieldMap = HourlyFieldMap {
    temp: "temperature_2m",
    temp_feels_like: "apparent_temperature",
    rain: "rain",
    precipitation_probability: "precipitation_probability",
};

/// `<section>_units` object; non-string entries read as "no unit".
type Units = HashMap<String, Value>;

#[derive(Debug, Deserialize)]
struct RawForecast {
    daily: Option<RawSection>,
    daily_units: Option<Units>,
    hourly: Option<RawSection>,
    hourly_units: Option<Units>,
}

#[derive(Debug, Deserialize)]
struct RawSection {
    time: Vec<String>,
    #[serde(flatten)]
    columns: HashMap<String, Value>,
}

impl RawForecast {
    fn parse(raw: &Value) -> Result<Self> {
        RawForecast::deserialize(raw).map_err(|e| {
            tracing::error!("Unexpected forecast payload: {}", e);
            ForecastError::ParsingForecast {
                message: "unexpected forecast payload".into(),
                source: Some(e),
            }
        })
    }

    fn daily(&self) -> Result<(&RawSection, Option<&Units>)> {
        let section = self.daily.as_ref().ok_or_else(|| missing_section("daily"))?;
        Ok((section, self.daily_units.as_ref()))
    }

    fn hourly(&self) -> Result<(&RawSection, Option<&Units>)> {
        let section = self.hourly.as_ref().ok_or_else(|| missing_section("hourly"))?;
        Ok((section, self.hourly_units.as_ref()))
    }
}

fn missing_section(name: &str) -> ForecastError {
    tracing::error!("Forecast payload has no '{}' section", name);
    ForecastError::parsing(format!("forecast payload has no '{name}' section"))
}

/// One variable's values plus its unit.
struct Column {
    values: Vec<Option<f64>>,
    unit: Option<String>,
}

impl Column {
    fn read(
        section: &RawSection,
        units: Option<&Units>,
        section_name: &str,
        field: &str,
    ) -> Result<Self> {
        let values = match section.columns.get(field) {
            None | Some(Value::Null) => Vec::new(),
            Some(raw) => Vec::<Option<f64>>::deserialize(raw).map_err(|e| {
                tracing::error!("{}.{} is not a numeric array: {}", section_name, field, e);
                ForecastError::ParsingForecast {
                    message: format!("{section_name}.{field} is not a numeric array"),
                    source: Some(e),
                }
            })?,
        };
        let unit = units
            .and_then(|units| units.get(field))
            .and_then(Value::as_str)
            .map(str::to_owned);
        Ok(Self { values, unit })
    }

    fn value_at(&self, i: usize) -> Option<f64> {
        self.values.get(i).copied().flatten()
    }

    fn amount_at(&self, i: usize) -> Amount {
        Amount::new(self.value_at(i), self.unit.as_deref())
    }
}

struct DailyColumns {
    temp_min: Column,
    temp_max: Column,
    rain_sum: Column,
    precipitation_probability: Column,
}

impl DailyColumns {
    fn read(section: &RawSection, units: Option<&Units>) -> Result<Self> {
        let read = |field| Column::read(section, units, "daily", field);
        Ok(Self {
            temp_min: read(DAILY_FIELDS.temp_min)?,
            temp_max: read(DAILY_FIELDS.temp_max)?,
            rain_sum: read(DAILY_FIELDS.rain_sum)?,
            precipitation_probability: read(DAILY_FIELDS.precipitation_probability)?,
        })
    }

    fn weather_at(&self, i: usize) -> DailyWeather {
        DailyWeather {
            temp_min: self.temp_min.amount_at(i),
            temp_max: self.temp_max.amount_at(i),
            rain_sum: self.rain_sum.amount_at(i),
            precipitation_probability: self.precipitation_probability.amount_at(i),
            hourly: IndexMap::new(),
        }
    }
}

struct HourlyColumns {
    temp: Column,
    temp_feels_like: Column,
    rain: Column,
    precipitation_probability: Column,
}

impl HourlyColumns {
    fn read(section: &RawSection, units: Option<&Units>) -> Result<Self> {
        let read = |field| Column::read(section, units, "hourly", field);
        Ok(Self {
            temp: read(HOURLY_FIELDS.temp)?,
            temp_feels_like: read(HOURLY_FIELDS.temp_feels_like)?,
            rain: read(HOURLY_FIELDS.rain)?,
            precipitation_probability: read(HOURLY_FIELDS.precipitation_probability)?,
        })
    }

    fn weather_at(&self, i: usize) -> HourlyWeather {
        HourlyWeather {
            temp: self.temp.amount_at(i),
            temp_feels_like: self.temp_feels_like.amount_at(i),
            rain: self.rain.value_at(i),
            precipitation_probability: self.precipitation_probability.amount_at(i),
        }
    }
}

/// Calendar date (`YYYY-MM-DD`) a timestamp like `2024-05-01T13:00` belongs to.
fn owning_date(timestamp: &str) -> Result<&str> {
    let date = timestamp.split_once('T').map_or(timestamp, |(date, _)| date);
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| ForecastError::parsing(format!("unexpected hourly timestamp '{timestamp}'")))?;
    Ok(date)
}

fn daily_from(raw: &RawForecast) -> Result<DailyForecast> {
    let (section, units) = raw.daily()?;
    let columns = DailyColumns::read(section, units)?;

    let mut forecast = DailyForecast::new();
    for (i, day) in section.time.iter().enumerate() {
        forecast.insert(day.clone(), columns.weather_at(i));
    }
    Ok(forecast)
}

/// Day → [`DailyWeather`], one entry per `daily.time` value, in upstream order.
pub fn normalize_daily(raw: &Value) -> Result<DailyForecast> {
    daily_from(&RawForecast::parse(raw)?)
}

/// Like [`normalize_daily`], with each hour filed under the day it falls on.
pub fn normalize_daily_with_hourly(raw: &Value) -> Result<DailyForecast> {
    let raw = RawForecast::parse(raw)?;
    let mut forecast = daily_from(&raw)?;

    let (section, units) = raw.hourly()?;
    let columns = HourlyColumns::read(section, units)?;

    for (i, timestamp) in section.time.iter().enumerate() {
        let date = owning_date(timestamp)?;
        match forecast.get_mut(date) {
            Some(day) => {
                day.hourly.insert(timestamp.clone(), columns.weather_at(i));
            }
            None => tracing::debug!(timestamp = timestamp.as_str(), "Hour outside requested days"),
        }
    }
    Ok(forecast)
}

/// Hours of `date` plus that day's min/max temperature.
///
/// The min/max come from the first `daily` entry, since only `date` was requested.
pub fn normalize_hourly(raw: &Value, date: NaiveDate) -> Result<HourlyForecast> {
    let raw = RawForecast::parse(raw)?;

    let (daily, daily_units) = raw.daily()?;
    let temp_min = Column::read(daily, daily_units, "daily", DAILY_FIELDS.temp_min)?.amount_at(0);
    let temp_max = Column::read(daily, daily_units, "daily", DAILY_FIELDS.temp_max)?.amount_at(0);

    let (section, units) = raw.hourly()?;
    let columns = HourlyColumns::read(section, units)?;
    let wanted = date.format("%Y-%m-%d").to_string();

    let mut hourly = IndexMap::new();
    for (i, timestamp) in section.time.iter().enumerate() {
        if owning_date(timestamp)? == wanted {
            hourly.insert(timestamp.clone(), columns.weather_at(i));
        }
    }

    Ok(HourlyForecast { hourly, temp_min, temp_max })
}
