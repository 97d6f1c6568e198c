//! Human-readable output.

use std::fmt::Write;

use chrono::NaiveDate;
use forecast_core::{Amount, CityCount, DailyForecast, HourlyForecast, HourlyWeather};
use serde::Serialize;

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn amount(a: &Amount) -> String {
    match (a.value, a.unit.as_deref()) {
        (Some(v), Some(unit)) if unit == "%" => format!("{v}%"),
        (Some(v), Some(unit)) => format!("{v} {unit}"),
        (Some(v), None) => v.to_string(),
        (None, _) => "n/a".to_string(),
    }
}

fn hour_line(out: &mut String, timestamp: &str, hour: &HourlyWeather) {
    let rain = hour.rain.map_or_else(|| "n/a".to_string(), |r| r.to_string());
    let _ = writeln!(
        out,
        "  {timestamp}  {} (feels {}), rain {rain}, precip {}",
        amount(&hour.temp),
        amount(&hour.temp_feels_like),
        amount(&hour.precipitation_probability),
    );
}

pub fn daily(city: &str, forecast: &DailyForecast) -> String {
    let mut out = format!("Forecast for {city}\n");
    for (date, day) in forecast.iter() {
        let _ = writeln!(
            out,
            "{date}  min {}  max {}  rain {}  precip {}",
            amount(&day.temp_min),
            amount(&day.temp_max),
            amount(&day.rain_sum),
            amount(&day.precipitation_probability),
        );
        for (timestamp, hour) in day.hourly.iter() {
            hour_line(&mut out, timestamp, hour);
        }
    }
    out
}

pub fn hourly(city: &str, date: NaiveDate, forecast: &HourlyForecast) -> String {
    let mut out = format!(
        "Forecast for {city} on {date}: min {}  max {}\n",
        amount(&forecast.temp_min),
        amount(&forecast.temp_max),
    );
    for (timestamp, hour) in forecast.hourly.iter() {
        hour_line(&mut out, timestamp, hour);
    }
    out
}

pub fn cities(counts: &[CityCount]) -> String {
    let width = counts.iter().map(|c| c.name.chars().count()).max().unwrap_or(0);
    counts.iter().fold(String::new(), |mut out, c| {
        let _ = writeln!(out, "{:<width$}  {}", c.name, c.count);
        out
    })
}
