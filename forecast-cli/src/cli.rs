use std::sync::Arc;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use forecast_core::{
    Config, ForecastService, LocationQuery, service::MAX_FORECAST_DAYS, service_from_config,
};
use inquire::{Confirm, CustomType};

use crate::{render, store::Store};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "forecast", version, about = "Weather forecasts for a city or coordinates")]
pub struct Cli {
    /// Print results as JSON instead of text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Log debug output to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Where to forecast: a city name, coordinates, or both.
#[derive(Debug, Args)]
pub struct LocationArgs {
    /// City name, e.g. "London". With --lat/--lon it is only used as the label.
    pub city: Option<String>,

    #[arg(long, requires = "lon", allow_negative_numbers = true)]
    pub lat: Option<f64>,

    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    pub lon: Option<f64>,
}

impl LocationArgs {
    pub fn query(&self) -> LocationQuery {
        let mut query = match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => LocationQuery::coords(lat, lon),
            _ => LocationQuery::default(),
        };
        if let Some(city) = &self.city {
            query = query.with_city_name(city.as_str());
        }
        query
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Daily forecast for the next days.
    Daily {
        #[command(flatten)]
        location: LocationArgs,

        /// Number of days (1-16); defaults to the configured value.
        #[arg(long)]
        days: Option<u32>,

        /// Include the hourly breakdown of every day.
        #[arg(long)]
        hourly: bool,
    },

    /// Hourly forecast for one day.
    Hourly {
        #[command(flatten)]
        location: LocationArgs,

        /// Day to forecast, as YYYY-MM-DD.
        #[arg(long)]
        date: NaiveDate,
    },

    /// Cities searched so far, oldest first.
    History,

    /// The most recently searched city.
    Last,

    /// How often each city has been forecast.
    Cities,

    /// Interactively edit the configuration file.
    Configure,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let config = Config::load()?;
        let store = Store::new(config.resolved_data_dir()?);

        match self.command {
            Command::Daily { location, days, hourly } => {
                let service = service(&config, &store)?;
                let mut history = store.load_history()?;
                let days = days.unwrap_or(config.forecast_days);

                let (forecast, city) = if hourly {
                    service.get_detailed_forecast(days, &mut history, &location.query()).await?
                } else {
                    service.get_daily_forecast(days, &mut history, &location.query()).await?
                };
                store.save_history(&history)?;

                if self.json {
                    render::print_json(&serde_json::json!({ "city": city, "forecast": forecast }))?;
                } else {
                    print!("{}", render::daily(&city, &forecast));
                }
            }
            Command::Hourly { location, date } => {
                let service = service(&config, &store)?;
                let mut history = store.load_history()?;
                let (forecast, city) =
                    service.get_hourly_forecast_for_date(date, &mut history, &location.query()).await?;
                store.save_history(&history)?;

                if self.json {
                    render::print_json(&serde_json::json!({ "city": city, "forecast": forecast }))?;
                } else {
                    print!("{}", render::hourly(&city, date, &forecast));
                }
            }
            Command::History => {
                let names = service(&config, &store)?.get_search_history(&store.load_history()?);
                if self.json {
                    render::print_json(&names)?;
                } else {
                    for name in names {
                        println!("{name}");
                    }
                }
            }
            Command::Last => {
                let city = service(&config, &store)?.get_last_viewed_city(&store.load_history()?)?;
                if self.json {
                    render::print_json(&serde_json::json!({ "last_viewed_city": city }))?;
                } else {
                    println!("{city}");
                }
            }
            Command::Cities => {
                let counts = service(&config, &store)?.get_cities_count().await?;
                if self.json {
                    render::print_json(&counts)?;
                } else {
                    print!("{}", render::cities(&counts));
                }
            }
            Command::Configure => configure(config, &store)?,
        }

        Ok(())
    }
}

/// Opening the service touches the counts database only; no request is made.
fn service(config: &Config, store: &Store) -> anyhow::Result<ForecastService> {
    service_from_config(config, Arc::new(store.counts()?))
}

fn configure(mut config: Config, store: &Store) -> anyhow::Result<()> {
    config.forecast_days = CustomType::<u32>::new("Default number of forecast days:")
        .with_default(config.forecast_days)
        .with_validator(|days: &u32| {
            Ok::<_, inquire::CustomUserError>(if (1..=MAX_FORECAST_DAYS).contains(days) {
                inquire::validator::Validation::Valid
            } else {
                inquire::validator::Validation::Invalid(
                    format!("Must be between 1 and {MAX_FORECAST_DAYS}").into(),
                )
            })
        })
        .prompt()
        .context("Failed to read forecast days")?;

    let persist = Confirm::new("Keep the HTTP cache on disk between runs?")
        .with_default(config.cache.path.is_some())
        .prompt()
        .context("Failed to read cache choice")?;
    config.cache.path = persist.then(|| store.cache_path());

    config.cache.expire_after_secs = CustomType::<u64>::new("Cache expiry in seconds:")
        .with_default(config.cache.expire_after_secs)
        .prompt()
        .context("Failed to read cache expiry")?;

    config.retry.retries = CustomType::<u32>::new("Retries on transport failure:")
        .with_default(config.retry.retries)
        .prompt()
        .context("Failed to read retry count")?;

    config.retry.backoff_factor = CustomType::<f64>::new("Backoff factor in seconds:")
        .with_default(config.retry.backoff_factor)
        .prompt()
        .context("Failed to read backoff factor")?;

    config.save()?;
    println!("Configuration saved to {}", Config::config_file_path()?.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use forecast_core::{Coordinates, SearchHistory, SessionHistory};

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("forecast").chain(args.iter().copied())).expect("parse")
    }

    #[test]
    fn daily_with_city() {
        let cli = parse(&["daily", "London", "--days", "3"]);
        match cli.command {
            Command::Daily { location, days, hourly } => {
                assert_eq!(location.query(), LocationQuery::city("London"));
                assert_eq!(days, Some(3));
                assert!(!hourly);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn negative_coordinates_parse() {
        let cli = parse(&["daily", "--lat", "51.5", "--lon", "-0.12", "--json"]);
        assert!(cli.json);
        match cli.command {
            Command::Daily { location, .. } => {
                assert_eq!(location.query().coords, Some(Coordinates::new(51.5, -0.12)));
                assert_eq!(location.query().city_name, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn lat_requires_lon() {
        let result = Cli::try_parse_from(["forecast", "daily", "--lat", "51.5"]);
        assert!(result.is_err());
    }

    #[test]
    fn hourly_parses_date() {
        let cli = parse(&["hourly", "Oslo", "--date", "2024-05-01"]);
        match cli.command {
            Command::Hourly { date, .. } => {
                assert_eq!(date, NaiveDate::from_ymd_opt(2024, 5, 1).expect("date"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn hourly_rejects_bad_date() {
        assert!(Cli::try_parse_from(["forecast", "hourly", "Oslo", "--date", "tomorrow"]).is_err());
    }

    #[test]
    fn coords_and_city_keep_both() {
        let cli = parse(&["daily", "Paris", "--lat", "48.85", "--lon", "2.35"]);
        match cli.command {
            Command::Daily { location, .. } => {
                let query = location.query();
                assert_eq!(query.city_name.as_deref(), Some("Paris"));
                assert!(query.coords.is_some());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn stored_history_is_read_through_the_service() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Store::new(dir.path());
        let mut saved = SessionHistory::new();
        saved.push("Oslo");
        saved.push("Lima");
        store.save_history(&saved).expect("save");

        let service = service(&Config::default(), &store).expect("service");
        let history = store.load_history().expect("load");

        assert_eq!(service.get_search_history(&history), ["Oslo", "Lima"]);
        assert_eq!(service.get_last_viewed_city(&history).expect("last"), "Lima");
    }
}
