use thiserror::Error;

use crate::http::HttpError;

pub type Result<T, E = ForecastError> = std::result::Result<T, E>;

/// Everything the forecast pipeline can fail with.
///
/// Each variant is a distinct kind so callers can branch on it without
/// inspecting messages. Causes are kept as `source` for diagnostics.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("no coordinates found for city '{0}'")]
    CoordinatesNotFound(String),

    #[error("failed to get coordinates: {message}")]
    GettingCoordinates {
        message: String,
        #[source]
        source: Option<HttpError>,
    },

    #[error("failed to get forecast")]
    GettingForecast(#[source] HttpError),

    #[error("failed to parse forecast: {message}")]
    ParsingForecast {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("repository error")]
    Repository(#[source] anyhow::Error),
}

/// What a client-facing layer should tell the end user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientSignal {
    BadRequest,
    NotFound,
    TryAgainLater,
}

impl ForecastError {
    pub(crate) fn coordinates(message: impl Into<String>, source: HttpError) -> Self {
        Self::GettingCoordinates { message: message.into(), source: Some(source) }
    }

    pub(crate) fn parsing(message: impl Into<String>) -> Self {
        Self::ParsingForecast { message: message.into(), source: None }
    }

    pub fn signal(&self) -> ClientSignal {
        match self {
            Self::InvalidRequest(_) => ClientSignal::BadRequest,
            Self::CoordinatesNotFound(_) | Self::NotFound(_) => ClientSignal::NotFound,
            Self::GettingCoordinates { .. }
            | Self::GettingForecast(_)
            | Self::ParsingForecast { .. }
            | Self::Repository(_) => ClientSignal::TryAgainLater,
        }
    }

    /// Templated message safe to show an end user; never includes causes.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidRequest(reason) => reason.clone(),
            Self::CoordinatesNotFound(city) => format!("City with name {city} not found."),
            Self::NotFound(what) => what.clone(),
            Self::GettingCoordinates { .. } => {
                "Can't get coordinates for the requested location. Please try again later.".into()
            }
            Self::GettingForecast(_) | Self::ParsingForecast { .. } => {
                "Can't get forecast. Please try again later.".into()
            }
            Self::Repository(_) => "Can't reach storage. Please try again later.".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_kinds_map_to_not_found_signal() {
        assert_eq!(ForecastError::CoordinatesNotFound("Atlantis".into()).signal(), ClientSignal::NotFound);
        assert_eq!(ForecastError::NotFound("empty".into()).signal(), ClientSignal::NotFound);
    }

    #[test]
    fn failures_map_to_try_again_later() {
        let err = ForecastError::parsing("missing daily");
        assert_eq!(err.signal(), ClientSignal::TryAgainLater);
        assert_eq!(err.user_message(), "Can't get forecast. Please try again later.");
    }

    #[test]
    fn user_message_hides_internal_detail() {
        let err = ForecastError::GettingCoordinates {
            message: "dns lookup failed for geocoding-api.internal".into(),
            source: None,
        };
        assert!(!err.user_message().contains("dns"));
    }

    #[test]
    fn invalid_request_is_bad_request() {
        let err = ForecastError::InvalidRequest("Either city_name or coords must be provided".into());
        assert_eq!(err.signal(), ClientSignal::BadRequest);
        assert_eq!(err.user_message(), "Either city_name or coords must be provided");
    }
}
