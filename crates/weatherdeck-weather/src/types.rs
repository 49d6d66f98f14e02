use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use weatherdeck_core::{AppError, NetworkError};
use weatherdeck_proxy::ProxyError;

/// Where a delivered forecast came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecastSource {
    /// Last stored response, delivered while the network read is pending
    Cache,
    Network,
}

/// Icon categories mapped from Yahoo condition codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WeatherCondition {
    ClearDay,
    Rain,
    Thunderstorms,
    Snow,
    Fog,
    Wind,
    Cloudy,
    PartlyCloudyNight,
    PartlyCloudyDay,
}

impl WeatherCondition {
    /// Convert a Yahoo weather code to an icon category.
    /// See: https://developer.yahoo.com/weather/documentation.html#codes
    ///
    /// Codes outside the table have no icon.
    pub fn from_yahoo_code(code: i32) -> Option<Self> {
        let condition = match code {
            25 | 32 | 33 | 34 | 36 | 3200 => Self::ClearDay,
            0 | 1 | 2 | 6 | 8..=12 | 17 | 35 | 40 => Self::Rain,
            3 | 4 | 37..=39 | 45 | 47 => Self::Thunderstorms,
            5 | 7 | 13 | 14 | 16 | 18 | 41..=43 | 46 => Self::Snow,
            15 | 19..=22 => Self::Fog,
            23 | 24 => Self::Wind,
            26..=28 | 31 => Self::Cloudy,
            29 => Self::PartlyCloudyNight,
            30 | 44 => Self::PartlyCloudyDay,
            _ => return None,
        };
        Some(condition)
    }

    pub fn icon_class(&self) -> &'static str {
        match self {
            Self::ClearDay => "clear-day",
            Self::Rain => "rain",
            Self::Thunderstorms => "thunderstorms",
            Self::Snow => "snow",
            Self::Fog => "fog",
            Self::Wind => "wind",
            Self::Cloudy => "cloudy",
            Self::PartlyCloudyNight => "partly-cloudy-night",
            Self::PartlyCloudyDay => "partly-cloudy-day",
        }
    }
}

/// Current conditions for a city
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub description: String,
    pub code: i32,
    /// Observation time as the provider formats it
    pub date: String,
    pub temperature: f64,
    pub humidity: f64,
    pub wind_speed: f64,
    /// Degrees
    pub wind_direction: f64,
    pub sunrise: String,
    pub sunset: String,
}

/// Daily forecast entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayForecast {
    /// Provider day name ("Mon")
    pub day: String,
    pub code: i32,
    pub high: f64,
    pub low: f64,
}

/// Maximum number of daily entries kept per forecast
pub const MAX_DAYS: usize = 7;

/// A decoded forecast, tagged with the city it was requested for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub key: String,
    pub label: String,
    /// When the provider produced the response
    pub created: DateTime<Utc>,
    pub source: ForecastSource,
    pub current: CurrentConditions,
    pub days: Vec<DayForecast>,
}

impl Forecast {
    pub fn condition(&self) -> Option<WeatherCondition> {
        WeatherCondition::from_yahoo_code(self.current.code)
    }

    /// Strictly newer than `other` by provider timestamp
    pub fn is_fresher_than(&self, other: &Forecast) -> bool {
        self.created > other.created
    }
}

/// Forecast fetch errors
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("Network error: {0}")]
    Network(#[from] ProxyError),
    #[error("Provider returned HTTP {0}")]
    Status(u16),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Fetch cancelled")]
    Cancelled,
    #[error("Fetch task failed: {0}")]
    Task(String),
}

impl From<serde_json::Error> for WeatherError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<WeatherError> for AppError {
    fn from(err: WeatherError) -> Self {
        match err {
            WeatherError::Network(e) => e.into(),
            WeatherError::Status(status) => AppError::NetworkFailure(NetworkError::ServerError {
                status,
                message: "forecast request failed".to_string(),
            }),
            WeatherError::Parse(msg) => AppError::DecodeFailure(msg),
            WeatherError::Cancelled | WeatherError::Task(_) => {
                AppError::Other(anyhow::anyhow!(err.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yahoo_code_clear() {
        for code in [25, 32, 33, 34, 36, 3200] {
            assert_eq!(WeatherCondition::from_yahoo_code(code), Some(WeatherCondition::ClearDay));
        }
    }

    #[test]
    fn test_yahoo_code_rain() {
        for code in [0, 1, 2, 6, 8, 9, 10, 11, 12, 17, 35, 40] {
            assert_eq!(WeatherCondition::from_yahoo_code(code), Some(WeatherCondition::Rain));
        }
    }

    #[test]
    fn test_yahoo_code_thunderstorms() {
        for code in [3, 4, 37, 38, 39, 45, 47] {
            assert_eq!(
                WeatherCondition::from_yahoo_code(code),
                Some(WeatherCondition::Thunderstorms)
            );
        }
    }

    #[test]
    fn test_yahoo_code_snow() {
        for code in [5, 7, 13, 14, 16, 18, 41, 42, 43, 46] {
            assert_eq!(WeatherCondition::from_yahoo_code(code), Some(WeatherCondition::Snow));
        }
    }

    #[test]
    fn test_yahoo_code_fog_and_wind() {
        for code in [15, 19, 20, 21, 22] {
            assert_eq!(WeatherCondition::from_yahoo_code(code), Some(WeatherCondition::Fog));
        }
        assert_eq!(WeatherCondition::from_yahoo_code(23), Some(WeatherCondition::Wind));
        assert_eq!(WeatherCondition::from_yahoo_code(24), Some(WeatherCondition::Wind));
    }

    #[test]
    fn test_yahoo_code_clouds() {
        for code in [26, 27, 28, 31] {
            assert_eq!(WeatherCondition::from_yahoo_code(code), Some(WeatherCondition::Cloudy));
        }
        assert_eq!(
            WeatherCondition::from_yahoo_code(29),
            Some(WeatherCondition::PartlyCloudyNight)
        );
        assert_eq!(
            WeatherCondition::from_yahoo_code(30),
            Some(WeatherCondition::PartlyCloudyDay)
        );
        assert_eq!(
            WeatherCondition::from_yahoo_code(44),
            Some(WeatherCondition::PartlyCloudyDay)
        );
    }

    #[test]
    fn test_yahoo_code_unknown() {
        assert_eq!(WeatherCondition::from_yahoo_code(48), None);
        assert_eq!(WeatherCondition::from_yahoo_code(-1), None);
    }

    #[test]
    fn test_icon_class() {
        assert_eq!(WeatherCondition::PartlyCloudyNight.icon_class(), "partly-cloudy-night");
        assert_eq!(WeatherCondition::ClearDay.icon_class(), "clear-day");
    }

    #[test]
    fn test_decode_failure_maps_to_app_error() {
        let err: AppError = WeatherError::Parse("missing channel".into()).into();
        assert!(matches!(err, AppError::DecodeFailure(_)));
        let err: AppError = WeatherError::Status(503).into();
        assert!(matches!(
            err,
            AppError::NetworkFailure(NetworkError::ServerError { status: 503, .. })
        ));
    }
}
