//! Yahoo YQL `weather.forecast` payload decoding.
//!
//! The provider sends most numbers as JSON strings (`"temp": "12"`); both
//! strings and numbers are accepted.

use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer};
use serde::Deserialize;
use weatherdeck_core::City;

use crate::types::{
    CurrentConditions, DayForecast, Forecast, ForecastSource, WeatherError, MAX_DAYS,
};

#[derive(Debug, Deserialize)]
struct YqlEnvelope {
    query: YqlQuery,
}

#[derive(Debug, Deserialize)]
struct YqlQuery {
    created: DateTime<Utc>,
    results: Option<YqlResults>,
}

#[derive(Debug, Deserialize)]
struct YqlResults {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    astronomy: Astronomy,
    atmosphere: Atmosphere,
    wind: Wind,
    item: Item,
}

#[derive(Debug, Deserialize)]
struct Astronomy {
    sunrise: String,
    sunset: String,
}

#[derive(Debug, Deserialize)]
struct Atmosphere {
    #[serde(deserialize_with = "numeric")]
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct Wind {
    #[serde(deserialize_with = "numeric")]
    speed: f64,
    #[serde(deserialize_with = "numeric")]
    direction: f64,
}

#[derive(Debug, Deserialize)]
struct Item {
    condition: Condition,
    #[serde(default)]
    forecast: Vec<Daily>,
}

#[derive(Debug, Deserialize)]
struct Condition {
    #[serde(deserialize_with = "code")]
    code: i32,
    date: String,
    #[serde(deserialize_with = "numeric")]
    temp: f64,
    text: String,
}

#[derive(Debug, Deserialize)]
struct Daily {
    #[serde(deserialize_with = "code")]
    code: i32,
    day: String,
    #[serde(deserialize_with = "numeric")]
    high: f64,
    #[serde(deserialize_with = "numeric")]
    low: f64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Numeric {
    Number(f64),
    Text(String),
}

fn numeric<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    match Numeric::deserialize(deserializer)? {
        Numeric::Number(n) => Ok(n),
        Numeric::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("not a number: {:?}", s))),
    }
}

fn code<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i32, D::Error> {
    let value = numeric(deserializer)?;
    if value.fract() != 0.0 {
        return Err(de::Error::custom(format!("not a condition code: {}", value)));
    }
    Ok(value as i32)
}

/// Decode a provider response body into a [`Forecast`] for `city`.
///
/// # Errors
/// `WeatherError::Parse` for malformed bodies and for responses without
/// results (unknown city key).
pub fn decode_forecast(
    city: &City,
    body: &[u8],
    source: ForecastSource,
) -> Result<Forecast, WeatherError> {
    let envelope: YqlEnvelope = serde_json::from_slice(body)?;
    let created = envelope.query.created;
    let channel = envelope
        .query
        .results
        .ok_or_else(|| WeatherError::Parse(format!("No results for {}", city.key)))?
        .channel;

    let condition = channel.item.condition;
    let current = CurrentConditions {
        description: condition.text,
        code: condition.code,
        date: condition.date,
        temperature: condition.temp,
        humidity: channel.atmosphere.humidity,
        wind_speed: channel.wind.speed,
        wind_direction: channel.wind.direction,
        sunrise: channel.astronomy.sunrise,
        sunset: channel.astronomy.sunset,
    };

    let days = channel
        .item
        .forecast
        .into_iter()
        .take(MAX_DAYS)
        .map(|d| DayForecast {
            day: d.day,
            code: d.code,
            high: d.high,
            low: d.low,
        })
        .collect();

    Ok(Forecast {
        key: city.key.clone(),
        label: city.label.clone(),
        created,
        source,
        current,
        days,
    })
}

#[cfg(test)]
pub(crate) mod fixtures {
    use serde_json::json;

    /// A provider body in the shape the YQL endpoint returns.
    pub fn yql_body(created: &str, temp: &str, days: usize) -> Vec<u8> {
        let forecast: Vec<_> = (0..days)
            .map(|i| {
                let day = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"][i % 7];
                json!({
                    "code": "30",
                    "date": format!("{:02} May 2017", i + 1),
                    "day": day,
                    "high": "21",
                    "low": "9",
                    "text": "Partly Cloudy"
                })
            })
            .collect();

        json!({
            "query": {
                "count": 1,
                "created": created,
                "lang": "en-US",
                "results": {
                    "channel": {
                        "astronomy": { "sunrise": "5:32 am", "sunset": "8:21 pm" },
                        "atmosphere": { "humidity": "56", "pressure": "1004.0" },
                        "wind": { "chill": "55", "direction": "225", "speed": "11.27" },
                        "item": {
                            "condition": {
                                "code": "28",
                                "date": "Tue, 02 May 2017 01:00 PM EEST",
                                "temp": temp,
                                "text": "Mostly Cloudy"
                            },
                            "forecast": forecast
                        }
                    }
                }
            }
        })
        .to_string()
        .into_bytes()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::fixtures::yql_body;
    use super::*;
    use crate::types::WeatherCondition;

    fn kyiv() -> City {
        City::new("924938", "Kyiv, UA")
    }

    #[test]
    fn test_decode_string_numbers() {
        let body = yql_body("2017-05-02T10:12:31Z", "12", 10);
        let forecast = decode_forecast(&kyiv(), &body, ForecastSource::Network).unwrap();

        assert_eq!(forecast.key, "924938");
        assert_eq!(forecast.label, "Kyiv, UA");
        assert_eq!(forecast.created.to_rfc3339(), "2017-05-02T10:12:31+00:00");
        assert_eq!(forecast.current.temperature, 12.0);
        assert_eq!(forecast.current.humidity, 56.0);
        assert_eq!(forecast.current.wind_direction, 225.0);
        assert_eq!(forecast.current.sunrise, "5:32 am");
        assert_eq!(forecast.condition(), Some(WeatherCondition::Cloudy));
        assert_eq!(forecast.days.len(), MAX_DAYS);
        assert_eq!(forecast.days[0].day, "Mon");
        assert_eq!(forecast.days[0].high, 21.0);
    }

    #[test]
    fn test_decode_plain_numbers() {
        let body = br#"{"query":{"created":"2017-05-02T10:12:31Z","results":{"channel":{
            "astronomy":{"sunrise":"5:32 am","sunset":"8:21 pm"},
            "atmosphere":{"humidity":56},
            "wind":{"speed":11.27,"direction":225},
            "item":{"condition":{"code":32,"date":"d","temp":18.5,"text":"Sunny"},
                    "forecast":[{"code":32,"day":"Tue","high":20,"low":8}]}}}}}"#;

        let forecast = decode_forecast(&kyiv(), body, ForecastSource::Cache).unwrap();
        assert_eq!(forecast.source, ForecastSource::Cache);
        assert_eq!(forecast.current.temperature, 18.5);
        assert_eq!(forecast.condition(), Some(WeatherCondition::ClearDay));
        assert_eq!(forecast.days.len(), 1);
    }

    #[test]
    fn test_decode_null_results() {
        let body = br#"{"query":{"count":0,"created":"2017-05-02T10:12:31Z","results":null}}"#;
        let result = decode_forecast(&kyiv(), body, ForecastSource::Network);
        assert!(matches!(result, Err(WeatherError::Parse(msg)) if msg.contains("924938")));
    }

    #[test]
    fn test_decode_garbage() {
        let result = decode_forecast(&kyiv(), b"<html>502</html>", ForecastSource::Network);
        assert!(matches!(result, Err(WeatherError::Parse(_))));
    }

    #[test]
    fn test_decode_rejects_non_numeric_temperature() {
        let body = yql_body("2017-05-02T10:12:31Z", "warm", 1);
        assert!(decode_forecast(&kyiv(), &body, ForecastSource::Network).is_err());
    }
}
