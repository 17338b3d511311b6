// datachat-core/src/tools/weather.rs

//! Current-conditions lookup against an OpenWeather-compatible API.

use reqwest::Client;
use serde::Deserialize;

use super::status_error;
use crate::config::WeatherProviderConfig;
use crate::errors::ToolError;
use crate::models::domain::{CurrentConditions, DailyOutlook, WeatherReport};

#[derive(Debug)]
pub enum WeatherQuery {
    Coordinates { latitude: f64, longitude: f64 },
    City(String),
}

#[derive(Deserialize, Default)]
struct OwmMain {
    #[serde(default)]
    temp: f64,
    #[serde(default)]
    feels_like: f64,
    #[serde(default)]
    humidity: f64,
    #[serde(default)]
    temp_max: f64,
    #[serde(default)]
    temp_min: f64,
}

#[derive(Deserialize, Default)]
struct OwmCondition {
    #[serde(default)]
    id: i64,
    #[serde(default)]
    description: String,
    #[serde(default)]
    main: String,
}

#[derive(Deserialize, Default)]
struct OwmWind {
    #[serde(default)]
    speed: f64,
}

#[derive(Deserialize, Default)]
struct OwmSys {
    #[serde(default)]
    country: String,
    #[serde(default)]
    sunrise: i64,
    #[serde(default)]
    sunset: i64,
}

#[derive(Deserialize, Default)]
struct OwmResponse {
    #[serde(default)]
    main: OwmMain,
    #[serde(default)]
    weather: Vec<OwmCondition>,
    #[serde(default)]
    wind: OwmWind,
    #[serde(default)]
    sys: OwmSys,
    #[serde(default)]
    name: String,
}

fn iso_from_epoch(secs: i64) -> String {
    chrono::DateTime::<chrono::Utc>::from_timestamp(secs, 0)
        .map(|dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
        .unwrap_or_default()
}

pub async fn fetch_weather(
    client: &Client,
    config: &WeatherProviderConfig,
    query: &WeatherQuery,
) -> Result<WeatherReport, ToolError> {
    if config.api_key.is_empty() {
        return Err(ToolError::Configuration(
            "weather provider API key is not set".to_string(),
        ));
    }

    let url = format!("{}/data/2.5/weather", config.base_url);
    let request = client.get(&url).query(&[
        ("units", "metric".to_string()),
        ("appid", config.api_key.clone()),
    ]);
    let request = match query {
        WeatherQuery::Coordinates {
            latitude,
            longitude,
        } => request.query(&[("lat", latitude.to_string()), ("lon", longitude.to_string())]),
        WeatherQuery::City(city) => request.query(&[("q", city.clone())]),
    };

    let response = request.send().await?;
    if response.status() == reqwest::StatusCode::NOT_FOUND {
        let what = match query {
            WeatherQuery::Coordinates { .. } => "the given coordinates".to_string(),
            WeatherQuery::City(city) => format!("\"{}\"", city),
        };
        return Err(ToolError::NotFound(format!(
            "No weather data found for {}.",
            what
        )));
    }
    if !response.status().is_success() {
        return Err(status_error("OpenWeather API", response).await);
    }

    let data: OwmResponse = response
        .json()
        .await
        .map_err(|e| ToolError::Provider(format!("OpenWeather API returned invalid JSON: {}", e)))?;
    let condition = data.weather.into_iter().next().unwrap_or_default();

    Ok(WeatherReport {
        current: CurrentConditions {
            temperature: data.main.temp,
            temperature_feel: data.main.feels_like,
            humidity: data.main.humidity,
            weather_code: condition.id,
            weather_description: condition.description,
            weather_main: condition.main,
            wind_speed: data.wind.speed,
            city_name: data.name,
            country: data.sys.country,
        },
        forecast: DailyOutlook {
            max_temp: data.main.temp_max,
            min_temp: data.main.temp_min,
            sunrise: iso_from_epoch(data.sys.sunrise),
            sunset: iso_from_epoch(data.sys.sunset),
        },
    })
}
