// datachat-core/src/tools/mod.rs

//! The five data-lookup tools offered to the model, plus the argument
//! parsing and schema definitions shared between them.

pub mod coin;
pub mod earthquake;
pub mod exchange_rate;
pub mod stock;
pub mod weather;

use reqwest::Client;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;

use crate::config::ProviderConfig;
use crate::errors::ToolError;
use crate::models::domain::DomainData;
use crate::models::tools::{
    ToolDefinition, ToolInput, ToolParameter, ToolParameterType, ToolParametersDefinition,
};

use coin::CoinMode;
use earthquake::{QuakeOptions, QuakeSearch};
use exchange_rate::RateQuery;
use stock::{OutputSize, StockInterval, StockMode};
use weather::WeatherQuery;

/// Typed arguments for one tool invocation, decoded from the raw
/// JSON map the model produced.
#[derive(Debug)]
pub enum ToolArguments {
    Weather {
        query: WeatherQuery,
    },
    Earthquake {
        search: QuakeSearch,
        options: QuakeOptions,
    },
    ExchangeRate {
        query: RateQuery,
    },
    Coin {
        mode: CoinMode,
        coin_id: String,
        vs_currency: String,
        days: u32,
    },
    Stock {
        mode: StockMode,
        symbol: String,
        interval: StockInterval,
        output_size: OutputSize,
    },
}

impl fmt::Display for ToolArguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolArguments::Weather { query } => match query {
                WeatherQuery::Coordinates {
                    latitude,
                    longitude,
                } => write!(f, "coordinates: {}, {}", latitude, longitude),
                WeatherQuery::City(city) => write!(f, "city: '{}'", city),
            },
            ToolArguments::Earthquake { search, options } => {
                match search {
                    QuakeSearch::Region(region) => write!(f, "region: '{}'", region)?,
                    QuakeSearch::Location(location) => write!(f, "location: '{}'", location)?,
                    QuakeSearch::Coordinates {
                        latitude,
                        longitude,
                    } => write!(f, "coordinates: {}, {}", latitude, longitude)?,
                }
                write!(
                    f,
                    ", radius: {}km, days: {}, min_magnitude: {}",
                    options.radius, options.days, options.min_magnitude
                )
            }
            ToolArguments::ExchangeRate { query } => {
                write!(f, "mode: {:?}, base: {}", query.mode, query.base_currency)?;
                if let Some(targets) = &query.target_currencies {
                    write!(f, ", targets: {}", targets)?;
                }
                Ok(())
            }
            ToolArguments::Coin {
                mode,
                coin_id,
                vs_currency,
                days,
            } => write!(
                f,
                "mode: {:?}, coin: '{}', vs_currency: {}, days: {}",
                mode, coin_id, vs_currency, days
            ),
            ToolArguments::Stock {
                mode,
                symbol,
                interval,
                ..
            } => write!(f, "mode: {:?}, symbol: '{}', interval: {:?}", mode, symbol, interval),
        }
    }
}

fn get_required_arg<T>(args: &HashMap<String, JsonValue>, key: &str) -> Result<T, ToolError>
where
    T: serde::de::DeserializeOwned,
{
    let value = args
        .get(key)
        .ok_or_else(|| ToolError::InvalidParameters(format!("Missing required argument: '{}'", key)))?;
    serde_json::from_value(value.clone()).map_err(|_| {
        ToolError::InvalidParameters(format!(
            "Invalid type or value for argument '{}'. Expected {}.",
            key,
            std::any::type_name::<T>()
        ))
    })
}

fn get_optional_arg<T>(args: &HashMap<String, JsonValue>, key: &str) -> Result<Option<T>, ToolError>
where
    T: serde::de::DeserializeOwned,
{
    match args.get(key) {
        Some(value) => {
            if value.is_null() {
                Ok(None)
            } else {
                serde_json::from_value(value.clone()).map(Some).map_err(|_| {
                    ToolError::InvalidParameters(format!(
                        "Invalid type or value for optional argument '{}'. Expected {}.",
                        key,
                        std::any::type_name::<T>()
                    ))
                })
            }
        }
        None => Ok(None),
    }
}

pub fn parse_tool_arguments(
    tool_name: &str,
    args: &HashMap<String, JsonValue>,
) -> Result<ToolArguments, ToolError> {
    match tool_name {
        "get_weather" => {
            let location_type: String = get_required_arg(args, "location_type")?;
            let query = match location_type.as_str() {
                "coordinates" => {
                    let latitude = get_optional_arg(args, "latitude")?.ok_or_else(|| {
                        ToolError::InvalidParameters(
                            "'latitude' is required for coordinate lookups".to_string(),
                        )
                    })?;
                    let longitude = get_optional_arg(args, "longitude")?.ok_or_else(|| {
                        ToolError::InvalidParameters(
                            "'longitude' is required for coordinate lookups".to_string(),
                        )
                    })?;
                    WeatherQuery::Coordinates {
                        latitude,
                        longitude,
                    }
                }
                "city_name" => {
                    let city: String = get_optional_arg(args, "city_name")?.ok_or_else(|| {
                        ToolError::InvalidParameters(
                            "'city_name' is required for city lookups".to_string(),
                        )
                    })?;
                    WeatherQuery::City(city)
                }
                other => {
                    return Err(ToolError::InvalidParameters(format!(
                        "Unknown location_type: '{}'",
                        other
                    )))
                }
            };
            Ok(ToolArguments::Weather { query })
        }
        "get_earthquake" => {
            let search_type: String = get_required_arg(args, "search_type")?;
            let search = match search_type.as_str() {
                "region" => QuakeSearch::Region(get_optional_arg(args, "region")?.ok_or_else(
                    || {
                        ToolError::InvalidParameters(
                            "'region' is required for region searches".to_string(),
                        )
                    },
                )?),
                "location" => QuakeSearch::Location(
                    get_optional_arg(args, "location")?.ok_or_else(|| {
                        ToolError::InvalidParameters(
                            "'location' is required for location searches".to_string(),
                        )
                    })?,
                ),
                "coordinates" => {
                    let latitude = get_optional_arg(args, "latitude")?.ok_or_else(|| {
                        ToolError::InvalidParameters(
                            "'latitude' is required for coordinate searches".to_string(),
                        )
                    })?;
                    let longitude = get_optional_arg(args, "longitude")?.ok_or_else(|| {
                        ToolError::InvalidParameters(
                            "'longitude' is required for coordinate searches".to_string(),
                        )
                    })?;
                    QuakeSearch::Coordinates {
                        latitude,
                        longitude,
                    }
                }
                other => {
                    return Err(ToolError::InvalidParameters(format!(
                        "Unknown search_type: '{}'",
                        other
                    )))
                }
            };
            let defaults = QuakeOptions::default();
            let options = QuakeOptions {
                radius: get_optional_arg(args, "radius")?.unwrap_or(defaults.radius),
                days: get_optional_arg(args, "days")?.unwrap_or(defaults.days),
                min_magnitude: get_optional_arg(args, "min_magnitude")?
                    .unwrap_or(defaults.min_magnitude),
            };
            Ok(ToolArguments::Earthquake { search, options })
        }
        "get_exchange_rate" => {
            let mode: String = get_required_arg(args, "mode")?;
            let mode = exchange_rate::RateMode::parse(&mode)?;
            Ok(ToolArguments::ExchangeRate {
                query: RateQuery {
                    mode,
                    base_currency: get_required_arg(args, "base_currency")?,
                    target_currencies: get_optional_arg(args, "target_currencies")?,
                    amount: get_optional_arg(args, "amount")?.unwrap_or(1.0),
                    date: get_optional_arg(args, "date")?,
                    start_date: get_optional_arg(args, "start_date")?,
                    end_date: get_optional_arg(args, "end_date")?,
                    days: get_optional_arg(args, "days")?,
                },
            })
        }
        "get_coin" => {
            let mode: String = get_required_arg(args, "mode")?;
            Ok(ToolArguments::Coin {
                mode: CoinMode::parse(&mode)?,
                coin_id: get_required_arg(args, "coin_id")?,
                vs_currency: get_optional_arg(args, "vs_currency")?
                    .unwrap_or_else(|| "usd".to_string()),
                days: get_optional_arg(args, "days")?.unwrap_or(7),
            })
        }
        "get_stock" => {
            let mode: String = get_required_arg(args, "mode")?;
            let interval: Option<String> = get_optional_arg(args, "interval")?;
            let output_size: Option<String> = get_optional_arg(args, "output_size")?;
            Ok(ToolArguments::Stock {
                mode: StockMode::parse(&mode)?,
                symbol: get_required_arg(args, "symbol")?,
                interval: match interval {
                    Some(i) => StockInterval::parse(&i)?,
                    None => StockInterval::Daily,
                },
                output_size: match output_size {
                    Some(s) => OutputSize::parse(&s)?,
                    None => OutputSize::Compact,
                },
            })
        }
        unknown => Err(ToolError::InvalidParameters(format!(
            "Unknown tool name: {}",
            unknown
        ))),
    }
}

/// Executes model-issued tool calls against the configured upstream
/// providers.
pub struct ToolRegistry {
    client: Client,
    providers: ProviderConfig,
}

impl ToolRegistry {
    pub fn new(client: Client, providers: ProviderConfig) -> Self {
        Self { client, providers }
    }

    fn string_param(description: &str) -> ToolParameter {
        ToolParameter {
            param_type: ToolParameterType::String,
            description: description.to_string(),
            enum_values: None,
        }
    }

    fn number_param(description: &str) -> ToolParameter {
        ToolParameter {
            param_type: ToolParameterType::Number,
            description: description.to_string(),
            enum_values: None,
        }
    }

    fn int_param(description: &str) -> ToolParameter {
        ToolParameter {
            param_type: ToolParameterType::Integer,
            description: description.to_string(),
            enum_values: None,
        }
    }

    fn enum_param(description: &str, values: &[&str]) -> ToolParameter {
        ToolParameter {
            param_type: ToolParameterType::String,
            description: description.to_string(),
            enum_values: Some(values.iter().map(|v| v.to_string()).collect()),
        }
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        vec![
            ToolDefinition {
                name: "get_weather".to_string(),
                description: "Get current weather information for a location or city".to_string(),
                parameters: ToolParametersDefinition {
                    param_type: "object".to_string(),
                    properties: HashMap::from([
                        ("location_type".to_string(), Self::enum_param("Location type: coordinates or city name", &["coordinates", "city_name"])),
                        ("latitude".to_string(), Self::number_param("Latitude (required for coordinate lookups)")),
                        ("longitude".to_string(), Self::number_param("Longitude (required for coordinate lookups)")),
                        ("city_name".to_string(), Self::string_param("City name (required for city lookups)")),
                    ]),
                    required: vec!["location_type".to_string()],
                },
            },
            ToolDefinition {
                name: "get_earthquake".to_string(),
                description: "Get recent earthquakes around a region, city or coordinate".to_string(),
                parameters: ToolParametersDefinition {
                    param_type: "object".to_string(),
                    properties: HashMap::from([
                        ("search_type".to_string(), Self::enum_param("Search type: a named region (like Turkey), a free-text location (any city/place) or coordinates", &["region", "location", "coordinates"])),
                        ("region".to_string(), Self::string_param("Region name (e.g. \"Turkey\", \"California\", \"Japan\", \"Italy\", \"Greece\") - required for region searches")),
                        ("location".to_string(), Self::string_param("Any city or place name (e.g. \"Istanbul\", \"Tokyo\", \"Rome\", \"Paris\") - required for location searches")),
                        ("latitude".to_string(), Self::number_param("Center latitude - required for coordinate searches")),
                        ("longitude".to_string(), Self::number_param("Center longitude - required for coordinate searches")),
                        ("radius".to_string(), Self::number_param("Search radius in km for coordinate or location searches (default: 300)")),
                        ("days".to_string(), Self::int_param("How many days of data to fetch (default: 30)")),
                        ("min_magnitude".to_string(), Self::number_param("Minimum magnitude filter (default: 3.0)")),
                    ]),
                    required: vec!["search_type".to_string()],
                },
            },
            ToolDefinition {
                name: "get_exchange_rate".to_string(),
                description: "Get currency exchange rates or convert between currencies, including historical data".to_string(),
                parameters: ToolParametersDefinition {
                    param_type: "object".to_string(),
                    properties: HashMap::from([
                        ("mode".to_string(), Self::enum_param("Operation mode: rates (current rates), convert (conversion) or historical (historical rate data)", &["rates", "convert", "historical"])),
                        ("base_currency".to_string(), Self::string_param("Base currency code (like USD, EUR, TRY)")),
                        ("target_currencies".to_string(), Self::string_param("Target currencies (comma separated: USD,EUR,TRY). All available rates are returned when omitted.")),
                        ("amount".to_string(), Self::number_param("Amount to convert (used in convert mode, default: 1)")),
                        ("date".to_string(), Self::string_param("Single date for past rates (YYYY-MM-DD). Latest rates are used when omitted.")),
                        ("start_date".to_string(), Self::string_param("Start date for historical queries (YYYY-MM-DD, used in historical mode)")),
                        ("end_date".to_string(), Self::string_param("End date for historical queries (YYYY-MM-DD, used in historical mode)")),
                        ("days".to_string(), Self::int_param("Fetch the last N days of data (alternative to start_date/end_date)")),
                    ]),
                    required: vec!["mode".to_string(), "base_currency".to_string()],
                },
            },
            ToolDefinition {
                name: "get_coin".to_string(),
                description: "Get cryptocurrency information".to_string(),
                parameters: ToolParametersDefinition {
                    param_type: "object".to_string(),
                    properties: HashMap::from([
                        ("mode".to_string(), Self::enum_param("Operation mode: price (current price), historical (past price data), or info (coin details)", &["price", "historical", "info"])),
                        ("coin_id".to_string(), Self::string_param("Cryptocurrency id or symbol (e.g. bitcoin, eth, BNB)")),
                        ("vs_currency".to_string(), Self::string_param("Comparison currency (e.g. usd, eur, try; default: usd)")),
                        ("days".to_string(), Self::int_param("Number of days for historical mode (1, 7, 14, 30, 90, 180, 365; default: 7)")),
                    ]),
                    required: vec!["mode".to_string(), "coin_id".to_string()],
                },
            },
            ToolDefinition {
                name: "get_stock".to_string(),
                description: "Get stock market information".to_string(),
                parameters: ToolParametersDefinition {
                    param_type: "object".to_string(),
                    properties: HashMap::from([
                        ("mode".to_string(), Self::enum_param("Operation mode: quote (current price), historical (past price data), or search (symbol search)", &["quote", "historical", "search"])),
                        ("symbol".to_string(), Self::string_param("Stock symbol (e.g. AAPL, MSFT, TSLA, THYAO.IST)")),
                        ("interval".to_string(), Self::enum_param("Data interval for historical mode (default: daily)", &["daily", "weekly", "monthly"])),
                        ("output_size".to_string(), Self::enum_param("Data size for historical mode: compact (last 100 points) or full (20+ years)", &["compact", "full"])),
                    ]),
                    required: vec!["mode".to_string(), "symbol".to_string()],
                },
            },
        ]
    }

    pub async fn execute(&self, tool_name: &str, input: &ToolInput) -> Result<DomainData, ToolError> {
        let parsed_args = parse_tool_arguments(tool_name, &input.arguments)?;

        tracing::info!(
            tool_name = tool_name,
            args = %parsed_args,
            "Executing tool"
        );

        match parsed_args {
            ToolArguments::Weather { query } => {
                let report =
                    weather::fetch_weather(&self.client, &self.providers.weather, &query).await?;
                Ok(DomainData::Weather(report))
            }
            ToolArguments::Earthquake { search, options } => {
                let report = earthquake::fetch_earthquakes(
                    &self.client,
                    &self.providers.earthquake,
                    &search,
                    &options,
                )
                .await?;
                Ok(DomainData::Earthquake(report))
            }
            ToolArguments::ExchangeRate { query } => {
                let report = exchange_rate::fetch_exchange_rate(
                    &self.client,
                    &self.providers.exchange_rate,
                    &query,
                )
                .await?;
                Ok(DomainData::ExchangeRate(report))
            }
            ToolArguments::Coin {
                mode,
                coin_id,
                vs_currency,
                days,
            } => {
                let report = coin::fetch_coin(
                    &self.client,
                    &self.providers.coin,
                    mode,
                    &coin_id,
                    &vs_currency,
                    days,
                )
                .await?;
                Ok(DomainData::Coin(report))
            }
            ToolArguments::Stock {
                mode,
                symbol,
                interval,
                output_size,
            } => {
                let report = stock::fetch_stock(
                    &self.client,
                    &self.providers.stock,
                    mode,
                    &symbol,
                    interval,
                    output_size,
                )
                .await?;
                Ok(DomainData::Stock(report))
            }
        }
    }
}

/// Folds a non-success upstream response into a `Provider` error
/// carrying the status and body.
pub(crate) async fn status_error(api_name: &str, response: reqwest::Response) -> ToolError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    ToolError::Provider(format!("{} error: {} - {}", api_name, status, body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(pairs: &[(&str, JsonValue)]) -> HashMap<String, JsonValue> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_parse_weather_city() {
        let parsed = parse_tool_arguments(
            "get_weather",
            &args(&[
                ("location_type", json!("city_name")),
                ("city_name", json!("Istanbul")),
            ]),
        )
        .unwrap();
        match parsed {
            ToolArguments::Weather {
                query: WeatherQuery::City(city),
            } => assert_eq!(city, "Istanbul"),
            other => panic!("unexpected parse: {:?}", other),
        }
    }

    #[test]
    fn test_parse_weather_coordinates_require_both() {
        let result = parse_tool_arguments(
            "get_weather",
            &args(&[
                ("location_type", json!("coordinates")),
                ("latitude", json!(41.0)),
            ]),
        );
        assert!(matches!(result, Err(ToolError::InvalidParameters(_))));
    }

    #[test]
    fn test_parse_earthquake_defaults() {
        let parsed = parse_tool_arguments(
            "get_earthquake",
            &args(&[
                ("search_type", json!("region")),
                ("region", json!("Turkey")),
            ]),
        )
        .unwrap();
        match parsed {
            ToolArguments::Earthquake { options, .. } => {
                assert_eq!(options.radius, 300.0);
                assert_eq!(options.days, 30);
                assert_eq!(options.min_magnitude, 3.0);
            }
            other => panic!("unexpected parse: {:?}", other),
        }
    }

    #[test]
    fn test_parse_exchange_rate_amount_default() {
        let parsed = parse_tool_arguments(
            "get_exchange_rate",
            &args(&[
                ("mode", json!("convert")),
                ("base_currency", json!("usd")),
                ("target_currencies", json!("EUR")),
            ]),
        )
        .unwrap();
        match parsed {
            ToolArguments::ExchangeRate { query } => assert_eq!(query.amount, 1.0),
            other => panic!("unexpected parse: {:?}", other),
        }
    }

    #[test]
    fn test_parse_unknown_tool() {
        let result = parse_tool_arguments("get_horoscope", &HashMap::new());
        assert!(matches!(result, Err(ToolError::InvalidParameters(_))));
    }

    #[test]
    fn test_parse_stock_invalid_interval() {
        let result = parse_tool_arguments(
            "get_stock",
            &args(&[
                ("mode", json!("historical")),
                ("symbol", json!("AAPL")),
                ("interval", json!("hourly")),
            ]),
        );
        assert!(matches!(result, Err(ToolError::InvalidParameters(_))));
    }

    #[test]
    fn test_definitions_cover_all_tools() {
        let registry = ToolRegistry::new(
            Client::new(),
            crate::config::RuntimeConfig::from_app(&crate::config::AppConfig::default()).providers,
        );
        let names: Vec<String> = registry.definitions().iter().map(|d| d.name.clone()).collect();
        assert_eq!(
            names,
            vec![
                "get_weather",
                "get_earthquake",
                "get_exchange_rate",
                "get_coin",
                "get_stock"
            ]
        );
    }
}
