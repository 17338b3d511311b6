// datachat-core/src/tools/stock.rs

//! Equity quotes, history and symbol search from an Alpha
//! Vantage-compatible API.
//!
//! The upstream keys fields positionally ("01. symbol", "1. open"),
//! so responses are walked as JSON values rather than deserialized
//! into fixed structs.

use reqwest::Client;
use serde_json::Value;

use super::status_error;
use crate::config::StockProviderConfig;
use crate::errors::ToolError;
use crate::models::domain::{StockBar, StockReport, SymbolMatch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockMode {
    Quote,
    Historical,
    Search,
}

impl StockMode {
    pub fn parse(raw: &str) -> Result<StockMode, ToolError> {
        match raw {
            "quote" => Ok(StockMode::Quote),
            "historical" => Ok(StockMode::Historical),
            "search" => Ok(StockMode::Search),
            other => Err(ToolError::InvalidParameters(format!(
                "Invalid mode '{}'. Use quote, historical or search.",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockInterval {
    Daily,
    Weekly,
    Monthly,
}

impl StockInterval {
    pub fn parse(raw: &str) -> Result<StockInterval, ToolError> {
        match raw {
            "daily" => Ok(StockInterval::Daily),
            "weekly" => Ok(StockInterval::Weekly),
            "monthly" => Ok(StockInterval::Monthly),
            other => Err(ToolError::InvalidParameters(format!(
                "Invalid interval '{}'. Use daily, weekly or monthly.",
                other
            ))),
        }
    }

    fn function_name(self) -> &'static str {
        match self {
            StockInterval::Daily => "TIME_SERIES_DAILY",
            StockInterval::Weekly => "TIME_SERIES_WEEKLY",
            StockInterval::Monthly => "TIME_SERIES_MONTHLY",
        }
    }

    fn series_key(self) -> &'static str {
        match self {
            StockInterval::Daily => "Time Series (Daily)",
            StockInterval::Weekly => "Weekly Time Series",
            StockInterval::Monthly => "Monthly Time Series",
        }
    }

    fn label(self) -> &'static str {
        match self {
            StockInterval::Daily => "daily",
            StockInterval::Weekly => "weekly",
            StockInterval::Monthly => "monthly",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSize {
    Compact,
    Full,
}

impl OutputSize {
    pub fn parse(raw: &str) -> Result<OutputSize, ToolError> {
        match raw {
            "compact" => Ok(OutputSize::Compact),
            "full" => Ok(OutputSize::Full),
            other => Err(ToolError::InvalidParameters(format!(
                "Invalid output_size '{}'. Use compact or full.",
                other
            ))),
        }
    }

    fn label(self) -> &'static str {
        match self {
            OutputSize::Compact => "compact",
            OutputSize::Full => "full",
        }
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
}

fn num_field(value: &Value, key: &str) -> f64 {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0)
}

/// The upstream signals throttling inside a 200 body, not via HTTP 429.
fn check_rate_limit(data: &Value) -> Result<(), ToolError> {
    if let Some(note) = data.get("Note").and_then(|n| n.as_str()) {
        if note.contains("API call frequency") {
            return Err(ToolError::RateLimited(
                "Alpha Vantage API call limit exceeded. Please try again later.".to_string(),
            ));
        }
    }
    Ok(())
}

async fn query(
    client: &Client,
    config: &StockProviderConfig,
    params: &[(&str, String)],
) -> Result<Value, ToolError> {
    if config.api_key.is_empty() {
        return Err(ToolError::Configuration(
            "stock provider API key is not set".to_string(),
        ));
    }
    let url = format!("{}/query", config.base_url);
    let mut params = params.to_vec();
    params.push(("apikey", config.api_key.clone()));
    let response = client.get(&url).query(&params).send().await?;
    if !response.status().is_success() {
        return Err(status_error("Alpha Vantage API", response).await);
    }
    let data: Value = response.json().await.map_err(|e| {
        ToolError::Provider(format!("Alpha Vantage API returned invalid JSON: {}", e))
    })?;
    check_rate_limit(&data)?;
    Ok(data)
}

pub async fn fetch_stock(
    client: &Client,
    config: &StockProviderConfig,
    mode: StockMode,
    symbol: &str,
    interval: StockInterval,
    output_size: OutputSize,
) -> Result<StockReport, ToolError> {
    let normalized_symbol = symbol.to_uppercase().trim().to_string();

    match mode {
        StockMode::Quote => {
            let data = query(
                client,
                config,
                &[
                    ("function", "GLOBAL_QUOTE".to_string()),
                    ("symbol", normalized_symbol.clone()),
                ],
            )
            .await?;

            let quote = data
                .get("Global Quote")
                .filter(|q| q.as_object().map(|o| !o.is_empty()).unwrap_or(false))
                .ok_or_else(|| {
                    ToolError::NotFound(format!(
                        "No stock data found for \"{}\".",
                        normalized_symbol
                    ))
                })?;

            Ok(StockReport::Quote {
                symbol: str_field(quote, "01. symbol").unwrap_or(normalized_symbol),
                open: num_field(quote, "02. open"),
                high: num_field(quote, "03. high"),
                low: num_field(quote, "04. low"),
                price: num_field(quote, "05. price"),
                volume: num_field(quote, "06. volume"),
                latest_trading_day: str_field(quote, "07. latest trading day"),
                previous_close: num_field(quote, "08. previous close"),
                change: num_field(quote, "09. change"),
                change_percent: quote
                    .get("10. change percent")
                    .and_then(|v| v.as_str())
                    .and_then(|s| s.trim_end_matches('%').parse::<f64>().ok())
                    .unwrap_or(0.0),
            })
        }
        StockMode::Historical => {
            let data = query(
                client,
                config,
                &[
                    ("function", interval.function_name().to_string()),
                    ("symbol", normalized_symbol.clone()),
                    ("outputsize", output_size.label().to_string()),
                ],
            )
            .await?;

            let time_series = data
                .get(interval.series_key())
                .and_then(|s| s.as_object())
                .ok_or_else(|| {
                    ToolError::NotFound(format!(
                        "No historical data found for \"{}\".",
                        normalized_symbol
                    ))
                })?;

            // Most recent first.
            let mut dates: Vec<&String> = time_series.keys().collect();
            dates.sort();
            dates.reverse();

            let bars = dates
                .into_iter()
                .map(|date| {
                    let entry = &time_series[date];
                    StockBar {
                        date: date.clone(),
                        open: num_field(entry, "1. open"),
                        high: num_field(entry, "2. high"),
                        low: num_field(entry, "3. low"),
                        close: num_field(entry, "4. close"),
                        volume: num_field(entry, "5. volume"),
                    }
                })
                .collect();

            let meta = data.get("Meta Data").cloned().unwrap_or(Value::Null);
            Ok(StockReport::Historical {
                symbol: str_field(&meta, "2. Symbol").unwrap_or(normalized_symbol),
                interval: interval.label().to_string(),
                last_refreshed: str_field(&meta, "3. Last Refreshed"),
                time_zone: str_field(&meta, "5. Time Zone").unwrap_or_else(|| "UTC".to_string()),
                data: bars,
            })
        }
        StockMode::Search => {
            let data = query(
                client,
                config,
                &[
                    ("function", "SYMBOL_SEARCH".to_string()),
                    ("keywords", normalized_symbol.clone()),
                ],
            )
            .await?;

            let results = data
                .get("bestMatches")
                .and_then(|m| m.as_array())
                .map(|matches| {
                    matches
                        .iter()
                        .map(|m| SymbolMatch {
                            symbol: str_field(m, "1. symbol").unwrap_or_default(),
                            name: str_field(m, "2. name").unwrap_or_default(),
                            kind: str_field(m, "3. type").unwrap_or_default(),
                            region: str_field(m, "4. region").unwrap_or_default(),
                            market_open: str_field(m, "5. marketOpen").unwrap_or_default(),
                            market_close: str_field(m, "6. marketClose").unwrap_or_default(),
                            timezone: str_field(m, "7. timezone").unwrap_or_default(),
                            currency: str_field(m, "8. currency").unwrap_or_default(),
                            match_score: str_field(m, "9. matchScore").unwrap_or_default(),
                        })
                        .collect()
                })
                .unwrap_or_default();

            Ok(StockReport::Search {
                query: normalized_symbol,
                results,
            })
        }
    }
}
