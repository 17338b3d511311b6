// datachat-core/src/tools/coin.rs

//! Cryptocurrency data from a CoinGecko-compatible API.

use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

use super::status_error;
use crate::config::CoinProviderConfig;
use crate::errors::ToolError;
use crate::models::domain::{CoinReport, SeriesPoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoinMode {
    Price,
    Historical,
    Info,
}

impl CoinMode {
    pub fn parse(raw: &str) -> Result<CoinMode, ToolError> {
        match raw {
            "price" => Ok(CoinMode::Price),
            "historical" => Ok(CoinMode::Historical),
            "info" => Ok(CoinMode::Info),
            other => Err(ToolError::InvalidParameters(format!(
                "Invalid mode '{}'. Use price, historical or info.",
                other
            ))),
        }
    }
}

fn iso_from_millis(millis: i64) -> String {
    chrono::DateTime::<chrono::Utc>::from_timestamp_millis(millis)
        .map(|dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
        .unwrap_or_default()
}

fn series(points: Vec<(f64, f64)>) -> Vec<SeriesPoint> {
    points
        .into_iter()
        .map(|(timestamp, value)| SeriesPoint {
            timestamp: iso_from_millis(timestamp as i64),
            value,
        })
        .collect()
}

#[derive(Deserialize, Default)]
struct MarketChartResponse {
    prices: Option<Vec<(f64, f64)>>,
    #[serde(default)]
    market_caps: Vec<(f64, f64)>,
    #[serde(default)]
    total_volumes: Vec<(f64, f64)>,
}

#[derive(Deserialize)]
struct CoinListEntry {
    id: String,
    symbol: String,
}

#[derive(Deserialize, Default)]
struct ImageUrls {
    large: Option<String>,
    small: Option<String>,
}

#[derive(Deserialize, Default)]
struct MarketData {
    #[serde(default)]
    current_price: HashMap<String, Option<f64>>,
    #[serde(default)]
    market_cap: HashMap<String, Option<f64>>,
    #[serde(default)]
    fully_diluted_valuation: HashMap<String, Option<f64>>,
    #[serde(default)]
    total_volume: HashMap<String, Option<f64>>,
    #[serde(default)]
    high_24h: HashMap<String, Option<f64>>,
    #[serde(default)]
    low_24h: HashMap<String, Option<f64>>,
    #[serde(default)]
    price_change_24h: Option<f64>,
    #[serde(default)]
    price_change_percentage_24h: Option<f64>,
    #[serde(default)]
    market_cap_change_24h: Option<f64>,
    #[serde(default)]
    market_cap_change_percentage_24h: Option<f64>,
    #[serde(default)]
    circulating_supply: Option<f64>,
    #[serde(default)]
    total_supply: Option<f64>,
    #[serde(default)]
    max_supply: Option<f64>,
    #[serde(default)]
    ath: HashMap<String, Option<f64>>,
    #[serde(default)]
    ath_change_percentage: HashMap<String, Option<f64>>,
    #[serde(default)]
    ath_date: HashMap<String, Option<String>>,
    #[serde(default)]
    atl: HashMap<String, Option<f64>>,
    #[serde(default)]
    atl_change_percentage: HashMap<String, Option<f64>>,
    #[serde(default)]
    atl_date: HashMap<String, Option<String>>,
}

impl MarketData {
    fn number(map: &HashMap<String, Option<f64>>, vs_currency: &str) -> f64 {
        map.get(vs_currency).copied().flatten().unwrap_or(0.0)
    }

    fn date(map: &HashMap<String, Option<String>>, vs_currency: &str) -> Option<String> {
        map.get(vs_currency).cloned().flatten()
    }
}

#[derive(Deserialize, Default)]
struct Description {
    #[serde(default)]
    en: String,
}

#[derive(Deserialize, Default)]
struct CoinInfoResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    symbol: String,
    #[serde(default)]
    image: ImageUrls,
    #[serde(default)]
    description: Description,
    #[serde(default)]
    market_cap_rank: Option<i64>,
    #[serde(default)]
    market_data: MarketData,
    #[serde(default)]
    last_updated: Option<String>,
}

fn info_url(base_url: &str, coin_id: &str) -> String {
    format!(
        "{}/coins/{}?localization=false&tickers=false&market_data=true&community_data=false&developer_data=false&sparkline=false",
        base_url, coin_id
    )
}

/// Resolves an id that 404'd on direct lookup by scanning the full
/// coin list for a case-insensitive symbol or id match.
async fn resolve_by_symbol(
    client: &Client,
    config: &CoinProviderConfig,
    coin_id: &str,
) -> Result<String, ToolError> {
    debug!(coin_id = %coin_id, "Coin not found by id, searching the coin list by symbol");
    let response = client
        .get(format!("{}/coins/list", config.base_url))
        .send()
        .await?;
    if !response.status().is_success() {
        return Err(status_error("CoinGecko API", response).await);
    }
    let coins: Vec<CoinListEntry> = response
        .json()
        .await
        .map_err(|e| ToolError::Provider(format!("CoinGecko API returned invalid JSON: {}", e)))?;

    coins
        .into_iter()
        .find(|coin| coin.symbol.eq_ignore_ascii_case(coin_id) || coin.id.eq_ignore_ascii_case(coin_id))
        .map(|coin| coin.id)
        .ok_or_else(|| ToolError::NotFound(format!("No cryptocurrency found for \"{}\".", coin_id)))
}

pub async fn fetch_coin(
    client: &Client,
    config: &CoinProviderConfig,
    mode: CoinMode,
    coin_id: &str,
    vs_currency: &str,
    days: u32,
) -> Result<CoinReport, ToolError> {
    let normalized_id = coin_id.to_lowercase().trim().to_string();

    match mode {
        CoinMode::Price => {
            let url = format!(
                "{}/simple/price?ids={}&vs_currencies={}&include_market_cap=true&include_24hr_vol=true&include_24hr_change=true&include_last_updated_at=true",
                config.base_url, normalized_id, vs_currency
            );
            let response = client.get(&url).send().await?;
            if !response.status().is_success() {
                return Err(status_error("CoinGecko API", response).await);
            }
            let data: HashMap<String, HashMap<String, f64>> =
                response.json().await.map_err(|e| {
                    ToolError::Provider(format!("CoinGecko API returned invalid JSON: {}", e))
                })?;
            let coin_data = data.get(&normalized_id).ok_or_else(|| {
                ToolError::NotFound(format!(
                    "No cryptocurrency data found for \"{}\".",
                    normalized_id
                ))
            })?;

            let field = |suffix: &str| {
                coin_data
                    .get(&format!("{}{}", vs_currency, suffix))
                    .copied()
                    .unwrap_or(0.0)
            };
            Ok(CoinReport::Price {
                id: normalized_id.clone(),
                // The simple-price endpoint only knows ids.
                name: normalized_id.clone(),
                symbol: normalized_id,
                current_price: coin_data.get(vs_currency).copied().unwrap_or(0.0),
                market_cap: field("_market_cap"),
                volume_24h: field("_24h_vol"),
                price_change_24h: field("_24h_change"),
                last_updated: coin_data.get("last_updated_at").map(|secs| {
                    chrono::DateTime::<chrono::Utc>::from_timestamp(*secs as i64, 0)
                        .map(|dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
                        .unwrap_or_default()
                }),
                vs_currency: vs_currency.to_string(),
            })
        }
        CoinMode::Historical => {
            let url = format!(
                "{}/coins/{}/market_chart?vs_currency={}&days={}",
                config.base_url, normalized_id, vs_currency, days
            );
            let response = client.get(&url).send().await?;
            if !response.status().is_success() {
                return Err(status_error("CoinGecko API", response).await);
            }
            let data: MarketChartResponse = response.json().await.map_err(|e| {
                ToolError::Provider(format!("CoinGecko API returned invalid JSON: {}", e))
            })?;
            let prices = data.prices.ok_or_else(|| {
                ToolError::NotFound(format!(
                    "No historical data found for \"{}\".",
                    normalized_id
                ))
            })?;

            Ok(CoinReport::Historical {
                id: normalized_id,
                vs_currency: vs_currency.to_string(),
                days,
                price_data: series(prices),
                market_cap_data: series(data.market_caps),
                volume_data: series(data.total_volumes),
            })
        }
        CoinMode::Info => {
            let mut response = client
                .get(info_url(&config.base_url, &normalized_id))
                .send()
                .await?;

            if response.status() == reqwest::StatusCode::NOT_FOUND {
                let resolved_id = resolve_by_symbol(client, config, &normalized_id).await?;
                response = client
                    .get(info_url(&config.base_url, &resolved_id))
                    .send()
                    .await?;
            }
            if !response.status().is_success() {
                return Err(status_error("CoinGecko API", response).await);
            }

            let data: CoinInfoResponse = response.json().await.map_err(|e| {
                ToolError::Provider(format!("CoinGecko API returned invalid JSON: {}", e))
            })?;
            let md = &data.market_data;
            Ok(CoinReport::Info {
                id: data.id,
                name: data.name,
                symbol: data.symbol,
                image: data.image.large.or(data.image.small),
                description: data.description.en,
                current_price: MarketData::number(&md.current_price, vs_currency),
                market_cap: MarketData::number(&md.market_cap, vs_currency),
                market_cap_rank: data.market_cap_rank,
                fully_diluted_valuation: MarketData::number(&md.fully_diluted_valuation, vs_currency),
                volume_24h: MarketData::number(&md.total_volume, vs_currency),
                high_24h: MarketData::number(&md.high_24h, vs_currency),
                low_24h: MarketData::number(&md.low_24h, vs_currency),
                price_change_24h: md.price_change_24h.unwrap_or(0.0),
                price_change_percentage_24h: md.price_change_percentage_24h.unwrap_or(0.0),
                market_cap_change_24h: md.market_cap_change_24h.unwrap_or(0.0),
                market_cap_change_percentage_24h: md
                    .market_cap_change_percentage_24h
                    .unwrap_or(0.0),
                circulating_supply: md.circulating_supply,
                total_supply: md.total_supply,
                max_supply: md.max_supply,
                ath: MarketData::number(&md.ath, vs_currency),
                ath_change_percentage: MarketData::number(&md.ath_change_percentage, vs_currency),
                ath_date: MarketData::date(&md.ath_date, vs_currency),
                atl: MarketData::number(&md.atl, vs_currency),
                atl_change_percentage: MarketData::number(&md.atl_change_percentage, vs_currency),
                atl_date: MarketData::date(&md.atl_date, vs_currency),
                last_updated: data.last_updated,
                vs_currency: vs_currency.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn test_config(server: &MockServer) -> CoinProviderConfig {
        CoinProviderConfig {
            base_url: server.base_url(),
        }
    }

    #[tokio::test]
    async fn test_price_mode() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/simple/price")
                    .query_param("ids", "bitcoin")
                    .query_param("vs_currencies", "usd");
                then.status(200).json_body(json!({
                    "bitcoin": {
                        "usd": 64000.5,
                        "usd_market_cap": 1.26e12,
                        "usd_24h_vol": 3.1e10,
                        "usd_24h_change": -1.2,
                        "last_updated_at": 1_700_000_000
                    }
                }));
            })
            .await;

        let report = fetch_coin(
            &Client::new(),
            &test_config(&server),
            CoinMode::Price,
            "Bitcoin",
            "usd",
            7,
        )
        .await
        .unwrap();

        mock.assert_async().await;
        match report {
            CoinReport::Price {
                id,
                current_price,
                price_change_24h,
                last_updated,
                ..
            } => {
                assert_eq!(id, "bitcoin");
                assert_eq!(current_price, 64000.5);
                assert_eq!(price_change_24h, -1.2);
                assert!(last_updated.unwrap().ends_with('Z'));
            }
            other => panic!("unexpected report: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_price_unknown_coin_is_not_found() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/simple/price");
                then.status(200).json_body(json!({}));
            })
            .await;

        let result = fetch_coin(
            &Client::new(),
            &test_config(&server),
            CoinMode::Price,
            "nocoin",
            "usd",
            7,
        )
        .await;
        assert!(matches!(result, Err(ToolError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_historical_series_mapping() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/coins/ethereum/market_chart")
                    .query_param("vs_currency", "usd")
                    .query_param("days", "7");
                then.status(200).json_body(json!({
                    "prices": [[1_700_000_000_000_i64, 2000.0], [1_700_086_400_000_i64, 2050.0]],
                    "market_caps": [[1_700_000_000_000_i64, 2.4e11]],
                    "total_volumes": [[1_700_000_000_000_i64, 1.2e10]]
                }));
            })
            .await;

        let report = fetch_coin(
            &Client::new(),
            &test_config(&server),
            CoinMode::Historical,
            "ethereum",
            "usd",
            7,
        )
        .await
        .unwrap();

        match report {
            CoinReport::Historical {
                days,
                price_data,
                market_cap_data,
                volume_data,
                ..
            } => {
                assert_eq!(days, 7);
                assert_eq!(price_data.len(), 2);
                assert_eq!(price_data[0].value, 2000.0);
                assert!(price_data[0].timestamp.contains('T'));
                assert_eq!(market_cap_data.len(), 1);
                assert_eq!(volume_data.len(), 1);
            }
            other => panic!("unexpected report: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_info_symbol_fallback_resolves_via_list() {
        let server = MockServer::start_async().await;
        // Direct lookup by symbol 404s.
        server
            .mock_async(|when, then| {
                when.method(GET).path("/coins/eth");
                then.status(404).json_body(json!({"error": "coin not found"}));
            })
            .await;
        let list_mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/coins/list");
                then.status(200).json_body(json!([
                    {"id": "bitcoin", "symbol": "btc", "name": "Bitcoin"},
                    {"id": "ethereum", "symbol": "eth", "name": "Ethereum"}
                ]));
            })
            .await;
        let info_mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/coins/ethereum");
                then.status(200).json_body(json!({
                    "id": "ethereum",
                    "name": "Ethereum",
                    "symbol": "eth",
                    "image": {"large": "https://example.org/eth.png"},
                    "description": {"en": "A smart contract platform"},
                    "market_cap_rank": 2,
                    "market_data": {
                        "current_price": {"usd": 2000.0},
                        "market_cap": {"usd": 2.4e11},
                        "ath": {"usd": 4878.26},
                        "ath_date": {"usd": "2021-11-10T14:24:19.604Z"}
                    },
                    "last_updated": "2024-05-02T10:00:00.000Z"
                }));
            })
            .await;

        let report = fetch_coin(
            &Client::new(),
            &test_config(&server),
            CoinMode::Info,
            "ETH",
            "usd",
            7,
        )
        .await
        .unwrap();

        list_mock.assert_async().await;
        info_mock.assert_async().await;
        match report {
            CoinReport::Info {
                id,
                name,
                current_price,
                ath,
                fully_diluted_valuation,
                ..
            } => {
                assert_eq!(id, "ethereum");
                assert_eq!(name, "Ethereum");
                assert_eq!(current_price, 2000.0);
                assert_eq!(ath, 4878.26);
                // Missing upstream field lands as zero, not an error.
                assert_eq!(fully_diluted_valuation, 0.0);
            }
            other => panic!("unexpected report: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_info_fallback_miss_is_not_found() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/coins/wat");
                then.status(404);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/coins/list");
                then.status(200).json_body(json!([
                    {"id": "bitcoin", "symbol": "btc", "name": "Bitcoin"}
                ]));
            })
            .await;

        let result = fetch_coin(
            &Client::new(),
            &test_config(&server),
            CoinMode::Info,
            "wat",
            "usd",
            7,
        )
        .await;
        assert!(matches!(result, Err(ToolError::NotFound(_))));
    }
}
