// datachat-core/src/tools/exchange_rate.rs

//! Fiat exchange rates from a Frankfurter-compatible API.
//!
//! Conversion math happens locally: the upstream is only asked for
//! rates, and each target amount is `rate * input amount` with no
//! rounding.

use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;

use super::status_error;
use crate::config::ExchangeRateProviderConfig;
use crate::errors::ToolError;
use crate::models::domain::{Conversion, ConversionSource, ConversionTarget, ExchangeRateReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateMode {
    Rates,
    Convert,
    Historical,
}

impl RateMode {
    pub fn parse(raw: &str) -> Result<RateMode, ToolError> {
        match raw {
            "rates" => Ok(RateMode::Rates),
            "convert" => Ok(RateMode::Convert),
            "historical" => Ok(RateMode::Historical),
            other => Err(ToolError::InvalidParameters(format!(
                "Invalid mode '{}'. Use rates, convert or historical.",
                other
            ))),
        }
    }
}

#[derive(Debug)]
pub struct RateQuery {
    pub mode: RateMode,
    pub base_currency: String,
    pub target_currencies: Option<String>,
    pub amount: f64,
    pub date: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub days: Option<i64>,
}

#[derive(Deserialize, Default)]
struct SnapshotResponse {
    #[serde(default)]
    base: String,
    #[serde(default)]
    date: String,
    #[serde(default)]
    rates: BTreeMap<String, f64>,
}

#[derive(Deserialize, Default)]
struct RangeResponse {
    #[serde(default)]
    base: String,
    // Keyed by date; BTreeMap gives ascending date order for free.
    #[serde(default)]
    rates: BTreeMap<String, BTreeMap<String, f64>>,
}

fn date_window(query: &RateQuery) -> Result<(String, String), ToolError> {
    let (start, end) = match (&query.start_date, query.days) {
        (Some(start), _) => (Some(start.clone()), query.end_date.clone()),
        (None, Some(days)) => {
            let today = Utc::now();
            let past = today - chrono::Duration::days(days);
            (
                Some(past.format("%Y-%m-%d").to_string()),
                Some(today.format("%Y-%m-%d").to_string()),
            )
        }
        (None, None) => (None, query.end_date.clone()),
    };
    match (start, end) {
        (Some(start), Some(end)) => Ok((start, end)),
        _ => Err(ToolError::InvalidParameters(
            "Historical data requires a start and end date.".to_string(),
        )),
    }
}

pub async fn fetch_exchange_rate(
    client: &Client,
    config: &ExchangeRateProviderConfig,
    query: &RateQuery,
) -> Result<ExchangeRateReport, ToolError> {
    let path = match query.mode {
        RateMode::Historical => {
            let (start, end) = date_window(query)?;
            format!("{}..{}", start, end)
        }
        _ => match &query.date {
            Some(date) => date.clone(),
            None => "latest".to_string(),
        },
    };

    let mut params = vec![("from", query.base_currency.to_uppercase())];
    if let Some(targets) = &query.target_currencies {
        params.push(("to", targets.to_uppercase()));
    }

    let url = format!("{}/{}", config.base_url, path);
    let response = client.get(&url).query(&params).send().await?;
    if !response.status().is_success() {
        return Err(status_error("Exchange rate API", response).await);
    }

    match query.mode {
        RateMode::Historical => {
            let data: RangeResponse = response.json().await.map_err(|e| {
                ToolError::Provider(format!("Exchange rate API returned invalid JSON: {}", e))
            })?;
            let dates: Vec<String> = data.rates.keys().cloned().collect();
            let currencies: Vec<String> = match &query.target_currencies {
                Some(targets) => targets
                    .split(',')
                    .map(|c| c.trim().to_uppercase())
                    .collect(),
                None => data
                    .rates
                    .values()
                    .next()
                    .map(|first| first.keys().cloned().collect())
                    .unwrap_or_default(),
            };

            // Dense matrix: every currency gets every date, missing
            // upstream points become explicit nulls.
            let mut matrix: BTreeMap<String, BTreeMap<String, Option<f64>>> = BTreeMap::new();
            for currency in &currencies {
                let mut per_date = BTreeMap::new();
                for date in &dates {
                    per_date.insert(
                        date.clone(),
                        data.rates.get(date).and_then(|r| r.get(currency)).copied(),
                    );
                }
                matrix.insert(currency.clone(), per_date);
            }

            Ok(ExchangeRateReport::Historical {
                base: data.base,
                start_date: dates.first().cloned().unwrap_or_default(),
                end_date: dates.last().cloned().unwrap_or_default(),
                dates,
                currencies,
                data: matrix,
            })
        }
        RateMode::Rates => {
            let data: SnapshotResponse = response.json().await.map_err(|e| {
                ToolError::Provider(format!("Exchange rate API returned invalid JSON: {}", e))
            })?;
            Ok(ExchangeRateReport::Rates {
                base: data.base,
                date: data.date,
                rates: data.rates,
            })
        }
        RateMode::Convert => {
            let data: SnapshotResponse = response.json().await.map_err(|e| {
                ToolError::Provider(format!("Exchange rate API returned invalid JSON: {}", e))
            })?;
            let to = data
                .rates
                .into_iter()
                .map(|(currency, rate)| {
                    (
                        currency.clone(),
                        ConversionTarget {
                            currency,
                            rate,
                            amount: rate * query.amount,
                        },
                    )
                })
                .collect();
            Ok(ExchangeRateReport::Convert {
                conversion: Conversion {
                    from: ConversionSource {
                        currency: query.base_currency.to_uppercase(),
                        amount: query.amount,
                    },
                    to,
                },
                date: data.date,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn query(mode: RateMode) -> RateQuery {
        RateQuery {
            mode,
            base_currency: "usd".to_string(),
            target_currencies: Some("EUR".to_string()),
            amount: 1.0,
            date: None,
            start_date: None,
            end_date: None,
            days: None,
        }
    }

    fn test_config(server: &MockServer) -> ExchangeRateProviderConfig {
        ExchangeRateProviderConfig {
            base_url: server.base_url(),
        }
    }

    #[tokio::test]
    async fn test_rates_snapshot() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/latest")
                    .query_param("from", "USD")
                    .query_param("to", "EUR");
                then.status(200).json_body(json!({
                    "base": "USD", "date": "2024-05-02", "rates": {"EUR": 0.93}
                }));
            })
            .await;

        let report = fetch_exchange_rate(&Client::new(), &test_config(&server), &query(RateMode::Rates))
            .await
            .unwrap();

        mock.assert_async().await;
        match report {
            ExchangeRateReport::Rates { base, date, rates } => {
                assert_eq!(base, "USD");
                assert_eq!(date, "2024-05-02");
                assert_eq!(rates.get("EUR"), Some(&0.93));
            }
            other => panic!("unexpected report: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_convert_multiplies_locally() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/latest").query_param("from", "USD");
                then.status(200).json_body(json!({
                    "base": "USD", "date": "2024-05-02", "rates": {"EUR": 0.9}
                }));
            })
            .await;

        let mut q = query(RateMode::Convert);
        q.amount = 100.0;
        let report = fetch_exchange_rate(&Client::new(), &test_config(&server), &q)
            .await
            .unwrap();

        mock.assert_async().await;
        match report {
            ExchangeRateReport::Convert { conversion, .. } => {
                assert_eq!(conversion.from.currency, "USD");
                assert_eq!(conversion.from.amount, 100.0);
                let eur = conversion.to.get("EUR").unwrap();
                assert_eq!(eur.rate, 0.9);
                assert_eq!(eur.amount, 90.0);
            }
            other => panic!("unexpected report: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_historical_matrix_is_dense_with_nulls() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/2024-05-01..2024-05-03");
                then.status(200).json_body(json!({
                    "base": "USD",
                    "rates": {
                        "2024-05-01": {"EUR": 0.91, "TRY": 32.3},
                        "2024-05-02": {"EUR": 0.92},
                        "2024-05-03": {"EUR": 0.93, "TRY": 32.5}
                    }
                }));
            })
            .await;

        let q = RateQuery {
            target_currencies: Some("EUR,TRY".to_string()),
            start_date: Some("2024-05-01".to_string()),
            end_date: Some("2024-05-03".to_string()),
            ..query(RateMode::Historical)
        };
        let report = fetch_exchange_rate(&Client::new(), &test_config(&server), &q)
            .await
            .unwrap();

        match report {
            ExchangeRateReport::Historical {
                dates,
                currencies,
                data,
                start_date,
                end_date,
                ..
            } => {
                assert_eq!(dates, vec!["2024-05-01", "2024-05-02", "2024-05-03"]);
                assert_eq!(currencies, vec!["EUR", "TRY"]);
                assert_eq!(start_date, "2024-05-01");
                assert_eq!(end_date, "2024-05-03");
                // The gap on 2024-05-02 is present as an explicit null.
                let try_series = data.get("TRY").unwrap();
                assert_eq!(try_series.get("2024-05-02"), Some(&None));
                assert_eq!(try_series.get("2024-05-03"), Some(&Some(32.5)));
            }
            other => panic!("unexpected report: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_historical_without_window_is_invalid() {
        let server = MockServer::start_async().await;
        let result = fetch_exchange_rate(
            &Client::new(),
            &test_config(&server),
            &query(RateMode::Historical),
        )
        .await;
        assert!(matches!(result, Err(ToolError::InvalidParameters(_))));
    }

    #[tokio::test]
    async fn test_historical_days_window() {
        let server = MockServer::start_async().await;
        let today = Utc::now().format("%Y-%m-%d").to_string();
        let past = (Utc::now() - chrono::Duration::days(5))
            .format("%Y-%m-%d")
            .to_string();
        let mock = server
            .mock_async(move |when, then| {
                when.method(GET).path(format!("/{}..{}", past, today));
                then.status(200).json_body(json!({"base": "USD", "rates": {}}));
            })
            .await;

        let q = RateQuery {
            days: Some(5),
            ..query(RateMode::Historical)
        };
        let result = fetch_exchange_rate(&Client::new(), &test_config(&server), &q).await;
        mock.assert_async().await;
        assert!(result.is_ok());
    }
}
