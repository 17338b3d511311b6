// datachat-core/src/models/domain.rs

//! Typed results produced by the tool adapters.
//!
//! These records are the contract between adapters and renderers and
//! must round-trip through JSON losslessly. Mode-discriminated kinds
//! (exchange rate, coin, stock) carry their discriminant in a `mode`
//! tag. Optional upstream fields land as 0 or null here so downstream
//! formatting never sees an absent numeric field.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which of the five data kinds a result belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
    Weather,
    Earthquake,
    ExchangeRate,
    Coin,
    Stock,
}

/// A tool result, one-to-one with the tool call that produced it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum DomainData {
    Weather(WeatherReport),
    Earthquake(EarthquakeReport),
    ExchangeRate(ExchangeRateReport),
    Coin(CoinReport),
    Stock(StockReport),
}

impl DomainData {
    pub fn kind(&self) -> DataKind {
        match self {
            DomainData::Weather(_) => DataKind::Weather,
            DomainData::Earthquake(_) => DataKind::Earthquake,
            DomainData::ExchangeRate(_) => DataKind::ExchangeRate,
            DomainData::Coin(_) => DataKind::Coin,
            DomainData::Stock(_) => DataKind::Stock,
        }
    }
}

// --- Weather ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WeatherReport {
    pub current: CurrentConditions,
    pub forecast: DailyOutlook,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CurrentConditions {
    pub temperature: f64,
    pub temperature_feel: f64,
    pub humidity: f64,
    pub weather_code: i64,
    pub weather_description: String,
    pub weather_main: String,
    pub wind_speed: f64,
    pub city_name: String,
    pub country: String,
}

/// Single-day outlook; sunrise/sunset are ISO-8601 strings converted
/// from the provider's epoch seconds.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DailyOutlook {
    pub max_temp: f64,
    pub min_temp: f64,
    pub sunrise: String,
    pub sunset: String,
}

// --- Earthquake ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EarthquakeReport {
    pub total_count: usize,
    /// Display string for the searched area, echoing the radius when
    /// the search was radius-based.
    pub region: String,
    /// Human-readable period, e.g. "Last 30 days".
    pub period: String,
    pub min_magnitude: f64,
    /// Upstream ordering preserved; no dedupe beyond the feed's own.
    pub earthquakes: Vec<EarthquakeEvent>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EarthquakeEvent {
    pub id: String,
    pub magnitude: f64,
    pub place: String,
    pub time: String,
    pub coordinates: EventCoordinates,
    pub alert: Option<String>,
    pub tsunami: bool,
    pub felt: Option<i64>,
    pub significance: i64,
    pub url: String,
    pub detail_url: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EventCoordinates {
    pub latitude: f64,
    pub longitude: f64,
    pub depth: f64,
}

// --- Exchange rate ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ExchangeRateReport {
    /// Snapshot of one base currency against a set of targets.
    Rates {
        base: String,
        date: String,
        rates: BTreeMap<String, f64>,
    },
    /// Per-target conversion of a concrete amount.
    Convert { conversion: Conversion, date: String },
    /// Dense date-by-currency matrix; a missing upstream data point is
    /// an explicit null, never an omitted key. Dates ascend.
    Historical {
        base: String,
        start_date: String,
        end_date: String,
        dates: Vec<String>,
        currencies: Vec<String>,
        data: BTreeMap<String, BTreeMap<String, Option<f64>>>,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Conversion {
    pub from: ConversionSource,
    pub to: BTreeMap<String, ConversionTarget>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ConversionSource {
    pub currency: String,
    pub amount: f64,
}

/// `amount` is exactly `rate * input amount`, no rounding.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ConversionTarget {
    pub currency: String,
    pub rate: f64,
    pub amount: f64,
}

// --- Coin ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum CoinReport {
    Price {
        id: String,
        name: String,
        symbol: String,
        current_price: f64,
        market_cap: f64,
        volume_24h: f64,
        price_change_24h: f64,
        last_updated: Option<String>,
        vs_currency: String,
    },
    /// Three parallel time series; gaps are possible when the upstream
    /// omits a series entirely.
    Historical {
        id: String,
        vs_currency: String,
        days: u32,
        price_data: Vec<SeriesPoint>,
        market_cap_data: Vec<SeriesPoint>,
        volume_data: Vec<SeriesPoint>,
    },
    Info {
        id: String,
        name: String,
        symbol: String,
        image: Option<String>,
        description: String,
        current_price: f64,
        market_cap: f64,
        market_cap_rank: Option<i64>,
        fully_diluted_valuation: f64,
        volume_24h: f64,
        high_24h: f64,
        low_24h: f64,
        price_change_24h: f64,
        price_change_percentage_24h: f64,
        market_cap_change_24h: f64,
        market_cap_change_percentage_24h: f64,
        circulating_supply: Option<f64>,
        total_supply: Option<f64>,
        max_supply: Option<f64>,
        ath: f64,
        ath_change_percentage: f64,
        ath_date: Option<String>,
        atl: f64,
        atl_change_percentage: f64,
        atl_date: Option<String>,
        last_updated: Option<String>,
        vs_currency: String,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SeriesPoint {
    pub timestamp: String,
    pub value: f64,
}

// --- Stock ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum StockReport {
    Quote {
        symbol: String,
        open: f64,
        high: f64,
        low: f64,
        price: f64,
        volume: f64,
        latest_trading_day: Option<String>,
        previous_close: f64,
        change: f64,
        change_percent: f64,
    },
    /// Data points sorted by descending date, most recent first. The
    /// exchange-rate historical ordering is the opposite.
    Historical {
        symbol: String,
        interval: String,
        last_refreshed: Option<String>,
        time_zone: String,
        data: Vec<StockBar>,
    },
    Search {
        query: String,
        results: Vec<SymbolMatch>,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StockBar {
    pub date: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SymbolMatch {
    pub symbol: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub region: String,
    pub market_open: String,
    pub market_close: String,
    pub timezone: String,
    pub currency: String,
    pub match_score: String,
}
