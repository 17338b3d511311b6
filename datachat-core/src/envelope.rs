// datachat-core/src/envelope.rs

//! The structured payload returned for a tool-augmented chat turn,
//! and the display-text and render-mode rules that go with it.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::domain::{
    CoinReport, DataKind, DomainData, EarthquakeReport, ExchangeRateReport, StockReport,
    WeatherReport,
};

pub const WEATHER_TEXT: &str = "Here is the weather information:";
pub const EARTHQUAKE_TEXT: &str = "Here is the earthquake information:";
pub const EXCHANGE_RATE_TEXT: &str = "Here is the exchange rate information:";
pub const EXCHANGE_RATE_HISTORICAL_TEXT: &str = "Here is the historical exchange rate data:";
pub const COIN_TEXT: &str = "Here is the cryptocurrency information:";
pub const STOCK_TEXT: &str = "Here is the stock market information:";

lazy_static! {
    /// "<amount> <CODE> to|=|in <CODE>", e.g. "100 USD to EUR".
    static ref CONVERT_PHRASE: Regex =
        Regex::new(r"(?i)(\d+(?:[.,]\d+)?)\s*([A-Za-z]{3})\s*(?:to|=|in)\s*([A-Za-z]{3})")
            .expect("convert phrase regex is valid");
    static ref AMOUNT_CODE: Regex =
        Regex::new(r"\d+\s*[A-Z]{3}").expect("amount-code regex is valid");
}

/// Whether a data card renders as a compact single line or a full
/// breakdown.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    Simple,
    Rich,
}

/// One chat turn's structured response: display text plus at most one
/// populated domain-data slot per kind. When several tools ran, each
/// slot holds the last result of its kind (last-write-wins); the
/// display text follows its own precedence order instead, see
/// [`build_envelope`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct ResponseEnvelope {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub weather_data: Option<WeatherReport>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub earthquake_data: Option<EarthquakeReport>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub exchange_rate_data: Option<ExchangeRateReport>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub coin_data: Option<CoinReport>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub stock_data: Option<StockReport>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub render_mode: Option<RenderMode>,
}

impl ResponseEnvelope {
    /// The kind whose card should be mounted, using the fixed
    /// weather > earthquake > exchange rate > coin > stock order.
    pub fn populated_kind(&self) -> Option<DataKind> {
        if self.weather_data.is_some() {
            Some(DataKind::Weather)
        } else if self.earthquake_data.is_some() {
            Some(DataKind::Earthquake)
        } else if self.exchange_rate_data.is_some() {
            Some(DataKind::ExchangeRate)
        } else if self.coin_data.is_some() {
            Some(DataKind::Coin)
        } else if self.stock_data.is_some() {
            Some(DataKind::Stock)
        } else {
            None
        }
    }
}

/// True when the text reads like a currency-conversion statement.
pub fn looks_like_conversion(text: &str) -> bool {
    text.contains('=')
        || text.contains("USD")
        || text.contains("TRY")
        || text.contains("EUR")
        || text.contains(" to ")
        || AMOUNT_CODE.is_match(text)
}

/// True when the text talks about earthquakes (English or Turkish).
pub fn mentions_earthquake(text: &str) -> bool {
    let lowered = text.to_lowercase();
    lowered.contains("earthquake") || lowered.contains("deprem")
}

fn contains_convert_phrase(text: &str) -> bool {
    CONVERT_PHRASE.is_match(text)
}

fn derive_render_mode(kind: DataKind, text: &str) -> RenderMode {
    match kind {
        DataKind::Earthquake => {
            if mentions_earthquake(text) {
                RenderMode::Rich
            } else {
                RenderMode::Simple
            }
        }
        DataKind::ExchangeRate => {
            if looks_like_conversion(text) {
                RenderMode::Simple
            } else {
                RenderMode::Rich
            }
        }
        _ => RenderMode::Rich,
    }
}

/// Folds tool results and the model's phase-2 summary into one
/// envelope.
///
/// Slots fill in result order, so a later result of the same kind
/// replaces an earlier one. The display text is chosen by kind
/// precedence: weather first, then earthquake, then exchange rate,
/// then coin, then stock, independent of slot order. Exchange-rate
/// conversions keep the model's own text when it contains a phrase
/// like "100 USD to EUR", which lets the client pick the compact
/// rendering; every other tool kind gets its fixed phrase.
pub fn build_envelope(results: &[DomainData], summary: &str) -> ResponseEnvelope {
    let mut envelope = ResponseEnvelope::default();

    for result in results {
        match result.clone() {
            DomainData::Weather(report) => envelope.weather_data = Some(report),
            DomainData::Earthquake(report) => envelope.earthquake_data = Some(report),
            DomainData::ExchangeRate(report) => envelope.exchange_rate_data = Some(report),
            DomainData::Coin(report) => envelope.coin_data = Some(report),
            DomainData::Stock(report) => envelope.stock_data = Some(report),
        }
    }

    envelope.text = if envelope.weather_data.is_some() {
        WEATHER_TEXT.to_string()
    } else if envelope.earthquake_data.is_some() {
        EARTHQUAKE_TEXT.to_string()
    } else if let Some(exchange) = &envelope.exchange_rate_data {
        match exchange {
            ExchangeRateReport::Convert { .. } if contains_convert_phrase(summary) => {
                summary.to_string()
            }
            ExchangeRateReport::Convert { .. } => EXCHANGE_RATE_TEXT.to_string(),
            ExchangeRateReport::Historical { .. } => EXCHANGE_RATE_HISTORICAL_TEXT.to_string(),
            ExchangeRateReport::Rates { .. } => EXCHANGE_RATE_TEXT.to_string(),
        }
    } else if envelope.coin_data.is_some() {
        COIN_TEXT.to_string()
    } else if envelope.stock_data.is_some() {
        STOCK_TEXT.to_string()
    } else {
        summary.to_string()
    };

    envelope.render_mode = envelope
        .populated_kind()
        .map(|kind| derive_render_mode(kind, &envelope.text));

    envelope
}
