// datachat-core/src/config.rs

//! Configuration structures and parsing.
//!
//! The on-disk shape (`AppConfig`) names API keys indirectly through
//! environment variables; [`RuntimeConfig`] is the resolved form the
//! pipeline actually runs with. A missing model credential is not an
//! error at load time; the orchestrator rejects it per request,
//! before any network call.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::env;
use std::path::Path;
use url::Url;

#[derive(Deserialize, Debug, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub model: ModelSettings,
    #[serde(default)]
    pub providers: ProviderSettings,
    #[serde(default)]
    pub storage: Option<StorageSettings>,
    #[serde(default)]
    pub server: ServerSettings,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ModelSettings {
    pub model_name: String,
    pub endpoint: String,
    pub api_key_env_var: String,
    /// Extra request parameters merged verbatim into the completion
    /// payload (temperature etc.).
    pub parameters: Option<toml::Value>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        let mut parameters = toml::value::Table::new();
        parameters.insert("temperature".to_string(), toml::Value::Float(0.7));
        ModelSettings {
            model_name: "deepseek-chat".to_string(),
            endpoint: "https://api.deepseek.com/chat/completions".to_string(),
            api_key_env_var: "DEEPSEEK_API_KEY".to_string(),
            parameters: Some(toml::Value::Table(parameters)),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct ProviderSettings {
    pub weather: WeatherSettings,
    pub earthquake: EarthquakeSettings,
    pub exchange_rate: ExchangeRateSettings,
    pub coin: CoinSettings,
    pub stock: StockSettings,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct WeatherSettings {
    pub base_url: String,
    pub api_key_env_var: String,
}

impl Default for WeatherSettings {
    fn default() -> Self {
        WeatherSettings {
            base_url: "https://api.openweathermap.org".to_string(),
            api_key_env_var: "OPENWEATHER_API_KEY".to_string(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct EarthquakeSettings {
    pub base_url: String,
    pub geocode_url: String,
}

impl Default for EarthquakeSettings {
    fn default() -> Self {
        EarthquakeSettings {
            base_url: "https://earthquake.usgs.gov".to_string(),
            geocode_url: "https://nominatim.openstreetmap.org".to_string(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ExchangeRateSettings {
    pub base_url: String,
}

impl Default for ExchangeRateSettings {
    fn default() -> Self {
        ExchangeRateSettings {
            base_url: "https://api.frankfurter.app".to_string(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct CoinSettings {
    pub base_url: String,
}

impl Default for CoinSettings {
    fn default() -> Self {
        CoinSettings {
            base_url: "https://api.coingecko.com/api/v3".to_string(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct StockSettings {
    pub base_url: String,
    pub api_key_env_var: String,
}

impl Default for StockSettings {
    fn default() -> Self {
        StockSettings {
            base_url: "https://www.alphavantage.co".to_string(),
            api_key_env_var: "ALPHA_VANTAGE_API_KEY".to_string(),
        }
    }
}

/// PostgREST-style storage collaborator (sessions, messages,
/// attachments).
#[derive(Deserialize, Debug, Clone)]
pub struct StorageSettings {
    pub base_url: String,
    pub api_key_env_var: String,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(config_toml_content: &str) -> Result<AppConfig> {
        let config: AppConfig = match toml::from_str(config_toml_content) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::error!(error = %e, "Failed to parse TOML configuration");
                return Err(anyhow!(e))
                    .context("Failed to parse configuration TOML content. Check TOML syntax.");
            }
        };

        if config.model.model_name.trim().is_empty() {
            return Err(anyhow!("'model.model_name' is empty."));
        }
        if config.model.api_key_env_var.trim().is_empty() {
            return Err(anyhow!("'model.api_key_env_var' is empty."));
        }
        Url::parse(&config.model.endpoint).with_context(|| {
            format!(
                "Invalid URL format for model endpoint ('{}').",
                config.model.endpoint
            )
        })?;
        if let Some(params) = &config.model.parameters {
            if !params.is_table() {
                return Err(anyhow!(
                    "'model.parameters' must be a TOML table of request parameters."
                ));
            }
        }

        for (name, base_url) in [
            ("providers.weather", &config.providers.weather.base_url),
            ("providers.earthquake", &config.providers.earthquake.base_url),
            (
                "providers.earthquake.geocode_url",
                &config.providers.earthquake.geocode_url,
            ),
            (
                "providers.exchange_rate",
                &config.providers.exchange_rate.base_url,
            ),
            ("providers.coin", &config.providers.coin.base_url),
            ("providers.stock", &config.providers.stock.base_url),
        ] {
            Url::parse(base_url)
                .with_context(|| format!("Invalid URL for '{}' ('{}').", name, base_url))?;
        }

        if let Some(storage) = &config.storage {
            Url::parse(&storage.base_url).with_context(|| {
                format!("Invalid URL for 'storage.base_url' ('{}').", storage.base_url)
            })?;
            if storage.api_key_env_var.trim().is_empty() {
                return Err(anyhow!("'storage.api_key_env_var' is empty."));
            }
        }

        tracing::info!("Successfully parsed and validated configuration.");
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<AppConfig> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml_str(&content)
    }
}

// --- Resolved runtime form ---

#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub model_name: String,
    pub endpoint: String,
    pub api_key: String,
    pub parameters: Option<toml::Value>,
}

#[derive(Debug, Clone)]
pub struct WeatherProviderConfig {
    pub base_url: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct EarthquakeProviderConfig {
    pub base_url: String,
    pub geocode_url: String,
}

#[derive(Debug, Clone)]
pub struct ExchangeRateProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct CoinProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct StockProviderConfig {
    pub base_url: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub weather: WeatherProviderConfig,
    pub earthquake: EarthquakeProviderConfig,
    pub exchange_rate: ExchangeRateProviderConfig,
    pub coin: CoinProviderConfig,
    pub stock: StockProviderConfig,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub base_url: String,
    pub api_key: String,
}

/// Fully resolved configuration: every `*_env_var` replaced with the
/// variable's current value, or an empty string when unset.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub model: ModelConfig,
    pub providers: ProviderConfig,
    pub storage: Option<StorageConfig>,
}

fn env_or_empty(var: &str) -> String {
    env::var(var).unwrap_or_default()
}

impl RuntimeConfig {
    pub fn from_app(config: &AppConfig) -> RuntimeConfig {
        RuntimeConfig {
            model: ModelConfig {
                model_name: config.model.model_name.clone(),
                endpoint: config.model.endpoint.clone(),
                api_key: env_or_empty(&config.model.api_key_env_var),
                parameters: config.model.parameters.clone(),
            },
            providers: ProviderConfig {
                weather: WeatherProviderConfig {
                    base_url: config.providers.weather.base_url.clone(),
                    api_key: env_or_empty(&config.providers.weather.api_key_env_var),
                },
                earthquake: EarthquakeProviderConfig {
                    base_url: config.providers.earthquake.base_url.clone(),
                    geocode_url: config.providers.earthquake.geocode_url.clone(),
                },
                exchange_rate: ExchangeRateProviderConfig {
                    base_url: config.providers.exchange_rate.base_url.clone(),
                },
                coin: CoinProviderConfig {
                    base_url: config.providers.coin.base_url.clone(),
                },
                stock: StockProviderConfig {
                    base_url: config.providers.stock.base_url.clone(),
                    api_key: env_or_empty(&config.providers.stock.api_key_env_var),
                },
            },
            storage: config.storage.as_ref().map(|s| StorageConfig {
                base_url: s.base_url.clone(),
                api_key: env_or_empty(&s.api_key_env_var),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config_content() -> String {
        r#"
            [model]
            model_name = "deepseek-chat"
            endpoint = "https://api.deepseek.com/chat/completions"
            api_key_env_var = "DEEPSEEK_API_KEY"
            parameters = { temperature = 0.7 }

            [providers.weather]
            base_url = "https://api.openweathermap.org"
            api_key_env_var = "OPENWEATHER_API_KEY"

            [providers.stock]
            base_url = "https://www.alphavantage.co"
            api_key_env_var = "ALPHA_VANTAGE_API_KEY"

            [storage]
            base_url = "https://example.supabase.co"
            api_key_env_var = "SUPABASE_ANON_KEY"

            [server]
            host = "0.0.0.0"
            port = 8080
        "#
        .to_string()
    }

    #[test]
    fn test_config_parse_success() {
        let content = valid_config_content();
        let result = AppConfig::from_toml_str(&content);
        assert!(result.is_ok(), "Parse failed: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.model.model_name, "deepseek-chat");
        assert_eq!(config.server.port, 8080);
        // Unlisted providers keep their defaults.
        assert_eq!(
            config.providers.exchange_rate.base_url,
            "https://api.frankfurter.app"
        );
        assert!(config.storage.is_some());
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config.model.model_name, "deepseek-chat");
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert!(config.storage.is_none());
        assert_eq!(
            config.providers.coin.base_url,
            "https://api.coingecko.com/api/v3"
        );
    }

    #[test]
    fn test_config_rejects_bad_endpoint_url() {
        let content = r#"
            [model]
            endpoint = "not a url"
        "#;
        let result = AppConfig::from_toml_str(content);
        assert!(result.is_err());
        let msg = format!("{:#}", result.err().unwrap());
        assert!(msg.contains("Invalid URL format for model endpoint"), "{}", msg);
    }

    #[test]
    fn test_config_rejects_non_table_parameters() {
        let content = r#"
            [model]
            parameters = "temperature=0.7"
        "#;
        let result = AppConfig::from_toml_str(content);
        assert!(result.is_err());
    }

    #[test]
    fn test_runtime_resolution_missing_key_is_empty() {
        let mut config = AppConfig::default();
        config.model.api_key_env_var = "DATACHAT_TEST_SURELY_UNSET_VAR".to_string();
        let runtime = RuntimeConfig::from_app(&config);
        assert!(runtime.model.api_key.is_empty());
        assert_eq!(runtime.model.model_name, "deepseek-chat");
    }
}
