// datachat-core/src/tools/earthquake.rs

//! Seismic-event search against a USGS fdsnws-compatible feed, with a
//! Nominatim-style geocoder for free-text place names.

use chrono::Utc;
use lazy_static::lazy_static;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

use super::status_error;
use crate::config::EarthquakeProviderConfig;
use crate::errors::ToolError;
use crate::models::domain::{EarthquakeEvent, EarthquakeReport, EventCoordinates};

const GEOCODE_USER_AGENT: &str = "datachat/0.1";

#[derive(Debug)]
pub enum QuakeSearch {
    Region(String),
    Location(String),
    Coordinates { latitude: f64, longitude: f64 },
}

#[derive(Debug)]
pub struct QuakeOptions {
    pub radius: f64,
    pub days: i64,
    pub min_magnitude: f64,
}

impl Default for QuakeOptions {
    fn default() -> Self {
        QuakeOptions {
            radius: 300.0,
            days: 30,
            min_magnitude: 3.0,
        }
    }
}

struct RegionBounds {
    min_latitude: f64,
    max_latitude: f64,
    min_longitude: f64,
    max_longitude: f64,
}

lazy_static! {
    /// Bounding boxes for well-known regions, keyed by lowercase name
    /// in English and Turkish.
    static ref PREDEFINED_REGIONS: HashMap<&'static str, RegionBounds> = {
        let turkey = || RegionBounds { min_latitude: 36.0, max_latitude: 42.0, min_longitude: 26.0, max_longitude: 45.0 };
        let japan = || RegionBounds { min_latitude: 30.0, max_latitude: 46.0, min_longitude: 129.0, max_longitude: 146.0 };
        let italy = || RegionBounds { min_latitude: 36.0, max_latitude: 47.0, min_longitude: 6.0, max_longitude: 18.0 };
        let greece = || RegionBounds { min_latitude: 34.0, max_latitude: 42.0, min_longitude: 19.0, max_longitude: 29.0 };
        HashMap::from([
            ("türkiye", turkey()),
            ("turkey", turkey()),
            ("california", RegionBounds { min_latitude: 32.0, max_latitude: 42.0, min_longitude: -124.0, max_longitude: -114.0 }),
            ("japonya", japan()),
            ("japan", japan()),
            ("italya", italy()),
            ("italy", italy()),
            ("yunanistan", greece()),
            ("greece", greece()),
        ])
    };
}

#[derive(Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    display_name: String,
}

struct GeocodedPlace {
    lat: f64,
    lon: f64,
    display_name: String,
}

async fn geocode_location(
    client: &Client,
    config: &EarthquakeProviderConfig,
    location_name: &str,
) -> Result<GeocodedPlace, ToolError> {
    let url = format!("{}/search", config.geocode_url);
    let response = client
        .get(&url)
        .query(&[("q", location_name), ("format", "json"), ("limit", "1")])
        .header("User-Agent", GEOCODE_USER_AGENT)
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(status_error("Geocoding API", response).await);
    }

    let places: Vec<NominatimPlace> = response
        .json()
        .await
        .map_err(|e| ToolError::Provider(format!("Geocoding API returned invalid JSON: {}", e)))?;
    let place = places.into_iter().next().ok_or_else(|| {
        ToolError::NotFound(format!(
            "No coordinates found for \"{}\". Please provide a valid city or place name.",
            location_name
        ))
    })?;

    let lat = place.lat.parse::<f64>().map_err(|_| {
        ToolError::Provider(format!("Geocoding API returned a non-numeric latitude: {}", place.lat))
    })?;
    let lon = place.lon.parse::<f64>().map_err(|_| {
        ToolError::Provider(format!("Geocoding API returned a non-numeric longitude: {}", place.lon))
    })?;

    Ok(GeocodedPlace {
        lat,
        lon,
        display_name: place.display_name,
    })
}

#[derive(Deserialize, Default)]
struct UsgsProperties {
    #[serde(default)]
    mag: f64,
    #[serde(default)]
    place: String,
    #[serde(default)]
    time: i64,
    #[serde(default)]
    alert: Option<String>,
    #[serde(default)]
    tsunami: i64,
    #[serde(default)]
    felt: Option<i64>,
    #[serde(default)]
    sig: i64,
    #[serde(default)]
    url: String,
    #[serde(default)]
    detail: String,
}

#[derive(Deserialize, Default)]
struct UsgsGeometry {
    #[serde(default)]
    coordinates: Vec<f64>,
}

#[derive(Deserialize)]
struct UsgsFeature {
    #[serde(default)]
    id: String,
    #[serde(default)]
    properties: UsgsProperties,
    #[serde(default)]
    geometry: UsgsGeometry,
}

#[derive(Deserialize, Default)]
struct UsgsResponse {
    #[serde(default)]
    features: Vec<UsgsFeature>,
}

fn start_time(days: i64) -> String {
    (Utc::now() - chrono::Duration::days(days))
        .format("%Y-%m-%d")
        .to_string()
}

fn convert_events(data: UsgsResponse) -> Vec<EarthquakeEvent> {
    // Upstream ordering is kept as-is.
    data.features
        .into_iter()
        .map(|feature| {
            let coords = &feature.geometry.coordinates;
            EarthquakeEvent {
                id: feature.id,
                magnitude: feature.properties.mag,
                place: feature.properties.place,
                time: chrono::DateTime::<Utc>::from_timestamp_millis(feature.properties.time)
                    .map(|dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
                    .unwrap_or_default(),
                coordinates: EventCoordinates {
                    latitude: coords.get(1).copied().unwrap_or(0.0),
                    longitude: coords.first().copied().unwrap_or(0.0),
                    depth: coords.get(2).copied().unwrap_or(0.0),
                },
                alert: feature.properties.alert,
                tsunami: feature.properties.tsunami == 1,
                felt: feature.properties.felt,
                significance: feature.properties.sig,
                url: feature.properties.url,
                detail_url: feature.properties.detail,
            }
        })
        .collect()
}

async fn query_feed(
    client: &Client,
    config: &EarthquakeProviderConfig,
    params: &[(&str, String)],
) -> Result<UsgsResponse, ToolError> {
    let url = format!("{}/fdsnws/event/1/query", config.base_url);
    let response = client.get(&url).query(params).send().await?;
    if !response.status().is_success() {
        return Err(status_error("USGS API", response).await);
    }
    response
        .json()
        .await
        .map_err(|e| ToolError::Provider(format!("USGS API returned invalid JSON: {}", e)))
}

async fn fetch_by_radius(
    client: &Client,
    config: &EarthquakeProviderConfig,
    lat: f64,
    lon: f64,
    region_label: String,
    options: &QuakeOptions,
) -> Result<EarthquakeReport, ToolError> {
    let data = query_feed(
        client,
        config,
        &[
            ("format", "geojson".to_string()),
            ("starttime", start_time(options.days)),
            ("latitude", lat.to_string()),
            ("longitude", lon.to_string()),
            ("maxradiuskm", options.radius.to_string()),
            ("minmagnitude", options.min_magnitude.to_string()),
        ],
    )
    .await?;

    let earthquakes = convert_events(data);
    Ok(EarthquakeReport {
        total_count: earthquakes.len(),
        region: region_label,
        period: format!("Last {} days", options.days),
        min_magnitude: options.min_magnitude,
        earthquakes,
    })
}

async fn fetch_by_place_name(
    client: &Client,
    config: &EarthquakeProviderConfig,
    place: &str,
    options: &QuakeOptions,
) -> Result<EarthquakeReport, ToolError> {
    let geocoded = geocode_location(client, config, place).await?;
    let label = format!("{} ({}km)", geocoded.display_name, options.radius);
    fetch_by_radius(client, config, geocoded.lat, geocoded.lon, label, options).await
}

pub async fn fetch_earthquakes(
    client: &Client,
    config: &EarthquakeProviderConfig,
    search: &QuakeSearch,
    options: &QuakeOptions,
) -> Result<EarthquakeReport, ToolError> {
    match search {
        QuakeSearch::Coordinates {
            latitude,
            longitude,
        } => {
            let label = format!("{}, {} ({}km)", latitude, longitude, options.radius);
            fetch_by_radius(client, config, *latitude, *longitude, label, options).await
        }
        QuakeSearch::Location(location) => {
            fetch_by_place_name(client, config, location, options).await
        }
        QuakeSearch::Region(region) => {
            let normalized = region.to_lowercase().trim().to_string();
            match PREDEFINED_REGIONS.get(normalized.as_str()) {
                Some(bounds) => {
                    let data = query_feed(
                        client,
                        config,
                        &[
                            ("format", "geojson".to_string()),
                            ("starttime", start_time(options.days)),
                            ("minmagnitude", options.min_magnitude.to_string()),
                            ("minlatitude", bounds.min_latitude.to_string()),
                            ("maxlatitude", bounds.max_latitude.to_string()),
                            ("minlongitude", bounds.min_longitude.to_string()),
                            ("maxlongitude", bounds.max_longitude.to_string()),
                        ],
                    )
                    .await?;
                    let earthquakes = convert_events(data);
                    Ok(EarthquakeReport {
                        total_count: earthquakes.len(),
                        region: region.clone(),
                        period: format!("Last {} days", options.days),
                        min_magnitude: options.min_magnitude,
                        earthquakes,
                    })
                }
                None => {
                    // Unknown region names are treated as place names.
                    debug!(region = %region, "Region not in bounding-box table, geocoding instead");
                    fetch_by_place_name(client, config, region, options).await
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn test_config(server: &MockServer) -> EarthquakeProviderConfig {
        EarthquakeProviderConfig {
            base_url: server.base_url(),
            geocode_url: server.base_url(),
        }
    }

    fn feed_body() -> serde_json::Value {
        json!({
            "features": [
                {
                    "id": "us7000test",
                    "properties": {
                        "mag": 4.2,
                        "place": "10 km E of Marmara",
                        "time": 1_700_000_000_000_i64,
                        "alert": null,
                        "tsunami": 0,
                        "felt": 12,
                        "sig": 271,
                        "url": "https://example.org/eq/us7000test",
                        "detail": "https://example.org/eq/us7000test.geojson"
                    },
                    "geometry": {"coordinates": [28.9, 40.7, 9.4]}
                }
            ]
        })
    }

    #[tokio::test]
    async fn test_region_uses_bounding_box() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/fdsnws/event/1/query")
                    .query_param("format", "geojson")
                    .query_param("minlatitude", "36")
                    .query_param("maxlatitude", "42")
                    .query_param("minlongitude", "26")
                    .query_param("maxlongitude", "45");
                then.status(200).json_body(feed_body());
            })
            .await;

        let report = fetch_earthquakes(
            &Client::new(),
            &test_config(&server),
            &QuakeSearch::Region("Turkey".to_string()),
            &QuakeOptions::default(),
        )
        .await
        .unwrap();

        mock.assert_async().await;
        assert_eq!(report.total_count, 1);
        assert_eq!(report.region, "Turkey");
        assert_eq!(report.period, "Last 30 days");
        let event = &report.earthquakes[0];
        assert_eq!(event.magnitude, 4.2);
        assert_eq!(event.coordinates.latitude, 40.7);
        assert_eq!(event.coordinates.longitude, 28.9);
        assert_eq!(event.coordinates.depth, 9.4);
        assert!(!event.tsunami);
    }

    #[tokio::test]
    async fn test_unknown_region_falls_back_to_geocoding() {
        let server = MockServer::start_async().await;
        let geocode_mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/search")
                    .query_param("q", "Ankara Province")
                    .query_param("format", "json");
                then.status(200).json_body(json!([
                    {"lat": "39.92", "lon": "32.85", "display_name": "Ankara, Türkiye"}
                ]));
            })
            .await;
        let feed_mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/fdsnws/event/1/query")
                    .query_param("latitude", "39.92")
                    .query_param("longitude", "32.85")
                    .query_param("maxradiuskm", "300");
                then.status(200).json_body(feed_body());
            })
            .await;

        let report = fetch_earthquakes(
            &Client::new(),
            &test_config(&server),
            &QuakeSearch::Region("Ankara Province".to_string()),
            &QuakeOptions::default(),
        )
        .await
        .unwrap();

        geocode_mock.assert_async().await;
        feed_mock.assert_async().await;
        assert_eq!(report.region, "Ankara, Türkiye (300km)");
    }

    #[tokio::test]
    async fn test_coordinates_search_labels_radius() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/fdsnws/event/1/query");
                then.status(200).json_body(json!({"features": []}));
            })
            .await;

        let report = fetch_earthquakes(
            &Client::new(),
            &test_config(&server),
            &QuakeSearch::Coordinates {
                latitude: 39.0,
                longitude: 35.0,
            },
            &QuakeOptions {
                radius: 1000.0,
                ..QuakeOptions::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(report.total_count, 0);
        assert_eq!(report.region, "39, 35 (1000km)");
    }

    #[tokio::test]
    async fn test_no_geocode_match_is_not_found() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/search");
                then.status(200).json_body(json!([]));
            })
            .await;

        let result = fetch_earthquakes(
            &Client::new(),
            &test_config(&server),
            &QuakeSearch::Location("Nowhereville".to_string()),
            &QuakeOptions::default(),
        )
        .await;
        assert!(matches!(result, Err(ToolError::NotFound(_))));
    }
}
