//! Geocoding collaborator
//!
//! Address ↔ coordinate lookups against a Nominatim-compatible service, and
//! OSM tile URLs. Network calls are one-shot: no retry, no backoff. Every
//! failure (transport, status, empty result, malformed body) comes back as a
//! [`GeocodeError`] for the caller to handle.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::defaults::TILE_BASE_URL;
use crate::config::GeocoderConfig;

#[derive(Debug, thiserror::Error)]
pub enum GeocodeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("geocoder returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("no match for '{0}'")]
    NoMatch(String),
    #[error("invalid geocoder response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Address → coordinates of the best match
    async fn geocode(&self, address: &str) -> Result<Coordinates, GeocodeError>;

    /// Coordinates → display address
    async fn reverse(&self, latitude: f64, longitude: f64) -> Result<String, GeocodeError>;
}

/// `/search` result entry. Nominatim encodes coordinates as strings.
#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
}

/// `/reverse` response
#[derive(Debug, Deserialize)]
struct ReverseResult {
    display_name: Option<String>,
    error: Option<String>,
}

fn first_match(address: &str, places: Vec<Place>) -> Result<Coordinates, GeocodeError> {
    let place = places
        .into_iter()
        .next()
        .ok_or_else(|| GeocodeError::NoMatch(address.to_string()))?;
    let parse = |field: &str, raw: &str| {
        raw.parse::<f64>()
            .map_err(|e| GeocodeError::InvalidResponse(format!("{field} '{raw}': {e}")))
    };
    Ok(Coordinates {
        latitude: parse("lat", &place.lat)?,
        longitude: parse("lon", &place.lon)?,
    })
}

fn display_name(latitude: f64, longitude: f64, result: ReverseResult) -> Result<String, GeocodeError> {
    match (result.display_name, result.error) {
        (Some(name), _) => Ok(name),
        (None, Some(err)) => Err(GeocodeError::InvalidResponse(err)),
        (None, None) => Err(GeocodeError::NoMatch(format!("{latitude},{longitude}"))),
    }
}

pub struct NominatimGeocoder {
    http: reqwest::Client,
    base_url: String,
}

impl NominatimGeocoder {
    pub fn new(config: &GeocoderConfig) -> Result<Self, GeocodeError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, address: &str) -> Result<Coordinates, GeocodeError> {
        let resp = self
            .http
            .get(format!("{}/search", self.base_url))
            .query(&[("format", "json"), ("q", address), ("limit", "1")])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(GeocodeError::Status(resp.status()));
        }
        let places: Vec<Place> = resp.json().await?;
        let coords = first_match(address, places)?;
        debug!(address = %address, lat = coords.latitude, lon = coords.longitude, "Geocoded address");
        Ok(coords)
    }

    async fn reverse(&self, latitude: f64, longitude: f64) -> Result<String, GeocodeError> {
        let resp = self
            .http
            .get(format!("{}/reverse", self.base_url))
            .query(&[
                ("format", "json".to_string()),
                ("lat", latitude.to_string()),
                ("lon", longitude.to_string()),
            ])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(GeocodeError::Status(resp.status()));
        }
        let result: ReverseResult = resp.json().await?;
        display_name(latitude, longitude, result)
    }
}

/// OSM raster tile URL for zoom `z`, column `x`, row `y`.
pub fn tile_url(z: u8, x: u32, y: u32) -> String {
    format!("{TILE_BASE_URL}/{z}/{x}/{y}.png")
}
