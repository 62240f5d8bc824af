//! Coordinate types, request validation and provider-to-public re-mapping.
//!
//! Inbound bodies are validated from a raw [`serde_json::Value`] rather than a
//! derived struct so that a missing `start`/`dest` and a non-numeric `lat`/`lng`
//! can be told apart and answered with different messages.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// A geographic point in the public `(lat, lng)` convention.
///
/// Both fields are finite; no range check is applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Render as the `lat,lng` pair used in provider query strings.
    pub fn as_query_point(&self) -> String {
        format!("{},{}", self.lat, self.lng)
    }

    fn from_json(value: &Value) -> Result<Self> {
        let object = value.as_object().ok_or(Error::InvalidCoordinate)?;
        let lat = object.get("lat").and_then(coerce_finite);
        let lng = object.get("lng").and_then(coerce_finite);
        match (lat, lng) {
            (Some(lat), Some(lng)) => Ok(Self { lat, lng }),
            _ => Err(Error::InvalidCoordinate),
        }
    }
}

/// A validated start/destination pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteRequest {
    pub start: Coordinate,
    pub dest: Coordinate,
}

impl RouteRequest {
    pub fn new(start: Coordinate, dest: Coordinate) -> Self {
        Self { start, dest }
    }

    /// Extract and validate `start` and `dest` from a decoded request body.
    ///
    /// Presence is checked for both fields before either is parsed, so a body
    /// with a valid `start` and no `dest` reports [`Error::MissingField`].
    pub fn from_json(body: &Value) -> Result<Self> {
        let start = body.get("start").filter(|v| is_present(v));
        let dest = body.get("dest").filter(|v| is_present(v));

        let (Some(start), Some(dest)) = (start, dest) else {
            return Err(Error::MissingField);
        };

        Ok(Self {
            start: Coordinate::from_json(start)?,
            dest: Coordinate::from_json(dest)?,
        })
    }
}

/// Empty values (`null`, `false`, `0`, `""`, `[]`, `{}`) count as absent.
pub(crate) fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Accept JSON numbers and numeric strings; reject NaN and infinities.
fn coerce_finite(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

/// A provider position in `[lng, lat]` order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LngLat(pub f64, pub f64);

/// A public position in `[lat, lng]` order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng(pub f64, pub f64);

impl From<LngLat> for LatLng {
    fn from(LngLat(lng, lat): LngLat) -> Self {
        LatLng(lat, lng)
    }
}

impl From<LatLng> for LngLat {
    fn from(LatLng(lat, lng): LatLng) -> Self {
        LngLat(lng, lat)
    }
}

/// Swap every provider pair into public order, keeping order and length.
pub fn remap(points: &[LngLat]) -> Vec<LatLng> {
    points.iter().copied().map(LatLng::from).collect()
}

/// Successful route proxy payload: `{ "coords": [[lat, lng], ...] }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteResult {
    pub coords: Vec<LatLng>,
}

impl RouteResult {
    /// Build the public result from the provider's raw geometry.
    pub fn from_provider(points: &[LngLat]) -> Self {
        Self {
            coords: remap(points),
        }
    }

    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }
}
