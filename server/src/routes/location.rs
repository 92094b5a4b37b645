//! Location webhook: ingest pings from the tracking client, serve the last state.
//!
//! - `POST /` (or `/api/location`) — classify and persist a location report
//! - `GET  /` (or `/api/location`) — last stored `{location, battery}`
//!
//! ## Write flow
//!
//! 1. Anything that is not a JSON object with `"_type": "location"` is
//!    ignored: `200 []`, nothing stored. Coordinates are not validated; a
//!    missing or non-numeric `lat`/`lon` becomes NaN, matches no zone, and is
//!    stored as `"unknown"`.
//! 2. If the point is inside a configured hidden zone, the zone name is stored.
//! 3. Otherwise nearby POIs are looked up; the nearest is used if it is within
//!    `overpass.max_label_distance_km`, else `"unknown"`. Lookup failures count
//!    as "no POIs".
//! 4. Location and battery are persisted together and the response is `[]`
//!    whichever branch ran.
//!
//! Only a store failure turns into an error response (`500`).

use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Number, Value};
use tracing::{debug, error, info, warn};

use crate::geo::{find_hidden_zone, Coordinate};
use crate::poi::{location_label, UNKNOWN_LOCATION};
use crate::store::{StoreError, BATTERY_KEY, LOCATION_KEY};
use crate::AppState;

/// A location report from the tracking client. Other fields are ignored.
#[derive(Debug, Deserialize)]
pub struct LocationReport {
    #[serde(rename = "_type")]
    pub kind: String,
    #[serde(default = "nan", deserialize_with = "lenient_f64")]
    pub lat: f64,
    #[serde(default = "nan", deserialize_with = "lenient_f64")]
    pub lon: f64,
    /// Battery level, sent as a number or a string.
    #[serde(default)]
    pub batt: Option<Value>,
}

fn nan() -> f64 {
    f64::NAN
}

/// JSON number, or a string holding one; anything else is NaN.
fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
        _ => f64::NAN,
    })
}

impl LocationReport {
    /// Parse a request body, returning `None` for anything that is not a
    /// location-tagged JSON object.
    pub fn from_body(body: &[u8]) -> Option<Self> {
        let value: Value = serde_json::from_slice(body).ok()?;
        if value.get("_type").and_then(Value::as_str) != Some("location") {
            return None;
        }
        serde_json::from_value(value).ok()
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lon)
    }

    /// Battery reading as stored: strings verbatim, numbers in JSON form,
    /// empty when absent.
    pub fn battery(&self) -> String {
        match &self.batt {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    }
}

/// Stored battery text as a JSON number; `0` when absent or not numeric.
/// Whole values come back as integers (`"77.0"` reads as `77`).
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss, clippy::float_cmp)]
fn battery_number(raw: Option<&str>) -> Number {
    let raw = raw.map(str::trim).unwrap_or_default();
    if let Ok(n) = raw.parse::<i64>() {
        return Number::from(n);
    }
    match raw.parse::<f64>() {
        Ok(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Number::from(f as i64),
        Ok(f) => Number::from_f64(f).unwrap_or_else(|| Number::from(0)),
        Err(_) => Number::from(0),
    }
}

fn store_failure(e: &StoreError) -> (StatusCode, Json<Value>) {
    error!("Failed to persist location: {e}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": e.to_string()})),
    )
}

/// `POST /` — ingest a location report. Always answers `[]` unless the store fails.
pub async fn ingest(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let Some(report) = LocationReport::from_body(&body) else {
        debug!("Ignoring non-location payload ({} bytes)", body.len());
        return Ok(Json(json!([])));
    };

    let point = report.coordinate();
    let battery = report.battery();
    let zone = find_hidden_zone(&point, &state.config.zones);

    info!(
        "Received location update: lat={}, lon={}, batt={battery}, hidden zone: {}",
        report.lat,
        report.lon,
        if zone.is_some() { "yes" } else { "no" },
    );

    let location = if let Some(zone) = zone {
        zone.name.clone()
    } else if !(point.lat.is_finite() && point.lon.is_finite()) {
        debug!("No usable coordinates, skipping POI lookup");
        UNKNOWN_LOCATION.to_string()
    } else {
        let pois = state.overpass.nearby(&point).await.unwrap_or_else(|e| {
            warn!("POI lookup failed: {e}");
            Vec::new()
        });
        debug!("POI lookup returned {} candidate(s)", pois.len());
        location_label(&pois, state.config.overpass.max_label_distance_km)
    };

    state
        .store
        .put_many(&[(LOCATION_KEY, location.as_str()), (BATTERY_KEY, battery.as_str())])
        .await
        .map_err(|e| store_failure(&e))?;

    debug!("Stored location {location:?}");
    Ok(Json(json!([])))
}

/// `GET /` — last stored location and battery.
pub async fn current(State(state): State<AppState>) -> Json<Value> {
    let location = state
        .store
        .get(LOCATION_KEY)
        .await
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| UNKNOWN_LOCATION.to_string());
    let battery = battery_number(state.store.get(BATTERY_KEY).await.as_deref());

    Json(json!({
        "location": location,
        "battery": battery,
    }))
}
