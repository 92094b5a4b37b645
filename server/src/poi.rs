//! Nearby point-of-interest lookup via the Overpass API.
//!
//! [`OverpassClient::nearby`] sends one Overpass QL query for named `amenity`
//! features around a coordinate, drops low-value amenity types and restricted
//! access, and returns the closest few as [`Poi`]s sorted by distance.
//!
//! Lookup is best-effort. The client reports failures as [`OverpassError`];
//! callers on the write path treat any error as "no POIs" rather than failing
//! the request.
//!
//! The label policy lives here too: [`location_label`] turns the ranked list
//! into the display string that gets persisted.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::OverpassConfig;
use crate::geo::{distance_km, Coordinate};

/// Label stored when neither a hidden zone nor a close enough POI is found.
pub const UNKNOWN_LOCATION: &str = "unknown";

/// Amenity values excluded from the query (regex alternation, anchored).
const EXCLUDED_AMENITIES: &str = "parking.*|waste.*|bench|toilets|recycling|vending_machine|shelter|post_box|fountain|drinking_water|telephone";

/// Access values that make a feature useless as a location label.
const EXCLUDED_ACCESS: &str = "private|no|permit|delivery|agricultural|forestry";

/// A named feature near the queried coordinate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Poi {
    pub name: String,
    /// `addr:city`, empty when untagged.
    pub city: String,
    /// `addr:country`, empty when untagged.
    pub country: String,
    /// Distance from the queried coordinate in kilometers.
    pub distance: f64,
}

impl Poi {
    /// Display string: `name`, `name (city)` or `name (city, country)`.
    ///
    /// A country without a city is never shown.
    #[must_use]
    pub fn label(&self) -> String {
        match (self.city.is_empty(), self.country.is_empty()) {
            (true, _) => self.name.clone(),
            (false, true) => format!("{} ({})", self.name, self.city),
            (false, false) => format!("{} ({}, {})", self.name, self.city, self.country),
        }
    }
}

/// Label for the nearest POI if it lies within `max_distance_km`, otherwise
/// [`UNKNOWN_LOCATION`]. Expects `pois` sorted ascending by distance.
#[must_use]
pub fn location_label(pois: &[Poi], max_distance_km: f64) -> String {
    match pois.first() {
        Some(poi) if poi.distance <= max_distance_km => poi.label(),
        _ => UNKNOWN_LOCATION.to_string(),
    }
}

/// Raw Overpass response, only the parts we read.
#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<Element>,
}

#[derive(Debug, Deserialize)]
struct Element {
    lat: Option<f64>,
    lon: Option<f64>,
    /// Present for ways and relations with `out center`.
    center: Option<Center>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct Center {
    lat: f64,
    lon: f64,
}

impl Element {
    fn coordinate(&self) -> Option<Coordinate> {
        match (self.lat, self.lon, &self.center) {
            (Some(lat), Some(lon), _) => Some(Coordinate::new(lat, lon)),
            (_, _, Some(c)) => Some(Coordinate::new(c.lat, c.lon)),
            _ => None,
        }
    }

    fn tag(&self, key: &str) -> String {
        self.tags.get(key).cloned().unwrap_or_default()
    }

    fn into_poi(self, origin: &Coordinate) -> Option<Poi> {
        let at = self.coordinate()?;
        let name = self
            .tags
            .get("name")
            .filter(|n| !n.is_empty())
            .cloned()
            .unwrap_or_else(|| "Unknown".to_string());
        Some(Poi {
            city: self.tag("addr:city"),
            country: self.tag("addr:country"),
            distance: distance_km(origin.lat, origin.lon, at.lat, at.lon),
            name,
        })
    }
}

/// Convert raw elements into POIs, keep the `limit` closest, nearest first.
///
/// Elements without any usable coordinate are skipped.
fn rank_elements(elements: Vec<Element>, origin: &Coordinate, limit: usize) -> Vec<Poi> {
    let mut pois: Vec<Poi> = elements
        .into_iter()
        .filter_map(|e| e.into_poi(origin))
        .collect();
    pois.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    pois.truncate(limit);
    pois
}

/// Build the Overpass QL query for named amenities around `at`.
#[must_use]
pub fn build_query(at: &Coordinate, radius_m: u32, timeout_secs: u64) -> String {
    format!(
        r#"[out:json][timeout:{timeout_secs}];
(
  nwr(around:{radius_m},{lat},{lon})
    ["name"]
    ["amenity"]
    ["amenity"!~"^({EXCLUDED_AMENITIES})$"]
    ["access"!~"^({EXCLUDED_ACCESS})$"];
);
out center;"#,
        lat = at.lat,
        lon = at.lon,
    )
}

/// Overpass query failure.
#[derive(Debug)]
pub enum OverpassError {
    /// Transport error (connection refused, timeout, DNS failure, etc.).
    Request(reqwest::Error),
    /// Overpass answered with a non-2xx status (rate limit, bad query, ...).
    Status(u16),
    /// The body was not a valid Overpass JSON response.
    Decode(String),
}

impl std::fmt::Display for OverpassError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverpassError::Request(e) => write!(f, "Overpass request failed: {e}"),
            OverpassError::Status(status) => write!(f, "Overpass returned HTTP {status}"),
            OverpassError::Decode(msg) => write!(f, "Invalid Overpass response: {msg}"),
        }
    }
}

impl std::error::Error for OverpassError {}

/// HTTP client for an Overpass interpreter endpoint.
#[derive(Clone)]
pub struct OverpassClient {
    http: reqwest::Client,
    url: String,
    radius_m: u32,
    query_timeout_secs: u64,
    max_results: usize,
}

impl OverpassClient {
    pub fn new(config: &OverpassConfig) -> Result<Self, OverpassError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("lastseen/", env!("CARGO_PKG_VERSION")));
        // No client-side deadline unless configured; the query's own
        // `[timeout:..]` bounds the server side.
        if let Some(secs) = config.connect_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        if !config.system_proxy {
            builder = builder.no_proxy();
        }
        let http = builder.build().map_err(OverpassError::Request)?;
        Ok(Self {
            http,
            url: config.url.clone(),
            radius_m: config.radius_m,
            query_timeout_secs: config.query_timeout_secs,
            max_results: config.max_results,
        })
    }

    /// The interpreter URL queries are posted to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Closest named amenities around `at`, nearest first.
    pub async fn nearby(&self, at: &Coordinate) -> Result<Vec<Poi>, OverpassError> {
        let query = build_query(at, self.radius_m, self.query_timeout_secs);
        let resp = self
            .http
            .post(&self.url)
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(query)
            .send()
            .await
            .map_err(OverpassError::Request)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(OverpassError::Status(status.as_u16()));
        }

        let parsed: OverpassResponse = resp.json().await.map_err(|e| {
            if e.is_decode() {
                OverpassError::Decode(e.to_string())
            } else {
                OverpassError::Request(e)
            }
        })?;

        Ok(rank_elements(parsed.elements, at, self.max_results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};
    use tokio::net::TcpListener;

    fn poi(name: &str, city: &str, country: &str, distance: f64) -> Poi {
        Poi {
            name: name.to_string(),
            city: city.to_string(),
            country: country.to_string(),
            distance,
        }
    }

    fn node(name: &str, lat: f64, lon: f64) -> Value {
        json!({
            "type": "node",
            "lat": lat,
            "lon": lon,
            "tags": {"name": name, "amenity": "cafe"}
        })
    }

    fn elements(value: Value) -> Vec<Element> {
        serde_json::from_value::<OverpassResponse>(value)
            .unwrap()
            .elements
    }

    fn test_config(url: String) -> OverpassConfig {
        OverpassConfig {
            url,
            system_proxy: false,
            ..OverpassConfig::default()
        }
    }

    /// Serve `router` on an ephemeral port and return the interpreter URL.
    async fn mock_overpass(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/api/interpreter")
    }

    #[test]
    fn test_label_city_and_country() {
        assert_eq!(poi("Cafe", "Paris", "FR", 0.0).label(), "Cafe (Paris, FR)");
    }

    #[test]
    fn test_label_country_only_is_omitted() {
        assert_eq!(poi("Cafe", "", "FR", 0.0).label(), "Cafe");
    }

    #[test]
    fn test_label_city_only() {
        assert_eq!(poi("Cafe", "Paris", "", 0.0).label(), "Cafe (Paris)");
    }

    #[test]
    fn test_location_label_threshold() {
        let near = vec![poi("Cafe", "Paris", "FR", 0.199)];
        assert_eq!(location_label(&near, 0.2), "Cafe (Paris, FR)");

        let far = vec![poi("Cafe", "Paris", "FR", 0.201)];
        assert_eq!(location_label(&far, 0.2), UNKNOWN_LOCATION);
    }

    #[test]
    fn test_location_label_uses_nearest_only() {
        let pois = vec![poi("Far", "", "", 0.25), poi("Near", "", "", 0.05)];
        // Caller contract is sorted input; the first entry decides.
        assert_eq!(location_label(&pois, 0.2), UNKNOWN_LOCATION);
    }

    #[test]
    fn test_location_label_empty() {
        assert_eq!(location_label(&[], 0.2), UNKNOWN_LOCATION);
    }

    #[test]
    fn test_rank_keeps_five_closest_sorted() {
        let origin = Coordinate::new(0.0, 0.0);
        let raw = elements(json!({
            "elements": [
                node("g", 0.0, 0.0070),
                node("a", 0.0, 0.0010),
                node("e", 0.0, 0.0050),
                node("c", 0.0, 0.0030),
                node("f", 0.0, 0.0060),
                node("b", 0.0, 0.0020),
                node("d", 0.0, 0.0040),
            ]
        }));
        let ranked = rank_elements(raw, &origin, 5);
        let names: Vec<&str> = ranked.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c", "d", "e"]);
        assert!(ranked.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[test]
    fn test_rank_uses_center_for_ways() {
        let origin = Coordinate::new(48.8566, 2.3522);
        let raw = elements(json!({
            "elements": [{
                "type": "way",
                "center": {"lat": 48.8566, "lon": 2.3522},
                "tags": {"name": "Library", "addr:city": "Paris", "addr:country": "FR"}
            }]
        }));
        let ranked = rank_elements(raw, &origin, 5);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].label(), "Library (Paris, FR)");
        assert!(ranked[0].distance < 1e-9);
    }

    #[test]
    fn test_rank_defaults_missing_tags_and_skips_unlocated() {
        let origin = Coordinate::new(0.0, 0.0);
        let raw = elements(json!({
            "elements": [
                {"type": "node", "lat": 0.0, "lon": 0.0001},
                {"type": "relation", "tags": {"name": "Nowhere"}}
            ]
        }));
        let ranked = rank_elements(raw, &origin, 5);
        assert_eq!(ranked, vec![poi("Unknown", "", "", ranked[0].distance)]);
    }

    #[test]
    fn test_build_query_contains_filters() {
        let q = build_query(&Coordinate::new(48.8566, 2.3522), 500, 25);
        assert!(q.starts_with("[out:json][timeout:25];"));
        assert!(q.contains("nwr(around:500,48.8566,2.3522)"));
        assert!(q.contains(r#"["amenity"!~"^(parking.*|waste.*|bench|"#));
        assert!(q.contains(r#"["access"!~"^(private|no|permit|delivery|agricultural|forestry)$"]"#));
        assert!(q.trim_end().ends_with("out center;"));
    }

    #[tokio::test]
    async fn test_nearby_queries_and_ranks() {
        let router = Router::new().route(
            "/api/interpreter",
            post(|body: String| async move {
                assert!(body.contains("nwr(around:500,"));
                Json(json!({
                    "elements": [
                        node("Bakery", 48.8600, 2.3522),
                        node("Cafe", 48.8567, 2.3522),
                    ]
                }))
            }),
        );
        let url = mock_overpass(router).await;
        let client = OverpassClient::new(&test_config(url)).unwrap();

        let pois = client.nearby(&Coordinate::new(48.8566, 2.3522)).await.unwrap();
        assert_eq!(pois.len(), 2);
        assert_eq!(pois[0].name, "Cafe");
        assert_eq!(pois[1].name, "Bakery");
    }

    #[tokio::test]
    async fn test_default_client_has_no_deadline_and_still_queries() {
        let router = Router::new().route(
            "/api/interpreter",
            post(|| async { Json(json!({"elements": []})) }),
        );
        let url = mock_overpass(router).await;
        let config = OverpassConfig {
            url,
            system_proxy: false,
            ..OverpassConfig::default()
        };
        assert!(config.connect_timeout_secs.is_none());
        assert!(config.request_timeout_secs.is_none());

        let client = OverpassClient::new(&config).unwrap();
        let pois = client.nearby(&Coordinate::new(0.0, 0.0)).await.unwrap();
        assert!(pois.is_empty());
    }

    #[tokio::test]
    async fn test_nearby_non_json_is_decode_error() {
        let router = Router::new().route("/api/interpreter", post(|| async { "<html>busy</html>" }));
        let url = mock_overpass(router).await;
        let client = OverpassClient::new(&test_config(url)).unwrap();

        let err = client.nearby(&Coordinate::new(0.0, 0.0)).await.unwrap_err();
        assert!(matches!(err, OverpassError::Decode(_)), "{err}");
    }

    #[tokio::test]
    async fn test_nearby_rate_limited_is_status_error() {
        let router = Router::new().route(
            "/api/interpreter",
            post(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }),
        );
        let url = mock_overpass(router).await;
        let client = OverpassClient::new(&test_config(url)).unwrap();

        let err = client.nearby(&Coordinate::new(0.0, 0.0)).await.unwrap_err();
        assert!(matches!(err, OverpassError::Status(429)), "{err}");
    }

    #[tokio::test]
    async fn test_nearby_unreachable_is_request_error() {
        // Bind then drop to get a port nothing listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let client = OverpassClient::new(&test_config(format!("http://{addr}/"))).unwrap();

        let err = client.nearby(&Coordinate::new(0.0, 0.0)).await.unwrap_err();
        assert!(matches!(err, OverpassError::Request(_)), "{err}");
    }
}
