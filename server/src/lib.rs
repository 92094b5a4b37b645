#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::unused_async)]

//! lastseen library — the building blocks behind the `lastseen` binary.
//!
//! - `geo` — Haversine distance and hidden-zone classification
//! - `poi` — Overpass lookup, POI ranking and the location label policy
//! - `store` — last-known location/battery key-value state
//! - `config` — configuration loading
//! - `auth` — optional bearer-token middleware
//! - `routes` — HTTP handlers and router assembly

pub mod auth;
pub mod config;
pub mod geo;
pub mod poi;
pub mod routes;
pub mod state;
pub mod store;

// Re-export key types at crate root for convenience.
pub use config::Config;
pub use geo::{distance_km, find_hidden_zone, Coordinate, HiddenZone};
pub use poi::{OverpassClient, Poi};
pub use state::AppState;
pub use store::LocationStore;
