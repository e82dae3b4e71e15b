//! Weather data for CityCast
//!
//! Geocoding (search, best match, reverse) and daily forecasts via the
//! Open-Meteo APIs, plus the device position capability.

pub mod error_mapping;
pub mod geocode;
pub mod labels;
pub mod location;
pub mod provider;
pub mod types;

pub use geocode::{Geocoder, GeocodingClient, FALLBACK_LABEL};
pub use labels::{EnglishLabels, LabelTable};
pub use location::{locate_with_timeout, Geolocator, StaticGeolocator};
pub use provider::{ForecastClient, ForecastSource, FORECAST_DAYS};
pub use types::*;
