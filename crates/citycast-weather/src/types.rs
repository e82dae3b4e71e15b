use chrono::NaiveDate;
use citycast_core::ReqwestErrorExt;
use serde::{Deserialize, Serialize};

/// Two positions closer than this on both axes are the same place.
pub const COORDINATE_TOLERANCE: f64 = 1e-6;

/// Geographic position in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Per-axis tolerance box check, not a geodesic distance.
    pub fn is_near(&self, other: &Coordinates) -> bool {
        (self.latitude - other.latitude).abs() < COORDINATE_TOLERANCE
            && (self.longitude - other.longitude).abs() < COORDINATE_TOLERANCE
    }
}

/// Join a place name with its region and country, skipping blank parts.
pub fn compose_display_name(name: &str, admin1: Option<&str>, country: Option<&str>) -> String {
    let mut display = name.to_string();
    for part in [admin1, country].into_iter().flatten() {
        if !part.is_empty() {
            display.push_str(", ");
            display.push_str(part);
        }
    }
    display
}

/// One geocoding match offered as a suggestion.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub name: String,
    pub admin1: Option<String>,
    pub country: Option<String>,
    pub coordinates: Coordinates,
    pub display: String,
}

impl Candidate {
    pub fn new(
        name: impl Into<String>,
        admin1: Option<String>,
        country: Option<String>,
        coordinates: Coordinates,
    ) -> Self {
        let name = name.into();
        let display = compose_display_name(&name, admin1.as_deref(), country.as_deref());
        Self {
            name,
            admin1,
            country,
            coordinates,
            display,
        }
    }
}

/// A location about to be added to the city list (no id yet).
#[derive(Debug, Clone, PartialEq)]
pub struct NewLocation {
    pub name: String,
    pub display_name: String,
    pub coordinates: Option<Coordinates>,
    pub is_geo: bool,
}

impl From<&Candidate> for NewLocation {
    fn from(candidate: &Candidate) -> Self {
        Self {
            name: candidate.name.clone(),
            display_name: candidate.display.clone(),
            coordinates: Some(candidate.coordinates),
            is_geo: false,
        }
    }
}

/// A city on the list. Serialized in the saved-list format:
/// `{"id", "name", "displayName", "lat", "lon", "isGeo"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredLocation", into = "StoredLocation")]
pub struct TrackedLocation {
    pub id: String,
    pub name: String,
    pub display_name: String,
    pub coordinates: Option<Coordinates>,
    pub is_geo: bool,
}

impl TrackedLocation {
    pub fn from_new(id: String, location: NewLocation) -> Self {
        Self {
            id,
            name: location.name,
            display_name: location.display_name,
            coordinates: location.coordinates,
            is_geo: location.is_geo,
        }
    }

    /// Title shown on the card.
    pub fn label(&self) -> &str {
        if self.display_name.is_empty() {
            &self.name
        } else {
            &self.display_name
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredLocation {
    id: String,
    name: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
    #[serde(default)]
    is_geo: bool,
}

impl From<StoredLocation> for TrackedLocation {
    fn from(stored: StoredLocation) -> Self {
        let display_name = stored.display_name.unwrap_or_else(|| stored.name.clone());
        Self {
            id: stored.id,
            name: stored.name,
            display_name,
            coordinates: stored.lat.zip(stored.lon).map(|(lat, lon)| Coordinates::new(lat, lon)),
            is_geo: stored.is_geo,
        }
    }
}

impl From<TrackedLocation> for StoredLocation {
    fn from(location: TrackedLocation) -> Self {
        Self {
            id: location.id,
            name: location.name,
            display_name: Some(location.display_name),
            lat: location.coordinates.map(|c| c.latitude),
            lon: location.coordinates.map(|c| c.longitude),
            is_geo: location.is_geo,
        }
    }
}

/// One day row of a forecast card
#[derive(Debug, Clone, PartialEq)]
pub struct DayForecast {
    pub date: NaiveDate,
    pub date_label: String,
    pub min_temp: i32,
    pub max_temp: i32,
    pub weather_code: Option<i32>,
    pub description: String,
}

impl DayForecast {
    pub fn line(&self) -> String {
        format!(
            "{}: {}°C — {}°C, {}",
            self.date_label, self.min_temp, self.max_temp, self.description
        )
    }
}

/// Short-range daily forecast for one location. Never persisted.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ForecastSummary {
    pub days: Vec<DayForecast>,
}

impl ForecastSummary {
    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Rendered day rows, one per available day.
    pub fn lines(&self) -> Vec<String> {
        self.days.iter().map(DayForecast::line).collect()
    }
}

/// Round to whole degrees, halves toward positive infinity (-2.5 -> -2).
pub fn round_temperature(value: f64) -> i32 {
    (value + 0.5).floor() as i32
}

/// Device position errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeolocationError {
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Location request timed out")]
    Timeout,
    #[error("Location service unsupported")]
    Unsupported,
    #[error("Location error: {0}")]
    Other(String),
}

/// Geocoding errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeocodeError {
    #[error("No match for \"{0}\"")]
    NotFound(String),
    #[error("Geocoding request failed: {0}")]
    ResolutionFailed(String),
}

/// Forecast errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ForecastError {
    #[error("{0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for ForecastError {
    fn from(e: reqwest::Error) -> Self {
        ForecastError::Unavailable(e.into_network_error().to_string())
    }
}
