//! Device position capability.

use async_trait::async_trait;
use citycast_core::GeolocationConfig;
use std::time::Duration;

use crate::types::{Coordinates, GeolocationError};

/// One-shot current-position query.
#[async_trait]
pub trait Geolocator: Send + Sync {
    async fn current_position(&self) -> Result<Coordinates, GeolocationError>;
}

/// Position taken from configuration. Reports `Unsupported` when none is set.
#[derive(Debug, Clone, Default)]
pub struct StaticGeolocator {
    position: Option<Coordinates>,
}

impl StaticGeolocator {
    pub fn new(position: Option<Coordinates>) -> Self {
        Self { position }
    }

    pub fn from_config(config: &GeolocationConfig) -> Self {
        let position = config
            .latitude
            .zip(config.longitude)
            .map(|(lat, lon)| Coordinates::new(lat, lon));
        Self { position }
    }
}

#[async_trait]
impl Geolocator for StaticGeolocator {
    async fn current_position(&self) -> Result<Coordinates, GeolocationError> {
        self.position.ok_or(GeolocationError::Unsupported)
    }
}

/// Query the position, giving up after `timeout`.
pub async fn locate_with_timeout(
    geolocator: &dyn Geolocator,
    timeout: Duration,
) -> Result<Coordinates, GeolocationError> {
    match tokio::time::timeout(timeout, geolocator.current_position()).await {
        Ok(result) => result,
        Err(_) => {
            tracing::debug!("Geolocation timed out after {:?}", timeout);
            Err(GeolocationError::Timeout)
        }
    }
}
