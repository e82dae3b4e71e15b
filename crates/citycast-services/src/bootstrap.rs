//! First-run seeding from the device position.

use citycast_core::{CityError, GeolocationConfig};
use citycast_weather::{locate_with_timeout, Geocoder, Geolocator, NewLocation, TrackedLocation};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::cards::CardController;
use crate::directory::LocationDirectory;

/// What startup did before rendering.
#[derive(Debug, Clone, PartialEq)]
pub enum BootstrapOutcome {
    /// Saved cities exist or geolocation is off.
    Skipped,
    /// The current position was added as the first city.
    Seeded(TrackedLocation),
    /// Geolocation was attempted and failed; the reason is for logs only.
    FellBack(String),
}

pub struct Bootstrap {
    geolocator: Arc<dyn Geolocator>,
    geocoder: Arc<dyn Geocoder>,
    timeout: Duration,
    enabled: bool,
}

impl Bootstrap {
    pub fn new(
        geolocator: Arc<dyn Geolocator>,
        geocoder: Arc<dyn Geocoder>,
        config: &GeolocationConfig,
    ) -> Self {
        Self {
            geolocator,
            geocoder,
            timeout: Duration::from_secs(config.timeout_secs),
            enabled: config.enabled,
        }
    }

    /// Seed the list if it is empty, then render every card.
    pub async fn run(
        &self,
        directory: &LocationDirectory,
        cards: &Arc<CardController>,
    ) -> (BootstrapOutcome, Vec<JoinHandle<()>>) {
        let outcome = if !self.enabled || !directory.is_empty() {
            BootstrapOutcome::Skipped
        } else {
            match self.seed(directory).await {
                Ok(location) => {
                    tracing::info!("Seeded current location: {}", location.display_name);
                    BootstrapOutcome::Seeded(location)
                }
                Err(e) => {
                    tracing::info!("{} ({})", e.user_message(), e);
                    BootstrapOutcome::FellBack(e.to_string())
                }
            }
        };

        (outcome, cards.render_all())
    }

    async fn seed(&self, directory: &LocationDirectory) -> Result<TrackedLocation, CityError> {
        let position = locate_with_timeout(self.geolocator.as_ref(), self.timeout).await?;

        let label = self.geocoder.reverse_resolve(position).await;
        let name = label
            .split(',')
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(&label)
            .to_string();

        directory
            .add(NewLocation {
                name,
                display_name: label,
                coordinates: Some(position),
                is_geo: true,
            })
            .map_err(CityError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use citycast_weather::{
        Candidate, Coordinates, ForecastError, ForecastSource, ForecastSummary, GeocodeError,
        GeolocationError, StaticGeolocator, FALLBACK_LABEL,
    };

    struct ReverseOnly(Option<&'static str>);

    #[async_trait]
    impl Geocoder for ReverseOnly {
        async fn suggest(&self, _query: &str, _limit: usize) -> Vec<Candidate> {
            Vec::new()
        }

        async fn resolve_best(&self, query: &str) -> Result<Candidate, GeocodeError> {
            Err(GeocodeError::NotFound(query.to_string()))
        }

        async fn reverse_resolve(&self, _coordinates: Coordinates) -> String {
            self.0.unwrap_or(FALLBACK_LABEL).to_string()
        }
    }

    struct NoForecast;

    #[async_trait]
    impl ForecastSource for NoForecast {
        async fn fetch(&self, _coordinates: Coordinates) -> Result<ForecastSummary, ForecastError> {
            Err(ForecastError::Unavailable("offline".into()))
        }
    }

    struct Denied;

    #[async_trait]
    impl Geolocator for Denied {
        async fn current_position(&self) -> Result<Coordinates, GeolocationError> {
            Err(GeolocationError::PermissionDenied)
        }
    }

    fn setup(
        label: Option<&'static str>,
    ) -> (Arc<dyn Geocoder>, Arc<LocationDirectory>, Arc<CardController>) {
        let geocoder: Arc<dyn Geocoder> = Arc::new(ReverseOnly(label));
        let directory = Arc::new(LocationDirectory::load(Arc::new(MemoryStore::new()), "cities"));
        let cards = Arc::new(CardController::new(
            directory.clone(),
            geocoder.clone(),
            Arc::new(NoForecast),
        ));
        (geocoder, directory, cards)
    }

    fn paris() -> Arc<dyn Geolocator> {
        Arc::new(StaticGeolocator::new(Some(Coordinates::new(48.85, 2.35))))
    }

    #[tokio::test]
    async fn test_seeds_from_position() {
        let (geocoder, directory, cards) = setup(Some("Paris, France"));
        let bootstrap = Bootstrap::new(paris(), geocoder, &GeolocationConfig::default());

        let (outcome, loads) = bootstrap.run(&directory, &cards).await;
        let BootstrapOutcome::Seeded(seeded) = outcome else {
            unreachable!("expected a seeded location");
        };
        assert_eq!(seeded.name, "Paris");
        assert_eq!(seeded.display_name, "Paris, France");
        assert!(seeded.is_geo);
        assert_eq!(loads.len(), 1);
        assert_eq!(directory.len(), 1);
    }

    #[tokio::test]
    async fn test_reverse_failure_uses_fallback_label() {
        let (geocoder, directory, cards) = setup(None);
        let bootstrap = Bootstrap::new(paris(), geocoder, &GeolocationConfig::default());

        let (outcome, _) = bootstrap.run(&directory, &cards).await;
        assert!(matches!(
            outcome,
            BootstrapOutcome::Seeded(ref l) if l.display_name == FALLBACK_LABEL
        ));
    }

    #[tokio::test]
    async fn test_denied_falls_back_to_empty_render() {
        let (geocoder, directory, cards) = setup(Some("Paris, France"));
        let mut events = cards.subscribe();
        let bootstrap = Bootstrap::new(Arc::new(Denied), geocoder, &GeolocationConfig::default());

        let (outcome, loads) = bootstrap.run(&directory, &cards).await;
        assert_eq!(
            outcome,
            BootstrapOutcome::FellBack("Geolocation failed: Location permission denied".into())
        );
        assert!(loads.is_empty());
        assert!(matches!(events.try_recv(), Ok(crate::cards::CardEvent::Empty { .. })));
    }

    #[tokio::test]
    async fn test_skipped_when_cities_saved() {
        let (geocoder, directory, cards) = setup(Some("Paris, France"));
        directory
            .add(NewLocation {
                name: "Oslo".into(),
                display_name: "Oslo, Norway".into(),
                coordinates: Some(Coordinates::new(59.91, 10.75)),
                is_geo: false,
            })
            .unwrap();
        let bootstrap = Bootstrap::new(paris(), geocoder, &GeolocationConfig::default());

        let (outcome, loads) = bootstrap.run(&directory, &cards).await;
        assert_eq!(outcome, BootstrapOutcome::Skipped);
        assert_eq!(loads.len(), 1);
        assert_eq!(directory.len(), 1);
    }

    #[tokio::test]
    async fn test_skipped_when_disabled() {
        let (geocoder, directory, cards) = setup(Some("Paris, France"));
        let config = GeolocationConfig {
            enabled: false,
            ..GeolocationConfig::default()
        };
        let bootstrap = Bootstrap::new(paris(), geocoder, &config);

        let (outcome, _) = bootstrap.run(&directory, &cards).await;
        assert_eq!(outcome, BootstrapOutcome::Skipped);
        assert!(directory.is_empty());
    }
}
