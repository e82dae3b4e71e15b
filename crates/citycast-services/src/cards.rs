//! Forecast cards: one per tracked location, each with its own
//! load/refresh cycle. A failing card never blocks or alters its siblings.

use citycast_core::{CardPhase, CityError};
use citycast_weather::{ForecastSource, ForecastSummary, GeocodeError, Geocoder, TrackedLocation};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::directory::LocationDirectory;

/// Shown when there is nothing to display.
pub const EMPTY_MESSAGE: &str = "No saved cities. Allow location access or add a city manually.";

/// What a card currently displays
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CardState {
    #[default]
    Idle,
    Loading,
    Loaded(ForecastSummary),
    Failed(String),
}

impl CardState {
    pub fn phase(&self) -> CardPhase {
        match self {
            CardState::Idle => CardPhase::Idle,
            CardState::Loading => CardPhase::Loading,
            CardState::Loaded(_) => CardPhase::Loaded,
            CardState::Failed(_) => CardPhase::Failed,
        }
    }
}

/// Change notifications for the rendering layer
#[derive(Debug, Clone, PartialEq)]
pub enum CardEvent {
    StateChanged { id: String, state: CardState },
    Removed { id: String },
    Empty { message: String },
}

#[derive(Debug, Clone)]
pub struct CardSnapshot {
    pub location: TrackedLocation,
    pub state: CardState,
}

/// Outcome counts of a bulk refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RefreshReport {
    pub loaded: usize,
    pub failed: usize,
}

struct Card {
    id: String,
    state: CardState,
    /// Ticket of the load allowed to settle this card.
    ticket: u64,
}

#[derive(Default)]
struct CardTable {
    cards: Vec<Card>,
    next_ticket: u64,
}

pub struct CardController {
    directory: Arc<LocationDirectory>,
    geocoder: Arc<dyn Geocoder>,
    forecasts: Arc<dyn ForecastSource>,
    table: Mutex<CardTable>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<CardEvent>>>,
}

impl CardController {
    pub fn new(
        directory: Arc<LocationDirectory>,
        geocoder: Arc<dyn Geocoder>,
        forecasts: Arc<dyn ForecastSource>,
    ) -> Self {
        Self {
            directory,
            geocoder,
            forecasts,
            table: Mutex::new(CardTable::default()),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Receive every card change from now on.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<CardEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    fn notify(&self, event: CardEvent) {
        self.subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Rebuild the display from the directory and start loading every card.
    pub fn render_all(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        let locations = self.directory.all();
        {
            let mut table = self.table.lock();
            table.cards = locations
                .iter()
                .map(|l| Card {
                    id: l.id.clone(),
                    state: CardState::Idle,
                    ticket: 0,
                })
                .collect();
        }

        if locations.is_empty() {
            self.notify(CardEvent::Empty {
                message: EMPTY_MESSAGE.to_string(),
            });
            return Vec::new();
        }

        locations
            .iter()
            .filter_map(|l| self.spawn_load(&l.id))
            .collect()
    }

    /// Enter `Loading` synchronously, then finish the load on a spawned task.
    pub fn spawn_load(self: &Arc<Self>, id: &str) -> Option<JoinHandle<()>> {
        let (location, ticket) = self.begin(id)?;
        let this = Arc::clone(self);
        Some(tokio::spawn(async move {
            let state = this.run(&location).await;
            this.settle(&location.id, ticket, state);
        }))
    }

    /// Run one full load cycle. Returns the settled state, or `None` if the
    /// card is unknown, was removed, or was superseded by a newer load.
    pub async fn load(&self, id: &str) -> Option<CardState> {
        let (location, ticket) = self.begin(id)?;
        let state = self.run(&location).await;
        self.settle(id, ticket, state)
    }

    /// Refresh every displayed card one after another.
    pub async fn refresh_all(&self) -> RefreshReport {
        let ids: Vec<String> = self.table.lock().cards.iter().map(|c| c.id.clone()).collect();

        let mut report = RefreshReport::default();
        for id in ids {
            match self.load(&id).await {
                Some(CardState::Loaded(_)) => report.loaded += 1,
                Some(CardState::Failed(_)) => report.failed += 1,
                _ => {}
            }
        }
        tracing::info!(
            "Refreshed cards: {} loaded, {} failed",
            report.loaded,
            report.failed
        );
        report
    }

    /// Drop a location from the directory and the display, whatever its state.
    pub fn remove(&self, id: &str) -> Option<TrackedLocation> {
        let removed = self.directory.remove(id);
        let displayed = {
            let mut table = self.table.lock();
            let before = table.cards.len();
            table.cards.retain(|c| c.id != id);
            table.cards.len() != before
        };

        if removed.is_some() || displayed {
            self.notify(CardEvent::Removed { id: id.to_string() });
            if self.directory.is_empty() {
                self.notify(CardEvent::Empty {
                    message: EMPTY_MESSAGE.to_string(),
                });
            }
        }
        removed
    }

    pub fn state(&self, id: &str) -> Option<CardState> {
        self.table
            .lock()
            .cards
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.state.clone())
    }

    pub fn is_displayed(&self, id: &str) -> bool {
        self.table.lock().cards.iter().any(|c| c.id == id)
    }

    /// Displayed cards in order.
    pub fn cards(&self) -> Vec<CardSnapshot> {
        let states: Vec<(String, CardState)> = self
            .table
            .lock()
            .cards
            .iter()
            .map(|c| (c.id.clone(), c.state.clone()))
            .collect();

        states
            .into_iter()
            .filter_map(|(id, state)| {
                self.directory
                    .get(&id)
                    .map(|location| CardSnapshot { location, state })
            })
            .collect()
    }

    /// Mark the card as loading and hand out a ticket for this load.
    fn begin(&self, id: &str) -> Option<(TrackedLocation, u64)> {
        let location = self.directory.get(id)?;

        let mut table = self.table.lock();
        table.next_ticket += 1;
        let ticket = table.next_ticket;

        match table.cards.iter_mut().find(|c| c.id == id) {
            Some(card) => {
                card.state = CardState::Loading;
                card.ticket = ticket;
            }
            None => table.cards.push(Card {
                id: id.to_string(),
                state: CardState::Loading,
                ticket,
            }),
        }

        self.notify(CardEvent::StateChanged {
            id: id.to_string(),
            state: CardState::Loading,
        });
        Some((location, ticket))
    }

    async fn run(&self, location: &TrackedLocation) -> CardState {
        let coordinates = match location.coordinates {
            Some(coordinates) => coordinates,
            None if location.is_geo => {
                return CardState::Failed(failure_text(CityError::ForecastUnavailable(
                    "no coordinates for current location".to_string(),
                )));
            }
            None => match self.geocoder.resolve_best(&location.name).await {
                Ok(best) => {
                    self.directory
                        .update_coordinates(&location.id, best.coordinates);
                    best.coordinates
                }
                Err(e @ GeocodeError::NotFound(_)) => {
                    return CardState::Failed(CityError::from(e).user_message().to_string());
                }
                Err(e) => return CardState::Failed(failure_text(e.into())),
            },
        };

        match self.forecasts.fetch(coordinates).await {
            Ok(summary) => CardState::Loaded(summary),
            Err(e) => {
                tracing::debug!("Forecast for {} failed: {}", location.label(), e);
                CardState::Failed(failure_text(e.into()))
            }
        }
    }

    fn settle(&self, id: &str, ticket: u64, state: CardState) -> Option<CardState> {
        let mut table = self.table.lock();
        let card = table.cards.iter_mut().find(|c| c.id == id)?;
        if card.ticket != ticket {
            tracing::debug!("Discarding superseded load for {}", id);
            return None;
        }

        let success = matches!(state, CardState::Loaded(_));
        card.state.phase().settle(success)?;
        card.state = state.clone();

        self.notify(CardEvent::StateChanged {
            id: id.to_string(),
            state: state.clone(),
        });
        Some(state)
    }
}

fn failure_text(error: CityError) -> String {
    format!("Failed to load: {}", error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use citycast_weather::{
        Candidate, Coordinates, DayForecast, ForecastError, NewLocation,
    };
    use parking_lot::Mutex as PlMutex;

    /// Resolves "Lima" only; counts calls.
    #[derive(Default)]
    struct FakeGeocoder {
        calls: PlMutex<Vec<String>>,
    }

    #[async_trait]
    impl Geocoder for FakeGeocoder {
        async fn suggest(&self, _query: &str, _limit: usize) -> Vec<Candidate> {
            Vec::new()
        }

        async fn resolve_best(&self, query: &str) -> Result<Candidate, GeocodeError> {
            self.calls.lock().push(query.to_string());
            match query {
                "Lima" => Ok(Candidate::new(
                    "Lima",
                    None,
                    Some("Peru".into()),
                    Coordinates::new(-12.05, -77.04),
                )),
                "Offline" => Err(GeocodeError::ResolutionFailed("connection reset".into())),
                other => Err(GeocodeError::NotFound(other.to_string())),
            }
        }

        async fn reverse_resolve(&self, _coordinates: Coordinates) -> String {
            citycast_weather::FALLBACK_LABEL.to_string()
        }
    }

    /// Fails for latitudes listed in `failing`.
    #[derive(Default)]
    struct FakeForecasts {
        failing: Vec<f64>,
        calls: PlMutex<usize>,
    }

    fn one_day() -> ForecastSummary {
        ForecastSummary {
            days: vec![DayForecast {
                date: chrono_date(),
                date_label: "Today (16 October)".into(),
                min_temp: 1,
                max_temp: 9,
                weather_code: Some(0),
                description: "Clear".into(),
            }],
        }
    }

    fn chrono_date() -> chrono::NaiveDate {
        chrono::NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    #[async_trait]
    impl ForecastSource for FakeForecasts {
        async fn fetch(&self, coordinates: Coordinates) -> Result<ForecastSummary, ForecastError> {
            *self.calls.lock() += 1;
            if self.failing.contains(&coordinates.latitude) {
                Err(ForecastError::Unavailable("HTTP 500".into()))
            } else {
                Ok(one_day())
            }
        }
    }

    fn located(name: &str, lat: f64) -> NewLocation {
        NewLocation {
            name: name.into(),
            display_name: name.into(),
            coordinates: Some(Coordinates::new(lat, 0.0)),
            is_geo: false,
        }
    }

    fn unresolved(name: &str) -> NewLocation {
        NewLocation {
            name: name.into(),
            display_name: name.into(),
            coordinates: None,
            is_geo: false,
        }
    }

    struct Fixture {
        directory: Arc<LocationDirectory>,
        geocoder: Arc<FakeGeocoder>,
        forecasts: Arc<FakeForecasts>,
        cards: Arc<CardController>,
    }

    fn fixture(failing: Vec<f64>) -> Fixture {
        let directory = Arc::new(LocationDirectory::load(Arc::new(MemoryStore::new()), "cities"));
        let geocoder = Arc::new(FakeGeocoder::default());
        let forecasts = Arc::new(FakeForecasts {
            failing,
            ..FakeForecasts::default()
        });
        let cards = Arc::new(CardController::new(
            directory.clone(),
            geocoder.clone(),
            forecasts.clone(),
        ));
        Fixture {
            directory,
            geocoder,
            forecasts,
            cards,
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<CardEvent>) -> Vec<CardEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_load_passes_through_loading() {
        let f = fixture(vec![]);
        let berlin = f.directory.add(located("Berlin", 52.52)).unwrap();
        let mut rx = f.cards.subscribe();

        let state = f.cards.load(&berlin.id).await;
        assert_eq!(state, Some(CardState::Loaded(one_day())));

        let events = drain(&mut rx);
        assert_eq!(
            events,
            vec![
                CardEvent::StateChanged {
                    id: berlin.id.clone(),
                    state: CardState::Loading
                },
                CardEvent::StateChanged {
                    id: berlin.id.clone(),
                    state: CardState::Loaded(one_day())
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_spawn_load_shows_loading_before_any_await() {
        let f = fixture(vec![]);
        let berlin = f.directory.add(located("Berlin", 52.52)).unwrap();

        let handle = f.cards.spawn_load(&berlin.id).unwrap();
        assert_eq!(f.cards.state(&berlin.id), Some(CardState::Loading));

        handle.await.unwrap();
        assert!(matches!(f.cards.state(&berlin.id), Some(CardState::Loaded(_))));
    }

    #[tokio::test]
    async fn test_missing_coordinates_resolved_and_persisted() {
        let f = fixture(vec![]);
        let lima = f.directory.add(unresolved("Lima")).unwrap();

        let state = f.cards.load(&lima.id).await;
        assert!(matches!(state, Some(CardState::Loaded(_))));
        assert_eq!(
            f.directory.get(&lima.id).and_then(|l| l.coordinates),
            Some(Coordinates::new(-12.05, -77.04))
        );

        f.cards.load(&lima.id).await;
        assert_eq!(f.geocoder.calls.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_name_fails_without_fetch() {
        let f = fixture(vec![]);
        let atlantis = f.directory.add(unresolved("Atlantis")).unwrap();

        let state = f.cards.load(&atlantis.id).await;
        assert_eq!(state, Some(CardState::Failed("Location not found.".into())));
        assert_eq!(*f.forecasts.calls.lock(), 0);
    }

    #[tokio::test]
    async fn test_geocoding_transport_error_fails_card() {
        let f = fixture(vec![]);
        let offline = f.directory.add(unresolved("Offline")).unwrap();

        let state = f.cards.load(&offline.id).await;
        assert!(
            matches!(state, Some(CardState::Failed(ref r)) if r.contains("connection reset")),
            "unexpected state: {:?}",
            state
        );
    }

    #[tokio::test]
    async fn test_geo_entry_without_coordinates_fails() {
        let f = fixture(vec![]);
        let mut geo = unresolved("geo");
        geo.is_geo = true;
        let geo = f.directory.add(geo).unwrap();

        let state = f.cards.load(&geo.id).await;
        assert!(matches!(state, Some(CardState::Failed(_))));
        assert!(f.geocoder.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_all_isolates_failures() {
        let f = fixture(vec![2.0]);
        let a = f.directory.add(located("A", 1.0)).unwrap();
        let b = f.directory.add(located("B", 2.0)).unwrap();
        let c = f.directory.add(located("C", 3.0)).unwrap();
        for handle in f.cards.render_all() {
            handle.await.unwrap();
        }

        let report = f.cards.refresh_all().await;
        assert_eq!(report, RefreshReport { loaded: 2, failed: 1 });

        assert!(matches!(f.cards.state(&a.id), Some(CardState::Loaded(_))));
        assert!(matches!(f.cards.state(&b.id), Some(CardState::Failed(ref r)) if r.contains("HTTP 500")));
        assert!(matches!(f.cards.state(&c.id), Some(CardState::Loaded(_))));
    }

    #[tokio::test]
    async fn test_render_all_empty_emits_message() {
        let f = fixture(vec![]);
        let mut rx = f.cards.subscribe();

        assert!(f.cards.render_all().is_empty());
        assert_eq!(
            drain(&mut rx),
            vec![CardEvent::Empty {
                message: EMPTY_MESSAGE.to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_render_all_keeps_directory_order() {
        let f = fixture(vec![]);
        f.directory.add(located("First", 1.0)).unwrap();
        f.directory.add(located("Second", 2.0)).unwrap();

        for handle in f.cards.render_all() {
            handle.await.unwrap();
        }
        let names: Vec<_> = f.cards.cards().into_iter().map(|c| c.location.name).collect();
        assert_eq!(names, vec!["First", "Second"]);
    }

    #[tokio::test]
    async fn test_remove_drops_card_and_discards_in_flight_result() {
        let f = fixture(vec![]);
        let berlin = f.directory.add(located("Berlin", 52.52)).unwrap();
        let mut rx = f.cards.subscribe();

        let handle = f.cards.spawn_load(&berlin.id).unwrap();
        assert!(f.cards.remove(&berlin.id).is_some());
        handle.await.unwrap();

        assert!(!f.cards.is_displayed(&berlin.id));
        assert!(f.directory.is_empty());
        let events = drain(&mut rx);
        assert!(events.contains(&CardEvent::Removed {
            id: berlin.id.clone()
        }));
        assert!(!events
            .iter()
            .any(|e| matches!(e, CardEvent::StateChanged { state: CardState::Loaded(_), .. })));
    }

    #[tokio::test]
    async fn test_removing_last_card_shows_empty_state() {
        let f = fixture(vec![]);
        let berlin = f.directory.add(located("Berlin", 52.52)).unwrap();
        let oslo = f.directory.add(located("Oslo", 59.91)).unwrap();
        for handle in f.cards.render_all() {
            handle.await.unwrap();
        }
        let mut rx = f.cards.subscribe();

        f.cards.remove(&berlin.id);
        assert_eq!(
            drain(&mut rx),
            vec![CardEvent::Removed {
                id: berlin.id.clone()
            }]
        );

        f.cards.remove(&oslo.id);
        assert_eq!(
            drain(&mut rx),
            vec![
                CardEvent::Removed {
                    id: oslo.id.clone()
                },
                CardEvent::Empty {
                    message: EMPTY_MESSAGE.to_string()
                },
            ]
        );
        assert!(f.cards.cards().is_empty());
    }

    #[tokio::test]
    async fn test_remove_unknown_is_noop() {
        let f = fixture(vec![]);
        f.directory.add(located("Berlin", 52.52)).unwrap();
        let mut rx = f.cards.subscribe();

        assert!(f.cards.remove("missing").is_none());
        assert_eq!(f.directory.len(), 1);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_superseded_load_is_discarded() {
        let f = fixture(vec![]);
        let berlin = f.directory.add(located("Berlin", 52.52)).unwrap();

        let (location, old_ticket) = f.cards.begin(&berlin.id).unwrap();
        let (_, _new_ticket) = f.cards.begin(&berlin.id).unwrap();

        let stale = f.cards.run(&location).await;
        assert_eq!(f.cards.settle(&berlin.id, old_ticket, stale), None);
        assert_eq!(f.cards.state(&berlin.id), Some(CardState::Loading));
    }
}
