//! The application object: everything the UI layer talks to.

use anyhow::{Context, Result};
use citycast_core::Config;
use citycast_weather::{
    EnglishLabels, ForecastClient, ForecastSource, Geocoder, GeocodingClient, Geolocator,
    StaticGeolocator, TrackedLocation,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::autocomplete::{AddCityError, AutocompleteSession};
use crate::bootstrap::{Bootstrap, BootstrapOutcome};
use crate::cards::{CardController, CardEvent, CardSnapshot, RefreshReport};
use crate::directory::LocationDirectory;
use crate::storage::{KeyValueStore, SqliteStore};

pub struct Board {
    directory: Arc<LocationDirectory>,
    cards: Arc<CardController>,
    search: AutocompleteSession,
    bootstrap: Bootstrap,
}

impl Board {
    pub fn new(
        config: &Config,
        store: Arc<dyn KeyValueStore>,
        geocoder: Arc<dyn Geocoder>,
        forecasts: Arc<dyn ForecastSource>,
        geolocator: Arc<dyn Geolocator>,
    ) -> Self {
        let directory = Arc::new(LocationDirectory::load(store, config.storage.key.clone()));
        let cards = Arc::new(CardController::new(
            directory.clone(),
            geocoder.clone(),
            forecasts,
        ));
        let search = AutocompleteSession::new(geocoder.clone(), &config.autocomplete);
        let bootstrap = Bootstrap::new(geolocator, geocoder, &config.geolocation);

        Self {
            directory,
            cards,
            search,
            bootstrap,
        }
    }

    /// Wire up the HTTP clients and SQLite storage described by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = SqliteStore::open(&config.database_path())?;
        let geocoder = GeocodingClient::new(&config.services, config.autocomplete.resolve_limit)
            .context("Failed to build geocoding client")?;
        let forecasts = ForecastClient::new(&config.services, Arc::new(EnglishLabels))
            .context("Failed to build forecast client")?;
        let geolocator = StaticGeolocator::from_config(&config.geolocation);

        Ok(Self::new(
            config,
            Arc::new(store),
            Arc::new(geocoder),
            Arc::new(forecasts),
            Arc::new(geolocator),
        ))
    }

    /// Seed from the current position if nothing is saved, then render.
    pub async fn start(&self) -> (BootstrapOutcome, Vec<JoinHandle<()>>) {
        self.bootstrap.run(&self.directory, &self.cards).await
    }

    /// Add whatever the search field holds and start loading its card.
    /// The load handle is `None` only if the city was removed in between.
    pub async fn add_city(
        &self,
    ) -> Result<(TrackedLocation, Option<JoinHandle<()>>), AddCityError> {
        let location = self.search.submit(&self.directory).await?;
        let load = self.cards.spawn_load(&location.id);
        Ok((location, load))
    }

    pub fn remove_city(&self, id: &str) -> Option<TrackedLocation> {
        self.cards.remove(id)
    }

    pub async fn refresh_all(&self) -> RefreshReport {
        self.cards.refresh_all().await
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<CardEvent> {
        self.cards.subscribe()
    }

    pub fn search(&self) -> &AutocompleteSession {
        &self.search
    }

    pub fn cards(&self) -> Vec<CardSnapshot> {
        self.cards.cards()
    }

    pub fn controller(&self) -> &Arc<CardController> {
        &self.cards
    }

    pub fn directory(&self) -> &LocationDirectory {
        &self.directory
    }
}
