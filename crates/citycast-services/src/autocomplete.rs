//! City search field: debounced suggestions, a pinned pick, and the
//! add-city action.

use citycast_core::{AutocompleteConfig, CityError};
use citycast_weather::{Candidate, GeocodeError, Geocoder, NewLocation, TrackedLocation};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::directory::{DirectoryError, LocationDirectory};

/// Shown in the field while a typed name is being resolved.
pub const CHECKING_MESSAGE: &str = "Checking...";

/// Current suggestion dropdown
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SuggestionList {
    #[default]
    Hidden,
    Shown(Vec<Candidate>),
}

/// Why the add-city action did not add anything.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AddCityError {
    #[error("No city name entered")]
    EmptyInput,
    #[error("No match for \"{0}\"")]
    NotFound(String),
    #[error("City already tracked")]
    Duplicate,
    #[error("Geocoding failed: {0}")]
    Network(String),
}

impl AddCityError {
    /// The equivalent application error, if any.
    pub fn as_city_error(&self) -> Option<CityError> {
        match self {
            AddCityError::EmptyInput => None,
            AddCityError::NotFound(q) => Some(CityError::NotFound(q.clone())),
            AddCityError::Duplicate => Some(CityError::DuplicateLocation),
            AddCityError::Network(s) => Some(CityError::ResolutionFailed(s.clone())),
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self.as_city_error() {
            Some(e) => e.user_message(),
            None => "Enter a city name.",
        }
    }
}

impl From<GeocodeError> for AddCityError {
    fn from(e: GeocodeError) -> Self {
        match e {
            GeocodeError::NotFound(q) => AddCityError::NotFound(q),
            GeocodeError::ResolutionFailed(s) => AddCityError::Network(s),
        }
    }
}

impl From<DirectoryError> for AddCityError {
    fn from(e: DirectoryError) -> Self {
        match e {
            DirectoryError::DuplicateLocation { .. } => AddCityError::Duplicate,
        }
    }
}

/// A scheduled suggestion fetch that has not fired yet.
#[derive(Debug, Clone)]
pub struct DebounceHandle {
    token: CancellationToken,
}

impl DebounceHandle {
    /// Stop the fetch if its quiet period has not elapsed yet.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[derive(Default)]
struct FieldState {
    input: String,
    pinned: Option<Candidate>,
    pending: Option<DebounceHandle>,
    /// Bumped on every edit; results from older generations are dropped.
    generation: u64,
    message: Option<String>,
}

struct Inner {
    geocoder: Arc<dyn Geocoder>,
    debounce: Duration,
    limit: usize,
    field: Mutex<FieldState>,
    suggestions: watch::Sender<SuggestionList>,
}

impl Inner {
    fn publish(&self, generation: u64, candidates: Vec<Candidate>) {
        let mut field = self.field.lock();
        if field.generation != generation {
            tracing::debug!("Dropping stale suggestions");
            return;
        }
        field.pending = None;
        let list = if candidates.is_empty() {
            SuggestionList::Hidden
        } else {
            SuggestionList::Shown(candidates)
        };
        self.suggestions.send_replace(list);
    }
}

/// State behind the city input field.
#[derive(Clone)]
pub struct AutocompleteSession {
    inner: Arc<Inner>,
}

impl AutocompleteSession {
    pub fn new(geocoder: Arc<dyn Geocoder>, config: &AutocompleteConfig) -> Self {
        let (suggestions, _) = watch::channel(SuggestionList::Hidden);
        Self {
            inner: Arc::new(Inner {
                geocoder,
                debounce: Duration::from_millis(config.debounce_ms),
                limit: config.suggestion_limit,
                field: Mutex::new(FieldState::default()),
                suggestions,
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SuggestionList> {
        self.inner.suggestions.subscribe()
    }

    pub fn suggestions(&self) -> SuggestionList {
        self.inner.suggestions.borrow().clone()
    }

    pub fn input(&self) -> String {
        self.inner.field.lock().input.clone()
    }

    pub fn pinned(&self) -> Option<Candidate> {
        self.inner.field.lock().pinned.clone()
    }

    /// Message currently shown under the field.
    pub fn field_message(&self) -> Option<String> {
        self.inner.field.lock().message.clone()
    }

    /// The field text changed. Any edit drops the pinned pick.
    pub fn on_input(&self, text: &str) {
        let mut field = self.inner.field.lock();
        if let Some(pending) = field.pending.take() {
            pending.cancel();
        }
        field.input = text.to_string();
        field.pinned = None;
        field.generation += 1;

        let query = text.trim();
        if query.is_empty() {
            drop(field);
            self.inner.suggestions.send_replace(SuggestionList::Hidden);
            return;
        }

        let handle = self.schedule(query.to_string(), field.generation);
        field.pending = Some(handle);
    }

    /// Fetch suggestions for `query` once the quiet period passes.
    fn schedule(&self, query: String, generation: u64) -> DebounceHandle {
        let handle = DebounceHandle {
            token: CancellationToken::new(),
        };
        let task = handle.clone();
        let inner = Arc::clone(&self.inner);

        tokio::spawn(async move {
            tokio::select! {
                _ = task.token.cancelled() => return,
                _ = tokio::time::sleep(inner.debounce) => {}
            }
            let candidates = inner.geocoder.suggest(&query, inner.limit).await;
            // Edited while the request was in flight.
            if task.is_cancelled() {
                return;
            }
            inner.publish(generation, candidates);
        });

        handle
    }

    /// Pick the suggestion at `index`: it fills the field and becomes pinned.
    pub fn select(&self, index: usize) -> Option<Candidate> {
        let candidate = match &*self.inner.suggestions.borrow() {
            SuggestionList::Shown(list) => list.get(index).cloned(),
            SuggestionList::Hidden => None,
        }?;
        self.pin(candidate.clone());
        Some(candidate)
    }

    /// Pin a candidate directly.
    pub fn pin(&self, candidate: Candidate) {
        {
            let mut field = self.inner.field.lock();
            if let Some(pending) = field.pending.take() {
                pending.cancel();
            }
            field.generation += 1;
            field.input = candidate.display.clone();
            field.pinned = Some(candidate);
        }
        self.inner.suggestions.send_replace(SuggestionList::Hidden);
    }

    /// The add-city action. Uses the pinned pick when the field still shows
    /// it, otherwise resolves the typed text to its best match.
    pub async fn submit(
        &self,
        directory: &LocationDirectory,
    ) -> Result<TrackedLocation, AddCityError> {
        let (name, pinned) = {
            let field = self.inner.field.lock();
            let name = field.input.trim().to_string();
            let pinned = field.pinned.clone().filter(|p| p.display == name);
            (name, pinned)
        };

        if name.is_empty() {
            return Err(self.fail(AddCityError::EmptyInput));
        }

        let candidate = match pinned {
            Some(candidate) => candidate,
            None => {
                self.set_message(Some(CHECKING_MESSAGE.to_string()));
                match self.inner.geocoder.resolve_best(&name).await {
                    Ok(candidate) => candidate,
                    Err(e) => return Err(self.fail(e.into())),
                }
            }
        };

        let added = directory
            .add(NewLocation::from(&candidate))
            .map_err(|e| self.fail(e.into()))?;

        self.reset();
        Ok(added)
    }

    fn fail(&self, error: AddCityError) -> AddCityError {
        tracing::debug!("Add city rejected: {}", error);
        self.set_message(Some(error.user_message().to_string()));
        error
    }

    fn set_message(&self, message: Option<String>) {
        self.inner.field.lock().message = message;
    }

    /// Clear the field after a successful add.
    fn reset(&self) {
        {
            let mut field = self.inner.field.lock();
            if let Some(pending) = field.pending.take() {
                pending.cancel();
            }
            field.generation += 1;
            field.input.clear();
            field.pinned = None;
            field.message = None;
        }
        self.inner.suggestions.send_replace(SuggestionList::Hidden);
    }
}
