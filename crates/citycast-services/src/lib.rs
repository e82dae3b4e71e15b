pub mod autocomplete;
pub mod board;
pub mod bootstrap;
pub mod cards;
pub mod directory;
pub mod error_mapping;
pub mod storage;

pub use autocomplete::{AddCityError, AutocompleteSession, DebounceHandle, SuggestionList};
pub use board::Board;
pub use bootstrap::{Bootstrap, BootstrapOutcome};
pub use cards::{CardController, CardEvent, CardSnapshot, CardState, RefreshReport};
pub use directory::{DirectoryError, LocationDirectory};
pub use storage::{KeyValueStore, MemoryStore, SqliteStore};
