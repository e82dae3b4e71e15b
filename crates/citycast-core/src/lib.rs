pub mod card_phase;
pub mod config;
pub mod error;

pub use card_phase::CardPhase;
pub use config::{
    AutocompleteConfig, Config, GeolocationConfig, ServiceConfig, StorageConfig, ValidationResult,
};
pub use error::{
    AppError, CityError, ConfigError, DatabaseError, NetworkError, ReqwestErrorExt,
    RusqliteErrorExt,
};

use anyhow::Result;

/// Initialize logging for the application
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))?;

    tracing::info!("CityCast core initialized");
    Ok(())
}
