use citycast_core::{AppError, CityError};

use crate::types::{ForecastError, GeocodeError, GeolocationError};

impl From<GeocodeError> for CityError {
    fn from(e: GeocodeError) -> Self {
        match e {
            GeocodeError::NotFound(query) => CityError::NotFound(query),
            GeocodeError::ResolutionFailed(s) => CityError::ResolutionFailed(s),
        }
    }
}

impl From<ForecastError> for CityError {
    fn from(e: ForecastError) -> Self {
        match e {
            ForecastError::Unavailable(s) => CityError::ForecastUnavailable(s),
        }
    }
}

impl From<GeolocationError> for CityError {
    fn from(e: GeolocationError) -> Self {
        CityError::GeolocationFailed(e.to_string())
    }
}

impl From<GeocodeError> for AppError {
    fn from(e: GeocodeError) -> Self {
        AppError::City(e.into())
    }
}

impl From<ForecastError> for AppError {
    fn from(e: ForecastError) -> Self {
        AppError::City(e.into())
    }
}
