use citycast_core::{AppError, CityError};

use crate::autocomplete::AddCityError;
use crate::directory::DirectoryError;

impl From<DirectoryError> for CityError {
    fn from(e: DirectoryError) -> Self {
        match e {
            DirectoryError::DuplicateLocation { .. } => CityError::DuplicateLocation,
        }
    }
}

impl From<DirectoryError> for AppError {
    fn from(e: DirectoryError) -> Self {
        AppError::City(e.into())
    }
}

impl From<AddCityError> for AppError {
    fn from(e: AddCityError) -> Self {
        match e.as_city_error() {
            Some(city) => AppError::City(city),
            None => AppError::Other(anyhow::anyhow!(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_maps_to_city_error() {
        let err: AppError = DirectoryError::DuplicateLocation {
            existing_id: "a1".into(),
        }
        .into();
        assert!(matches!(err, AppError::City(CityError::DuplicateLocation)));
        assert_eq!(err.user_message(), "This city is already added.");
    }

    #[test]
    fn test_add_city_errors_keep_messages() {
        for e in [
            AddCityError::NotFound("Atlantis".into()),
            AddCityError::Duplicate,
            AddCityError::Network("timeout".into()),
        ] {
            let message = e.user_message();
            let app: AppError = e.into();
            assert_eq!(app.user_message(), message);
        }
    }

    #[test]
    fn test_empty_input_is_not_a_city_error() {
        let app: AppError = AddCityError::EmptyInput.into();
        assert!(matches!(app, AppError::Other(_)));
    }
}
