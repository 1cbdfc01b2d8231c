//! API handlers module

pub mod deposits;
pub mod files;
pub mod health;
pub mod reference;

use sonar_deposit_common::{
    client::{DEPOSITS, DOCUMENTS},
    errors::{AppError, Result},
};
use validator::Validate;

/// Resolve a record type path segment; only deposits and documents carry files
pub(crate) fn record_type(value: &str) -> Result<&'static str> {
    match value {
        DEPOSITS => Ok(DEPOSITS),
        DOCUMENTS => Ok(DOCUMENTS),
        other => Err(AppError::NotFound {
            resource_type: "record type".to_string(),
            id: other.to_string(),
        }),
    }
}

/// Run derive validation on a request body
pub(crate) fn validated<T: Validate>(request: T) -> Result<T> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_type() {
        assert_eq!(record_type("deposits").unwrap(), DEPOSITS);
        assert_eq!(record_type("documents").unwrap(), DOCUMENTS);
        assert!(matches!(
            record_type("projects"),
            Err(AppError::NotFound { .. })
        ));
    }
}
