use serde::{Deserialize, Deserializer};
use validator::{Validate, ValidationError};

use crate::error::AppError;

/// Runs the DTO's declared rules, turning failures into `Validation`.
pub fn validated<T: Validate>(dto: T) -> Result<T, AppError> {
    dto.validate()?;
    Ok(dto)
}

pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("must not be blank".into());
        return Err(err);
    }
    Ok(())
}

/// Tells an explicit `null` (`Some(None)`) apart from an absent field
/// (`None`, via `#[serde(default)]`).
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
