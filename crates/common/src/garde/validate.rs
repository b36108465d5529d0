//! Garde validation utilities.

use crate::domain::DomainError;
use garde::{Report, Validate};

/// Longest device id accepted; ids end up in NATS subjects and KV keys.
pub const MAX_DEVICE_ID_LEN: usize = 128;

/// Convert garde validation report to DomainError
pub fn validate_struct<T>(value: &T) -> Result<(), DomainError>
where
    T: Validate,
    T::Context: Default,
{
    value
        .validate()
        .map_err(|report| DomainError::ValidationError(format_validation_errors(&report)))
}

/// Device ids are used verbatim as subject tokens and bucket keys, so only
/// `[A-Za-z0-9_-]` is allowed.
pub fn validate_device_id(value: &str, _context: &()) -> garde::Result {
    if value.is_empty() {
        return Err(garde::Error::new("device id cannot be empty"));
    }
    if value.len() > MAX_DEVICE_ID_LEN {
        return Err(garde::Error::new(format!(
            "device id longer than {} characters",
            MAX_DEVICE_ID_LEN
        )));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(garde::Error::new(
            "device id may only contain ASCII letters, digits, '-' and '_'",
        ));
    }
    Ok(())
}

/// Format validation errors from garde Report into a human-readable string
fn format_validation_errors(report: &Report) -> String {
    report
        .iter()
        .map(|(path, error)| {
            if path.to_string().is_empty() {
                error.message().to_string()
            } else {
                format!("{}: {}", path, error.message())
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
