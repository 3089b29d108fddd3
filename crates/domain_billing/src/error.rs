//! Billing domain errors

use core_kernel::{BillId, MoneyError, PortError};
use thiserror::Error;

/// Errors that can occur in the billing domain
///
/// Handlers map these onto user-facing responses; the engine never retries a
/// catalog or patient lookup on its own.
#[derive(Debug, Error)]
pub enum BillingError {
    /// Catalog item, patient, or bill absent, inactive, or owned by another tenant
    #[error("{entity} not found: {id}")]
    NotFound {
        entity: &'static str,
        id: String,
    },

    /// Malformed input: empty item list, bad quantity, negative amount, bad discount
    #[error("Validation error: {0}")]
    Validation(String),

    /// Mutation attempted on a bill whose state forbids it
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Cancellation requested for a bill that is already cancelled
    #[error("Bill already cancelled: {0}")]
    AlreadyCancelled(BillId),

    /// Sequence collision or optimistic-lock conflict
    #[error("Concurrency conflict: {0}")]
    Concurrency(String),

    /// Money arithmetic failed (currency mismatch)
    #[error("Money error: {0}")]
    Money(#[from] MoneyError),

    /// Adapter failure that is not a domain condition
    #[error("Port error: {0}")]
    Port(PortError),
}

impl BillingError {
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        BillingError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        BillingError::Validation(message.into())
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        BillingError::InvalidState(message.into())
    }

    pub fn concurrency(message: impl Into<String>) -> Self {
        BillingError::Concurrency(message.into())
    }

    /// Returns true for the not-found family
    pub fn is_not_found(&self) -> bool {
        matches!(self, BillingError::NotFound { .. })
    }
}

impl From<PortError> for BillingError {
    fn from(error: PortError) -> Self {
        match error {
            PortError::NotFound { entity_type, id } => BillingError::NotFound {
                entity: match entity_type.as_str() {
                    "Bill" => "Bill",
                    "Patient" => "Patient",
                    "Test" => "Test",
                    "Package" => "Package",
                    _ => "Entity",
                },
                id,
            },
            PortError::Validation { message, field } => match field {
                Some(field) => BillingError::Validation(format!("{}: {}", field, message)),
                None => BillingError::Validation(message),
            },
            PortError::Conflict { message } => BillingError::Concurrency(message),
            other => BillingError::Port(other),
        }
    }
}

impl From<validator::ValidationErrors> for BillingError {
    fn from(errors: validator::ValidationErrors) -> Self {
        BillingError::Validation(errors.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_not_found_maps_to_not_found() {
        let error: BillingError = PortError::not_found("Bill", "BIL-1").into();
        assert!(error.is_not_found());
        assert_eq!(error.to_string(), "Bill not found: BIL-1");
    }

    #[test]
    fn test_port_conflict_maps_to_concurrency() {
        let error: BillingError = PortError::conflict("version 3 is stale").into();
        assert!(matches!(error, BillingError::Concurrency(msg) if msg.contains("stale")));
    }

    #[test]
    fn test_field_validation_keeps_field_name() {
        let error: BillingError = PortError::validation_field("must be positive", "quantity").into();
        assert!(matches!(error, BillingError::Validation(msg) if msg == "quantity: must be positive"));
    }

    #[test]
    fn test_connection_stays_port_error() {
        let error: BillingError = PortError::connection("pool timed out").into();
        assert!(matches!(error, BillingError::Port(PortError::Connection { .. })));
    }
}
