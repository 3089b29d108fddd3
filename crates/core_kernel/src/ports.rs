//! Ports and Adapters Infrastructure
//!
//! A domain crate declares its port traits on top of [`DomainPort`];
//! adapters (PostgreSQL, in-memory) implement them and report failures as
//! [`PortError`], so the domain classifies errors without knowing which
//! backend produced them.
//!
//! ```text
//!            BillingService
//!                  │
//!    ┌─────────────┼──────────────┐
//!    ▼             ▼              ▼
//! CatalogPort  SequencePort    BillPort      (domain_billing::ports)
//!    ▲             ▲              ▲
//!    └──── Postgres / in-memory adapters ─┘
//! ```

use std::fmt;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure reported by an adapter
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortError {
    #[error("Not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    /// The store rejected the data (check or foreign-key constraint)
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// Duplicate key or stale version; the caller may reload and retry
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// Backend unreachable or out of connections
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// A stored value could not be mapped to or from its domain type
    #[error("Transformation error: {message}")]
    Transformation { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl PortError {
    pub fn not_found(entity_type: impl Into<String>, id: impl fmt::Display) -> Self {
        PortError::NotFound {
            entity_type: entity_type.into(),
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        PortError::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Validation error naming the offending field
    pub fn validation_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        PortError::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        PortError::Conflict {
            message: message.into(),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        PortError::Connection {
            message: message.into(),
        }
    }

    pub fn transformation(message: impl Into<String>) -> Self {
        PortError::Transformation {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        PortError::Internal {
            message: message.into(),
        }
    }

    /// True when the same call may succeed later without any change
    pub fn is_transient(&self) -> bool {
        matches!(self, PortError::Connection { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, PortError::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, PortError::Conflict { .. })
    }
}

/// Marker trait for all domain ports
///
/// Ports are shared as `Arc<dyn Port>` across tasks.
pub trait DomainPort: Send + Sync + 'static {}

/// Health status for an adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterHealth {
    Healthy,
    Unhealthy,
}

/// Outcome of one health probe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub adapter_id: String,
    pub status: AdapterHealth,
    pub latency_ms: u64,
    /// Failure detail when unhealthy
    pub message: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl HealthCheckResult {
    /// Builds a result from a probe that started at `started`
    pub fn from_probe<E: fmt::Display>(
        adapter_id: impl Into<String>,
        started: Instant,
        probe: Result<(), E>,
    ) -> Self {
        let (status, message) = match probe {
            Ok(()) => (AdapterHealth::Healthy, None),
            Err(error) => (AdapterHealth::Unhealthy, Some(error.to_string())),
        };

        Self {
            adapter_id: adapter_id.into(),
            status,
            latency_ms: started.elapsed().as_millis() as u64,
            message,
            checked_at: Utc::now(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == AdapterHealth::Healthy
    }
}

/// Trait for adapters that support health checks
#[async_trait::async_trait]
pub trait HealthCheckable: Send + Sync {
    async fn health_check(&self) -> HealthCheckResult;
}
