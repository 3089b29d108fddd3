//! Core Kernel - Foundational types shared by the lab billing workspace
//!
//! - Money and percentage types with precise decimal arithmetic
//! - Strongly-typed entity identifiers
//! - Port infrastructure for the hexagonal adapters

pub mod money;
pub mod identifiers;
pub mod ports;

pub use money::{Money, Currency, MoneyError, Percentage};
pub use identifiers::{
    BillId, IdParseError, PackageId, PatientId, TenantId, TestId, UserId,
};
pub use ports::{
    PortError, DomainPort, HealthCheckable, HealthCheckResult,
    AdapterHealth,
};
