//! Human-facing sequential codes
//!
//! Codes are `<PREFIX><scope components><zero-padded ordinal>`:
//!
//! | kind    | example          | window                     |
//! |---------|------------------|----------------------------|
//! | Patient | `PAT00007`       | all time (optionally per tenant) |
//! | Test    | `TEST0042`       | all time (optionally per tenant) |
//! | Package | `PKG0003`        | all time (optionally per tenant) |
//! | Bill    | `BILL2024060012` | calendar month             |
//!
//! The ordinal comes from an atomic per-scope counter (see
//! [`SequencePort`](crate::ports::SequencePort)); it is never derived by
//! counting existing rows.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use core_kernel::TenantId;

use crate::error::BillingError;

/// Entity kinds that receive generated codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CodeKind {
    Patient,
    Test,
    Package,
    Bill,
}

impl CodeKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            CodeKind::Patient => "PAT",
            CodeKind::Test => "TEST",
            CodeKind::Package => "PKG",
            CodeKind::Bill => "BILL",
        }
    }

    /// Minimum digits of the ordinal
    pub fn pad_width(&self) -> usize {
        match self {
            CodeKind::Patient => 5,
            CodeKind::Test | CodeKind::Package | CodeKind::Bill => 4,
        }
    }

    /// Whether the counter restarts every calendar month
    pub fn is_monthly(&self) -> bool {
        matches!(self, CodeKind::Bill)
    }
}

/// A calendar month
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    /// Creates a month, rejecting anything that would not render as `YYYYMM`
    pub fn new(year: i32, month: u32) -> Result<Self, BillingError> {
        if !(1..=12).contains(&month) {
            return Err(BillingError::validation(format!("Invalid month: {}", month)));
        }
        if !(1000..=9999).contains(&year) {
            return Err(BillingError::validation(format!("Invalid year: {}", year)));
        }
        Ok(Self { year, month })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Month containing the given date
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Month containing the given instant (UTC)
    pub fn of_instant(instant: DateTime<Utc>) -> Self {
        Self::of(instant.date_naive())
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// The counting window for a code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SequenceScope {
    pub tenant: Option<TenantId>,
    pub period: Option<YearMonth>,
}

impl SequenceScope {
    /// Global, all-time window
    pub fn global() -> Self {
        Self::default()
    }

    /// All-time window for one tenant
    pub fn for_tenant(tenant: TenantId) -> Self {
        Self {
            tenant: Some(tenant),
            period: None,
        }
    }

    /// One calendar month across all tenants
    pub fn monthly(period: YearMonth) -> Self {
        Self {
            tenant: None,
            period: Some(period),
        }
    }

    pub fn with_tenant(mut self, tenant: TenantId) -> Self {
        self.tenant = Some(tenant);
        self
    }
}

/// A fully resolved counter: kind plus the parts of the scope that apply to it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SequenceKey {
    kind: CodeKind,
    tenant: Option<TenantId>,
    period: Option<YearMonth>,
}

impl SequenceKey {
    /// Resolves a scope for a kind
    ///
    /// Monthly kinds require a period; all-time kinds ignore one.
    pub fn new(kind: CodeKind, scope: SequenceScope) -> Result<Self, BillingError> {
        let period = if kind.is_monthly() {
            Some(scope.period.ok_or_else(|| {
                BillingError::validation(format!("{:?} codes need a year and month", kind))
            })?)
        } else {
            None
        };

        Ok(Self {
            kind,
            tenant: scope.tenant,
            period,
        })
    }

    pub fn kind(&self) -> CodeKind {
        self.kind
    }

    pub fn tenant(&self) -> Option<TenantId> {
        self.tenant
    }

    pub fn period(&self) -> Option<YearMonth> {
        self.period
    }

    /// Key of the counter document backing this sequence
    pub fn storage_key(&self) -> String {
        let mut key = self.kind.prefix().to_string();
        if let Some(period) = self.period {
            key.push(':');
            key.push_str(&period.to_string());
        }
        if let Some(tenant) = self.tenant {
            key.push(':');
            key.push_str(&tenant.as_uuid().to_string());
        }
        key
    }

    /// Renders the code for a reserved ordinal
    ///
    /// Ordinals wider than the pad width are printed in full.
    pub fn render(&self, ordinal: u64) -> String {
        let components = match self.period {
            Some(period) => format!("{:04}{:02}", period.year, period.month),
            None => String::new(),
        };
        format!(
            "{}{}{:0width$}",
            self.kind.prefix(),
            components,
            ordinal,
            width = self.kind.pad_width()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patient_code_format() {
        let key = SequenceKey::new(CodeKind::Patient, SequenceScope::global()).unwrap();
        assert_eq!(key.render(7), "PAT00007");
    }

    #[test]
    fn test_bill_code_format() {
        let period = YearMonth::new(2024, 6).unwrap();
        let key = SequenceKey::new(CodeKind::Bill, SequenceScope::monthly(period)).unwrap();
        assert_eq!(key.render(12), "BILL2024060012");
    }

    #[test]
    fn test_test_and_package_codes() {
        let test = SequenceKey::new(CodeKind::Test, SequenceScope::global()).unwrap();
        let package = SequenceKey::new(CodeKind::Package, SequenceScope::global()).unwrap();
        assert_eq!(test.render(42), "TEST0042");
        assert_eq!(package.render(3), "PKG0003");
    }

    #[test]
    fn test_overflowing_ordinal_not_truncated() {
        let key = SequenceKey::new(CodeKind::Test, SequenceScope::global()).unwrap();
        assert_eq!(key.render(123_456), "TEST123456");
    }

    #[test]
    fn test_bill_requires_period() {
        let result = SequenceKey::new(CodeKind::Bill, SequenceScope::global());
        assert!(matches!(result, Err(BillingError::Validation(_))));
    }

    #[test]
    fn test_all_time_kinds_drop_period() {
        let period = YearMonth::new(2024, 6).unwrap();
        let key = SequenceKey::new(CodeKind::Patient, SequenceScope::monthly(period)).unwrap();
        assert_eq!(key.period(), None);
        assert_eq!(key.storage_key(), "PAT");
    }

    #[test]
    fn test_storage_keys_separate_scopes() {
        let tenant = TenantId::new();
        let june = YearMonth::new(2024, 6).unwrap();
        let july = YearMonth::new(2024, 7).unwrap();

        let a = SequenceKey::new(CodeKind::Bill, SequenceScope::monthly(june)).unwrap();
        let b = SequenceKey::new(CodeKind::Bill, SequenceScope::monthly(july)).unwrap();
        let c = SequenceKey::new(CodeKind::Patient, SequenceScope::for_tenant(tenant)).unwrap();

        assert_eq!(a.storage_key(), "BILL:2024-06");
        assert_ne!(a.storage_key(), b.storage_key());
        assert_eq!(c.storage_key(), format!("PAT:{}", tenant.as_uuid()));
    }

    #[test]
    fn test_year_month_validation() {
        assert!(YearMonth::new(2024, 0).is_err());
        assert!(YearMonth::new(2024, 13).is_err());
        assert!(YearMonth::new(99, 1).is_err());
        let date = NaiveDate::from_ymd_opt(2025, 2, 28).unwrap();
        assert_eq!(YearMonth::of(date), YearMonth::new(2025, 2).unwrap());
    }
}
