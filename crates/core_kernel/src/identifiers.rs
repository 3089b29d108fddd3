//! Typed storage keys
//!
//! Each key wraps a UUID and renders as `<TAG>-<uuid>`, e.g.
//! `BIL-0190a3b2-...`. The tag exists for log readability only; the
//! human-facing codes such as `PAT00007` or `BILL2024060012` come from the
//! billing sequence module and are never stored in these types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A key string that is neither a bare UUID nor `<TAG>-<uuid>`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} key '{input}'")]
pub struct IdParseError {
    pub kind: &'static str,
    pub input: String,
}

macro_rules! storage_key {
    ($(#[$doc:meta])* $name:ident => $tag:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Random key
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Time-ordered key; later calls sort after earlier ones
            pub fn new_v7() -> Self {
                Self(Uuid::now_v7())
            }

            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Tag used in the display form
            pub const fn prefix() -> &'static str {
                $tag
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}-{}", $tag, self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = match s.split_once('-') {
                    Some(($tag, rest)) => rest,
                    _ => s,
                };
                Uuid::parse_str(raw).map(Self).map_err(|_| IdParseError {
                    kind: stringify!($name),
                    input: s.to_string(),
                })
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Uuid {
                id.0
            }
        }
    };
}

storage_key! {
    /// Lab (franchise) owning catalog entries, patients and bills
    TenantId => "FRN"
}
storage_key! {
    /// Staff member recorded as a bill's creator
    UserId => "USR"
}
storage_key!(PatientId => "PTN");
storage_key!(TestId => "TST");
storage_key!(PackageId => "PKG");
storage_key!(BillId => "BIL");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_tag() {
        assert!(BillId::new().to_string().starts_with("BIL-"));
    }

    #[test]
    fn test_display_form_parses_back() {
        let original = TenantId::new_v7();
        let parsed: TenantId = original.to_string().parse().unwrap();
        assert_eq!(original, parsed);
    }

    #[test]
    fn test_foreign_tag_is_rejected() {
        let bill = BillId::new().to_string();
        let error = bill.parse::<PatientId>().unwrap_err();
        assert_eq!(error.kind, "PatientId");
    }
}
