//! Strongly-typed identifiers shared across the client.
//!
//! Every id serializes transparently as a UUID string, matching the JSON
//! the backend speaks.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

macro_rules! uuid_id {
    ($(#[$doc:meta])* $t:ident) => {
        $(#[$doc])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $t(Uuid);

        impl $t {
            /// Mint a fresh time-ordered (UUIDv7) identifier.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }
        }

        impl fmt::Display for $t {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $t {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$t> for Uuid {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::from_str(s).map(Self).map_err(|e| {
                    DomainError::invalid_id(format!("{} {s:?}: {e}", stringify!($t)))
                })
            }
        }
    };
}

uuid_id! {
    /// The warehouse this client acts for. Sent with every request as the
    /// `X-Warehouse-ID` header and embedded in webhook payloads.
    WarehouseId
}

uuid_id! {
    /// A catalog item.
    ItemId
}

uuid_id! {
    /// A logged stock movement (truck or container).
    MovementId
}

uuid_id! {
    /// A stock transaction.
    TransactionId
}
