//! Identifier types used throughout the loadout engine.
//!
//! Remote identifiers are plain integers wrapped in newtypes so a bucket hash
//! can never be passed where an item hash is expected. Session identifiers
//! are UUID v7 for time ordering.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident($inner:ty)) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name($inner);

        impl $name {
            /// Wraps a raw remote value.
            #[must_use]
            pub const fn new(raw: $inner) -> Self {
                Self(raw)
            }

            /// Returns the raw remote value.
            #[must_use]
            pub const fn get(&self) -> $inner {
                self.0
            }
        }

        impl From<$inner> for $name {
            fn from(raw: $inner) -> Self {
                Self(raw)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.trim().parse()?))
            }
        }
    };
}

numeric_id!(
    /// Stable identifier of one owned item instance.
    ItemInstanceId(u64)
);

numeric_id!(
    /// Catalog hash identifying an item type. Many instances share one hash.
    ItemHash(u32)
);

numeric_id!(
    /// Catalog hash identifying an equipment bucket (slot category).
    BucketHash(u32)
);

numeric_id!(
    /// Identifier of one of the player's characters.
    CharacterId(u64)
);

numeric_id!(
    /// Account identifier used to fetch the profile.
    MembershipId(u64)
);

numeric_id!(
    /// Catalog hash of a plug that can be inserted into a socket.
    PlugHash(u32)
);

/// Identifier for a move session. Only used for log correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Creates a new session ID with the current timestamp.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s.trim())?))
    }
}
