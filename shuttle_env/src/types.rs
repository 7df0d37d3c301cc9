//! Common identifier types shared across the tracking pipeline.

use crate::error::EnvError;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};

macro_rules! int_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Returns the raw integer value.
            pub fn get(&self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = EnvError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse::<i64>().map(Self).map_err(|_| EnvError::invalid_id(s))
            }
        }
    };
}

int_id!(
    /// Identifier of a vehicle, assigned by the model service.
    VehicleId
);
int_id!(
    /// Identifier of a route, assigned by the model service.
    RouteId
);
int_id!(
    /// Identifier of a stop, assigned by the model service.
    StopId
);
int_id!(
    /// Identifier of a location fix, assigned by the component that produced it.
    LocationId
);

/// Monotonically increasing source of [`LocationId`]s.
///
/// Each producing component owns one. Components that persist into the same
/// store can share a single sequence through an `Arc` so ids never collide.
#[derive(Debug)]
pub struct IdSequence {
    next: AtomicI64,
}

impl IdSequence {
    /// Creates a sequence whose first id is 1.
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Creates a sequence whose first id is `first`.
    pub fn starting_at(first: i64) -> Self {
        Self {
            next: AtomicI64::new(first),
        }
    }

    /// Hands out the next id.
    pub fn next_id(&self) -> LocationId {
        LocationId(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// The id the next call to `next_id` will return.
    pub fn peek(&self) -> LocationId {
        LocationId(self.next.load(Ordering::Relaxed))
    }
}

impl Default for IdSequence {
    fn default() -> Self {
        Self::new()
    }
}
