//! Error taxonomy for pattern compilation and trip classification.
//!
//! Every variant is fatal for a run: they all come from configuration or data
//! mismatches, so nothing here is retried.

use crate::identifiers::{RouteId, TripId};
use crate::model::DirectionId;

#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    /// A pattern descriptor is internally inconsistent or references an unknown stop.
    #[error("route {route}: invalid pattern: {reason}")]
    InvalidPattern { route: RouteId, reason: String },

    /// A trip could not be assigned to either direction of its route.
    #[error("route {route}: unexpected trip {trip}: {reason}")]
    UnmatchedTrip {
        route: RouteId,
        trip: TripId,
        reason: String,
    },

    /// Two classified trips were merged as duplicates but differ.
    #[error("route {route} direction {direction}: unexpected trips to merge: {first} & {second}")]
    AmbiguousMerge {
        route: RouteId,
        direction: DirectionId,
        first: TripId,
        second: TripId,
    },
}

impl PatternError {
    pub(crate) fn invalid(route: &RouteId, reason: impl Into<String>) -> Self {
        PatternError::InvalidPattern {
            route: route.clone(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unmatched(route: &RouteId, trip: &TripId, reason: impl Into<String>) -> Self {
        PatternError::UnmatchedTrip {
            route: route.clone(),
            trip: trip.clone(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PatternError>;
