//! Feed-side entities consumed and produced by the classifier.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PatternError, Result};
use crate::identifiers::{RouteId, ServiceId, StopId, TripId};

/// Trip direction (0 = outbound, 1 = inbound per GTFS). Which physical way each
/// one runs is up to the route's pattern.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DirectionId {
    Outbound,
    Inbound,
}

impl DirectionId {
    pub const ALL: [DirectionId; 2] = [DirectionId::Outbound, DirectionId::Inbound];

    pub fn from_gtfs(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Outbound),
            1 => Some(Self::Inbound),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Self::Outbound => 0,
            Self::Inbound => 1,
        }
    }

    pub fn other(self) -> Self {
        match self {
            Self::Outbound => Self::Inbound,
            Self::Inbound => Self::Outbound,
        }
    }
}

impl TryFrom<u8> for DirectionId {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        Self::from_gtfs(value).ok_or_else(|| format!("unknown direction_id {value}"))
    }
}

impl From<DirectionId> for u8 {
    fn from(value: DirectionId) -> Self {
        value.index() as u8
    }
}

impl fmt::Display for DirectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stop {
    pub id: StopId,
    pub name: String,
}

/// One stop visit of a trip, with the feed's `stop_sequence`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopVisit {
    pub stop_id: StopId,
    pub sequence: u32,
}

impl StopVisit {
    pub fn new(stop_id: impl Into<StopId>, sequence: u32) -> Self {
        Self {
            stop_id: stop_id.into(),
            sequence,
        }
    }
}

/// A trip as the feed recorded it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawTrip {
    pub trip_id: TripId,
    pub route_id: RouteId,
    pub service_id: ServiceId,
    /// Direction declared by the feed, if any. Not trusted for patterned routes.
    pub direction_id: Option<DirectionId>,
    pub headsign: Option<String>,
    pub visits: Vec<StopVisit>,
}

impl RawTrip {
    /// Builds a trip whose sequence numbers follow the visit order, starting at 1.
    pub fn from_stops(
        trip_id: impl Into<TripId>,
        route_id: impl Into<RouteId>,
        stops: &[&str],
    ) -> Self {
        Self {
            trip_id: trip_id.into(),
            route_id: route_id.into(),
            service_id: ServiceId::new("default"),
            direction_id: None,
            headsign: None,
            visits: stops
                .iter()
                .enumerate()
                .map(|(i, s)| StopVisit::new(*s, i as u32 + 1))
                .collect(),
        }
    }

    pub fn stop_ids(&self) -> impl Iterator<Item = &StopId> {
        self.visits.iter().map(|v| &v.stop_id)
    }
}

/// Which rule settled a trip's direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Strictly more stops matched in canonical order.
    Score,
    /// Tied scores, settled by a divergent stop next to a shared-ambiguous stop.
    SharedStopContext,
    /// Tied scores with no context, settled by the feed's own direction_id.
    FeedDirection,
    /// Not claimed by the only non-empty direction, so taken by the empty one.
    Complement,
    /// The route has no pattern; the feed's direction_id was used as is.
    Unpatterned,
}

/// Per-direction match counts, indexed by [`DirectionId::index`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchScores {
    /// Visits whose stop has an unambiguous canonical position in the direction.
    pub hits: [usize; 2],
    /// Longest run of those visits in canonical order.
    pub ordered: [usize; 2],
}

impl MatchScores {
    pub fn ordered(&self, direction: DirectionId) -> usize {
        self.ordered[direction.index()]
    }

    pub fn hits(&self, direction: DirectionId) -> usize {
        self.hits[direction.index()]
    }
}

/// A trip assigned to one direction of its route.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassifiedTrip {
    pub trip: RawTrip,
    pub direction_id: DirectionId,
    pub headsign: String,
    pub resolution: Resolution,
    pub scores: MatchScores,
}

impl ClassifiedTrip {
    pub fn trip_id(&self) -> &TripId {
        &self.trip.trip_id
    }

    pub fn route_id(&self) -> &RouteId {
        &self.trip.route_id
    }

    /// Checks that `other` can be folded into this trip's direction group.
    ///
    /// Two trips merge only when they agree on route, direction and display
    /// name; anything else means the grouping upstream is wrong.
    pub fn merge_headsign(&self, other: &ClassifiedTrip) -> Result<()> {
        if self.route_id() == other.route_id()
            && self.direction_id == other.direction_id
            && self.headsign == other.headsign
        {
            return Ok(());
        }
        Err(PatternError::AmbiguousMerge {
            route: self.route_id().clone(),
            direction: self.direction_id,
            first: self.trip_id().clone(),
            second: other.trip_id().clone(),
        })
    }
}
