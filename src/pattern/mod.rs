//! Authored route patterns.
//!
//! A [`PatternDescriptor`] lists the canonical stops of one direction of a
//! route. [`CompiledRoutePattern`] validates a pair of them and indexes them
//! for classification and ordering.

mod compile;

pub use compile::CompiledRoutePattern;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PatternError, Result};
use crate::identifiers::{RouteId, StopId};
use crate::model::DirectionId;

/// Role of a stop within a canonical list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopAnnotation {
    #[default]
    Plain,
    /// `==`: part of the trunk both directions share.
    #[serde(alias = "==")]
    Equal,
    /// `!=`: where this direction leaves the shared trunk.
    #[serde(alias = "!=")]
    Divergent,
    /// `<>`: served by both directions at a position that can't tell them apart.
    #[serde(alias = "<>")]
    SharedAmbiguous,
}

impl StopAnnotation {
    fn from_marker(marker: &str) -> Option<Self> {
        match marker {
            "==" => Some(Self::Equal),
            "!=" => Some(Self::Divergent),
            "<>" => Some(Self::SharedAmbiguous),
            // "via" stops only matter for display
            "++" => Some(Self::Plain),
            _ => None,
        }
    }

    /// Folds two markers given on one entry. `<>` wins over everything, and
    /// `==` with `!=` contradict each other.
    fn combine(self, other: Self) -> Option<Self> {
        use StopAnnotation::*;
        match (self, other) {
            (SharedAmbiguous, _) | (_, SharedAmbiguous) => Some(SharedAmbiguous),
            (Plain, x) | (x, Plain) => Some(x),
            (a, b) if a == b => Some(a),
            _ => None,
        }
    }
}

impl fmt::Display for StopAnnotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Plain => "plain",
            Self::Equal => "equal",
            Self::Divergent => "divergent",
            Self::SharedAmbiguous => "shared-ambiguous",
        };
        f.write_str(s)
    }
}

/// One stop of a canonical list.
///
/// Pattern files may write an entry as an object or in the compact form
/// `"811790 != <>  # Savikko Road"`: the stop id, then markers, then an
/// optional `#` comment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "EntrySpec")]
pub struct PatternEntry {
    pub stop_id: StopId,
    #[serde(default)]
    pub annotation: StopAnnotation,
}

impl PatternEntry {
    pub fn new(stop_id: impl Into<StopId>, annotation: StopAnnotation) -> Self {
        Self {
            stop_id: stop_id.into(),
            annotation,
        }
    }
}

impl FromStr for PatternEntry {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let body = s.split('#').next().unwrap_or_default();
        let mut tokens = body.split_whitespace();
        let stop_id = tokens
            .next()
            .ok_or_else(|| format!("pattern entry {s:?} has no stop id"))?;

        let mut annotation = StopAnnotation::Plain;
        for marker in tokens {
            let next = StopAnnotation::from_marker(marker)
                .ok_or_else(|| format!("unknown marker {marker:?} in pattern entry {s:?}"))?;
            annotation = annotation
                .combine(next)
                .ok_or_else(|| format!("conflicting markers in pattern entry {s:?}"))?;
        }

        Ok(Self::new(stop_id, annotation))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EntrySpec {
    Compact(String),
    Full {
        stop_id: StopId,
        #[serde(default)]
        annotation: StopAnnotation,
    },
}

impl TryFrom<EntrySpec> for PatternEntry {
    type Error = String;

    fn try_from(spec: EntrySpec) -> std::result::Result<Self, Self::Error> {
        match spec {
            EntrySpec::Compact(s) => s.parse(),
            EntrySpec::Full {
                stop_id,
                annotation,
            } => Ok(Self::new(stop_id, annotation)),
        }
    }
}

/// Canonical stop list of one direction of a route.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternDescriptor {
    pub route_id: RouteId,
    pub direction_id: DirectionId,
    /// Display name for the direction. Empty means "use the feed's headsign".
    #[serde(default)]
    pub headsign: String,
    /// Empty means this direction takes every trip the other one doesn't claim.
    #[serde(default)]
    pub stops: Vec<PatternEntry>,
}

impl PatternDescriptor {
    pub fn new(
        route_id: impl Into<RouteId>,
        direction_id: DirectionId,
        headsign: impl Into<String>,
        stops: Vec<PatternEntry>,
    ) -> Self {
        Self {
            route_id: route_id.into(),
            direction_id,
            headsign: headsign.into(),
            stops,
        }
    }

    /// Builds a descriptor from compact entries such as `"811789 =="`.
    pub fn from_markers(
        route_id: impl Into<RouteId>,
        direction_id: DirectionId,
        headsign: impl Into<String>,
        entries: &[&str],
    ) -> Result<Self> {
        let route_id = route_id.into();
        let stops = entries
            .iter()
            .map(|e| e.parse::<PatternEntry>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|reason| PatternError::invalid(&route_id, reason))?;
        Ok(Self::new(route_id, direction_id, headsign, stops))
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }
}
