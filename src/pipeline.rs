//! Whole-feed batch: classify every trip, then summarize each route direction.
//!
//! Both steps stop at the first error; a partly classified feed would put
//! trips under the wrong direction downstream.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info};

use crate::classify::{classify_unpatterned, classify_with_labels};
use crate::error::Result;
use crate::identifiers::{RouteId, TripId};
use crate::label::LabelCleaner;
use crate::model::{ClassifiedTrip, DirectionId, RawTrip, StopVisit};
use crate::registry::PatternRegistry;
use crate::sequence::direction_stop_sequence;

/// Classifies `trips`, using the route's pattern when the registry has one and
/// the feed's direction_id otherwise.
#[tracing::instrument(skip_all, fields(trips = trips.len(), patterns = registry.len()))]
pub fn classify_feed(
    registry: &PatternRegistry,
    trips: &[RawTrip],
    labels: &impl LabelCleaner,
) -> Result<Vec<ClassifiedTrip>> {
    let mut classified = Vec::with_capacity(trips.len());
    for trip in trips {
        let result = match registry.get(&trip.route_id) {
            Some(pattern) => classify_with_labels(pattern, trip, labels)?,
            None => classify_unpatterned(trip, labels)?,
        };
        classified.push(result);
    }

    info!(classified = classified.len(), "Classified all trips");
    Ok(classified)
}

/// One direction of one route, ready for rendering.
#[derive(Debug, Clone, Serialize)]
pub struct DirectionSummary {
    pub route_id: RouteId,
    pub direction_id: DirectionId,
    pub headsign: String,
    pub trip_ids: Vec<TripId>,
    pub stops: Vec<StopVisit>,
}

/// Groups classified trips by route and direction, checks that each group
/// agrees on its display name and merges its stop sequence.
#[tracing::instrument(skip_all, fields(trips = trips.len()))]
pub fn summarize_directions(
    registry: &PatternRegistry,
    trips: &[ClassifiedTrip],
) -> Result<Vec<DirectionSummary>> {
    let mut groups: BTreeMap<(RouteId, DirectionId), Vec<&ClassifiedTrip>> = BTreeMap::new();
    for trip in trips {
        groups
            .entry((trip.route_id().clone(), trip.direction_id))
            .or_default()
            .push(trip);
    }

    let mut summaries = Vec::with_capacity(groups.len());
    for ((route_id, direction_id), group) in groups {
        let Some((first, rest)) = group.split_first() else {
            continue;
        };
        for other in rest {
            first.merge_headsign(other)?;
        }

        let stops = direction_stop_sequence(registry.get(&route_id), direction_id, &group);
        debug!(
            route = %route_id,
            direction = %direction_id,
            trips = group.len(),
            stops = stops.len(),
            "Merged direction stop sequence"
        );

        summaries.push(DirectionSummary {
            headsign: first.headsign.clone(),
            trip_ids: group.iter().map(|t| t.trip_id().clone()).collect(),
            route_id,
            direction_id,
            stops,
        });
    }
    Ok(summaries)
}
