//! Assigns raw trips to one direction of their route's pattern.
//!
//! Each non-empty direction is scored by how many of the trip's stops appear
//! in it in canonical order. Ties fall back to the divergent stops around any
//! shared-ambiguous stop the trip visits, then to the feed's own direction.

use std::cmp::Ordering;

use tracing::{debug, warn};

use crate::error::{PatternError, Result};
use crate::label::{BasicLabelCleaner, LabelCleaner};
use crate::model::{ClassifiedTrip, DirectionId, MatchScores, RawTrip, Resolution};
use crate::pattern::CompiledRoutePattern;

/// Classifies `trip`, cleaning fallback headsigns with [`BasicLabelCleaner`].
pub fn classify(pattern: &CompiledRoutePattern, trip: &RawTrip) -> Result<ClassifiedTrip> {
    classify_with_labels(pattern, trip, &BasicLabelCleaner)
}

#[tracing::instrument(level = "debug", skip_all, fields(route = %pattern.route_id(), trip = %trip.trip_id))]
pub fn classify_with_labels(
    pattern: &CompiledRoutePattern,
    trip: &RawTrip,
    labels: &impl LabelCleaner,
) -> Result<ClassifiedTrip> {
    let scores = score(pattern, trip);
    let (direction, resolution) = resolve(pattern, trip, &scores)?;
    let headsign = display_name(pattern.headsign(direction), trip, labels);

    debug!(
        direction = %direction,
        ?resolution,
        outbound = scores.ordered[0],
        inbound = scores.ordered[1],
        "Classified trip"
    );

    Ok(ClassifiedTrip {
        trip: trip.clone(),
        direction_id: direction,
        headsign,
        resolution,
        scores,
    })
}

/// Classifies a trip of a route that has no pattern, trusting the feed's direction.
pub fn classify_unpatterned(trip: &RawTrip, labels: &impl LabelCleaner) -> Result<ClassifiedTrip> {
    let direction = trip.direction_id.ok_or_else(|| {
        PatternError::unmatched(
            &trip.route_id,
            &trip.trip_id,
            "route has no pattern and the feed gives no direction_id",
        )
    })?;

    Ok(ClassifiedTrip {
        trip: trip.clone(),
        direction_id: direction,
        headsign: display_name("", trip, labels),
        resolution: Resolution::Unpatterned,
        scores: MatchScores::default(),
    })
}

fn score(pattern: &CompiledRoutePattern, trip: &RawTrip) -> MatchScores {
    let mut scores = MatchScores::default();
    for direction in DirectionId::ALL {
        if pattern.is_complement(direction) {
            continue;
        }
        let positions: Vec<usize> = trip
            .stop_ids()
            .filter_map(|stop| pattern.position(direction, stop))
            .collect();
        scores.hits[direction.index()] = positions.len();
        scores.ordered[direction.index()] = longest_ordered_run(&positions);
    }
    scores
}

fn resolve(
    pattern: &CompiledRoutePattern,
    trip: &RawTrip,
    scores: &MatchScores,
) -> Result<(DirectionId, Resolution)> {
    if let Some(empty) = DirectionId::ALL
        .into_iter()
        .find(|d| pattern.is_complement(*d))
    {
        // The other direction claims the trip only if most of its hits are in order
        let claimant = empty.other();
        let ordered = scores.ordered(claimant);
        let out_of_order = scores.hits(claimant) - ordered;
        if ordered > 0 && ordered > out_of_order {
            return Ok((claimant, Resolution::Score));
        }
        return Ok((empty, Resolution::Complement));
    }

    let outbound = scores.ordered(DirectionId::Outbound);
    let inbound = scores.ordered(DirectionId::Inbound);
    match outbound.cmp(&inbound) {
        Ordering::Greater => return Ok((DirectionId::Outbound, Resolution::Score)),
        Ordering::Less => return Ok((DirectionId::Inbound, Resolution::Score)),
        Ordering::Equal => {}
    }

    if outbound == 0 {
        return Err(PatternError::unmatched(
            pattern.route_id(),
            &trip.trip_id,
            "no stop of the trip matches either direction",
        ));
    }

    if let Some(direction) = shared_stop_vote(pattern, trip) {
        return Ok((direction, Resolution::SharedStopContext));
    }

    match trip.direction_id {
        Some(direction) => {
            warn!(
                route = %pattern.route_id(),
                trip = %trip.trip_id,
                direction = %direction,
                score = outbound,
                "Tied trip settled by feed direction_id"
            );
            Ok((direction, Resolution::FeedDirection))
        }
        None => Err(PatternError::unmatched(
            pattern.route_id(),
            &trip.trip_id,
            format!("tied at {outbound} ordered stops in both directions"),
        )),
    }
}

/// Looks at the trip's neighbours of every shared-ambiguous stop. A neighbour
/// divergent in exactly one direction votes for it; only a unanimous vote counts.
fn shared_stop_vote(pattern: &CompiledRoutePattern, trip: &RawTrip) -> Option<DirectionId> {
    let mut votes = [false; 2];
    for (i, visit) in trip.visits.iter().enumerate() {
        if !pattern.is_shared(&visit.stop_id) {
            continue;
        }
        for j in [i.checked_sub(1), Some(i + 1)].into_iter().flatten() {
            let Some(neighbour) = trip.visits.get(j) else {
                continue;
            };
            let directions = pattern.divergent_directions(&neighbour.stop_id);
            if let [only] = directions.as_slice() {
                votes[only.index()] = true;
            }
        }
    }
    match votes {
        [true, false] => Some(DirectionId::Outbound),
        [false, true] => Some(DirectionId::Inbound),
        _ => None,
    }
}

/// Length of the longest non-decreasing subsequence of `positions`.
pub(crate) fn longest_ordered_run(positions: &[usize]) -> usize {
    // tails[k] is the smallest last position of any run of length k + 1
    let mut tails: Vec<usize> = Vec::new();
    for &p in positions {
        let k = tails.partition_point(|&t| t <= p);
        if k == tails.len() {
            tails.push(p);
        } else {
            tails[k] = p;
        }
    }
    tails.len()
}

fn display_name(declared: &str, trip: &RawTrip, labels: &impl LabelCleaner) -> String {
    if !declared.is_empty() {
        return declared.to_string();
    }
    match trip.headsign.as_deref() {
        Some(headsign) => labels.clean_headsign(headsign),
        None => {
            warn!(route = %trip.route_id, trip = %trip.trip_id, "Trip has no display name");
            String::new()
        }
    }
}
