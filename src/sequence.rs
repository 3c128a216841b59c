//! Merges the stop lists of many trips into one stop sequence per direction.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::identifiers::StopId;
use crate::model::{ClassifiedTrip, DirectionId, StopVisit};
use crate::order::compare_visits;
use crate::pattern::CompiledRoutePattern;

/// Merges `lists` in order into a single list holding each stop once.
///
/// When one list proves that a stop comes before another (it lists both), that
/// order is kept; otherwise `cmp` decides and ties keep the earlier list's stop
/// first. The result is renumbered from 1.
pub fn merge_stop_lists<F>(lists: &[&[StopVisit]], mut cmp: F) -> Vec<StopVisit>
where
    F: FnMut(&StopVisit, &StopVisit) -> Ordering,
{
    let mut merged: Vec<StopVisit> = Vec::new();
    for list in lists {
        merged = merge_two(&merged, list, &mut cmp);
    }
    for (i, visit) in merged.iter_mut().enumerate() {
        visit.sequence = i as u32 + 1;
    }
    merged
}

fn merge_two<F>(current: &[StopVisit], next: &[StopVisit], cmp: &mut F) -> Vec<StopVisit>
where
    F: FnMut(&StopVisit, &StopVisit) -> Ordering,
{
    let mut merged = Vec::with_capacity(current.len() + next.len());
    let mut seen: HashSet<&StopId> = HashSet::new();
    let (mut i, mut j) = (0, 0);
    loop {
        while i < current.len() && seen.contains(&current[i].stop_id) {
            i += 1;
        }
        while j < next.len() && seen.contains(&next[j].stop_id) {
            j += 1;
        }

        let take_current = match (current.get(i), next.get(j)) {
            (None, None) => break,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (Some(a), Some(b)) => {
                if a.stop_id == b.stop_id {
                    true
                } else if next[j + 1..].iter().any(|v| v.stop_id == a.stop_id) {
                    false
                } else if current[i + 1..].iter().any(|v| v.stop_id == b.stop_id) {
                    true
                } else {
                    cmp(a, b) != Ordering::Greater
                }
            }
        };

        let visit = if take_current {
            i += 1;
            &current[i - 1]
        } else {
            j += 1;
            &next[j - 1]
        };
        seen.insert(&visit.stop_id);
        merged.push(visit.clone());
    }
    merged
}

/// Stop sequence of one direction, merged from `trips` of that direction.
///
/// Longer trips go first (ties by trip id) so the most complete trip sets the
/// skeleton. With a pattern, the Stop Order Resolver places stops the trips
/// can't order between themselves; without one, feed sequence numbers do.
pub fn direction_stop_sequence(
    pattern: Option<&CompiledRoutePattern>,
    direction: DirectionId,
    trips: &[&ClassifiedTrip],
) -> Vec<StopVisit> {
    let mut ordered: Vec<&ClassifiedTrip> = trips
        .iter()
        .copied()
        .filter(|t| t.direction_id == direction)
        .collect();
    ordered.sort_by(|a, b| {
        b.trip
            .visits
            .len()
            .cmp(&a.trip.visits.len())
            .then_with(|| a.trip_id().cmp(b.trip_id()))
    });
    let lists: Vec<&[StopVisit]> = ordered.iter().map(|t| t.trip.visits.as_slice()).collect();

    match pattern {
        Some(pattern) => merge_stop_lists(&lists, |a, b| compare_visits(pattern, direction, a, b)),
        None => merge_stop_lists(&lists, |a, b| a.sequence.cmp(&b.sequence)),
    }
}
