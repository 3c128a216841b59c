//! Relative order of two stops within one direction of a route.
//!
//! Feed `stop_sequence` numbers can't be trusted around shared-ambiguous
//! stops, so the canonical pattern decides whenever it knows both stops.

use std::cmp::Ordering;

use crate::identifiers::StopId;
use crate::model::{DirectionId, StopVisit};
use crate::pattern::CompiledRoutePattern;

/// Orders `stop_a` against `stop_b` for `direction`. `Less` means `stop_a` comes first.
///
/// Canonical positions win when both stops have one in `direction`; in every
/// other case (shared-ambiguous or unknown stops) the feed sequence numbers
/// decide, and equal numbers leave the stops equal.
///
/// The result is not transitive once canonical and non-canonical stops mix:
/// two canonical stops can be ordered by position while a shared stop sits
/// between them by feed number in the opposite sense. Use it for pairwise
/// questions and merges, never as a `sort_by` key.
pub fn compare_order(
    pattern: &CompiledRoutePattern,
    direction: DirectionId,
    stop_a: &StopId,
    stop_b: &StopId,
    seq_a: u32,
    seq_b: u32,
) -> Ordering {
    match (
        pattern.position(direction, stop_a),
        pattern.position(direction, stop_b),
    ) {
        (Some(a), Some(b)) => a.cmp(&b),
        _ => seq_a.cmp(&seq_b),
    }
}

/// [`compare_order`] over two visits.
pub fn compare_visits(
    pattern: &CompiledRoutePattern,
    direction: DirectionId,
    a: &StopVisit,
    b: &StopVisit,
) -> Ordering {
    compare_order(pattern, direction, &a.stop_id, &b.stop_id, a.sequence, b.sequence)
}
