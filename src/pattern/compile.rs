//! Validation and indexing of a route's two canonical stop lists.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::debug;

use super::{PatternDescriptor, PatternEntry, StopAnnotation};
use crate::error::{PatternError, Result};
use crate::identifiers::{RouteId, StopId};
use crate::model::{DirectionId, Stop};

/// Both directions of a route, validated and indexed.
///
/// Built once and only read afterwards, so a single instance can be shared by
/// every trip of the route, across threads if needed.
#[derive(Clone, Debug)]
pub struct CompiledRoutePattern {
    route_id: RouteId,
    descriptors: [PatternDescriptor; 2],
    // Canonical position per direction; shared-ambiguous stops never appear here
    positions: HashMap<StopId, [Option<usize>; 2]>,
    shared: HashSet<StopId>,
    divergent: [HashMap<StopId, usize>; 2],
    unambiguous_len: [usize; 2],
}

impl CompiledRoutePattern {
    /// Validates the outbound (0) and inbound (1) descriptors of one route.
    pub fn compile(outbound: PatternDescriptor, inbound: PatternDescriptor) -> Result<Self> {
        let route_id = outbound.route_id.clone();
        if inbound.route_id != route_id {
            return Err(PatternError::invalid(
                &route_id,
                format!("inbound descriptor belongs to route {}", inbound.route_id),
            ));
        }
        if outbound.direction_id != DirectionId::Outbound
            || inbound.direction_id != DirectionId::Inbound
        {
            return Err(PatternError::invalid(
                &route_id,
                format!(
                    "expected descriptors for directions 0 and 1, got {} and {}",
                    outbound.direction_id, inbound.direction_id
                ),
            ));
        }

        let descriptors = [outbound, inbound];
        validate(&route_id, &descriptors)?;

        let mut positions: HashMap<StopId, [Option<usize>; 2]> = HashMap::new();
        let mut shared = HashSet::new();
        let mut divergent: [HashMap<StopId, usize>; 2] = Default::default();
        let mut unambiguous_len = [0; 2];
        for direction in DirectionId::ALL {
            let d = direction.index();
            for (pos, entry) in descriptors[d].stops.iter().enumerate() {
                match entry.annotation {
                    StopAnnotation::SharedAmbiguous => {
                        shared.insert(entry.stop_id.clone());
                        continue;
                    }
                    StopAnnotation::Divergent => {
                        divergent[d].insert(entry.stop_id.clone(), pos);
                    }
                    StopAnnotation::Plain | StopAnnotation::Equal => {}
                }
                positions.entry(entry.stop_id.clone()).or_default()[d] = Some(pos);
                unambiguous_len[d] += 1;
            }
        }

        debug!(
            route = %route_id,
            outbound_stops = descriptors[0].stops.len(),
            inbound_stops = descriptors[1].stops.len(),
            shared = shared.len(),
            "Compiled route pattern"
        );

        Ok(Self {
            route_id,
            descriptors,
            positions,
            shared,
            divergent,
            unambiguous_len,
        })
    }

    /// Like [`compile`](Self::compile), and also rejects stops the feed doesn't know.
    pub fn compile_with_stops(
        outbound: PatternDescriptor,
        inbound: PatternDescriptor,
        stops: &BTreeMap<StopId, Stop>,
    ) -> Result<Self> {
        let pattern = Self::compile(outbound, inbound)?;
        pattern.check_stops(stops)?;
        Ok(pattern)
    }

    pub fn check_stops(&self, stops: &BTreeMap<StopId, Stop>) -> Result<()> {
        for descriptor in &self.descriptors {
            if let Some(entry) = descriptor
                .stops
                .iter()
                .find(|e| !stops.contains_key(&e.stop_id))
            {
                return Err(PatternError::invalid(
                    &self.route_id,
                    format!(
                        "direction {} references unknown stop {}",
                        descriptor.direction_id, entry.stop_id
                    ),
                ));
            }
        }
        Ok(())
    }

    pub fn route_id(&self) -> &RouteId {
        &self.route_id
    }

    pub fn descriptor(&self, direction: DirectionId) -> &PatternDescriptor {
        &self.descriptors[direction.index()]
    }

    pub fn headsign(&self, direction: DirectionId) -> &str {
        &self.descriptor(direction).headsign
    }

    /// True when the direction has no canonical stops and takes the complement.
    pub fn is_complement(&self, direction: DirectionId) -> bool {
        self.descriptor(direction).is_empty()
    }

    /// Canonical position of an unambiguous stop in `direction`.
    pub fn position(&self, direction: DirectionId, stop: &StopId) -> Option<usize> {
        self.positions
            .get(stop)
            .and_then(|p| p[direction.index()])
    }

    pub fn is_shared(&self, stop: &StopId) -> bool {
        self.shared.contains(stop)
    }

    pub fn is_divergent(&self, direction: DirectionId, stop: &StopId) -> bool {
        self.divergent[direction.index()].contains_key(stop)
    }

    /// Directions in which `stop` is divergent.
    pub fn divergent_directions(&self, stop: &StopId) -> Vec<DirectionId> {
        DirectionId::ALL
            .into_iter()
            .filter(|d| self.is_divergent(*d, stop))
            .collect()
    }

    /// Number of canonical stops of `direction` that are not shared-ambiguous.
    pub fn unambiguous_len(&self, direction: DirectionId) -> usize {
        self.unambiguous_len[direction.index()]
    }
}

fn validate(route: &RouteId, descriptors: &[PatternDescriptor; 2]) -> Result<()> {
    if descriptors.iter().all(|d| d.is_empty()) {
        return Err(PatternError::invalid(
            route,
            "both directions have empty stop lists",
        ));
    }

    let mut indexed: [HashMap<&StopId, StopAnnotation>; 2] = Default::default();
    for (d, descriptor) in descriptors.iter().enumerate() {
        for entry in &descriptor.stops {
            if indexed[d]
                .insert(&entry.stop_id, entry.annotation)
                .is_some()
            {
                return Err(PatternError::invalid(
                    route,
                    format!(
                        "stop {} listed twice in direction {}",
                        entry.stop_id, descriptor.direction_id
                    ),
                ));
            }
        }
    }

    for entry in &descriptors[0].stops {
        let Some(other) = indexed[1].get(&entry.stop_id).copied() else {
            continue;
        };
        if entry.annotation == StopAnnotation::Plain || other == StopAnnotation::Plain {
            return Err(PatternError::invalid(
                route,
                format!(
                    "stop {} is in both directions without an annotation",
                    entry.stop_id
                ),
            ));
        }
        if entry.annotation != other {
            return Err(PatternError::invalid(
                route,
                format!(
                    "stop {} is {} in direction 0 but {} in direction 1",
                    entry.stop_id, entry.annotation, other
                ),
            ));
        }
    }

    // An equal stop only one direction lists must bracket a junction there
    for direction in DirectionId::ALL {
        let (d, o) = (direction.index(), direction.other().index());
        let stops = &descriptors[d].stops;
        for (i, entry) in stops.iter().enumerate() {
            if entry.annotation != StopAnnotation::Equal || indexed[o].contains_key(&entry.stop_id) {
                continue;
            }
            let next_to_junction = [i.checked_sub(1), Some(i + 1)]
                .into_iter()
                .flatten()
                .filter_map(|j| stops.get(j))
                .any(|e| is_junction_entry(e.annotation));
            if !next_to_junction {
                return Err(PatternError::invalid(
                    route,
                    format!(
                        "equal stop {} of direction {} is neither in direction {} nor next to a divergent or shared stop",
                        entry.stop_id,
                        direction,
                        direction.other()
                    ),
                ));
            }
        }
    }

    let common: HashSet<&StopId> = descriptors[0]
        .stops
        .iter()
        .filter(|e| {
            e.annotation == StopAnnotation::Equal
                && indexed[1].get(&e.stop_id) == Some(&StopAnnotation::Equal)
        })
        .map(|e| &e.stop_id)
        .collect();
    let trunks = [
        trunk_runs(&descriptors[0].stops, &common),
        trunk_runs(&descriptors[1].stops, &common),
    ];
    for direction in DirectionId::ALL {
        let (d, o) = (direction.index(), direction.other().index());
        for run in &trunks[d] {
            if !trunks[o].iter().any(|other| same_trunk(run, other)) {
                return Err(PatternError::invalid(
                    route,
                    format!(
                        "shared trunk [{}] of direction {} has no matching run in direction {}",
                        join(run),
                        direction,
                        direction.other()
                    ),
                ));
            }
        }
    }

    let junctions = [
        junctions(&descriptors[0].stops),
        junctions(&descriptors[1].stops),
    ];
    for direction in DirectionId::ALL {
        let (d, o) = (direction.index(), direction.other().index());
        for junction in &junctions[d] {
            let shared: Vec<&StopId> = junction
                .shared
                .iter()
                .copied()
                .filter(|s| indexed[o].contains_key(*s))
                .collect();
            let Some(first) = shared.first() else {
                continue;
            };
            let Some(mirror) = junctions[o].iter().find(|m| m.shared.contains(first)) else {
                continue;
            };
            let mirror_shared: Vec<&StopId> = mirror
                .shared
                .iter()
                .copied()
                .filter(|s| indexed[d].contains_key(*s))
                .collect();

            let same = shared == mirror_shared;
            let reversed = shared.iter().eq(mirror_shared.iter().rev());
            if !same && !reversed {
                return Err(PatternError::invalid(
                    route,
                    format!(
                        "shared stops [{}] of direction {} don't line up with [{}] in direction {}",
                        join(&shared),
                        direction,
                        join(&mirror_shared),
                        direction.other()
                    ),
                ));
            }

            let [before, after] = junction.brackets();
            let [m_before, m_after] = mirror.brackets();
            let paired = (same && before == m_before && after == m_after)
                || (reversed && before == m_after && after == m_before);
            if !paired {
                return Err(PatternError::invalid(
                    route,
                    format!(
                        "equal stops around shared stops [{}] of direction {} don't mirror direction {}",
                        join(&shared),
                        direction,
                        direction.other()
                    ),
                ));
            }
        }
    }

    for descriptor in descriptors {
        let stops = &descriptor.stops;
        for (i, entry) in stops.iter().enumerate() {
            if entry.annotation == StopAnnotation::Divergent && !brackets_trunk(stops, i) {
                return Err(PatternError::invalid(
                    route,
                    format!(
                        "divergent stop {} of direction {} is not next to a shared trunk",
                        entry.stop_id, descriptor.direction_id
                    ),
                ));
            }
        }
    }

    Ok(())
}

fn join(ids: &[&StopId]) -> String {
    ids.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
}

fn is_junction_entry(annotation: StopAnnotation) -> bool {
    matches!(
        annotation,
        StopAnnotation::Divergent | StopAnnotation::SharedAmbiguous
    )
}

/// Maximal runs of consecutive `Equal` entries, keeping only the stops both
/// directions mark `Equal`. Runs left empty are dropped.
fn trunk_runs<'a>(stops: &'a [PatternEntry], common: &HashSet<&StopId>) -> Vec<Vec<&'a StopId>> {
    let mut runs = Vec::new();
    let mut current: Vec<&StopId> = Vec::new();
    for entry in stops {
        if entry.annotation != StopAnnotation::Equal {
            if !current.is_empty() {
                runs.push(std::mem::take(&mut current));
            }
        } else if common.contains(&entry.stop_id) {
            current.push(&entry.stop_id);
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }
    runs
}

// Opposite directions ride a trunk either the same way or exactly reversed.
fn same_trunk(a: &[&StopId], b: &[&StopId]) -> bool {
    a == b || a.iter().eq(b.iter().rev())
}

/// A maximal run of divergent and shared-ambiguous entries, where the two
/// directions part and meet again.
struct Junction<'a> {
    shared: Vec<&'a StopId>,
    before: Option<&'a PatternEntry>,
    after: Option<&'a PatternEntry>,
}

impl Junction<'_> {
    /// Whether the entry just before and just after the run is `Equal`.
    fn brackets(&self) -> [bool; 2] {
        [self.before, self.after]
            .map(|e| e.is_some_and(|e| e.annotation == StopAnnotation::Equal))
    }
}

fn junctions(stops: &[PatternEntry]) -> Vec<Junction<'_>> {
    let mut found = Vec::new();
    let mut i = 0;
    while i < stops.len() {
        if !is_junction_entry(stops[i].annotation) {
            i += 1;
            continue;
        }
        let start = i;
        while i < stops.len() && is_junction_entry(stops[i].annotation) {
            i += 1;
        }
        found.push(Junction {
            shared: stops[start..i]
                .iter()
                .filter(|e| e.annotation == StopAnnotation::SharedAmbiguous)
                .map(|e| &e.stop_id)
                .collect(),
            before: start.checked_sub(1).map(|j| &stops[j]),
            after: stops.get(i),
        });
    }
    found
}

/// Walks outward from entry `i` across divergent and shared-ambiguous entries
/// and reports whether either side lands on an equal stop. Junctions holding
/// shared stops also have their equal stops paired with the other direction.
fn brackets_trunk(stops: &[PatternEntry], i: usize) -> bool {
    let before = stops[..i]
        .iter()
        .rev()
        .find(|e| !is_junction_entry(e.annotation));
    let after = stops[i + 1..]
        .iter()
        .find(|e| !is_junction_entry(e.annotation));
    [before, after]
        .into_iter()
        .flatten()
        .any(|e| e.annotation == StopAnnotation::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DirectionId::{Inbound, Outbound};

    fn pattern(outbound: &[&str], inbound: &[&str]) -> Result<CompiledRoutePattern> {
        CompiledRoutePattern::compile(
            PatternDescriptor::from_markers("1", Outbound, "Douglas", outbound)?,
            PatternDescriptor::from_markers("1", Inbound, "Downtown", inbound)?,
        )
    }

    fn reason(err: PatternError) -> String {
        match err {
            PatternError::InvalidPattern { reason, .. } => reason,
            other => panic!("expected InvalidPattern, got {other:?}"),
        }
    }

    fn divergent_route() -> CompiledRoutePattern {
        pattern(
            &["T0", "P ==", "Q ==", "D0 !=", "X <>", "R ==", "T1"],
            &["U1", "R ==", "X <>", "D1 !=", "Q ==", "P ==", "U0"],
        )
        .unwrap()
    }

    #[test]
    fn test_compile_indexes_positions() {
        let p = divergent_route();
        let id = |s: &str| StopId::new(s);

        assert_eq!(p.position(Outbound, &id("T0")), Some(0));
        assert_eq!(p.position(Outbound, &id("Q")), Some(2));
        assert_eq!(p.position(Inbound, &id("Q")), Some(4));
        assert_eq!(p.position(Inbound, &id("T0")), None);
        assert_eq!(p.position(Outbound, &id("X")), None);
        assert!(p.is_shared(&id("X")));
        assert!(p.is_divergent(Outbound, &id("D0")));
        assert!(!p.is_divergent(Inbound, &id("D0")));
        assert_eq!(p.divergent_directions(&id("D1")), vec![Inbound]);
        assert_eq!(p.unambiguous_len(Outbound), 6);
        assert_eq!(p.headsign(Inbound), "Downtown");
    }

    #[test]
    fn test_pure_reversal_compiles() {
        let p = pattern(&["A ==", "B ==", "C =="], &["C ==", "B ==", "A =="]).unwrap();
        assert_eq!(p.position(Inbound, &StopId::new("A")), Some(2));
    }

    #[test]
    fn test_equal_stops_are_symmetric() {
        let p = divergent_route();
        for direction in DirectionId::ALL {
            for entry in &p.descriptor(direction).stops {
                if entry.annotation == StopAnnotation::Equal {
                    let mirrored = p
                        .descriptor(direction.other())
                        .stops
                        .iter()
                        .find(|e| e.stop_id == entry.stop_id)
                        .unwrap();
                    assert_eq!(mirrored.annotation, StopAnnotation::Equal);
                }
            }
        }
    }

    #[test]
    fn test_unannotated_overlap_is_rejected() {
        let err = pattern(&["A", "B"], &["B", "C"]).unwrap_err();
        assert!(reason(err).contains("without an annotation"));
    }

    #[test]
    fn test_conflicting_annotations_are_rejected() {
        let err = pattern(&["A ==", "B <>"], &["B ==", "A =="]).unwrap_err();
        assert!(reason(err).contains("but"));
    }

    #[test]
    fn test_equal_stop_missing_from_other_direction() {
        let err = pattern(&["A ==", "B"], &["C", "D"]).unwrap_err();
        assert!(reason(err).contains("neither in direction 1"));
    }

    // Juneau routes 1, 3, 4 and 5. Terminals served both ways are marked equal;
    // the equal stops around each shared stop differ per direction.
    fn juneau_route(route: &str) -> (Vec<&'static str>, Vec<&'static str>) {
        match route {
            "1" => (
                vec!["811771 ==", "811672", "811789 ==", "811790 != <>", "811791 ==", "811821 =="],
                vec!["811821 ==", "811810 ==", "811790 != <>", "811811 ==", "811771 =="],
            ),
            "3" => (
                vec!["811771 ==", "811687 ==", "811688 != <>", "811691 != <>", "811692 ==", "811701", "811717 =="],
                vec!["811717 ==", "811816", "811754 ==", "839422 !=", "811688 != <>", "811691 != <>", "811755 ==", "811771 =="],
            ),
            "4" => (
                vec!["811771 ==", "811687 ==", "811688 != <>", "811691 != <>", "811692 ==", "811731", "811749 =="],
                vec!["811749 ==", "811816", "811754 ==", "839422 !=", "811688 != <>", "811691 != <>", "811755 ==", "811771 =="],
            ),
            "5" => (
                vec!["540 ==", "430 ++", "541 =="],
                vec!["541 ==", "451 ++", "540 =="],
            ),
            other => panic!("no fixture for route {other}"),
        }
    }

    #[test]
    fn test_juneau_routes_compile() {
        for route in ["1", "3", "4", "5"] {
            let (outbound, inbound) = juneau_route(route);
            let compiled = CompiledRoutePattern::compile(
                PatternDescriptor::from_markers(route, Outbound, "", &outbound).unwrap(),
                PatternDescriptor::from_markers(route, Inbound, "", &inbound).unwrap(),
            );
            assert!(compiled.is_ok(), "route {route}: {:?}", compiled.err());
        }

        let (outbound, inbound) = juneau_route("3");
        let p = pattern(&outbound, &inbound).unwrap();
        assert!(p.is_shared(&StopId::new("811688")));
        assert_eq!(p.position(Inbound, &StopId::new("839422")), Some(3));
        assert_eq!(p.divergent_directions(&StopId::new("839422")), vec![Inbound]);
        assert_eq!(p.position(Outbound, &StopId::new("811692")), Some(4));
    }

    #[test]
    fn test_equal_stops_around_shared_stop_must_mirror() {
        // Direction 1 has no equal stop after X
        let err = pattern(&["A ==", "X <>", "B =="], &["C ==", "X <>", "E"]).unwrap_err();
        assert!(reason(err).contains("don't mirror"));

        assert!(pattern(&["A ==", "X <>", "B =="], &["C ==", "X <>", "E =="]).is_ok());
    }

    #[test]
    fn test_shared_stops_must_line_up() {
        let err = pattern(
            &["A ==", "X <>", "Y <>", "B =="],
            &["C ==", "X <>", "E ==", "Y <>", "F =="],
        )
        .unwrap_err();
        assert!(reason(err).contains("don't line up"));
    }

    #[test]
    fn test_equal_stop_of_one_direction_next_to_divergent_run() {
        // Juneau route 8 only has an outbound list
        let p = pattern(
            &["811768", "811673 ==", "811674 !=", "811675 !=", "811686 !=", "811687 ==", "811717"],
            &[],
        )
        .unwrap();
        assert!(p.is_complement(Inbound));
    }

    #[test]
    fn test_trunk_must_match_as_a_run() {
        // Same equal stops, but direction 1 splits the trunk with a plain stop
        let err = pattern(&["A ==", "B ==", "C =="], &["C ==", "Z", "B ==", "A =="]).unwrap_err();
        assert!(reason(err).contains("shared trunk"));
    }

    #[test]
    fn test_trunk_order_must_be_same_or_reversed() {
        let err = pattern(&["A ==", "B ==", "C =="], &["B ==", "A ==", "C =="]).unwrap_err();
        assert!(reason(err).contains("shared trunk"));
    }

    #[test]
    fn test_divergent_without_trunk_is_rejected() {
        let err = pattern(&["A", "D !=", "B"], &["C", "E"]).unwrap_err();
        assert!(reason(err).contains("not next to a shared trunk"));
    }

    #[test]
    fn test_divergent_reaches_trunk_across_shared_stops() {
        assert!(pattern(&["A ==", "X <>", "D !=", "B"], &["X <>", "A =="]).is_ok());
    }

    #[test]
    fn test_duplicate_stop_in_one_direction() {
        let err = pattern(&["A", "B", "A"], &["C"]).unwrap_err();
        assert!(reason(err).contains("listed twice"));
    }

    #[test]
    fn test_both_empty_is_rejected() {
        assert!(pattern(&[], &[]).is_err());
    }

    #[test]
    fn test_one_empty_direction_is_a_complement() {
        let p = pattern(&[], &["811750", "811770"]).unwrap();
        assert!(p.is_complement(Outbound));
        assert!(!p.is_complement(Inbound));
    }

    #[test]
    fn test_mismatched_descriptors() {
        let a = PatternDescriptor::from_markers("1", Outbound, "", &["A"]).unwrap();
        let b = PatternDescriptor::from_markers("2", Inbound, "", &["B"]).unwrap();
        assert!(CompiledRoutePattern::compile(a.clone(), b).is_err());

        let c = PatternDescriptor::from_markers("1", Outbound, "", &["B"]).unwrap();
        let err = CompiledRoutePattern::compile(a, c).unwrap_err();
        assert!(reason(err).contains("directions 0 and 1"));
    }

    #[test]
    fn test_unknown_stop_is_rejected() {
        let stops: BTreeMap<StopId, Stop> = ["A", "B"]
            .into_iter()
            .map(|s| {
                (
                    StopId::new(s),
                    Stop {
                        id: StopId::new(s),
                        name: s.to_string(),
                    },
                )
            })
            .collect();
        let ok = CompiledRoutePattern::compile_with_stops(
            PatternDescriptor::from_markers("1", Outbound, "", &["A"]).unwrap(),
            PatternDescriptor::from_markers("1", Inbound, "", &["B"]).unwrap(),
            &stops,
        );
        assert!(ok.is_ok());

        let err = CompiledRoutePattern::compile_with_stops(
            PatternDescriptor::from_markers("1", Outbound, "", &["A"]).unwrap(),
            PatternDescriptor::from_markers("1", Inbound, "", &["C"]).unwrap(),
            &stops,
        )
        .unwrap_err();
        assert!(reason(err).contains("unknown stop C"));
    }
}
