//! Run totals for a classification: trips per direction, per route and per resolution.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::identifiers::RouteId;
use crate::model::{ClassifiedTrip, DirectionId, Resolution};
use crate::registry::PatternRegistry;

/// Totals for one classification run.
#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub patterned_routes: usize,
    pub total_trips: usize,

    // direction split
    pub outbound: usize,
    pub inbound: usize,

    pub by_resolution: BTreeMap<Resolution, usize>,
    pub routes: Vec<RouteReport>,
}

#[derive(Debug, Default, Serialize)]
pub struct RouteReport {
    pub route_id: RouteId,
    pub patterned: bool,
    pub trips: usize,
    pub outbound: usize,
    pub inbound: usize,
    /// Trips whose direction needed a tie-break (context or feed direction).
    pub tie_breaks: usize,
}

impl RunReport {
    pub fn from_classified(registry: &PatternRegistry, trips: &[ClassifiedTrip]) -> Self {
        let mut s = RunReport {
            generated_at: Utc::now(),
            patterned_routes: registry.len(),
            total_trips: trips.len(),
            ..Default::default()
        };

        let mut routes: BTreeMap<RouteId, RouteReport> = BTreeMap::new();
        for t in trips {
            let route = routes
                .entry(t.route_id().clone())
                .or_insert_with(|| RouteReport {
                    route_id: t.route_id().clone(),
                    patterned: registry.contains(t.route_id()),
                    ..Default::default()
                });
            route.trips += 1;

            match t.direction_id {
                DirectionId::Outbound => {
                    s.outbound += 1;
                    route.outbound += 1;
                }
                DirectionId::Inbound => {
                    s.inbound += 1;
                    route.inbound += 1;
                }
            }

            if is_tie_break(t.resolution) {
                route.tie_breaks += 1;
            }

            *s.by_resolution.entry(t.resolution).or_default() += 1;
        }

        s.routes = routes.into_values().collect();
        s
    }

    pub fn pct(part: usize, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            (part as f64 / total as f64) * 100.0
        }
    }

    pub fn resolved_by(&self, resolution: Resolution) -> usize {
        self.by_resolution.get(&resolution).copied().unwrap_or(0)
    }

    /// Share of trips that needed a tie-break.
    pub fn tie_break_pct(&self) -> f64 {
        let ties = self.resolved_by(Resolution::SharedStopContext)
            + self.resolved_by(Resolution::FeedDirection);
        Self::pct(ties, self.total_trips)
    }
}

fn is_tie_break(resolution: Resolution) -> bool {
    matches!(
        resolution,
        Resolution::SharedStopContext | Resolution::FeedDirection
    )
}
