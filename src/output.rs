//! Output formatting and persistence for classification results.
//!
//! Supports JSON logging, JSON files and a flat CSV of classified trips.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info};

use crate::identifiers::{RouteId, ServiceId, TripId};
use crate::model::{ClassifiedTrip, DirectionId, Resolution};
use csv::WriterBuilder;
use std::fs::File;
use std::path::Path;

/// One row of the classified trips CSV.
#[derive(Debug, Serialize)]
pub struct ClassifiedTripRecord {
    pub route_id: RouteId,
    pub trip_id: TripId,
    pub service_id: ServiceId,
    pub feed_direction_id: Option<DirectionId>,
    pub direction_id: DirectionId,
    pub headsign: String,
    pub resolution: Resolution,
    pub outbound_score: usize,
    pub inbound_score: usize,
    pub stop_count: usize,
}

impl From<&ClassifiedTrip> for ClassifiedTripRecord {
    fn from(c: &ClassifiedTrip) -> Self {
        Self {
            route_id: c.trip.route_id.clone(),
            trip_id: c.trip.trip_id.clone(),
            service_id: c.trip.service_id.clone(),
            feed_direction_id: c.trip.direction_id,
            direction_id: c.direction_id,
            headsign: c.headsign.clone(),
            resolution: c.resolution,
            outbound_score: c.scores.ordered(DirectionId::Outbound),
            inbound_score: c.scores.ordered(DirectionId::Inbound),
            stop_count: c.trip.visits.len(),
        }
    }
}

/// Logs any serializable value as pretty-printed JSON.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Writes `value` as pretty-printed JSON to `path`, replacing the file.
pub fn write_json<T: Serialize + ?Sized>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let path = path.as_ref();
    debug!(path = %path.display(), "Writing JSON");
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(file, value)?;
    Ok(())
}

/// Writes one CSV row per classified trip to `path`, replacing the file.
pub fn write_classified_trips(path: impl AsRef<Path>, trips: &[ClassifiedTrip]) -> Result<()> {
    let path = path.as_ref();
    debug!(path = %path.display(), rows = trips.len(), "Writing classified trips CSV");

    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = WriterBuilder::new().has_headers(true).from_writer(file);

    for trip in trips {
        writer.serialize(ClassifiedTripRecord::from(trip))?;
    }
    writer.flush()?;

    Ok(())
}
