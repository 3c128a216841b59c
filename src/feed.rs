//! Minimal GTFS loader: just the stops, trips and stop times the classifier needs.
//!
//! Calendars, routes.txt and shapes are ignored.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::identifiers::{RouteId, ServiceId, StopId, TripId};
use crate::model::{DirectionId, RawTrip, Stop, StopVisit};

/// Parsed feed contents.
#[derive(Debug, Default)]
pub struct Feed {
    pub stops: BTreeMap<StopId, Stop>,
    /// In trips.txt order, each with its visits sorted by `stop_sequence`.
    pub trips: Vec<RawTrip>,
}

impl Feed {
    /// Loads `stops.txt`, `trips.txt` and `stop_times.txt` from `dir`.
    #[tracing::instrument(skip_all)]
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        debug!(dir = %dir.display(), "Loading feed");
        let feed = Self::from_readers(
            open(dir, "stops.txt")?,
            open(dir, "trips.txt")?,
            open(dir, "stop_times.txt")?,
        )?;
        info!(
            stops = feed.stops.len(),
            trips = feed.trips.len(),
            "Feed loaded"
        );
        Ok(feed)
    }

    pub fn from_readers<S: Read, T: Read, ST: Read>(
        stops: S,
        trips: T,
        stop_times: ST,
    ) -> Result<Self> {
        let stops = load_stops(stops).context("stops.txt")?;
        let mut trips = load_trips(trips).context("trips.txt")?;
        let mut visits = load_stop_times(stop_times, &stops).context("stop_times.txt")?;

        for trip in &mut trips {
            trip.visits = match visits.remove(&trip.trip_id) {
                Some(list) => list,
                None => bail!("Trip {} has no stop times", trip.trip_id),
            };
        }

        if !visits.is_empty() {
            warn!(
                unknown_trips = ?visits.keys().collect::<Vec<_>>(),
                "Stop times defined for unknown trips"
            );
        }

        Ok(Self { stops, trips })
    }

    /// Trips of one route, in feed order.
    pub fn trips_of<'a>(&'a self, route: &'a RouteId) -> impl Iterator<Item = &'a RawTrip> + 'a {
        self.trips.iter().filter(move |t| &t.route_id == route)
    }
}

fn open(dir: &Path, name: &str) -> Result<File> {
    let path = dir.join(name);
    File::open(&path).with_context(|| format!("opening {}", path.display()))
}

#[derive(Deserialize)]
struct StopRecord {
    stop_id: StopId,
    #[serde(default)]
    stop_name: String,
}

#[derive(Deserialize)]
struct TripRecord {
    route_id: RouteId,
    service_id: ServiceId,
    trip_id: TripId,
    #[serde(default)]
    trip_headsign: Option<String>,
    #[serde(default)]
    direction_id: Option<u8>,
}

#[derive(Deserialize)]
struct StopTimeRecord {
    trip_id: TripId,
    stop_id: StopId,
    stop_sequence: u32,
}

fn load_stops<R: Read>(reader: R) -> Result<BTreeMap<StopId, Stop>> {
    let mut stops = BTreeMap::new();
    for rec in csv::Reader::from_reader(reader).deserialize() {
        let rec: StopRecord = rec?;
        if stops.contains_key(&rec.stop_id) {
            bail!("Duplicate stop_id {}", rec.stop_id);
        }
        let stop = Stop {
            id: rec.stop_id.clone(),
            name: rec.stop_name,
        };
        stops.insert(rec.stop_id, stop);
    }
    Ok(stops)
}

fn load_trips<R: Read>(reader: R) -> Result<Vec<RawTrip>> {
    let mut trips = Vec::new();
    for rec in csv::Reader::from_reader(reader).deserialize() {
        let rec: TripRecord = rec?;
        let direction_id = match rec.direction_id {
            None => None,
            Some(x) => match DirectionId::from_gtfs(x) {
                Some(d) => Some(d),
                None => bail!("Trip {} has unknown direction_id {}", rec.trip_id, x),
            },
        };
        trips.push(RawTrip {
            trip_id: rec.trip_id,
            route_id: rec.route_id,
            service_id: rec.service_id,
            direction_id,
            headsign: rec.trip_headsign.filter(|h| !h.trim().is_empty()),
            visits: Vec::new(),
        });
    }
    Ok(trips)
}

fn load_stop_times<R: Read>(
    reader: R,
    stops: &BTreeMap<StopId, Stop>,
) -> Result<BTreeMap<TripId, Vec<StopVisit>>> {
    let mut visits: BTreeMap<TripId, Vec<StopVisit>> = BTreeMap::new();
    for rec in csv::Reader::from_reader(reader).deserialize() {
        let rec: StopTimeRecord = rec?;
        if !stops.contains_key(&rec.stop_id) {
            bail!("Trip {} visits unknown stop {}", rec.trip_id, rec.stop_id);
        }
        visits.entry(rec.trip_id).or_default().push(StopVisit {
            stop_id: rec.stop_id,
            sequence: rec.stop_sequence,
        });
    }

    // The file doesn't have to be in order
    for list in visits.values_mut() {
        list.sort_by_key(|v| v.sequence);
    }
    Ok(visits)
}
