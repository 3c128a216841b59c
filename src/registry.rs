//! Pattern file loading and the per-route registry of compiled patterns.
//!
//! The pattern file is plain JSON:
//! ```json
//! {
//!   "routes": [
//!     {
//!       "route_id": "7",
//!       "directions": [
//!         { "direction_id": 0, "headsign": "", "stops": [] },
//!         { "direction_id": 1, "headsign": "Downtown Juneau",
//!           "stops": ["811750  # Fred Meyer", "811770"] }
//!       ]
//!     }
//!   ]
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{PatternError, Result};
use crate::identifiers::{RouteId, StopId};
use crate::model::{DirectionId, Stop};
use crate::pattern::{CompiledRoutePattern, PatternDescriptor, PatternEntry};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatternConfig {
    pub routes: Vec<RouteConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    pub route_id: RouteId,
    pub directions: Vec<DirectionConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectionConfig {
    pub direction_id: DirectionId,
    #[serde(default)]
    pub headsign: String,
    #[serde(default)]
    pub stops: Vec<PatternEntry>,
}

impl PatternConfig {
    /// Loads the pattern file at `path`.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading pattern file {}", path.display()))?;
        Self::from_json(&content).with_context(|| format!("parsing pattern file {}", path.display()))
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl RouteConfig {
    /// Splits the route into its outbound and inbound descriptors.
    pub fn descriptors(&self) -> Result<(PatternDescriptor, PatternDescriptor)> {
        let mut found: [Option<PatternDescriptor>; 2] = [None, None];
        for direction in &self.directions {
            let slot = &mut found[direction.direction_id.index()];
            if slot.is_some() {
                return Err(PatternError::invalid(
                    &self.route_id,
                    format!("direction {} declared more than once", direction.direction_id),
                ));
            }
            *slot = Some(PatternDescriptor::new(
                self.route_id.clone(),
                direction.direction_id,
                direction.headsign.clone(),
                direction.stops.clone(),
            ));
        }

        match found {
            [Some(outbound), Some(inbound)] => Ok((outbound, inbound)),
            [None, _] => Err(PatternError::invalid(&self.route_id, "direction 0 is not declared")),
            [_, None] => Err(PatternError::invalid(&self.route_id, "direction 1 is not declared")),
        }
    }
}

/// Compiled patterns keyed by route. Read-only once built.
#[derive(Debug, Default)]
pub struct PatternRegistry {
    routes: BTreeMap<RouteId, CompiledRoutePattern>,
}

impl PatternRegistry {
    /// Compiles every route of `config` without checking stop references.
    pub fn compile(config: &PatternConfig) -> Result<Self> {
        Self::build(config, None)
    }

    /// Compiles every route of `config`, rejecting stops missing from `stops`.
    pub fn compile_with_stops(
        config: &PatternConfig,
        stops: &BTreeMap<StopId, Stop>,
    ) -> Result<Self> {
        Self::build(config, Some(stops))
    }

    #[tracing::instrument(skip_all, fields(routes = config.routes.len()))]
    fn build(config: &PatternConfig, stops: Option<&BTreeMap<StopId, Stop>>) -> Result<Self> {
        let mut routes = BTreeMap::new();
        for route in &config.routes {
            if routes.contains_key(&route.route_id) {
                return Err(PatternError::invalid(
                    &route.route_id,
                    "route declared more than once",
                ));
            }
            let (outbound, inbound) = route.descriptors()?;
            let pattern = match stops {
                Some(stops) => CompiledRoutePattern::compile_with_stops(outbound, inbound, stops)?,
                None => CompiledRoutePattern::compile(outbound, inbound)?,
            };
            routes.insert(route.route_id.clone(), pattern);
        }

        info!(routes = routes.len(), "Compiled route patterns");
        Ok(Self { routes })
    }

    pub fn get(&self, route: &RouteId) -> Option<&CompiledRoutePattern> {
        self.routes.get(route)
    }

    pub fn contains(&self, route: &RouteId) -> bool {
        self.routes.contains_key(route)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RouteId, &CompiledRoutePattern)> {
        self.routes.iter()
    }
}
