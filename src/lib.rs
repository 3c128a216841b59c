pub mod classify;
pub mod error;
pub mod feed;
pub mod identifiers;
pub mod label;
pub mod model;
pub mod order;
pub mod output;
pub mod pattern;
pub mod pipeline;
pub mod registry;
pub mod report;
pub mod sequence;

pub use classify::{classify, classify_with_labels};
pub use error::{PatternError, Result};
pub use identifiers::{RouteId, ServiceId, StopId, TripId};
pub use model::{ClassifiedTrip, DirectionId, RawTrip, Resolution, StopVisit};
pub use order::compare_order;
pub use pattern::{CompiledRoutePattern, PatternDescriptor, PatternEntry, StopAnnotation};
pub use registry::{PatternConfig, PatternRegistry};
