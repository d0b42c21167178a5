//! Core primitive graph for collaborative map editing.
//! This crate owns the data model, identity matching, merge and closure
//! invariants; hosts only drive it.

pub mod aggregate;
pub mod backref;
pub mod closure;
pub mod graph;
pub mod logging;
pub mod matcher;
pub mod merge;
pub mod model;
pub mod visit;

pub use aggregate::{bounding_extent, collect_points, graph_extent, BoundsMode, Extent};
pub use backref::{is_referenced, references_of};
pub use closure::{add_primitive, deep_clone, delete_primitive, IdentityMap, Snapshot, SnapshotId};
pub use graph::{DataGraph, GraphError, GraphResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingConfig};
pub use matcher::IdentityMatcher;
pub use merge::{
    merge_graph, ConflictPolicy, MergeConflict, MergeOptions, MergeOutcome, MergeReport, Merger,
};
pub use model::coordinate::{EastNorth, LatLon, COORDINATE_EPSILON};
pub use model::primitive::{
    Member, Point, PointId, Primitive, PrimitiveKind, PrimitiveRef, PrimitiveState,
    PrimitiveValidationError, Relation, RelationId, Segment, SegmentId, ServerId, Tags, Way,
    WayId,
};
pub use visit::{PrimitiveView, Visitor};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
