//! Read-only folds over the points reachable from primitives.
//!
//! # Responsibility
//! - Collect the points a primitive is drawn from.
//! - Compute bounding extents in geographic or projected space.
//!
//! # Invariants
//! - Only live, complete points contribute; tombstones and incomplete
//!   primitives (and everything reached only through them) are skipped.
//! - Relations contribute nothing: these folds use the reduced
//!   point/segment/way contract.

use crate::graph::{DataGraph, GraphResult};
use crate::model::primitive::{Point, PointId, PrimitiveRef, Segment, SegmentId, Way, WayId};
use crate::visit::Visitor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Coordinate space a bounding extent is computed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundsMode {
    /// x = longitude, y = latitude (degrees).
    #[default]
    Geographic,
    /// x = east, y = north (spherical Mercator).
    Projected,
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {
    /// Degenerate extent covering one position.
    pub fn at(x: f64, y: f64) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
        }
    }

    pub fn extend(&mut self, x: f64, y: f64) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    pub fn union(&self, other: &Extent) -> Extent {
        let mut merged = *self;
        merged.extend(other.min_x, other.min_y);
        merged.extend(other.max_x, other.max_y);
        merged
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        (self.min_x..=self.max_x).contains(&x) && (self.min_y..=self.max_y).contains(&y)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// Walks segments and ways down to their points and hands every live point
/// to `on_point`.
struct ReachablePoints<F> {
    on_point: F,
}

impl<F: FnMut(PointId, &Point)> Visitor for ReachablePoints<F> {
    fn visit_point(&mut self, _: &DataGraph, id: PointId, point: &Point) -> GraphResult<()> {
        if point.state.is_usable() {
            (self.on_point)(id, point);
        }
        Ok(())
    }

    fn visit_segment(&mut self, graph: &DataGraph, id: SegmentId, segment: &Segment) -> GraphResult<()> {
        if !segment.state.is_usable() {
            return Ok(());
        }
        for endpoint in [segment.from, segment.to] {
            let point = graph.require_point(id.into(), endpoint)?;
            self.visit_point(graph, endpoint, point)?;
        }
        Ok(())
    }

    fn visit_way(&mut self, graph: &DataGraph, id: WayId, way: &Way) -> GraphResult<()> {
        if !way.state.is_usable() {
            return Ok(());
        }
        for segment_id in &way.segments {
            let segment = graph.require_segment(id.into(), *segment_id)?;
            self.visit_segment(graph, *segment_id, segment)?;
        }
        Ok(())
    }
}

/// Points reachable from `root` (a point yields itself, a segment its two
/// endpoints, a way the endpoints of all its segments).
pub fn collect_points(graph: &DataGraph, root: PrimitiveRef) -> GraphResult<BTreeSet<PointId>> {
    let mut points = BTreeSet::new();
    let mut walker = ReachablePoints {
        on_point: |id: PointId, _: &Point| {
            points.insert(id);
        },
    };
    root.accept(graph, &mut walker)?;
    drop(walker);
    Ok(points)
}

fn extent_fold(mode: BoundsMode, extent: &mut Option<Extent>) -> impl FnMut(PointId, &Point) + '_ {
    move |_: PointId, point: &Point| {
        let (x, y) = match mode {
            BoundsMode::Geographic => (point.coor.lon, point.coor.lat),
            BoundsMode::Projected => {
                let en = point.coor.project();
                (en.east, en.north)
            }
        };
        *extent = Some(match *extent {
            Some(mut current) => {
                current.extend(x, y);
                current
            }
            None => Extent::at(x, y),
        });
    }
}

/// Bounding extent of every live point reachable from `roots`.
///
/// Returns `None` when no live point was reached.
pub fn bounding_extent(
    graph: &DataGraph,
    roots: &[PrimitiveRef],
    mode: BoundsMode,
) -> GraphResult<Option<Extent>> {
    let mut extent = None;
    let mut walker = ReachablePoints {
        on_point: extent_fold(mode, &mut extent),
    };
    for root in roots {
        root.accept(graph, &mut walker)?;
    }
    drop(walker);
    Ok(extent)
}

/// Bounding extent of the whole graph.
pub fn graph_extent(graph: &DataGraph, mode: BoundsMode) -> GraphResult<Option<Extent>> {
    let mut extent = None;
    let mut walker = ReachablePoints {
        on_point: extent_fold(mode, &mut extent),
    };
    graph.accept_all(&mut walker)?;
    drop(walker);
    Ok(extent)
}
