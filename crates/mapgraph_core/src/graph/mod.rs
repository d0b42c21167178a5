//! Primitive graph storage.
//!
//! # Responsibility
//! - Own every point, segment, way and relation of one dataset.
//! - Hand out typed handles and resolve them back to primitives.
//! - Reject inserts whose structural references cannot be resolved.
//!
//! # Invariants
//! - The graph is passed explicitly to every operation; there is no ambient
//!   "current dataset".
//! - Handles are slot indices and are never reused after removal.
//! - Mutation requires `&mut DataGraph`, so at most one writer exists at a
//!   time and traversals never observe a concurrent edit.

mod slots;

use crate::model::primitive::{
    Point, PointId, Primitive, PrimitiveKind, PrimitiveRef, PrimitiveState,
    PrimitiveValidationError, Relation, RelationId, Segment, SegmentId, Way, WayId,
};
use crate::visit::PrimitiveView;
use slots::Slots;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type GraphResult<T> = Result<T, GraphError>;

/// Errors raised by graph storage and the algorithms layered on it.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphError {
    /// Primitive payload failed local validation.
    Validation(PrimitiveValidationError),
    /// Handle does not resolve in this graph.
    NotFound(PrimitiveRef),
    /// Insert refers to a primitive that is not present.
    UnknownReference(PrimitiveRef),
    /// Stored primitive refers to a primitive that is no longer present.
    DanglingReference {
        holder: PrimitiveRef,
        missing: PrimitiveRef,
    },
    /// Delete refused because live primitives still use the target.
    StillReferenced {
        target: PrimitiveRef,
        referrers: Vec<PrimitiveRef>,
    },
    /// Relation membership loops back onto a relation being merged.
    CyclicMembership(PrimitiveRef),
    /// Payload variant does not match the handle variant.
    KindMismatch {
        expected: PrimitiveKind,
        found: PrimitiveKind,
    },
    /// Collection ran out of slot indices.
    CapacityExceeded(PrimitiveKind),
}

impl Display for GraphError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound(target) => write!(f, "primitive not found: {target}"),
            Self::UnknownReference(target) => {
                write!(f, "referenced primitive is not in the graph: {target}")
            }
            Self::DanglingReference { holder, missing } => {
                write!(f, "{holder} refers to missing primitive {missing}")
            }
            Self::StillReferenced { target, referrers } => write!(
                f,
                "{target} is still referenced by {} primitive(s)",
                referrers.len()
            ),
            Self::CyclicMembership(target) => {
                write!(f, "relation membership cycle through {target}")
            }
            Self::KindMismatch { expected, found } => write!(
                f,
                "expected {} primitive, found {}",
                expected.as_str(),
                found.as_str()
            ),
            Self::CapacityExceeded(kind) => {
                write!(f, "{} collection is full", kind.as_str())
            }
        }
    }
}

impl Error for GraphError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<PrimitiveValidationError> for GraphError {
    fn from(value: PrimitiveValidationError) -> Self {
        Self::Validation(value)
    }
}

/// One dataset of primitives and the structure between them.
#[derive(Debug, Clone, Default)]
pub struct DataGraph {
    points: Slots<Point>,
    segments: Slots<Segment>,
    ways: Slots<Way>,
    relations: Slots<Relation>,
}

impl DataGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_point(&mut self, point: Point) -> GraphResult<PointId> {
        point.validate()?;
        self.points
            .push(point)
            .map(PointId)
            .ok_or(GraphError::CapacityExceeded(PrimitiveKind::Point))
    }

    /// Inserts a segment whose endpoints are already in this graph.
    pub fn add_segment(&mut self, segment: Segment) -> GraphResult<SegmentId> {
        segment.state.validate()?;
        self.ensure_present(segment.from.into())?;
        self.ensure_present(segment.to.into())?;
        self.segments
            .push(segment)
            .map(SegmentId)
            .ok_or(GraphError::CapacityExceeded(PrimitiveKind::Segment))
    }

    /// Inserts a way whose segments are already in this graph.
    pub fn add_way(&mut self, way: Way) -> GraphResult<WayId> {
        way.state.validate()?;
        for segment in &way.segments {
            self.ensure_present((*segment).into())?;
        }
        self.ways
            .push(way)
            .map(WayId)
            .ok_or(GraphError::CapacityExceeded(PrimitiveKind::Way))
    }

    /// Inserts a relation whose members are already in this graph.
    ///
    /// Members not fetched yet must be inserted first as incomplete
    /// placeholders.
    pub fn add_relation(&mut self, relation: Relation) -> GraphResult<RelationId> {
        relation.state.validate()?;
        for member in &relation.members {
            self.ensure_present(member.target)?;
        }
        self.relations
            .push(relation)
            .map(RelationId)
            .ok_or(GraphError::CapacityExceeded(PrimitiveKind::Relation))
    }

    pub fn add(&mut self, primitive: Primitive) -> GraphResult<PrimitiveRef> {
        match primitive {
            Primitive::Point(point) => self.add_point(point).map(PrimitiveRef::Point),
            Primitive::Segment(segment) => self.add_segment(segment).map(PrimitiveRef::Segment),
            Primitive::Way(way) => self.add_way(way).map(PrimitiveRef::Way),
            Primitive::Relation(relation) => {
                self.add_relation(relation).map(PrimitiveRef::Relation)
            }
        }
    }

    pub fn point(&self, id: PointId) -> Option<&Point> {
        self.points.get(id.0)
    }

    pub fn point_mut(&mut self, id: PointId) -> Option<&mut Point> {
        self.points.get_mut(id.0)
    }

    pub fn segment(&self, id: SegmentId) -> Option<&Segment> {
        self.segments.get(id.0)
    }

    pub fn segment_mut(&mut self, id: SegmentId) -> Option<&mut Segment> {
        self.segments.get_mut(id.0)
    }

    pub fn way(&self, id: WayId) -> Option<&Way> {
        self.ways.get(id.0)
    }

    pub fn way_mut(&mut self, id: WayId) -> Option<&mut Way> {
        self.ways.get_mut(id.0)
    }

    pub fn relation(&self, id: RelationId) -> Option<&Relation> {
        self.relations.get(id.0)
    }

    pub fn relation_mut(&mut self, id: RelationId) -> Option<&mut Relation> {
        self.relations.get_mut(id.0)
    }

    /// Resolves a point referenced by `holder`, reporting a dangling
    /// reference instead of a bare lookup failure.
    pub fn require_point(&self, holder: PrimitiveRef, id: PointId) -> GraphResult<&Point> {
        self.point(id).ok_or(GraphError::DanglingReference {
            holder,
            missing: id.into(),
        })
    }

    /// Segment counterpart of [`DataGraph::require_point`].
    pub fn require_segment(&self, holder: PrimitiveRef, id: SegmentId) -> GraphResult<&Segment> {
        self.segment(id).ok_or(GraphError::DanglingReference {
            holder,
            missing: id.into(),
        })
    }

    /// Borrowed view of any primitive.
    pub fn get(&self, target: PrimitiveRef) -> Option<PrimitiveView<'_>> {
        match target {
            PrimitiveRef::Point(id) => self.point(id).map(|p| PrimitiveView::Point(id, p)),
            PrimitiveRef::Segment(id) => self.segment(id).map(|s| PrimitiveView::Segment(id, s)),
            PrimitiveRef::Way(id) => self.way(id).map(|w| PrimitiveView::Way(id, w)),
            PrimitiveRef::Relation(id) => {
                self.relation(id).map(|r| PrimitiveView::Relation(id, r))
            }
        }
    }

    pub fn contains(&self, target: PrimitiveRef) -> bool {
        self.state(target).is_some()
    }

    pub fn state(&self, target: PrimitiveRef) -> Option<&PrimitiveState> {
        match target {
            PrimitiveRef::Point(id) => self.point(id).map(|p| &p.state),
            PrimitiveRef::Segment(id) => self.segment(id).map(|s| &s.state),
            PrimitiveRef::Way(id) => self.way(id).map(|w| &w.state),
            PrimitiveRef::Relation(id) => self.relation(id).map(|r| &r.state),
        }
    }

    pub fn state_mut(&mut self, target: PrimitiveRef) -> Option<&mut PrimitiveState> {
        match target {
            PrimitiveRef::Point(id) => self.point_mut(id).map(|p| &mut p.state),
            PrimitiveRef::Segment(id) => self.segment_mut(id).map(|s| &mut s.state),
            PrimitiveRef::Way(id) => self.way_mut(id).map(|w| &mut w.state),
            PrimitiveRef::Relation(id) => self.relation_mut(id).map(|r| &mut r.state),
        }
    }

    /// Owned copy of one primitive.
    pub fn cloned(&self, target: PrimitiveRef) -> GraphResult<Primitive> {
        match self.get(target) {
            Some(view) => Ok(view.to_owned_primitive()),
            None => Err(GraphError::NotFound(target)),
        }
    }

    /// Direct structural references held by `target`, in stored order.
    pub fn dependencies(&self, target: PrimitiveRef) -> GraphResult<Vec<PrimitiveRef>> {
        match self.get(target) {
            Some(view) => Ok(view.dependencies()),
            None => Err(GraphError::NotFound(target)),
        }
    }

    pub fn points(&self) -> impl Iterator<Item = (PointId, &Point)> + '_ {
        self.points.iter().map(|(index, p)| (PointId(index), p))
    }

    pub fn segments(&self) -> impl Iterator<Item = (SegmentId, &Segment)> + '_ {
        self.segments.iter().map(|(index, s)| (SegmentId(index), s))
    }

    pub fn ways(&self) -> impl Iterator<Item = (WayId, &Way)> + '_ {
        self.ways.iter().map(|(index, w)| (WayId(index), w))
    }

    pub fn relations(&self) -> impl Iterator<Item = (RelationId, &Relation)> + '_ {
        self.relations.iter().map(|(index, r)| (RelationId(index), r))
    }

    /// Handles of one collection, in slot order.
    pub fn refs_of_kind(&self, kind: PrimitiveKind) -> Vec<PrimitiveRef> {
        match kind {
            PrimitiveKind::Point => self.points().map(|(id, _)| id.into()).collect(),
            PrimitiveKind::Segment => self.segments().map(|(id, _)| id.into()).collect(),
            PrimitiveKind::Way => self.ways().map(|(id, _)| id.into()).collect(),
            PrimitiveKind::Relation => self.relations().map(|(id, _)| id.into()).collect(),
        }
    }

    /// Every handle: points, segments, ways, then relations.
    pub fn refs(&self) -> Vec<PrimitiveRef> {
        [
            PrimitiveKind::Point,
            PrimitiveKind::Segment,
            PrimitiveKind::Way,
            PrimitiveKind::Relation,
        ]
        .into_iter()
        .flat_map(|kind| self.refs_of_kind(kind))
        .collect()
    }

    pub fn count(&self, kind: PrimitiveKind) -> usize {
        match kind {
            PrimitiveKind::Point => self.points.len(),
            PrimitiveKind::Segment => self.segments.len(),
            PrimitiveKind::Way => self.ways.len(),
            PrimitiveKind::Relation => self.relations.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len() + self.segments.len() + self.ways.len() + self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Physically removes one primitive. Callers check back-references.
    pub(crate) fn take(&mut self, target: PrimitiveRef) -> Option<Primitive> {
        match target {
            PrimitiveRef::Point(id) => self.points.take(id.0).map(Primitive::Point),
            PrimitiveRef::Segment(id) => self.segments.take(id.0).map(Primitive::Segment),
            PrimitiveRef::Way(id) => self.ways.take(id.0).map(Primitive::Way),
            PrimitiveRef::Relation(id) => self.relations.take(id.0).map(Primitive::Relation),
        }
    }

    /// Overwrites (or refills) the slot behind `target`.
    ///
    /// References inside `primitive` are not checked; this is the raw write
    /// used when restoring a snapshot whose structure was valid when taken.
    pub(crate) fn put(
        &mut self,
        target: PrimitiveRef,
        primitive: Primitive,
    ) -> GraphResult<Option<Primitive>> {
        match (target, primitive) {
            (PrimitiveRef::Point(id), Primitive::Point(point)) => self
                .points
                .put(id.0, point)
                .map(|prev| prev.map(Primitive::Point))
                .map_err(|_| GraphError::NotFound(target)),
            (PrimitiveRef::Segment(id), Primitive::Segment(segment)) => self
                .segments
                .put(id.0, segment)
                .map(|prev| prev.map(Primitive::Segment))
                .map_err(|_| GraphError::NotFound(target)),
            (PrimitiveRef::Way(id), Primitive::Way(way)) => self
                .ways
                .put(id.0, way)
                .map(|prev| prev.map(Primitive::Way))
                .map_err(|_| GraphError::NotFound(target)),
            (PrimitiveRef::Relation(id), Primitive::Relation(relation)) => self
                .relations
                .put(id.0, relation)
                .map(|prev| prev.map(Primitive::Relation))
                .map_err(|_| GraphError::NotFound(target)),
            (target, primitive) => Err(GraphError::KindMismatch {
                expected: target.kind(),
                found: primitive.kind(),
            }),
        }
    }

    fn ensure_present(&self, target: PrimitiveRef) -> GraphResult<()> {
        if self.contains(target) {
            Ok(())
        } else {
            Err(GraphError::UnknownReference(target))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DataGraph, GraphError};
    use crate::model::coordinate::LatLon;
    use crate::model::primitive::{Point, PrimitiveKind, PrimitiveRef, Segment};

    #[test]
    fn add_segment_rejects_unknown_endpoint() {
        let mut graph = DataGraph::new();
        let a = graph.add_point(Point::new(LatLon::new(1.0, 1.0))).unwrap();
        let mut scratch = DataGraph::new();
        scratch.add_point(Point::new(LatLon::new(0.0, 0.0))).unwrap();
        let foreign = scratch.add_point(Point::new(LatLon::new(0.0, 0.0))).unwrap();

        let err = graph.add_segment(Segment::new(a, foreign)).unwrap_err();
        assert_eq!(err, GraphError::UnknownReference(PrimitiveRef::Point(foreign)));
        assert_eq!(graph.count(PrimitiveKind::Segment), 0);
    }

    #[test]
    fn take_leaves_hole_and_put_refills_it() {
        let mut graph = DataGraph::new();
        let a = graph.add_point(Point::new(LatLon::new(1.0, 2.0))).unwrap();
        let removed = graph.take(a.into()).unwrap();
        assert!(!graph.contains(a.into()));
        assert!(graph.is_empty());

        graph.put(a.into(), removed).unwrap();
        assert_eq!(graph.point(a).unwrap().coor, LatLon::new(1.0, 2.0));
    }

    #[test]
    fn put_rejects_variant_mismatch() {
        let mut graph = DataGraph::new();
        let a = graph.add_point(Point::new(LatLon::new(1.0, 2.0))).unwrap();
        let b = graph.add_point(Point::new(LatLon::new(1.0, 3.0))).unwrap();
        let s = graph.add_segment(Segment::new(a, b)).unwrap();
        let segment = graph.cloned(s.into()).unwrap();

        let err = graph.put(a.into(), segment).unwrap_err();
        assert_eq!(
            err,
            GraphError::KindMismatch {
                expected: PrimitiveKind::Point,
                found: PrimitiveKind::Segment,
            }
        );
    }

    #[test]
    fn refs_are_grouped_by_kind() {
        let mut graph = DataGraph::new();
        let a = graph.add_point(Point::new(LatLon::new(1.0, 2.0))).unwrap();
        let b = graph.add_point(Point::new(LatLon::new(1.0, 3.0))).unwrap();
        let s = graph.add_segment(Segment::new(a, b)).unwrap();
        assert_eq!(
            graph.refs(),
            vec![
                PrimitiveRef::Point(a),
                PrimitiveRef::Point(b),
                PrimitiveRef::Segment(s)
            ]
        );
    }
}
