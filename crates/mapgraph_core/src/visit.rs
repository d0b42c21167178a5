//! Dispatch over primitive variants.
//!
//! # Responsibility
//! - Provide a borrowed, closed view (`PrimitiveView`) for exhaustive `match`.
//! - Provide the `Visitor` protocol: one entry point per variant, selected by
//!   the dynamic variant behind a `PrimitiveRef`.
//!
//! # Invariants
//! - `accept` calls exactly one `visit_*` method per resolved handle.
//! - Every `visit_*` method defaults to a no-op, so traversals that ignore
//!   relations (or any other variant) just leave it out.
//! - Visitors receive the graph immutably; traversal never mutates it.

use crate::graph::{DataGraph, GraphError, GraphResult};
use crate::model::primitive::{
    Point, PointId, Primitive, PrimitiveKind, PrimitiveRef, PrimitiveState, Relation, RelationId,
    Segment, SegmentId, Way, WayId,
};

/// Borrowed primitive of any variant, paired with its handle.
#[derive(Debug, Clone, Copy)]
pub enum PrimitiveView<'a> {
    Point(PointId, &'a Point),
    Segment(SegmentId, &'a Segment),
    Way(WayId, &'a Way),
    Relation(RelationId, &'a Relation),
}

impl<'a> PrimitiveView<'a> {
    pub fn handle(&self) -> PrimitiveRef {
        match self {
            Self::Point(id, _) => (*id).into(),
            Self::Segment(id, _) => (*id).into(),
            Self::Way(id, _) => (*id).into(),
            Self::Relation(id, _) => (*id).into(),
        }
    }

    pub fn kind(&self) -> PrimitiveKind {
        self.handle().kind()
    }

    pub fn state(&self) -> &'a PrimitiveState {
        match *self {
            Self::Point(_, point) => &point.state,
            Self::Segment(_, segment) => &segment.state,
            Self::Way(_, way) => &way.state,
            Self::Relation(_, relation) => &relation.state,
        }
    }

    /// Direct structural references, in stored order.
    pub fn dependencies(&self) -> Vec<PrimitiveRef> {
        match self {
            Self::Point(..) => Vec::new(),
            Self::Segment(_, segment) => vec![segment.from.into(), segment.to.into()],
            Self::Way(_, way) => way.segments.iter().map(|s| (*s).into()).collect(),
            Self::Relation(_, relation) => relation.members.iter().map(|m| m.target).collect(),
        }
    }

    pub fn to_owned_primitive(&self) -> Primitive {
        match self {
            Self::Point(_, point) => Primitive::Point((*point).clone()),
            Self::Segment(_, segment) => Primitive::Segment((*segment).clone()),
            Self::Way(_, way) => Primitive::Way((*way).clone()),
            Self::Relation(_, relation) => Primitive::Relation((*relation).clone()),
        }
    }
}

/// Algorithm applied uniformly to every primitive variant.
pub trait Visitor {
    fn visit_point(&mut self, _graph: &DataGraph, _id: PointId, _point: &Point) -> GraphResult<()> {
        Ok(())
    }

    fn visit_segment(
        &mut self,
        _graph: &DataGraph,
        _id: SegmentId,
        _segment: &Segment,
    ) -> GraphResult<()> {
        Ok(())
    }

    fn visit_way(&mut self, _graph: &DataGraph, _id: WayId, _way: &Way) -> GraphResult<()> {
        Ok(())
    }

    fn visit_relation(
        &mut self,
        _graph: &DataGraph,
        _id: RelationId,
        _relation: &Relation,
    ) -> GraphResult<()> {
        Ok(())
    }
}

impl PrimitiveRef {
    /// Forwards to the visitor entry point matching this handle's variant.
    pub fn accept<V: Visitor + ?Sized>(self, graph: &DataGraph, visitor: &mut V) -> GraphResult<()> {
        match graph.get(self) {
            Some(view) => view.accept(graph, visitor),
            None => Err(GraphError::NotFound(self)),
        }
    }
}

impl PrimitiveView<'_> {
    pub fn accept<V: Visitor + ?Sized>(&self, graph: &DataGraph, visitor: &mut V) -> GraphResult<()> {
        match *self {
            Self::Point(id, point) => visitor.visit_point(graph, id, point),
            Self::Segment(id, segment) => visitor.visit_segment(graph, id, segment),
            Self::Way(id, way) => visitor.visit_way(graph, id, way),
            Self::Relation(id, relation) => visitor.visit_relation(graph, id, relation),
        }
    }
}

impl DataGraph {
    /// Visits every primitive: points, segments, ways, then relations.
    pub fn accept_all<V: Visitor + ?Sized>(&self, visitor: &mut V) -> GraphResult<()> {
        for (id, point) in self.points() {
            visitor.visit_point(self, id, point)?;
        }
        for (id, segment) in self.segments() {
            visitor.visit_segment(self, id, segment)?;
        }
        for (id, way) in self.ways() {
            visitor.visit_way(self, id, way)?;
        }
        for (id, relation) in self.relations() {
            visitor.visit_relation(self, id, relation)?;
        }
        Ok(())
    }
}
