//! Identity rules for primitives coming from different sources.
//!
//! # Responsibility
//! - Decide whether two primitives denote the same real-world object.
//! - Locate the local counterpart of an incoming primitive.
//!
//! # Invariants
//! - Only primitives of the same variant can match.
//! - Server ids decide when both are assigned; a fresh (`id == 0`) side is
//!   matched by geometry/structure instead.
//! - Incomplete primitives carry no geometry and match by server id only.
//! - Matching never mutates either graph.

use crate::graph::{DataGraph, GraphError, GraphResult};
use crate::model::coordinate::COORDINATE_EPSILON;
use crate::model::primitive::{
    Member, Point, PrimitiveRef, PrimitiveState, Relation, RelationId, Segment, SegmentId, Way,
    WayId,
};
use crate::visit::PrimitiveView;

/// Pairwise identity matcher with a configurable coordinate tolerance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdentityMatcher {
    epsilon: f64,
}

impl Default for IdentityMatcher {
    fn default() -> Self {
        Self::new(COORDINATE_EPSILON)
    }
}

impl IdentityMatcher {
    pub fn new(epsilon: f64) -> Self {
        Self { epsilon }
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn points_match(&self, a: &Point, b: &Point) -> bool {
        match decide_by_id(&a.state, &b.state) {
            Some(decision) => decision,
            None => a.coor.equals_epsilon(&b.coor, self.epsilon),
        }
    }

    /// Segments match by id, or structurally by endpoints in the same order.
    pub fn segments_match(
        &self,
        left: &DataGraph,
        (left_id, a): (SegmentId, &Segment),
        right: &DataGraph,
        (right_id, b): (SegmentId, &Segment),
    ) -> GraphResult<bool> {
        if let Some(decision) = decide_by_id(&a.state, &b.state) {
            return Ok(decision);
        }
        let holder_a = PrimitiveRef::Segment(left_id);
        let holder_b = PrimitiveRef::Segment(right_id);
        let from_matches = self.points_match(
            left.require_point(holder_a, a.from)?,
            right.require_point(holder_b, b.from)?,
        );
        Ok(from_matches
            && self.points_match(
                left.require_point(holder_a, a.to)?,
                right.require_point(holder_b, b.to)?,
            ))
    }

    /// Ways match by id, or structurally when every segment matches in
    /// sequence.
    pub fn ways_match(
        &self,
        left: &DataGraph,
        (left_id, a): (WayId, &Way),
        right: &DataGraph,
        (right_id, b): (WayId, &Way),
    ) -> GraphResult<bool> {
        if let Some(decision) = decide_by_id(&a.state, &b.state) {
            return Ok(decision);
        }
        self.segment_sequences_match(
            left,
            PrimitiveRef::Way(left_id),
            &a.segments,
            right,
            PrimitiveRef::Way(right_id),
            &b.segments,
        )
    }

    /// Pairwise comparison of two segment sequences.
    pub fn segment_sequences_match(
        &self,
        left: &DataGraph,
        left_holder: PrimitiveRef,
        a: &[SegmentId],
        right: &DataGraph,
        right_holder: PrimitiveRef,
        b: &[SegmentId],
    ) -> GraphResult<bool> {
        if a.len() != b.len() {
            return Ok(false);
        }
        for (sa, sb) in a.iter().zip(b) {
            let seg_a = left.require_segment(left_holder, *sa)?;
            let seg_b = right.require_segment(right_holder, *sb)?;
            if !self.segments_match(left, (*sa, seg_a), right, (*sb, seg_b))? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Relations match by id, or structurally by roles and members in order.
    pub fn relations_match(
        &self,
        left: &DataGraph,
        (_, a): (RelationId, &Relation),
        right: &DataGraph,
        (_, b): (RelationId, &Relation),
    ) -> GraphResult<bool> {
        if let Some(decision) = decide_by_id(&a.state, &b.state) {
            return Ok(decision);
        }
        self.member_sequences_match(left, &a.members, right, &b.members)
    }

    /// Pairwise comparison of two member lists.
    ///
    /// Nested relations compare by assigned server id only.
    pub fn member_sequences_match(
        &self,
        left: &DataGraph,
        a: &[Member],
        right: &DataGraph,
        b: &[Member],
    ) -> GraphResult<bool> {
        if a.len() != b.len() {
            return Ok(false);
        }
        for (ma, mb) in a.iter().zip(b) {
            if ma.role != mb.role {
                return Ok(false);
            }
            let same = match (ma.target, mb.target) {
                (PrimitiveRef::Relation(ra), PrimitiveRef::Relation(rb)) => {
                    let sa = left
                        .state(ra.into())
                        .ok_or(GraphError::NotFound(ra.into()))?;
                    let sb = right
                        .state(rb.into())
                        .ok_or(GraphError::NotFound(rb.into()))?;
                    sa.id != 0 && sa.id == sb.id
                }
                (ta, tb) => self.matches(left, ta, right, tb)?,
            };
            if !same {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Compares any two primitives; different variants never match.
    pub fn matches(
        &self,
        left: &DataGraph,
        a: PrimitiveRef,
        right: &DataGraph,
        b: PrimitiveRef,
    ) -> GraphResult<bool> {
        let view_a = left.get(a).ok_or(GraphError::NotFound(a))?;
        let view_b = right.get(b).ok_or(GraphError::NotFound(b))?;
        match (view_a, view_b) {
            (PrimitiveView::Point(_, pa), PrimitiveView::Point(_, pb)) => {
                Ok(self.points_match(pa, pb))
            }
            (PrimitiveView::Segment(ia, sa), PrimitiveView::Segment(ib, sb)) => {
                self.segments_match(left, (ia, sa), right, (ib, sb))
            }
            (PrimitiveView::Way(ia, wa), PrimitiveView::Way(ib, wb)) => {
                self.ways_match(left, (ia, wa), right, (ib, wb))
            }
            (PrimitiveView::Relation(ia, ra), PrimitiveView::Relation(ib, rb)) => {
                self.relations_match(left, (ia, ra), right, (ib, rb))
            }
            _ => Ok(false),
        }
    }

    /// Finds the first local primitive matching `incoming`.
    ///
    /// Linear scan over the local collection of the same variant. Local
    /// tombstones whose structure no longer resolves are skipped; any other
    /// dangling reference is reported.
    pub fn find_match(
        &self,
        local: &DataGraph,
        incoming_graph: &DataGraph,
        incoming: PrimitiveRef,
    ) -> GraphResult<Option<PrimitiveRef>> {
        if !incoming_graph.contains(incoming) {
            return Err(GraphError::NotFound(incoming));
        }
        for candidate in local.refs_of_kind(incoming.kind()) {
            match self.matches(local, candidate, incoming_graph, incoming) {
                Ok(true) => return Ok(Some(candidate)),
                Ok(false) => {}
                Err(GraphError::DanglingReference { holder, .. })
                    if holder == candidate
                        && local.state(candidate).is_some_and(|s| s.deleted) =>
                {
                    continue;
                }
                Err(err) => return Err(err),
            }
        }
        Ok(None)
    }
}

/// Id rule shared by every variant; `None` means "compare structurally".
fn decide_by_id(a: &PrimitiveState, b: &PrimitiveState) -> Option<bool> {
    if a.incomplete || b.incomplete {
        return Some(a.id != 0 && a.id == b.id);
    }
    if a.id == 0 || b.id == 0 {
        return None;
    }
    Some(a.id == b.id)
}
