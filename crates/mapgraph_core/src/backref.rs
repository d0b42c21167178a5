//! "What refers to this primitive" queries.
//!
//! # Responsibility
//! - Compute, on demand, the live primitives that structurally use a target.
//! - Back delete guards and incremental re-validation.
//!
//! # Invariants
//! - Full scan of the graph on every call; no persistent index to go stale.
//! - Deleted and incomplete primitives never appear in results and a
//!   deleted or incomplete target has no back-references.
//! - Queries never mutate the graph.

use crate::graph::{DataGraph, GraphError, GraphResult};
use crate::model::primitive::{PointId, PrimitiveRef, Relation, RelationId, Segment, SegmentId, Way, WayId};
use crate::visit::Visitor;
use std::collections::BTreeSet;

/// Collects the back-references of one target during a graph traversal.
struct BackReferenceCollector {
    target: PrimitiveRef,
    found: BTreeSet<PrimitiveRef>,
}

impl Visitor for BackReferenceCollector {
    fn visit_segment(&mut self, _: &DataGraph, id: SegmentId, segment: &Segment) -> GraphResult<()> {
        if !segment.state.is_usable() {
            return Ok(());
        }
        if let PrimitiveRef::Point(point) = self.target {
            if segment.touches(point) {
                self.found.insert(id.into());
            }
        }
        Ok(())
    }

    fn visit_way(&mut self, graph: &DataGraph, id: WayId, way: &Way) -> GraphResult<()> {
        if !way.state.is_usable() {
            return Ok(());
        }
        let uses_target = match self.target {
            PrimitiveRef::Segment(segment) => way.segments.contains(&segment),
            PrimitiveRef::Point(point) => way_touches_point(graph, id, way, point)?,
            PrimitiveRef::Way(_) | PrimitiveRef::Relation(_) => false,
        };
        if uses_target {
            self.found.insert(id.into());
        }
        Ok(())
    }

    fn visit_relation(
        &mut self,
        _: &DataGraph,
        id: RelationId,
        relation: &Relation,
    ) -> GraphResult<()> {
        if !relation.state.is_usable() {
            return Ok(());
        }
        if relation.members.iter().any(|m| m.target == self.target) {
            self.found.insert(id.into());
        }
        Ok(())
    }
}

fn way_touches_point(
    graph: &DataGraph,
    id: WayId,
    way: &Way,
    point: PointId,
) -> GraphResult<bool> {
    for segment_id in &way.segments {
        let segment = graph.require_segment(id.into(), *segment_id)?;
        if segment.state.is_usable() && segment.touches(point) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Returns every live primitive that structurally uses `target`.
///
/// - point: segments ending at it, ways whose usable segments touch it.
/// - segment: ways listing it.
/// - any variant: relations listing it as a member.
///
/// # Errors
/// - `NotFound` when `target` is not in the graph.
/// - `DanglingReference` when a live way lists a segment that is gone.
pub fn references_of(graph: &DataGraph, target: PrimitiveRef) -> GraphResult<BTreeSet<PrimitiveRef>> {
    let state = graph.state(target).ok_or(GraphError::NotFound(target))?;
    if !state.is_usable() {
        return Ok(BTreeSet::new());
    }
    collect_referrers(graph, target)
}

/// Live primitives that use `target`, whatever the target's own flags.
///
/// Physical removal needs this: a live segment may still end at a
/// tombstoned or incomplete point.
pub(crate) fn live_referrers(
    graph: &DataGraph,
    target: PrimitiveRef,
) -> GraphResult<BTreeSet<PrimitiveRef>> {
    if !graph.contains(target) {
        return Err(GraphError::NotFound(target));
    }
    collect_referrers(graph, target)
}

fn collect_referrers(graph: &DataGraph, target: PrimitiveRef) -> GraphResult<BTreeSet<PrimitiveRef>> {
    let mut collector = BackReferenceCollector {
        target,
        found: BTreeSet::new(),
    };
    graph.accept_all(&mut collector)?;
    Ok(collector.found)
}

/// Returns whether any live primitive uses `target`.
pub fn is_referenced(graph: &DataGraph, target: PrimitiveRef) -> GraphResult<bool> {
    Ok(!references_of(graph, target)?.is_empty())
}
