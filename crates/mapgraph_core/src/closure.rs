//! Closure operations: transitive add, guarded delete and deep clone.
//!
//! # Responsibility
//! - Copy a primitive (and optionally everything it depends on) between
//!   graphs, recording an identity map from originals to copies.
//! - Physically remove primitives once nothing live refers to them.
//! - Snapshot primitives for undo/redo and write snapshots back.
//!
//! # Invariants
//! - Copies never alias originals: references inside a copy always point at
//!   copies in the copy's own graph.
//! - A dependency already present in the identity map is reused, never
//!   copied twice.
//! - Delete refuses to strand live referrers unless forced.

use crate::backref::live_referrers;
use crate::graph::{DataGraph, GraphError, GraphResult};
use crate::model::primitive::{
    Primitive, PrimitiveKind, PrimitiveRef, ServerId,
};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Mapping from original handles to copy handles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityMap {
    entries: BTreeMap<PrimitiveRef, PrimitiveRef>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, original: PrimitiveRef) -> Option<PrimitiveRef> {
        self.entries.get(&original).copied()
    }

    pub fn insert(&mut self, original: PrimitiveRef, copy: PrimitiveRef) {
        self.entries.insert(original, copy);
    }

    pub fn contains(&self, original: PrimitiveRef) -> bool {
        self.entries.contains_key(&original)
    }

    pub fn iter(&self) -> impl Iterator<Item = (PrimitiveRef, PrimitiveRef)> + '_ {
        self.entries.iter().map(|(original, copy)| (*original, *copy))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy -> original. When several originals share one copy the first
    /// original in handle order wins.
    pub fn inverse(&self) -> IdentityMap {
        let mut inverse = IdentityMap::new();
        for (original, copy) in self.iter() {
            inverse.entries.entry(copy).or_insert(original);
        }
        inverse
    }
}

/// Rewrites every structural reference inside `primitive` through `lookup`.
///
/// Fails with `DanglingReference` (attributed to `holder`) when a reference
/// has no mapping, leaving `primitive` partially rewritten.
pub(crate) fn rewrite_references<F>(
    primitive: &mut Primitive,
    holder: PrimitiveRef,
    lookup: F,
) -> GraphResult<()>
where
    F: Fn(PrimitiveRef) -> Option<PrimitiveRef>,
{
    let map = |dependency: PrimitiveRef| {
        lookup(dependency).ok_or(GraphError::DanglingReference {
            holder,
            missing: dependency,
        })
    };
    let mismatch = |expected: PrimitiveKind, found: PrimitiveRef| GraphError::KindMismatch {
        expected,
        found: found.kind(),
    };

    match primitive {
        Primitive::Point(_) => {}
        Primitive::Segment(segment) => {
            let from = map(segment.from.into())?;
            let to = map(segment.to.into())?;
            segment.from = from
                .as_point()
                .ok_or_else(|| mismatch(PrimitiveKind::Point, from))?;
            segment.to = to
                .as_point()
                .ok_or_else(|| mismatch(PrimitiveKind::Point, to))?;
        }
        Primitive::Way(way) => {
            for slot in way.segments.iter_mut() {
                let mapped = map((*slot).into())?;
                *slot = mapped
                    .as_segment()
                    .ok_or_else(|| mismatch(PrimitiveKind::Segment, mapped))?;
            }
        }
        Primitive::Relation(relation) => {
            for member in relation.members.iter_mut() {
                let mapped = map(member.target)?;
                if mapped.kind() != member.target.kind() {
                    return Err(mismatch(member.target.kind(), mapped));
                }
                member.target = mapped;
            }
        }
    }
    Ok(())
}

/// Copies `root` from `source` into `target`.
///
/// With `transitive`, every dependency missing from `map` is copied first
/// (recursively). Without it, every dependency must already be mapped.
/// Incomplete primitives are linked to a target primitive with the same
/// server id when one exists, otherwise copied as incomplete stubs.
///
/// Returns the target handle of the copy (or of the existing mapping).
pub fn add_primitive(
    target: &mut DataGraph,
    source: &DataGraph,
    root: PrimitiveRef,
    map: &mut IdentityMap,
    transitive: bool,
) -> GraphResult<PrimitiveRef> {
    let mut visiting = HashSet::new();
    add_recursive(target, source, root, map, transitive, &mut visiting)
}

fn add_recursive(
    target: &mut DataGraph,
    source: &DataGraph,
    root: PrimitiveRef,
    map: &mut IdentityMap,
    transitive: bool,
    visiting: &mut HashSet<PrimitiveRef>,
) -> GraphResult<PrimitiveRef> {
    if let Some(copy) = map.get(root) {
        return Ok(copy);
    }
    let view = source.get(root).ok_or(GraphError::NotFound(root))?;
    let state = view.state();
    if state.incomplete {
        if let Some(existing) = find_by_server_id(target, root.kind(), state.id) {
            map.insert(root, existing);
            return Ok(existing);
        }
    }

    if !visiting.insert(root) {
        return Err(GraphError::CyclicMembership(root));
    }
    for dependency in view.dependencies() {
        if map.contains(dependency) {
            continue;
        }
        if !transitive {
            return Err(GraphError::DanglingReference {
                holder: root,
                missing: dependency,
            });
        }
        add_recursive(target, source, dependency, map, transitive, visiting)?;
    }
    visiting.remove(&root);

    let mut copy = view.to_owned_primitive();
    rewrite_references(&mut copy, root, |dependency| map.get(dependency))?;
    let handle = target.add(copy)?;
    map.insert(root, handle);
    debug!(
        "event=primitive_add module=closure status=ok original={} copy={} transitive={}",
        root, handle, transitive
    );
    Ok(handle)
}

fn find_by_server_id(graph: &DataGraph, kind: PrimitiveKind, id: ServerId) -> Option<PrimitiveRef> {
    if id == 0 {
        return None;
    }
    graph
        .refs_of_kind(kind)
        .into_iter()
        .find(|candidate| graph.state(*candidate).is_some_and(|s| s.id == id))
}

/// Physically removes `target` from `graph` and returns it.
///
/// # Errors
/// - `NotFound` when `target` is not in the graph.
/// - `StillReferenced` when live primitives use `target` and `force` is off,
///   even if `target` itself is deleted or incomplete.
pub fn delete_primitive(
    graph: &mut DataGraph,
    target: PrimitiveRef,
    force: bool,
) -> GraphResult<Primitive> {
    if !graph.contains(target) {
        return Err(GraphError::NotFound(target));
    }
    if force {
        match live_referrers(graph, target) {
            Ok(referrers) if !referrers.is_empty() => warn!(
                "event=primitive_delete module=closure status=forced target={} referrers={}",
                target,
                referrers.len()
            ),
            Ok(_) => {}
            Err(err) => warn!(
                "event=primitive_delete module=closure status=forced target={} error={}",
                target, err
            ),
        }
    } else {
        let referrers = live_referrers(graph, target)?;
        if !referrers.is_empty() {
            return Err(GraphError::StillReferenced {
                target,
                referrers: referrers.into_iter().collect(),
            });
        }
    }

    let removed = graph.take(target).ok_or(GraphError::NotFound(target))?;
    info!(
        "event=primitive_delete module=closure status=ok target={} forced={}",
        target, force
    );
    Ok(removed)
}

/// Random identity of one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(Uuid);

impl SnapshotId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Display for SnapshotId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Self-contained copy of a set of primitives plus the identity map back to
/// the graph they were taken from.
#[derive(Debug, Clone)]
pub struct Snapshot {
    id: SnapshotId,
    graph: DataGraph,
    map: IdentityMap,
}

impl Snapshot {
    pub fn id(&self) -> SnapshotId {
        self.id
    }

    /// Graph holding the copies.
    pub fn graph(&self) -> &DataGraph {
        &self.graph
    }

    /// Mutable access to the copies; never affects the originals.
    pub fn graph_mut(&mut self) -> &mut DataGraph {
        &mut self.graph
    }

    pub fn identity_map(&self) -> &IdentityMap {
        &self.map
    }

    pub fn copy_of(&self, original: PrimitiveRef) -> Option<PrimitiveRef> {
        self.map.get(original)
    }

    /// Writes every copy back over its original in `live`.
    ///
    /// References are rewritten from copies to originals; slots emptied by a
    /// delete since the snapshot was taken are refilled. All writes are
    /// prepared before the first one is applied.
    pub fn restore_into(&self, live: &mut DataGraph) -> GraphResult<usize> {
        let inverse = self.map.inverse();
        let mut writes = Vec::with_capacity(self.map.len());
        for (original, copy) in self.map.iter() {
            let mut data = self.graph.cloned(copy)?;
            rewrite_references(&mut data, copy, |dependency| inverse.get(dependency))?;
            writes.push((original, data));
        }
        let restored = writes.len();
        for (original, data) in writes {
            live.put(original, data)?;
        }
        info!(
            "event=snapshot_restore module=closure status=ok snapshot={} restored={}",
            self.id, restored
        );
        Ok(restored)
    }
}

/// Deep-copies `roots` and all their dependencies into a fresh graph.
pub fn deep_clone(graph: &DataGraph, roots: &[PrimitiveRef]) -> GraphResult<Snapshot> {
    let mut copies = DataGraph::new();
    let mut map = IdentityMap::new();
    for root in roots {
        add_primitive(&mut copies, graph, *root, &mut map, true)?;
    }
    let snapshot = Snapshot {
        id: SnapshotId::generate(),
        graph: copies,
        map,
    };
    info!(
        "event=snapshot_take module=closure status=ok snapshot={} roots={} copies={}",
        snapshot.id,
        roots.len(),
        snapshot.map.len()
    );
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::{add_primitive, IdentityMap};
    use crate::graph::{DataGraph, GraphError};
    use crate::model::coordinate::LatLon;
    use crate::model::primitive::{Point, PrimitiveRef, Segment};

    #[test]
    fn inverse_swaps_directions() {
        let mut source = DataGraph::new();
        let a = source.add_point(Point::new(LatLon::new(0.0, 0.0))).unwrap();
        let mut target = DataGraph::new();
        let mut map = IdentityMap::new();
        let copy = add_primitive(&mut target, &source, a.into(), &mut map, false).unwrap();

        assert_eq!(map.get(a.into()), Some(copy));
        assert_eq!(map.inverse().get(copy), Some(PrimitiveRef::Point(a)));
    }

    #[test]
    fn non_transitive_add_requires_mapped_dependencies() {
        let mut source = DataGraph::new();
        let a = source.add_point(Point::new(LatLon::new(0.0, 0.0))).unwrap();
        let b = source.add_point(Point::new(LatLon::new(0.0, 1.0))).unwrap();
        let s = source.add_segment(Segment::new(a, b)).unwrap();

        let mut target = DataGraph::new();
        let mut map = IdentityMap::new();
        let err = add_primitive(&mut target, &source, s.into(), &mut map, false).unwrap_err();
        assert_eq!(
            err,
            GraphError::DanglingReference {
                holder: PrimitiveRef::Segment(s),
                missing: PrimitiveRef::Point(a),
            }
        );
        assert!(target.is_empty());
    }
}
