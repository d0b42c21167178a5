//! Reconciles incoming primitives into a local graph.
//!
//! # Responsibility
//! - Find the local counterpart of each incoming primitive.
//! - Merge shared attributes (deleted flag, server id, tags), then structure.
//! - Insert unmatched primitives with their references rewritten to local
//!   handles.
//!
//! # Invariants
//! - Structural dependencies of an incoming primitive are merged before the
//!   primitive itself, so every adopted reference resolves locally.
//! - A structural replacement is computed in full before it is written; a
//!   failed remap leaves the local primitive untouched.
//! - Local edits win over unmodified incoming data: neither tags nor
//!   structure are touched in that case.
//! - `modified` is never cleared by a merge.
//! - Merging the same source twice yields the same graph as merging once.

use crate::closure::rewrite_references;
use crate::graph::{DataGraph, GraphError, GraphResult};
use crate::matcher::IdentityMatcher;
use crate::model::coordinate::COORDINATE_EPSILON;
use crate::model::primitive::{Primitive, PrimitiveRef, PrimitiveState};
use crate::visit::PrimitiveView;
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use std::time::Instant;

/// What the engine reports when both sides changed the same tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// Keep local values and report a plain merge.
    #[default]
    KeepLocal,
    /// Keep local values and hand a conflict record back to the caller.
    Report,
}

/// Merge pass options.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergeOptions {
    /// Coordinate tolerance used for identity and geometry comparison.
    pub epsilon: f64,
    pub conflict_policy: ConflictPolicy,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            epsilon: COORDINATE_EPSILON,
            conflict_policy: ConflictPolicy::default(),
        }
    }
}

/// Both sides were modified and disagree on these tag values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeConflict {
    pub local: PrimitiveRef,
    pub incoming: PrimitiveRef,
    /// Keys whose local value was kept over a differing incoming value.
    pub tag_keys: Vec<String>,
}

/// Result of merging one incoming primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// No local counterpart; a copy was inserted.
    Inserted(PrimitiveRef),
    /// Merged into an existing local primitive.
    Merged(PrimitiveRef),
    /// Merged, but the caller asked to see tag disagreements.
    Conflict(MergeConflict),
}

impl MergeOutcome {
    /// Local handle now representing the incoming primitive.
    pub fn local(&self) -> PrimitiveRef {
        match self {
            Self::Inserted(local) | Self::Merged(local) => *local,
            Self::Conflict(conflict) => conflict.local,
        }
    }
}

/// Counters and conflicts accumulated by a merge pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub inserted: usize,
    pub merged: usize,
    pub conflicts: Vec<MergeConflict>,
}

/// One merge pass of `source` into `target`.
pub struct Merger<'g> {
    target: &'g mut DataGraph,
    source: &'g DataGraph,
    matcher: IdentityMatcher,
    policy: ConflictPolicy,
    resolved: HashMap<PrimitiveRef, PrimitiveRef>,
    in_progress: HashSet<PrimitiveRef>,
    report: MergeReport,
}

impl<'g> Merger<'g> {
    pub fn new(target: &'g mut DataGraph, source: &'g DataGraph, options: MergeOptions) -> Self {
        Self {
            target,
            source,
            matcher: IdentityMatcher::new(options.epsilon),
            policy: options.conflict_policy,
            resolved: HashMap::new(),
            in_progress: HashSet::new(),
            report: MergeReport::default(),
        }
    }

    /// Local handle an incoming primitive was merged into during this pass.
    pub fn resolved(&self, incoming: PrimitiveRef) -> Option<PrimitiveRef> {
        self.resolved.get(&incoming).copied()
    }

    pub fn report(&self) -> &MergeReport {
        &self.report
    }

    /// Merges every source primitive: points, segments, ways, relations.
    pub fn merge_all(&mut self) -> GraphResult<MergeReport> {
        let started_at = Instant::now();
        for incoming in self.source.refs() {
            self.merge_one(incoming)?;
        }
        info!(
            "event=merge_pass module=merge status=ok inserted={} merged={} conflicts={} duration_ms={}",
            self.report.inserted,
            self.report.merged,
            self.report.conflicts.len(),
            started_at.elapsed().as_millis()
        );
        Ok(self.report.clone())
    }

    /// Merges one incoming primitive (and, first, its dependencies).
    ///
    /// # Errors
    /// - `NotFound` when `incoming` is not in the source graph.
    /// - `CyclicMembership` when relation membership loops back on itself.
    /// - `DanglingReference` when either graph holds an unresolvable handle.
    pub fn merge_one(&mut self, incoming: PrimitiveRef) -> GraphResult<MergeOutcome> {
        if let Some(local) = self.resolved(incoming) {
            return Ok(MergeOutcome::Merged(local));
        }
        if !self.in_progress.insert(incoming) {
            return Err(GraphError::CyclicMembership(incoming));
        }
        let outcome = self.merge_unresolved(incoming);
        self.in_progress.remove(&incoming);
        outcome
    }

    fn merge_unresolved(&mut self, incoming: PrimitiveRef) -> GraphResult<MergeOutcome> {
        let source = self.source;
        let view = source.get(incoming).ok_or(GraphError::NotFound(incoming))?;
        for dependency in view.dependencies() {
            self.merge_one(dependency)?;
        }

        let Some(local) = self.matcher.find_match(self.target, source, incoming)? else {
            let local = self.insert_copy(incoming)?;
            self.resolved.insert(incoming, local);
            self.report.inserted += 1;
            debug!(
                "event=merge_primitive module=merge status=inserted incoming={} local={}",
                incoming, local
            );
            return Ok(MergeOutcome::Inserted(local));
        };

        self.resolved.insert(incoming, local);
        let conflicting_keys = self.merge_into(local, view)?;
        self.report.merged += 1;
        debug!(
            "event=merge_primitive module=merge status=merged incoming={} local={}",
            incoming, local
        );

        if conflicting_keys.is_empty() {
            return Ok(MergeOutcome::Merged(local));
        }
        warn!(
            "event=merge_conflict module=merge status=kept_local incoming={} local={} keys={}",
            incoming,
            local,
            conflicting_keys.len()
        );
        let conflict = MergeConflict {
            local,
            incoming,
            tag_keys: conflicting_keys,
        };
        self.report.conflicts.push(conflict.clone());
        Ok(match self.policy {
            ConflictPolicy::KeepLocal => MergeOutcome::Merged(local),
            ConflictPolicy::Report => MergeOutcome::Conflict(conflict),
        })
    }

    /// Merges `incoming` into its matched local primitive; returns the tag
    /// keys both sides modified differently.
    fn merge_into(
        &mut self,
        local: PrimitiveRef,
        incoming: PrimitiveView<'g>,
    ) -> GraphResult<Vec<String>> {
        let incoming_state = incoming.state();
        if incoming_state.incomplete {
            return Ok(Vec::new());
        }
        let local_state = self.target.state(local).ok_or(GraphError::NotFound(local))?;
        if local_state.incomplete {
            let mut filled = incoming.to_owned_primitive();
            rewrite_references(&mut filled, incoming.handle(), |dependency| {
                self.resolved(dependency)
            })?;
            self.target.put(local, filled)?;
            return Ok(Vec::new());
        }

        let state = self
            .target
            .state_mut(local)
            .ok_or(GraphError::NotFound(local))?;
        let local_was_modified = state.modified;
        if !merge_common(state, incoming_state) {
            return Ok(Vec::new());
        }
        let conflicting_keys = merge_tags(state, incoming_state, local_was_modified);
        self.merge_structure(local, incoming)?;
        Ok(conflicting_keys)
    }

    fn merge_structure(&mut self, local: PrimitiveRef, incoming: PrimitiveView<'g>) -> GraphResult<()> {
        let source = self.source;
        let holder = incoming.handle();
        let same = match (local, incoming) {
            (PrimitiveRef::Point(local_id), PrimitiveView::Point(_, theirs)) => {
                let ours = self
                    .target
                    .point(local_id)
                    .ok_or(GraphError::NotFound(local))?;
                ours.coor.equals_epsilon(&theirs.coor, self.matcher.epsilon())
            }
            (PrimitiveRef::Segment(local_id), PrimitiveView::Segment(_, theirs)) => {
                let ours = self
                    .target
                    .segment(local_id)
                    .ok_or(GraphError::NotFound(local))?;
                self.matcher.points_match(
                    self.target.require_point(local, ours.from)?,
                    source.require_point(holder, theirs.from)?,
                ) && self.matcher.points_match(
                    self.target.require_point(local, ours.to)?,
                    source.require_point(holder, theirs.to)?,
                )
            }
            (PrimitiveRef::Way(local_id), PrimitiveView::Way(_, theirs)) => {
                let ours = self.target.way(local_id).ok_or(GraphError::NotFound(local))?;
                self.matcher.segment_sequences_match(
                    self.target,
                    local,
                    &ours.segments,
                    source,
                    holder,
                    &theirs.segments,
                )?
            }
            (PrimitiveRef::Relation(local_id), PrimitiveView::Relation(_, theirs)) => {
                let ours = self
                    .target
                    .relation(local_id)
                    .ok_or(GraphError::NotFound(local))?;
                self.matcher.member_sequences_match(
                    self.target,
                    &ours.members,
                    source,
                    &theirs.members,
                )?
            }
            (local, incoming) => {
                return Err(GraphError::KindMismatch {
                    expected: local.kind(),
                    found: incoming.kind(),
                })
            }
        };
        if same {
            return Ok(());
        }

        let mut adopted = incoming.to_owned_primitive();
        rewrite_references(&mut adopted, holder, |dependency| self.resolved(dependency))?;
        let modified = incoming.state().modified;
        match (local, adopted) {
            (PrimitiveRef::Point(id), Primitive::Point(theirs)) => {
                if let Some(ours) = self.target.point_mut(id) {
                    ours.coor = theirs.coor;
                    ours.state.modified |= modified;
                }
            }
            (PrimitiveRef::Segment(id), Primitive::Segment(theirs)) => {
                if let Some(ours) = self.target.segment_mut(id) {
                    ours.from = theirs.from;
                    ours.to = theirs.to;
                    ours.state.modified |= modified;
                }
            }
            (PrimitiveRef::Way(id), Primitive::Way(theirs)) => {
                if let Some(ours) = self.target.way_mut(id) {
                    ours.segments = theirs.segments;
                    ours.state.modified |= modified;
                }
            }
            (PrimitiveRef::Relation(id), Primitive::Relation(theirs)) => {
                if let Some(ours) = self.target.relation_mut(id) {
                    ours.members = theirs.members;
                    ours.state.modified |= modified;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn insert_copy(&mut self, incoming: PrimitiveRef) -> GraphResult<PrimitiveRef> {
        let mut copy = self.source.cloned(incoming)?;
        rewrite_references(&mut copy, incoming, |dependency| self.resolved(dependency))?;
        self.target.add(copy)
    }
}

/// Deleted flag and id promotion; returns `false` when local edits win and
/// the rest of the merge must be skipped.
fn merge_common(local: &mut PrimitiveState, incoming: &PrimitiveState) -> bool {
    if incoming.deleted {
        local.deleted = true;
    }
    if local.id == 0 && incoming.id != 0 {
        local.id = incoming.id;
    } else if local.id != 0 && incoming.id != 0 && incoming.modified {
        local.modified = true;
    }
    !(local.modified && !incoming.modified)
}

/// Brings local tags up to the incoming ones. Incoming values win unless
/// both sides were modified; then local values are kept for the keys both
/// sides set differently, and those keys are returned.
fn merge_tags(
    local: &mut PrimitiveState,
    incoming: &PrimitiveState,
    local_was_modified: bool,
) -> Vec<String> {
    let Some(incoming_tags) = incoming.tags.as_ref() else {
        return Vec::new();
    };
    let Some(local_tags) = local.tags.as_mut() else {
        local.tags = Some(incoming_tags.clone());
        local.modified_properties = true;
        return Vec::new();
    };

    let covered = incoming_tags
        .iter()
        .all(|(key, value)| local_tags.get(key) == Some(value));
    if covered {
        return Vec::new();
    }

    let both_modified = local_was_modified && incoming.modified;
    let mut conflicting = Vec::new();
    for (key, value) in incoming_tags {
        let keep_local = match local_tags.get(key) {
            Some(ours) if ours == value => continue,
            Some(_) => both_modified,
            None => false,
        };
        if keep_local {
            conflicting.push(key.clone());
        } else {
            local_tags.insert(key.clone(), value.clone());
        }
    }
    local.modified_properties = true;
    conflicting
}

/// Merges all of `source` into `target` in one pass.
pub fn merge_graph(
    target: &mut DataGraph,
    source: &DataGraph,
    options: MergeOptions,
) -> GraphResult<MergeReport> {
    Merger::new(target, source, options).merge_all()
}
