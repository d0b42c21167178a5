//! Primitive variant model.
//!
//! # Responsibility
//! - Define the four primitive variants (point, segment, way, relation).
//! - Define the shared state every variant carries (server id, tags, flags).
//! - Define typed arena handles used for structural references.
//!
//! # Invariants
//! - `id == 0` means "not yet assigned by the server".
//! - Structural references are arena handles, never copies of the target.
//! - `deleted` primitives are tombstones: kept for undo, skipped by queries.
//! - `incomplete` primitives are known by id only and carry no geometry.

use super::coordinate::LatLon;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Server-assigned identity. `0` marks a locally created primitive.
pub type ServerId = i64;

/// Ordered tag map (key -> value).
pub type Tags = BTreeMap<String, String>;

static TAG_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s=\p{Cc}]+$").expect("valid tag key regex"));

macro_rules! arena_handle {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub(crate) u32);

        impl $name {
            /// Raw slot index inside the owning graph.
            pub fn index(self) -> u32 {
                self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($label, "#{}"), self.0)
            }
        }
    };
}

arena_handle!(
    /// Handle of a point inside one `DataGraph`.
    PointId,
    "point"
);
arena_handle!(
    /// Handle of a segment inside one `DataGraph`.
    SegmentId,
    "segment"
);
arena_handle!(
    /// Handle of a way inside one `DataGraph`.
    WayId,
    "way"
);
arena_handle!(
    /// Handle of a relation inside one `DataGraph`.
    RelationId,
    "relation"
);

/// Variant discriminant without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveKind {
    Point,
    Segment,
    Way,
    Relation,
}

impl PrimitiveKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Point => "point",
            Self::Segment => "segment",
            Self::Way => "way",
            Self::Relation => "relation",
        }
    }
}

/// Typed handle to any primitive of one graph.
///
/// Ordering is by variant first (points, segments, ways, relations), then by
/// slot index, which is also the order whole-graph traversals use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "index", rename_all = "snake_case")]
pub enum PrimitiveRef {
    Point(PointId),
    Segment(SegmentId),
    Way(WayId),
    Relation(RelationId),
}

impl PrimitiveRef {
    pub fn kind(self) -> PrimitiveKind {
        match self {
            Self::Point(_) => PrimitiveKind::Point,
            Self::Segment(_) => PrimitiveKind::Segment,
            Self::Way(_) => PrimitiveKind::Way,
            Self::Relation(_) => PrimitiveKind::Relation,
        }
    }

    pub fn as_point(self) -> Option<PointId> {
        match self {
            Self::Point(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_segment(self) -> Option<SegmentId> {
        match self {
            Self::Segment(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_way(self) -> Option<WayId> {
        match self {
            Self::Way(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_relation(self) -> Option<RelationId> {
        match self {
            Self::Relation(id) => Some(id),
            _ => None,
        }
    }
}

impl Display for PrimitiveRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Point(id) => write!(f, "{id}"),
            Self::Segment(id) => write!(f, "{id}"),
            Self::Way(id) => write!(f, "{id}"),
            Self::Relation(id) => write!(f, "{id}"),
        }
    }
}

impl From<PointId> for PrimitiveRef {
    fn from(value: PointId) -> Self {
        Self::Point(value)
    }
}

impl From<SegmentId> for PrimitiveRef {
    fn from(value: SegmentId) -> Self {
        Self::Segment(value)
    }
}

impl From<WayId> for PrimitiveRef {
    fn from(value: WayId) -> Self {
        Self::Way(value)
    }
}

impl From<RelationId> for PrimitiveRef {
    fn from(value: RelationId) -> Self {
        Self::Relation(value)
    }
}

/// Validation errors for primitive payloads.
#[derive(Debug, Clone, PartialEq)]
pub enum PrimitiveValidationError {
    /// Tag key is empty after trim.
    EmptyTagKey,
    /// Tag key contains whitespace, `=` or control characters.
    InvalidTagKey(String),
    /// Complete point has a non-finite or out-of-range position.
    InvalidCoordinate { lat: f64, lon: f64 },
    /// Incomplete primitive without a server id cannot be resolved later.
    IncompleteWithoutId,
}

impl Display for PrimitiveValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTagKey => write!(f, "tag key must not be empty"),
            Self::InvalidTagKey(key) => write!(f, "tag key is invalid: `{key}`"),
            Self::InvalidCoordinate { lat, lon } => {
                write!(f, "coordinate out of range: lat={lat} lon={lon}")
            }
            Self::IncompleteWithoutId => {
                write!(f, "incomplete primitive must carry a server id")
            }
        }
    }
}

impl Error for PrimitiveValidationError {}

/// Checks one tag key against the accepted key syntax.
pub fn validate_tag_key(key: &str) -> Result<(), PrimitiveValidationError> {
    if key.trim().is_empty() {
        return Err(PrimitiveValidationError::EmptyTagKey);
    }
    if !TAG_KEY_RE.is_match(key) {
        return Err(PrimitiveValidationError::InvalidTagKey(key.to_string()));
    }
    Ok(())
}

/// Attributes shared by every primitive variant.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PrimitiveState {
    /// Server identity; `0` until the first successful upload.
    pub id: ServerId,
    /// `None` means the primitive never had tags.
    pub tags: Option<Tags>,
    /// Local divergence from the last known server state.
    pub modified: bool,
    /// Tag-only divergence, set when a merge adds keys.
    pub modified_properties: bool,
    /// Tombstone marker.
    pub deleted: bool,
    /// Known by id only; data not fetched.
    pub incomplete: bool,
}

impl PrimitiveState {
    pub fn with_id(id: ServerId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Placeholder for a primitive referenced but not fetched.
    pub fn incomplete(id: ServerId) -> Self {
        Self {
            id,
            incomplete: true,
            ..Self::default()
        }
    }

    pub fn is_new(&self) -> bool {
        self.id == 0
    }

    /// Not a tombstone.
    pub fn is_active(&self) -> bool {
        !self.deleted
    }

    /// Active and fully loaded; only these take part in structural queries.
    pub fn is_usable(&self) -> bool {
        !self.deleted && !self.incomplete
    }

    pub fn soft_delete(&mut self) {
        self.deleted = true;
    }

    pub fn restore(&mut self) {
        self.deleted = false;
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.as_ref()?.get(key).map(String::as_str)
    }

    /// Sets one tag after validating its key.
    pub fn put_tag(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), PrimitiveValidationError> {
        let key = key.into();
        validate_tag_key(&key)?;
        self.tags.get_or_insert_with(Tags::new).insert(key, value.into());
        Ok(())
    }

    pub fn remove_tag(&mut self, key: &str) -> Option<String> {
        let tags = self.tags.as_mut()?;
        let removed = tags.remove(key);
        if tags.is_empty() {
            self.tags = None;
        }
        removed
    }

    pub fn validate(&self) -> Result<(), PrimitiveValidationError> {
        if self.incomplete && self.id == 0 {
            return Err(PrimitiveValidationError::IncompleteWithoutId);
        }
        if let Some(tags) = &self.tags {
            for key in tags.keys() {
                validate_tag_key(key)?;
            }
        }
        Ok(())
    }
}

/// Positioned primitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    #[serde(flatten)]
    pub state: PrimitiveState,
    pub coor: LatLon,
}

impl Point {
    pub fn new(coor: LatLon) -> Self {
        Self {
            state: PrimitiveState::default(),
            coor,
        }
    }

    pub fn with_id(id: ServerId, coor: LatLon) -> Self {
        Self {
            state: PrimitiveState::with_id(id),
            coor,
        }
    }

    pub fn incomplete(id: ServerId) -> Self {
        Self {
            state: PrimitiveState::incomplete(id),
            coor: LatLon::default(),
        }
    }

    pub fn validate(&self) -> Result<(), PrimitiveValidationError> {
        self.state.validate()?;
        if !self.state.incomplete && !self.coor.is_valid() {
            return Err(PrimitiveValidationError::InvalidCoordinate {
                lat: self.coor.lat,
                lon: self.coor.lon,
            });
        }
        Ok(())
    }
}

/// Line element between two points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    #[serde(flatten)]
    pub state: PrimitiveState,
    pub from: PointId,
    pub to: PointId,
}

impl Segment {
    pub fn new(from: PointId, to: PointId) -> Self {
        Self {
            state: PrimitiveState::default(),
            from,
            to,
        }
    }

    pub fn touches(&self, point: PointId) -> bool {
        self.from == point || self.to == point
    }
}

/// Compound element: an ordered path of segments.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Way {
    #[serde(flatten)]
    pub state: PrimitiveState,
    pub segments: Vec<SegmentId>,
}

impl Way {
    pub fn new(segments: Vec<SegmentId>) -> Self {
        Self {
            state: PrimitiveState::default(),
            segments,
        }
    }
}

/// One relation entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub target: PrimitiveRef,
    pub role: String,
}

impl Member {
    pub fn new(target: impl Into<PrimitiveRef>, role: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            role: role.into(),
        }
    }
}

/// Tagged, ordered grouping of arbitrary primitives.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Relation {
    #[serde(flatten)]
    pub state: PrimitiveState,
    pub members: Vec<Member>,
}

impl Relation {
    pub fn new(members: Vec<Member>) -> Self {
        Self {
            state: PrimitiveState::default(),
            members,
        }
    }
}

/// Owned primitive of any variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Primitive {
    Point(Point),
    Segment(Segment),
    Way(Way),
    Relation(Relation),
}

impl Primitive {
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            Self::Point(_) => PrimitiveKind::Point,
            Self::Segment(_) => PrimitiveKind::Segment,
            Self::Way(_) => PrimitiveKind::Way,
            Self::Relation(_) => PrimitiveKind::Relation,
        }
    }

    pub fn state(&self) -> &PrimitiveState {
        match self {
            Self::Point(point) => &point.state,
            Self::Segment(segment) => &segment.state,
            Self::Way(way) => &way.state,
            Self::Relation(relation) => &relation.state,
        }
    }
}
