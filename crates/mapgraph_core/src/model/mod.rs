//! Primitive graph data model.
//!
//! # Responsibility
//! - Define the primitive variants and their shared attributes.
//! - Define coordinate types and the projection used for planar queries.
//!
//! # Invariants
//! - Model types carry data and local validation only; graph-level rules
//!   (reference integrity, back-references) live in `graph` and above.
//! - Deletion is represented by tombstones, not by removal.

pub mod coordinate;
pub mod primitive;
