//! Geometry snapshots exchanged between the modeling kernel and the viewer.
//!
//! The rendering core treats these as read-only captures of kernel output at
//! the time they are handed over: point lists, face/edge index lists and the
//! per-element group ids used for selection.

pub mod aabb;
pub mod mesh;
pub mod web;

pub use aabb::Aabb;
pub use mesh::MeshSnapshot;
pub use web::WebSnapshot;
