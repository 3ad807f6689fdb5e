//! Small math helpers that sit alongside `cgmath` rather than replace it:
//! an axis-aligned bounding box with transform support (spec §8 property 8)
//! and a seeded random range helper used by the volumetrics render module.

pub mod aabb;
pub mod random;

pub use aabb::Aabb3;
pub use random::Random;
