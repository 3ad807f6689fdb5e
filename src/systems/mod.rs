//! Reference-counted resource caches (spec §4.7): texture, shader,
//! material, and geometry, each following the same acquire/release
//! contract over a `ResourceSystem`-backed loader.

pub mod geometry_system;
pub mod material_system;
pub mod shader_system;
pub mod texture_system;

pub use geometry_system::{Geometry, GeometrySystem, GeometryVertex};
pub use material_system::{Material, MaterialSystem};
pub use shader_system::ShaderSystem;
pub use texture_system::TextureSystem;
