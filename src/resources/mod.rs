//! Resource loading (spec §3 "Resource"/"Resource system"): a
//! [`loader::ResourceSystem`] resolves names to files under an assets root
//! and dispatches to the per-type loader in [`loaders`]; [`serializer`] is
//! the shared binary encode/decode primitive the `.mesh` cache is built on.

pub mod loader;
pub mod loaders;
pub mod resource;
pub mod serializer;

pub use loader::ResourceSystem;
pub use resource::{Resource, ResourceType};
