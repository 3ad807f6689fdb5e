//! One submodule per resource type (spec §3 "Resource loaders"), mirroring
//! `resources/loaders/*` in the original: each loader knows how to turn a
//! name into a full path under [`crate::resources::loader::ResourceSystem`]'s
//! base path and parse/decode the bytes found there.

pub mod binary;
pub mod image;
pub mod material;
pub mod mesh;
pub mod shader;
pub mod text;
