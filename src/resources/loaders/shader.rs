//! Shader config resource loader (spec §3), a thin wrapper around
//! [`crate::shader::config::parse`] — resource-system plumbing around an
//! already-written parser, grounded on `resources/loaders/shader_loader.cpp`'s
//! `ShaderLoader::load` (file read + error propagation; the parse itself
//! lives in `shader::config`).

use std::fs;
use std::path::Path;

use crate::error::{EngineError, EngineResult};
use crate::resources::resource::{Resource, ResourceType};
use crate::shader::config::{self, ShaderConfig};

pub fn load(full_path: &Path, name: &str) -> EngineResult<(Resource, ShaderConfig)> {
    let source = fs::read_to_string(full_path)
        .map_err(|e| EngineError::RuntimeError(format!("failed to read shader config \"{name}\": {e}")))?;
    let cfg = config::parse(name, &source)?;
    let resource = Resource::new(name, full_path.to_string_lossy(), ResourceType::SHADER);
    Ok((resource, cfg))
}
