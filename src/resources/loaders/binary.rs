//! Raw binary resource loader (spec §3), grounded on
//! `resources/loaders/binary_loader.cpp`.

use std::fs;
use std::path::Path;

use crate::error::{EngineError, EngineResult};
use crate::resources::resource::{Resource, ResourceType};

pub fn load(full_path: &Path, name: &str) -> EngineResult<(Resource, Vec<u8>)> {
    let contents = fs::read(full_path)
        .map_err(|e| EngineError::RuntimeError(format!("failed to read binary resource \"{name}\": {e}")))?;
    let resource = Resource::new(name, full_path.to_string_lossy(), ResourceType::BINARY);
    Ok((resource, contents))
}
