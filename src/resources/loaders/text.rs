//! Plain-text resource loader (spec §3), grounded on
//! `resources/loaders/text_loader.cpp`.

use std::fs;
use std::path::Path;

use crate::error::{EngineError, EngineResult};
use crate::resources::resource::{Resource, ResourceType};

pub fn load(full_path: &Path, name: &str) -> EngineResult<(Resource, String)> {
    let contents = fs::read_to_string(full_path)
        .map_err(|e| EngineError::RuntimeError(format!("failed to read text resource \"{name}\": {e}")))?;
    let resource = Resource::new(name, full_path.to_string_lossy(), ResourceType::TEXT);
    Ok((resource, contents))
}
