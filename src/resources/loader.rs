//! Resource system: resolves a resource name to a full asset path and
//! dispatches to the loader for the requested type (spec §3 "Resource
//! system"), grounded on `systems/resource_system.cpp`. The original keeps a
//! runtime registry of polymorphic `ResourceLoader*`; since every loader
//! this port has is known at compile time, `ResourceSystem` dispatches to
//! typed methods instead of a `dyn` registry.

use std::path::{Path, PathBuf};

use crate::error::EngineResult;
use crate::resources::loaders::{binary, image, material, mesh, shader, text};
use crate::resources::loaders::image::ImageData;
use crate::resources::loaders::material::MaterialConfig;
use crate::resources::loaders::mesh::MeshData;
use crate::resources::resource::Resource;
use crate::shader::config::ShaderConfig;

/// Per-loader asset subfolder names, matching each loader's
/// `_type_path` in the original (e.g. `MaterialLoader::MaterialLoader`
/// sets `_type_path = "materials"`).
pub struct ResourceSystem {
    base_path: PathBuf,
}

impl ResourceSystem {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn resolve(&self, subfolder: &str, file_name: &str) -> PathBuf {
        self.base_path.join(subfolder).join(file_name)
    }

    pub fn load_text(&self, name: &str) -> EngineResult<(Resource, String)> {
        text::load(&self.resolve("texts", name), name)
    }

    pub fn load_binary(&self, name: &str) -> EngineResult<(Resource, Vec<u8>)> {
        binary::load(&self.resolve("binary", name), name)
    }

    pub fn load_image(&self, name: &str) -> EngineResult<(Resource, ImageData)> {
        let file_name = format!("{name}.png");
        image::load(&self.resolve("textures", &file_name), name)
    }

    pub fn load_material(&self, name: &str) -> EngineResult<(Resource, MaterialConfig)> {
        let file_name = format!("{}.mat", name.to_ascii_lowercase());
        material::load(&self.resolve("materials", &file_name), name)
    }

    pub fn load_shader_config(&self, name: &str) -> EngineResult<(Resource, ShaderConfig)> {
        let file_name = format!("{name}.shadercfg");
        shader::load(&self.resolve("shaders", &file_name), name)
    }

    pub fn load_mesh(&self, name: &str) -> EngineResult<(Resource, Vec<MeshData>)> {
        let file_name = format!("{name}.obj");
        mesh::load(&self.resolve("models", &file_name), name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_paths_under_the_right_subfolder() {
        let rs = ResourceSystem::new("/assets");
        let path = rs.resolve("materials", "bricks.mat");
        assert_eq!(path, PathBuf::from("/assets/materials/bricks.mat"));
    }
}
