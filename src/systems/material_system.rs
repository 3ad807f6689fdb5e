//! Reference-counted material cache (spec §4.7 "Texture / Material /
//! Geometry / Shader / Resource Systems"), grounded on
//! `systems/material_system.cpp`. Acquiring a material resolves its
//! `.mat` config, acquires its shader and texture maps through
//! [`super::shader_system::ShaderSystem`]/[`super::texture_system::TextureSystem`],
//! and registers an instance with the shader so per-material uniforms
//! (diffuse color, shininess) and descriptor sets exist independently of
//! any one draw call.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use vulkano::device::{Device, Queue};

use crate::error::{EngineError, EngineResult};
use crate::resources::ResourceSystem;
use crate::shader::Shader;
use crate::vulkano_objects::allocators::Allocators;

use super::shader_system::ShaderSystem;
use super::texture_system::TextureSystem;

pub struct Material {
    pub id: u32,
    pub name: String,
    pub shader_name: String,
    pub shader: Arc<Mutex<Shader>>,
    pub instance_id: u32,
    pub diffuse_color: [f32; 4],
    pub shininess: f32,
}

struct MaterialRef {
    material: Arc<Material>,
    reference_count: u64,
    auto_release: bool,
}

pub struct MaterialSystem {
    registered: HashMap<String, MaterialRef>,
    next_id: u32,
    max_material_count: u64,
}

impl Default for MaterialSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl MaterialSystem {
    pub fn new() -> Self {
        Self {
            registered: HashMap::new(),
            next_id: 1,
            max_material_count: 4096,
        }
    }

    /// Loads `name.mat`, acquires its shader and texture maps, and registers
    /// a shader instance for the material's uniforms, or returns the
    /// already-cached material with its refcount bumped.
    #[allow(clippy::too_many_arguments)]
    pub fn acquire(
        &mut self,
        name: &str,
        auto_release: bool,
        device: Arc<Device>,
        queue: &Arc<Queue>,
        allocators: &Allocators,
        resource_system: &ResourceSystem,
        shader_system: &mut ShaderSystem,
        texture_system: &mut TextureSystem,
        required_ubo_alignment: u64,
        max_instance_count: u32,
        max_frames_in_flight: u32,
        wireframe: bool,
        render_graph: &crate::vulkano_objects::render_pass::RenderGraph,
    ) -> EngineResult<Arc<Material>> {
        let key = name.to_ascii_lowercase();
        if let Some(existing) = self.registered.get_mut(&key) {
            existing.reference_count += 1;
            return Ok(existing.material.clone());
        }

        if self.registered.len() as u64 >= self.max_material_count {
            return Err(EngineError::RuntimeError(format!(
                "material system is at capacity ({} materials)",
                self.max_material_count
            )));
        }

        let (_, config) = resource_system.load_material(name)?;

        let shader = shader_system.acquire(
            &config.shader,
            true,
            device.clone(),
            allocators,
            render_graph,
            resource_system,
            required_ubo_alignment,
            max_instance_count,
            max_frames_in_flight,
            wireframe,
        )?;

        let default_map = texture_system.default_texture().clone();
        let mut maps = Vec::new();
        for map_name in [&config.diffuse_map_name, &config.specular_map_name, &config.normal_map_name] {
            if map_name.is_empty() {
                maps.push(default_map.clone());
            } else {
                match texture_system.acquire(map_name, true, device.clone(), queue, allocators, resource_system) {
                    Ok(map) => maps.push(map),
                    Err(e) => {
                        log::warn!("MaterialSystem: failed to load texture map \"{map_name}\" for material \"{name}\": {e}, using default");
                        maps.push(default_map.clone());
                    }
                }
            }
        }

        let instance_id = {
            let mut shader_guard = shader.lock().unwrap();
            let id = shader_guard.acquire_instance_resources(maps, &default_map)?;
            if shader_guard.uniform_index("diffuse_color").is_some() {
                let bytes: Vec<u8> = config.diffuse_color.iter().flat_map(|f| f.to_ne_bytes()).collect();
                let _ = shader_guard.set_instance_uniform(id, "diffuse_color", &bytes);
            }
            if shader_guard.uniform_index("shininess").is_some() {
                let _ = shader_guard.set_instance_uniform(id, "shininess", &config.shininess.to_ne_bytes());
            }
            id
        };

        let id = self.next_id;
        self.next_id += 1;
        let material = Arc::new(Material {
            id,
            name: config.name.clone(),
            shader_name: config.shader.clone(),
            shader,
            instance_id,
            diffuse_color: config.diffuse_color,
            shininess: config.shininess,
        });

        self.registered.insert(
            key,
            MaterialRef {
                material: material.clone(),
                reference_count: 1,
                auto_release,
            },
        );
        Ok(material)
    }

    pub fn release(&mut self, name: &str, shader_system: &mut ShaderSystem, texture_system: &mut TextureSystem) {
        let key = name.to_ascii_lowercase();
        let Some(reference) = self.registered.get_mut(&key) else {
            log::warn!("tried to release a non-existent material: {name}");
            return;
        };
        if reference.reference_count == 0 {
            log::warn!("tried to release a non-existent material: {name}");
            return;
        }
        reference.reference_count -= 1;
        if reference.reference_count == 0 && reference.auto_release {
            reference
                .material
                .shader
                .lock()
                .unwrap()
                .release_instance_resources(reference.material.instance_id);
            shader_system.release(&reference.material.shader_name);
            let _ = texture_system;
            self.registered.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_material_system_starts_empty() {
        let system = MaterialSystem::new();
        assert_eq!(system.registered.len(), 0);
    }
}
