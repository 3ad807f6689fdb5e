//! Reference-counted shader cache tied to a render pass (spec §4.7 "Shader
//! system"), grounded on `systems/shader_system.cpp`. Where the teacher
//! hand-assembles one Rust module per shader under `src/shaders/*`, this
//! system resolves a name to a `.shadercfg` + compiled SPIR-V pair through
//! [`crate::resources::ResourceSystem`] and builds the data-driven
//! [`crate::shader::Shader`] runtime against whichever pass in the
//! [`crate::vulkano_objects::render_pass::RenderGraph`] its config names.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use vulkano::device::Device;
use vulkano::render_pass::Subpass;

use crate::error::{EngineError, EngineResult};
use crate::resources::ResourceSystem;
use crate::shader::Shader;
use crate::vulkano_objects::allocators::Allocators;
use crate::vulkano_objects::render_pass::RenderGraph;

struct ShaderRef {
    shader: Arc<Mutex<Shader>>,
    reference_count: u64,
    auto_release: bool,
}

pub struct ShaderSystem {
    registered: HashMap<String, ShaderRef>,
    max_shader_count: u64,
}

impl Default for ShaderSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl ShaderSystem {
    pub fn new() -> Self {
        Self {
            registered: HashMap::new(),
            max_shader_count: 256,
        }
    }

    /// Loads `name.shadercfg` plus its compiled `.vert.spv`/`.frag.spv`
    /// stages and builds a pipeline against the render pass the config
    /// names, or returns the already-cached shader with its refcount
    /// bumped (spec §4.7 "Common contract").
    #[allow(clippy::too_many_arguments)]
    pub fn acquire(
        &mut self,
        name: &str,
        auto_release: bool,
        device: Arc<Device>,
        allocators: &Allocators,
        render_graph: &RenderGraph,
        resource_system: &ResourceSystem,
        required_ubo_alignment: u64,
        max_instance_count: u32,
        max_frames_in_flight: u32,
        wireframe: bool,
    ) -> EngineResult<Arc<Mutex<Shader>>> {
        let key = name.to_ascii_lowercase();
        if let Some(existing) = self.registered.get_mut(&key) {
            existing.reference_count += 1;
            return Ok(existing.shader.clone());
        }

        if self.registered.len() as u64 >= self.max_shader_count {
            return Err(EngineError::RuntimeError(format!(
                "shader system is at capacity ({} shaders)",
                self.max_shader_count
            )));
        }

        let (_, config) = resource_system.load_shader_config(name)?;
        let graph_pass = render_graph.get(&config.render_pass_name).ok_or_else(|| {
            EngineError::InvalidArgument(format!(
                "shader \"{name}\" references unknown render pass \"{}\"",
                config.render_pass_name
            ))
        })?;
        let subpass = Subpass::from(graph_pass.handle().clone(), 0).ok_or_else(|| {
            EngineError::RuntimeError(format!(
                "render pass \"{}\" has no subpass 0",
                config.render_pass_name
            ))
        })?;

        let (_, vertex_bytes) = resource_system.load_binary(&format!("{name}.vert.spv"))?;
        let (_, fragment_bytes) = resource_system.load_binary(&format!("{name}.frag.spv"))?;

        let shader = Shader::new(
            device,
            allocators,
            subpass,
            config,
            required_ubo_alignment,
            max_instance_count,
            max_frames_in_flight,
            wireframe,
            &words_from_bytes(&vertex_bytes),
            &words_from_bytes(&fragment_bytes),
        )?;

        let handle = Arc::new(Mutex::new(shader));
        self.registered.insert(
            key,
            ShaderRef {
                shader: handle.clone(),
                reference_count: 1,
                auto_release,
            },
        );
        Ok(handle)
    }

    pub fn release(&mut self, name: &str) {
        let key = name.to_ascii_lowercase();
        let Some(reference) = self.registered.get_mut(&key) else {
            log::warn!("tried to release a non-existent shader: {name}");
            return;
        };
        if reference.reference_count == 0 {
            log::warn!("tried to release a non-existent shader: {name}");
            return;
        }
        reference.reference_count -= 1;
        if reference.reference_count == 0 && reference.auto_release {
            self.registered.remove(&key);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<Mutex<Shader>>> {
        self.registered.get(&name.to_ascii_lowercase()).map(|r| r.shader.clone())
    }
}

/// SPIR-V words are little-endian `u32`s (spec §6's binary loader hands
/// back raw bytes; shader module creation wants `&[u32]`).
fn words_from_bytes(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_from_bytes_is_little_endian() {
        let words = words_from_bytes(&[0x03, 0x02, 0x23, 0x07]);
        assert_eq!(words, vec![0x0723_0203]);
    }
}
