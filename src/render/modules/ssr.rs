//! Screen-space reflections: a full-screen pass that ray-marches the
//! world-pass color buffer in screen space using the G-prepass normal/depth
//! to find reflection hits, composited additively over the world pass's
//! output before the final post pass.

use std::sync::{Arc, Mutex};

use vulkano::command_buffer::{AutoCommandBufferBuilder, PrimaryAutoCommandBuffer};

use crate::error::EngineResult;
use crate::shader::Shader;
use crate::vulkano_objects::image::TextureMap;

use super::{matrix_bytes, FramePacket, FullScreenPass, RenderModule};

pub struct ScreenSpaceReflectionsModule {
    pass: FullScreenPass,
    max_distance: f32,
    thickness: f32,
}

impl ScreenSpaceReflectionsModule {
    pub fn new(
        shader: Arc<Mutex<Shader>>,
        color_texture: Arc<TextureMap>,
        normal_texture: Arc<TextureMap>,
        depth_texture: Arc<TextureMap>,
        default_map: &Arc<TextureMap>,
        max_distance: f32,
        thickness: f32,
    ) -> EngineResult<Self> {
        let instance_id = shader
            .lock()
            .unwrap()
            .acquire_instance_resources(vec![color_texture, normal_texture, depth_texture], default_map)?;
        Ok(Self {
            pass: FullScreenPass::new("ssr", shader, Some(instance_id)),
            max_distance,
            thickness,
        })
    }
}

impl RenderModule for ScreenSpaceReflectionsModule {
    fn name(&self) -> &str {
        self.pass.name()
    }

    fn shader(&self) -> &Arc<Mutex<Shader>> {
        self.pass.shader()
    }

    fn on_render(
        &mut self,
        packet: &FramePacket,
        builder: &mut AutoCommandBufferBuilder<PrimaryAutoCommandBuffer>,
    ) -> EngineResult<()> {
        {
            let mut shader = self.pass.shader().lock().unwrap();
            if shader.uniform_index("projection").is_some() {
                shader.set_global_uniform(packet.frame_index, "projection", matrix_bytes(&packet.proj))?;
            }
            if shader.uniform_index("max_distance").is_some() {
                shader.set_global_uniform(packet.frame_index, "max_distance", &self.max_distance.to_ne_bytes())?;
            }
            if shader.uniform_index("thickness").is_some() {
                shader.set_global_uniform(packet.frame_index, "thickness", &self.thickness.to_ne_bytes())?;
            }
        }
        self.pass.draw(packet, builder)
    }
}
