//! Volumetric fog/light-shaft pass: a full-screen ray march through the
//! direction light's shadow map, dithered per frame by the shared
//! [`crate::math::Random`] utility to break up banding (the original's
//! `Random` consumer named in its header, carried here as a real use
//! rather than a placeholder).

use std::sync::{Arc, Mutex};

use vulkano::command_buffer::{AutoCommandBufferBuilder, PrimaryAutoCommandBuffer};

use crate::error::EngineResult;
use crate::math::Random;
use crate::shader::Shader;
use crate::vulkano_objects::image::TextureMap;

use super::{matrix_bytes, FramePacket, FullScreenPass, RenderModule};

pub struct VolumetricsModule {
    pass: FullScreenPass,
    density: f32,
}

impl VolumetricsModule {
    pub fn new(
        shader: Arc<Mutex<Shader>>,
        shadow_map: Arc<TextureMap>,
        default_map: &Arc<TextureMap>,
        density: f32,
    ) -> EngineResult<Self> {
        let instance_id = shader.lock().unwrap().acquire_instance_resources(vec![shadow_map], default_map)?;
        Ok(Self { pass: FullScreenPass::new("volumetrics", shader, Some(instance_id)), density })
    }
}

impl RenderModule for VolumetricsModule {
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
            if shader.uniform_index("inverse_view_proj").is_some() {
                let inverse = cgmath::SquareMatrix::invert(packet.proj_view).unwrap_or(packet.proj_view);
                shader.set_global_uniform(packet.frame_index, "inverse_view_proj", matrix_bytes(&inverse))?;
            }
            if shader.uniform_index("density").is_some() {
                shader.set_global_uniform(packet.frame_index, "density", &self.density.to_ne_bytes())?;
            }
            if shader.uniform_index("dither_offset").is_some() {
                let offset = [Random::float32_01(), Random::float32_01()];
                shader.set_global_uniform(packet.frame_index, "dither_offset", super::f32_slice_bytes(&offset))?;
            }
        }
        self.pass.draw(packet, builder)
    }
}
