//! Separable blur pass, applied to the AO pass's raw occlusion buffer
//! before it is read by the world pass (a standard two-tap Gaussian blur
//! to remove the dither pattern the AO kernel's noise texture introduces).

use std::sync::{Arc, Mutex};

use vulkano::command_buffer::{AutoCommandBufferBuilder, PrimaryAutoCommandBuffer};

use crate::error::EngineResult;
use crate::shader::Shader;
use crate::vulkano_objects::image::TextureMap;

use super::{FramePacket, FullScreenPass, RenderModule};

pub struct BlurModule {
    pass: FullScreenPass,
}

impl BlurModule {
    pub fn new(shader: Arc<Mutex<Shader>>, input_texture: Arc<TextureMap>, default_map: &Arc<TextureMap>) -> EngineResult<Self> {
        let instance_id = shader
            .lock()
            .unwrap()
            .acquire_instance_resources(vec![input_texture], default_map)?;
        Ok(Self { pass: FullScreenPass::new("blur", shader, Some(instance_id)) })
    }
}

impl RenderModule for BlurModule {
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
            if shader.uniform_index("texel_size").is_some() {
                let texel_size = [1.0 / packet.viewport_extent[0] as f32, 1.0 / packet.viewport_extent[1] as f32];
                shader.set_global_uniform(packet.frame_index, "texel_size", super::f32_slice_bytes(&texel_size))?;
            }
        }
        self.pass.draw(packet, builder)
    }
}
