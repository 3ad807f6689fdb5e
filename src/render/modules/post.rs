//! Final post-processing pass: tone maps and exposes the accumulated HDR
//! color buffer into the swapchain's presentable format. Last pass in the
//! graph (spec §4.4 "`is_last` render pass writes directly to the
//! swapchain image rather than an offscreen attachment").

use std::sync::{Arc, Mutex};

use vulkano::command_buffer::{AutoCommandBufferBuilder, PrimaryAutoCommandBuffer};

use crate::error::EngineResult;
use crate::shader::Shader;
use crate::vulkano_objects::image::TextureMap;

use super::{FramePacket, FullScreenPass, RenderModule};

pub struct PostModule {
    pass: FullScreenPass,
    exposure: f32,
}

impl PostModule {
    pub fn new(
        shader: Arc<Mutex<Shader>>,
        hdr_color_texture: Arc<TextureMap>,
        default_map: &Arc<TextureMap>,
        exposure: f32,
    ) -> EngineResult<Self> {
        let instance_id = shader.lock().unwrap().acquire_instance_resources(vec![hdr_color_texture], default_map)?;
        Ok(Self { pass: FullScreenPass::new("post", shader, Some(instance_id)), exposure })
    }
}

impl RenderModule for PostModule {
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
            if shader.uniform_index("exposure").is_some() {
                shader.set_global_uniform(packet.frame_index, "exposure", &self.exposure.to_ne_bytes())?;
            }
        }
        self.pass.draw(packet, builder)
    }
}
