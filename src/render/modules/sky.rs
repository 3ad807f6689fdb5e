//! Sky pass: full-screen background fill drawn before the world pass (so
//! its depth test rejects fragments any opaque geometry already covers),
//! reconstructing a view ray per pixel from the inverse view-projection
//! matrix and a horizon/zenith gradient color.

use std::sync::{Arc, Mutex};

use cgmath::SquareMatrix;
use vulkano::command_buffer::{AutoCommandBufferBuilder, PrimaryAutoCommandBuffer};

use crate::error::EngineResult;
use crate::shader::Shader;

use super::{matrix_bytes, FramePacket, FullScreenPass, RenderModule};

pub struct SkyModule {
    pass: FullScreenPass,
    horizon_color: [f32; 4],
    zenith_color: [f32; 4],
}

impl SkyModule {
    pub fn new(shader: Arc<Mutex<Shader>>, horizon_color: [f32; 4], zenith_color: [f32; 4]) -> Self {
        Self {
            pass: FullScreenPass::new("sky", shader, None),
            horizon_color,
            zenith_color,
        }
    }
}

impl RenderModule for SkyModule {
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
                let inverse = packet.proj_view.invert().unwrap_or(packet.proj_view);
                shader.set_global_uniform(packet.frame_index, "inverse_view_proj", matrix_bytes(&inverse))?;
            }
            if shader.uniform_index("horizon_color").is_some() {
                shader.set_global_uniform(packet.frame_index, "horizon_color", super::f32_slice_bytes(&self.horizon_color))?;
            }
            if shader.uniform_index("zenith_color").is_some() {
                shader.set_global_uniform(packet.frame_index, "zenith_color", super::f32_slice_bytes(&self.zenith_color))?;
            }
        }
        self.pass.draw(packet, builder)
    }
}
