//! Shadow-map pass: renders visible geometry from the direction light's
//! point of view into a depth-only render target, read back by the world
//! pass for shadow testing. Same draw iteration as [`super::GeometryPass`];
//! the light-space view-projection matrix is the only global this pass
//! writes (no color attachment, no material texture binding).

use std::sync::{Arc, Mutex};

use cgmath::{Matrix4, SquareMatrix};
use vulkano::command_buffer::{AutoCommandBufferBuilder, PrimaryAutoCommandBuffer};

use crate::error::EngineResult;
use crate::shader::Shader;

use super::{matrix_bytes, FramePacket, GeometryPass, RenderModule};

pub struct ShadowModule {
    pass: GeometryPass,
    light_view_proj: Matrix4<f32>,
}

impl ShadowModule {
    pub fn new(shader: Arc<Mutex<Shader>>) -> Self {
        Self {
            pass: GeometryPass::new("shadow", shader),
            light_view_proj: Matrix4::identity(),
        }
    }

    /// Called once per frame before `on_render`, since the light-space
    /// transform depends on the scene's direction light, not the camera.
    pub fn set_light_view_proj(&mut self, light_view_proj: Matrix4<f32>) {
        self.light_view_proj = light_view_proj;
    }
}

impl RenderModule for ShadowModule {
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
            if shader.uniform_index("light_view_proj").is_some() {
                shader.set_global_uniform(packet.frame_index, "light_view_proj", matrix_bytes(&self.light_view_proj))?;
            }
        }
        self.pass.draw(packet, builder)
    }
}
