//! Geometry pre-pass: writes view-space position/normal (and, implicitly,
//! depth) for every visible mesh ahead of the lighting passes that read them
//! back as input attachments (AO, SSR). A thin [`GeometryPass`] wrapper;
//! the pass-specific behavior is entirely in its `.shadercfg` attachment
//! list, not in Rust code.

use std::sync::{Arc, Mutex};

use vulkano::command_buffer::{AutoCommandBufferBuilder, PrimaryAutoCommandBuffer};

use crate::error::EngineResult;
use crate::shader::Shader;

use super::{matrix_bytes, FramePacket, GeometryPass, RenderModule};

pub struct GPrepassModule {
    pass: GeometryPass,
}

impl GPrepassModule {
    pub fn new(shader: Arc<Mutex<Shader>>) -> Self {
        Self { pass: GeometryPass::new("g_prepass", shader) }
    }
}

impl RenderModule for GPrepassModule {
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
            if shader.uniform_index("view").is_some() {
                shader.set_global_uniform(packet.frame_index, "view", matrix_bytes(&packet.view))?;
            }
            if shader.uniform_index("projection").is_some() {
                shader.set_global_uniform(packet.frame_index, "projection", matrix_bytes(&packet.proj))?;
            }
        }
        self.pass.draw(packet, builder)
    }
}
