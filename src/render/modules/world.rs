//! World pass: the main forward-lit color pass, iterating every visible
//! geometry and applying the scene's point/direction lights plus the
//! blurred AO and shadow-map results as instance-scope samplers. Grounded
//! on the teacher's `LightingSystem`/`DrawSystem` (`render/lighting_system.rs`,
//! `render/draw_system.rs`), generalized from their hardcoded light count
//! into the config-driven uniform list any `.shadercfg` can declare.

use std::sync::{Arc, Mutex};

use vulkano::command_buffer::{AutoCommandBufferBuilder, PrimaryAutoCommandBuffer};

use crate::error::EngineResult;
use crate::shader::Shader;

use super::{matrix_bytes, FramePacket, GeometryPass, RenderModule};

#[derive(Debug, Clone, Copy)]
pub struct PointLight {
    pub position: [f32; 4],
    pub color: [f32; 4],
}

#[derive(Debug, Clone, Copy)]
pub struct DirectionLight {
    pub direction: [f32; 4],
    pub color: [f32; 4],
}

pub struct WorldModule {
    pass: GeometryPass,
    point_lights: Vec<PointLight>,
    direction_light: DirectionLight,
    ambient_color: [f32; 4],
}

impl WorldModule {
    pub fn new(shader: Arc<Mutex<Shader>>) -> Self {
        Self {
            pass: GeometryPass::new("world", shader),
            point_lights: Vec::new(),
            direction_light: DirectionLight { direction: [0.0, -1.0, 0.0, 0.0], color: [1.0, 1.0, 1.0, 1.0] },
            ambient_color: [0.1, 0.1, 0.1, 1.0],
        }
    }

    pub fn set_lights(&mut self, point_lights: Vec<PointLight>, direction_light: DirectionLight, ambient_color: [f32; 4]) {
        self.point_lights = point_lights;
        self.direction_light = direction_light;
        self.ambient_color = ambient_color;
    }
}

impl RenderModule for WorldModule {
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
            if shader.uniform_index("direction_light").is_some() {
                let mut bytes = Vec::with_capacity(32);
                bytes.extend_from_slice(super::f32_slice_bytes(&self.direction_light.direction));
                bytes.extend_from_slice(super::f32_slice_bytes(&self.direction_light.color));
                shader.set_global_uniform(packet.frame_index, "direction_light", &bytes)?;
            }
            if shader.uniform_index("ambient_color").is_some() {
                shader.set_global_uniform(packet.frame_index, "ambient_color", super::f32_slice_bytes(&self.ambient_color))?;
            }
            if shader.uniform_index("point_lights").is_some() {
                let mut bytes = Vec::with_capacity(self.point_lights.len() * 32);
                for light in &self.point_lights {
                    bytes.extend_from_slice(super::f32_slice_bytes(&light.position));
                    bytes.extend_from_slice(super::f32_slice_bytes(&light.color));
                }
                shader.set_global_uniform(packet.frame_index, "point_lights", &bytes)?;
            }
        }
        self.pass.draw(packet, builder)
    }
}
