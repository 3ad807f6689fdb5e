//! Ambient occlusion pass, grounded directly on
//! `renderer/modules/render_module_ao.hpp`/`.cpp`: a full-screen pass
//! sampling the G-prepass normal/position attachment and depth buffer
//! through a hemisphere kernel of sample points, dithered by a small
//! tiled noise texture. `_kernel_size = 64` and the noise-scale derivation
//! (`screen_extent / noise_texture_extent`) are carried over unchanged.

use std::sync::{Arc, Mutex};

use cgmath::{InnerSpace, Vector3};
use vulkano::command_buffer::{AutoCommandBufferBuilder, PrimaryAutoCommandBuffer};

use crate::error::EngineResult;
use crate::math::Random;
use crate::shader::Shader;
use crate::vulkano_objects::image::TextureMap;

use super::{f32_slice_bytes, matrix_bytes, FramePacket, FullScreenPass, RenderModule};

const KERNEL_SIZE: usize = 64;
const NOISE_TEXTURE_DIM: u32 = 4;

pub struct AmbientOcclusionModule {
    pass: FullScreenPass,
    kernel: [[f32; 4]; KERNEL_SIZE],
    sample_radius: f32,
}

impl AmbientOcclusionModule {
    pub fn new(
        shader: Arc<Mutex<Shader>>,
        g_pre_pass_texture: Arc<TextureMap>,
        depth_texture: Arc<TextureMap>,
        noise_texture: Arc<TextureMap>,
        default_map: &Arc<TextureMap>,
        sample_radius: f32,
    ) -> EngineResult<Self> {
        let instance_id = shader
            .lock()
            .unwrap()
            .acquire_instance_resources(vec![g_pre_pass_texture, depth_texture, noise_texture], default_map)?;

        Ok(Self {
            pass: FullScreenPass::new("ao", shader, Some(instance_id)),
            kernel: generate_kernel(),
            sample_radius,
        })
    }

    fn apply_globals(&mut self, packet: &FramePacket) -> EngineResult<()> {
        let mut shader = self.pass.shader().lock().unwrap();
        if shader.uniform_index("projection").is_some() {
            shader.set_global_uniform(packet.frame_index, "projection", matrix_bytes(&packet.proj))?;
        }
        if shader.uniform_index("projection_inverse").is_some() {
            let inverse = cgmath::SquareMatrix::invert(packet.proj).unwrap_or(packet.proj);
            shader.set_global_uniform(packet.frame_index, "projection_inverse", matrix_bytes(&inverse))?;
        }
        if shader.uniform_index("noise_scale").is_some() {
            let scale = [
                packet.viewport_extent[0] as f32 / NOISE_TEXTURE_DIM as f32,
                packet.viewport_extent[1] as f32 / NOISE_TEXTURE_DIM as f32,
            ];
            shader.set_global_uniform(packet.frame_index, "noise_scale", f32_slice_bytes(&scale))?;
        }
        if shader.uniform_index("sample_radius").is_some() {
            shader.set_global_uniform(packet.frame_index, "sample_radius", &self.sample_radius.to_ne_bytes())?;
        }
        if shader.uniform_index("kernel").is_some() {
            let bytes: Vec<u8> = self.kernel.iter().flat_map(|v| f32_slice_bytes(v).to_vec()).collect();
            shader.set_global_uniform(packet.frame_index, "kernel", &bytes)?;
        }
        Ok(())
    }
}

impl RenderModule for AmbientOcclusionModule {
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
        self.apply_globals(packet)?;
        self.pass.draw(packet, builder)
    }
}

/// Hemisphere-oriented sample kernel, scaled so samples cluster nearer the
/// origin (`generate_kernel`'s `scale = lerp(0.1, 1.0, t*t)`).
fn generate_kernel() -> [[f32; 4]; KERNEL_SIZE] {
    let mut kernel = [[0.0f32; 4]; KERNEL_SIZE];
    for (i, sample) in kernel.iter_mut().enumerate() {
        let v = Vector3::new(
            Random::float32(-1.0, 1.0),
            Random::float32(-1.0, 1.0),
            Random::float32(0.0, 1.0),
        )
        .normalize();
        let t = i as f32 / KERNEL_SIZE as f32;
        let scale = 0.1 + 0.9 * t * t;
        *sample = [v.x * scale, v.y * scale, v.z * scale, 0.0];
    }
    kernel
}

