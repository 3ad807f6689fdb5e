//! Device image allocation, layout transitions, and mipmap generation
//! (spec §4.3). Where the teacher's `render_data::texture::load_texture`
//! hardcodes a single "load a PNG, build one mip level" path, this module
//! generalizes it into the fuller Image/Texture contract: explicit
//! transitions, blit-based mip chains, and a staging-buffer write path any
//! texture (not just PNG-backed ones) can call into.

use std::sync::Arc;

use vulkano::command_buffer::{
    AutoCommandBufferBuilder, BlitImageInfo, BufferImageCopy, CommandBufferUsage,
    CopyBufferToImageInfo, ImageBlit, PrimaryCommandBufferAbstract,
};
use vulkano::format::Format;
use vulkano::image::sampler::Filter;
use vulkano::image::{
    Image, ImageAspects, ImageCreateInfo, ImageLayout, ImageSubresourceLayers, ImageTiling,
    ImageUsage, SampleCount,
};
use vulkano::memory::allocator::{AllocationCreateInfo, MemoryTypeFilter};
use vulkano::sync::GpuFuture;
use vulkano::{DeviceSize, VulkanObject};

use crate::error::{EngineError, EngineResult};
use crate::vulkano_objects::allocators::Allocators;

/// `mip_levels == floor(log2(max(w,h))) + 1` (spec §8 property 7).
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    (width.max(height) as f32).log2().floor() as u32 + 1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFlags {
    Wrapped,
    Writable,
    RenderTarget,
    Multisampled,
}

/// A GPU image plus the metadata spec §3 names: stable dimensions, format,
/// mip count, and whether it owns its memory (a wrapped swapchain image does
/// not).
pub struct Texture {
    pub image: Arc<Image>,
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
    pub format: Format,
    pub wrapped: bool,
}

impl Texture {
    pub fn create(
        allocators: &Allocators,
        width: u32,
        height: u32,
        format: Format,
        samples: SampleCount,
        usage: ImageUsage,
        generate_mips: bool,
    ) -> Self {
        let mip_levels = if generate_mips {
            mip_level_count(width, height)
        } else {
            1
        };

        let image = Image::new(
            allocators.memory.clone(),
            ImageCreateInfo {
                image_type: vulkano::image::ImageType::Dim2d,
                format,
                extent: [width, height, 1],
                mip_levels,
                samples,
                tiling: ImageTiling::Optimal,
                usage,
                ..Default::default()
            },
            AllocationCreateInfo {
                memory_type_filter: MemoryTypeFilter::PREFER_DEVICE,
                ..Default::default()
            },
        )
        .unwrap();

        crate::memory::tag::record_alloc(
            crate::memory::MemoryTag::Texture,
            (width as u64) * (height as u64) * 4,
        );

        Self {
            image,
            width,
            height,
            mip_levels,
            format,
            wrapped: false,
        }
    }

    /// Convenience constructor for the common texture-system path: create a
    /// sampled, mip-mapped RGBA8-class image and immediately stream `data`
    /// into it through a staging buffer (spec §4.3 `Texture.write`).
    pub fn create_and_upload(
        allocators: &Allocators,
        queue: Arc<vulkano::device::Queue>,
        width: u32,
        height: u32,
        format: Format,
        data: &[u8],
    ) -> EngineResult<Self> {
        let texture = Self::create(
            allocators,
            width,
            height,
            format,
            SampleCount::Sample1,
            ImageUsage::TRANSFER_DST | ImageUsage::TRANSFER_SRC | ImageUsage::SAMPLED,
            true,
        );
        texture.write(allocators, queue, data);
        Ok(texture)
    }

    /// Wraps a pre-existing image (e.g. a swapchain image) without taking
    /// ownership of its memory. Spec §3: "A wrapped texture ... owns no
    /// memory."
    pub fn wrap(image: Arc<Image>, format: Format) -> Self {
        let [width, height, _] = image.extent();
        Self {
            image,
            width,
            height,
            mip_levels: 1,
            format,
            wrapped: true,
        }
    }

    /// Streams `data` through a host-visible staging buffer, transitions the
    /// base mip level to `TransferDstOptimal`, copies, then regenerates the
    /// mip chain. No-op on wrapped textures (spec §4.3).
    pub fn write(&self, allocators: &Allocators, queue: Arc<vulkano::device::Queue>, data: &[u8]) {
        if self.wrapped {
            return;
        }

        let staging = vulkano::buffer::Buffer::from_iter(
            allocators.memory.clone(),
            vulkano::buffer::BufferCreateInfo {
                usage: vulkano::buffer::BufferUsage::TRANSFER_SRC,
                ..Default::default()
            },
            AllocationCreateInfo {
                memory_type_filter: MemoryTypeFilter::PREFER_DEVICE
                    | MemoryTypeFilter::HOST_SEQUENTIAL_WRITE,
                ..Default::default()
            },
            data.iter().copied(),
        )
        .unwrap();

        let mut builder = AutoCommandBufferBuilder::primary(
            &allocators.command_buffer,
            queue.queue_family_index(),
            CommandBufferUsage::OneTimeSubmit,
        )
        .unwrap();

        builder
            .copy_buffer_to_image(CopyBufferToImageInfo {
                regions: [BufferImageCopy {
                    image_subresource: ImageSubresourceLayers {
                        aspects: ImageAspects::COLOR,
                        mip_level: 0,
                        array_layers: 0..1,
                    },
                    image_extent: [self.width, self.height, 1],
                    ..Default::default()
                }]
                .into(),
                ..CopyBufferToImageInfo::buffer_image(staging, self.image.clone())
            })
            .unwrap();

        let future = builder.build().unwrap().execute(queue.clone()).unwrap();
        future.then_signal_fence_and_flush().unwrap().wait(None).unwrap();

        if self.mip_levels > 1 {
            self.generate_mipmaps(allocators, queue);
        }
    }

    /// Iteratively blits level i-1 into level i with halved extent (min 1),
    /// transitioning each finished level to shader-read-only (spec §4.3).
    /// Requires the format to support linear blit of sampled images.
    pub fn generate_mipmaps(&self, allocators: &Allocators, queue: Arc<vulkano::device::Queue>) {
        let mut builder = AutoCommandBufferBuilder::primary(
            &allocators.command_buffer,
            queue.queue_family_index(),
            CommandBufferUsage::OneTimeSubmit,
        )
        .unwrap();

        let mut mip_width = self.width as i32;
        let mut mip_height = self.height as i32;

        for level in 1..self.mip_levels {
            let next_width = (mip_width / 2).max(1);
            let next_height = (mip_height / 2).max(1);

            builder
                .blit_image(BlitImageInfo {
                    regions: [ImageBlit {
                        src_subresource: ImageSubresourceLayers {
                            aspects: ImageAspects::COLOR,
                            mip_level: level - 1,
                            array_layers: 0..1,
                        },
                        src_offsets: [[0, 0, 0], [mip_width as u32, mip_height as u32, 1]],
                        dst_subresource: ImageSubresourceLayers {
                            aspects: ImageAspects::COLOR,
                            mip_level: level,
                            array_layers: 0..1,
                        },
                        dst_offsets: [[0, 0, 0], [next_width as u32, next_height as u32, 1]],
                        ..Default::default()
                    }]
                    .into(),
                    filter: Filter::Linear,
                    ..BlitImageInfo::images(self.image.clone(), self.image.clone())
                })
                .unwrap();

            mip_width = next_width;
            mip_height = next_height;
        }

        let future = builder.build().unwrap().execute(queue).unwrap();
        future.then_signal_fence_and_flush().unwrap().wait(None).unwrap();
    }

    /// Emits an image-memory barrier moving the whole image from `old` to
    /// `new`. Unsupported pairs fail with `InvalidLayoutTransition` rather
    /// than guessing access/stage masks (spec §4.3).
    pub fn transition_layout(
        &self,
        builder: &mut AutoCommandBufferBuilder<vulkano::command_buffer::PrimaryAutoCommandBuffer>,
        old: ImageLayout,
        new: ImageLayout,
    ) -> EngineResult<()> {
        let (src_access, src_stage, dst_access, dst_stage) = transition_masks(old, new)
            .ok_or_else(|| EngineError::InvalidLayoutTransition {
                from: format!("{old:?}"),
                to: format!("{new:?}"),
            })?;

        use vulkano::command_buffer::{DependencyInfo, ImageMemoryBarrier};
        use vulkano::image::ImageSubresourceRange;

        builder
            .pipeline_barrier(DependencyInfo {
                image_memory_barriers: vec![ImageMemoryBarrier {
                    src_stages: src_stage,
                    src_access,
                    dst_stages: dst_stage,
                    dst_access,
                    old_layout: old,
                    new_layout: new,
                    subresource_range: ImageSubresourceRange {
                        aspects: ImageAspects::COLOR,
                        mip_levels: 0..self.mip_levels,
                        array_layers: 0..1,
                    },
                    ..ImageMemoryBarrier::image(self.image.clone())
                }]
                .into(),
                ..Default::default()
            })
            .unwrap();

        Ok(())
    }

    /// Destroys the backing image and reallocates with the same format/mip
    /// policy. No-op on wrapped textures (spec §4.3).
    pub fn resize(&mut self, allocators: &Allocators, width: u32, height: u32, usage: ImageUsage, samples: SampleCount) {
        if self.wrapped {
            return;
        }
        let generate_mips = self.mip_levels > 1;
        crate::memory::tag::record_free(
            crate::memory::MemoryTag::Texture,
            (self.width as u64) * (self.height as u64) * 4,
        );
        *self = Self::create(allocators, width, height, self.format, samples, usage, generate_mips);
    }

    pub fn handle(&self) -> u64 {
        self.image.handle().as_raw()
    }
}

/// Texture filtering and repeat mode, spec §3's "Texture Map": "references
/// a Texture plus filter-min, filter-mag, three repeat modes". Owned by
/// materials or a shader's global/instance state (spec §3), not by the
/// texture cache itself — several maps can reference the same cached
/// [`Texture`] with different sampler settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatMode {
    Repeat,
    MirroredRepeat,
    ClampToEdge,
    ClampToBorder,
}

impl RepeatMode {
    pub fn to_vulkano(self) -> vulkano::image::sampler::SamplerAddressMode {
        use vulkano::image::sampler::SamplerAddressMode::*;
        match self {
            RepeatMode::Repeat => Repeat,
            RepeatMode::MirroredRepeat => MirroredRepeat,
            RepeatMode::ClampToEdge => ClampToEdge,
            RepeatMode::ClampToBorder => ClampToBorder,
        }
    }
}

#[derive(Clone)]
pub struct TextureMap {
    pub texture: Arc<Texture>,
    pub filter_min: Filter,
    pub filter_mag: Filter,
    pub repeat_u: RepeatMode,
    pub repeat_v: RepeatMode,
    pub repeat_w: RepeatMode,
    pub sampler: Arc<vulkano::image::sampler::Sampler>,
}

impl TextureMap {
    pub fn new(
        device: Arc<vulkano::device::Device>,
        texture: Arc<Texture>,
        filter_min: Filter,
        filter_mag: Filter,
        repeat_u: RepeatMode,
        repeat_v: RepeatMode,
        repeat_w: RepeatMode,
        max_anisotropy: Option<f32>,
    ) -> Self {
        use vulkano::image::sampler::{Sampler, SamplerCreateInfo};

        let sampler = Sampler::new(
            device,
            SamplerCreateInfo {
                mag_filter: filter_mag,
                min_filter: filter_min,
                address_mode: [
                    repeat_u.to_vulkano(),
                    repeat_v.to_vulkano(),
                    repeat_w.to_vulkano(),
                ],
                anisotropy: max_anisotropy,
                mip_lod_bias: 0.0,
                lod: 0.0..=texture.mip_levels as f32,
                ..Default::default()
            },
        )
        .unwrap();

        Self {
            texture,
            filter_min,
            filter_mag,
            repeat_u,
            repeat_v,
            repeat_w,
            sampler,
        }
    }
}

type TransitionMasks = (
    vulkano::sync::AccessFlags,
    vulkano::sync::PipelineStages,
    vulkano::sync::AccessFlags,
    vulkano::sync::PipelineStages,
);

fn transition_masks(old: ImageLayout, new: ImageLayout) -> Option<TransitionMasks> {
    use vulkano::sync::{AccessFlags, PipelineStages};
    use ImageLayout::*;

    match (old, new) {
        (Undefined, TransferDstOptimal) => Some((
            AccessFlags::empty(),
            PipelineStages::TOP_OF_PIPE,
            AccessFlags::TRANSFER_WRITE,
            PipelineStages::TRANSFER,
        )),
        (TransferDstOptimal, ShaderReadOnlyOptimal) => Some((
            AccessFlags::TRANSFER_WRITE,
            PipelineStages::TRANSFER,
            AccessFlags::SHADER_READ,
            PipelineStages::FRAGMENT_SHADER,
        )),
        (Undefined, ColorAttachmentOptimal) => Some((
            AccessFlags::empty(),
            PipelineStages::TOP_OF_PIPE,
            AccessFlags::COLOR_ATTACHMENT_WRITE,
            PipelineStages::COLOR_ATTACHMENT_OUTPUT,
        )),
        (Undefined, DepthStencilAttachmentOptimal) => Some((
            AccessFlags::empty(),
            PipelineStages::TOP_OF_PIPE,
            AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            PipelineStages::EARLY_FRAGMENT_TESTS,
        )),
        (ColorAttachmentOptimal, PresentSrc) => Some((
            AccessFlags::COLOR_ATTACHMENT_WRITE,
            PipelineStages::COLOR_ATTACHMENT_OUTPUT,
            AccessFlags::empty(),
            PipelineStages::BOTTOM_OF_PIPE,
        )),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mipmap_count_matches_scenario() {
        assert_eq!(mip_level_count(1024, 512), 11);
    }

    #[test]
    fn mipmap_count_square_power_of_two() {
        assert_eq!(mip_level_count(256, 256), 9);
    }

    #[test]
    fn unsupported_transition_has_no_masks() {
        assert!(transition_masks(ImageLayout::Preinitialized, ImageLayout::General).is_none());
    }
}
