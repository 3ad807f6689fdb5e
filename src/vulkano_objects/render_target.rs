//! Render targets (spec §4.6): a framebuffer plus the attachments backing
//! it, with a resize policy relative to the swapchain. Grounded on the
//! original `RenderTarget` (`original_source/include/renderer/render_target.hpp`)
//! and layered over the teacher's ad hoc
//! `create_framebuffers_from_swapchain_images`/`create_deferred_framebuffers_from_images`
//! helpers, which this module's `Framebuffer` construction generalizes.

use std::sync::Arc;

use vulkano::image::view::ImageView;
use vulkano::image::ImageUsage;
use vulkano::render_pass::{Framebuffer, FramebufferCreateInfo, RenderPass};

use crate::vulkano_objects::allocators::Allocators;
use crate::vulkano_objects::image::Texture;

/// How a render target's resolution tracks the swapchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Always matches the current swapchain extent.
    WindowSize,
    /// Always matches half the current swapchain extent (rounded down,
    /// minimum 1x1) — used by downsampled passes like ambient occlusion.
    HalfResolution,
    /// Fixed size, ignores swapchain resize events.
    None,
}

pub struct RenderTarget {
    pub width: u32,
    pub height: u32,
    pub attachments: Vec<Texture>,
    pub framebuffer: Arc<Framebuffer>,
    pub sync_mode: SyncMode,
}

impl RenderTarget {
    pub fn new(
        render_pass: Arc<RenderPass>,
        width: u32,
        height: u32,
        attachments: Vec<Texture>,
        sync_mode: SyncMode,
    ) -> Self {
        let views: Vec<Arc<ImageView>> = attachments
            .iter()
            .map(|tex| ImageView::new_default(tex.image.clone()).unwrap())
            .collect();

        let framebuffer = Framebuffer::new(
            render_pass,
            FramebufferCreateInfo {
                attachments: views,
                extent: [width, height],
                ..Default::default()
            },
        )
        .unwrap();

        Self {
            width,
            height,
            attachments,
            framebuffer,
            sync_mode,
        }
    }

    fn target_extent(&self, swapchain_width: u32, swapchain_height: u32) -> (u32, u32) {
        match self.sync_mode {
            SyncMode::WindowSize => (swapchain_width, swapchain_height),
            SyncMode::HalfResolution => ((swapchain_width / 2).max(1), (swapchain_height / 2).max(1)),
            SyncMode::None => (self.width, self.height),
        }
    }

    /// Resizes each owned attachment per the sync mode, then recreates the
    /// framebuffer. A `SyncMode::None` target ignores swapchain resize
    /// events entirely (spec §4.6).
    pub fn resize(
        &mut self,
        allocators: &Allocators,
        render_pass: Arc<RenderPass>,
        swapchain_width: u32,
        swapchain_height: u32,
        usage: ImageUsage,
    ) {
        if self.sync_mode == SyncMode::None {
            return;
        }

        let (width, height) = self.target_extent(swapchain_width, swapchain_height);
        if width == self.width && height == self.height {
            return;
        }

        for attachment in &mut self.attachments {
            let samples = attachment.image.samples();
            attachment.resize(allocators, width, height, usage, samples);
        }

        let views: Vec<Arc<ImageView>> = self
            .attachments
            .iter()
            .map(|tex| ImageView::new_default(tex.image.clone()).unwrap())
            .collect();

        self.framebuffer = Framebuffer::new(
            render_pass,
            FramebufferCreateInfo {
                attachments: views,
                extent: [width, height],
                ..Default::default()
            },
        )
        .unwrap();

        self.width = width;
        self.height = height;
    }

    /// Explicitly releases owned attachments ahead of target destruction
    /// (spec §4.6: "Attachment removal is explicit via `free_attachments`").
    pub fn free_attachments(&mut self) {
        for attachment in self.attachments.drain(..) {
            if !attachment.wrapped {
                crate::memory::tag::record_free(
                    crate::memory::MemoryTag::Texture,
                    (attachment.width as u64) * (attachment.height as u64) * 4,
                );
            }
        }
    }
}
