//! Reference-counted texture cache (spec §4.7 "Resource systems"), grounded
//! on `systems/texture_system.cpp`. Acquiring the same name twice returns
//! the same handle and bumps a refcount; `release` drops it only once the
//! count reaches zero and `auto_release` was requested at first acquire —
//! the default texture is exempt from both, matching `acquire`/`release`'s
//! special-cased `_default_texture_name` checks in the original.

use std::collections::HashMap;
use std::sync::Arc;

use vulkano::device::{Device, Queue};
use vulkano::image::sampler::Filter;

use crate::error::{EngineError, EngineResult};
use crate::resources::ResourceSystem;
use crate::vulkano_objects::allocators::Allocators;
use crate::vulkano_objects::image::{RepeatMode, Texture, TextureMap};

const DEFAULT_TEXTURE_NAME: &str = "default";
const DEFAULT_TEXTURE_DIMENSION: u32 = 256;

struct TextureRef {
    handle: Arc<TextureMap>,
    reference_count: u64,
    auto_release: bool,
}

pub struct TextureSystem {
    default_texture: Arc<TextureMap>,
    registered: HashMap<String, TextureRef>,
    max_texture_count: u64,
}

impl TextureSystem {
    pub fn new(
        device: Arc<Device>,
        queue: &Arc<Queue>,
        allocators: &Allocators,
    ) -> EngineResult<Self> {
        let default_texture = Arc::new(create_default_texture_map(device, queue, allocators)?);
        Ok(Self {
            default_texture,
            registered: HashMap::new(),
            max_texture_count: 1024,
        })
    }

    pub fn default_texture(&self) -> &Arc<TextureMap> {
        &self.default_texture
    }

    pub fn acquire(
        &mut self,
        name: &str,
        auto_release: bool,
        device: Arc<Device>,
        queue: &Arc<Queue>,
        allocators: &Allocators,
        resource_system: &ResourceSystem,
    ) -> EngineResult<Arc<TextureMap>> {
        let key = name.to_ascii_lowercase();
        if key == DEFAULT_TEXTURE_NAME {
            log::warn!("use default_texture() to acquire the default texture, not acquire()");
            return Ok(self.default_texture.clone());
        }

        if let Some(existing) = self.registered.get_mut(&key) {
            existing.reference_count += 1;
            return Ok(existing.handle.clone());
        }

        if self.registered.len() as u64 >= self.max_texture_count {
            return Err(EngineError::RuntimeError(format!(
                "texture system is at capacity ({} textures)",
                self.max_texture_count
            )));
        }

        let (_, image_data) = resource_system.load_image(name)?;
        let texture = Texture::create_and_upload(
            allocators,
            queue.clone(),
            image_data.width,
            image_data.height,
            vulkano::format::Format::R8G8B8A8_SRGB,
            &image_data.pixels,
        )?;
        let map = Arc::new(TextureMap::new(
            device,
            Arc::new(texture),
            Filter::Linear,
            Filter::Linear,
            RepeatMode::Repeat,
            RepeatMode::Repeat,
            RepeatMode::Repeat,
            None,
        ));

        self.registered.insert(
            key,
            TextureRef {
                handle: map.clone(),
                reference_count: 1,
                auto_release,
            },
        );
        Ok(map)
    }

    pub fn release(&mut self, name: &str) {
        let key = name.to_ascii_lowercase();
        if key == DEFAULT_TEXTURE_NAME {
            log::warn!("cannot release the default texture");
            return;
        }

        let Some(reference) = self.registered.get_mut(&key) else {
            log::warn!("tried to release a non-existent texture: {name}");
            return;
        };
        if reference.reference_count == 0 {
            log::warn!("tried to release a non-existent texture: {name}");
            return;
        }
        reference.reference_count -= 1;
        if reference.reference_count == 0 && reference.auto_release {
            self.registered.remove(&key);
        }
    }
}

/// 256x256 magenta/blue checkerboard, matching
/// `TextureSystem::create_default_textures`'s `(row/4)%2 == (col/4)%2` check.
fn create_default_texture_map(
    device: Arc<Device>,
    queue: &Arc<Queue>,
    allocators: &Allocators,
) -> EngineResult<TextureMap> {
    let dim = DEFAULT_TEXTURE_DIMENSION;
    let mut pixels = vec![0u8; (dim * dim * 4) as usize];
    for row in 0..dim {
        for col in 0..dim {
            let index = ((row * dim + col) * 4) as usize;
            pixels[index + 2] = 255;
            if (row / 4) % 2 == (col / 4) % 2 {
                pixels[index] = 255;
                pixels[index + 1] = 255;
            }
            pixels[index + 3] = 255;
        }
    }

    let texture = Texture::create_and_upload(
        allocators,
        queue.clone(),
        dim,
        dim,
        vulkano::format::Format::R8G8B8A8_SRGB,
        &pixels,
    )?;
    Ok(TextureMap::new(
        device,
        Arc::new(texture),
        Filter::Nearest,
        Filter::Nearest,
        RepeatMode::Repeat,
        RepeatMode::Repeat,
        RepeatMode::Repeat,
        None,
    ))
}
