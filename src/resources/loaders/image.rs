//! PNG image resource loader (spec §3), grounded on
//! `resources/loaders/image_loader.cpp` for the loader shape and on
//! `render::render_data::texture::load_texture` for the RGB→RGBA8
//! expansion (the original engine's image loader also always hands back
//! 4-channel data to simplify the sampler/format story downstream). Split
//! out of `render_data::texture` so `resources` stays decoupled from
//! vulkano: `systems::texture_system` is what turns an [`ImageData`] into a
//! GPU-resident [`crate::vulkano_objects::image::Texture`].

use std::fs::File;
use std::path::Path;

use png::ColorType;

use crate::error::{EngineError, EngineResult};
use crate::resources::resource::{Resource, ResourceType};

pub struct ImageData {
    pub width: u32,
    pub height: u32,
    /// Always 4 channels (RGBA8), regardless of the source PNG's color type.
    pub pixels: Vec<u8>,
}

pub fn load(full_path: &Path, name: &str) -> EngineResult<(Resource, ImageData)> {
    let file = File::open(full_path)
        .map_err(|e| EngineError::RuntimeError(format!("failed to open image resource \"{name}\": {e}")))?;
    let decoder = png::Decoder::new(file);
    let mut reader = decoder
        .read_info()
        .map_err(|e| EngineError::RuntimeError(format!("failed to decode PNG header for \"{name}\": {e}")))?;
    let info = reader.info();
    let width = info.width;
    let height = info.height;
    let color_type = info.color_type;
    let pixel_count = (width * height) as usize;

    let pixels = match color_type {
        ColorType::Rgb => {
            let mut rgb_buf = vec![0u8; pixel_count * 3];
            reader
                .next_frame(&mut rgb_buf)
                .map_err(|e| EngineError::RuntimeError(format!("failed to decode PNG frame for \"{name}\": {e}")))?;
            let mut rgba_buf = vec![0u8; pixel_count * 4];
            for i in 0..pixel_count {
                rgba_buf[i * 4] = rgb_buf[i * 3];
                rgba_buf[i * 4 + 1] = rgb_buf[i * 3 + 1];
                rgba_buf[i * 4 + 2] = rgb_buf[i * 3 + 2];
                rgba_buf[i * 4 + 3] = u8::MAX;
            }
            rgba_buf
        }
        ColorType::Rgba => {
            let mut rgba_buf = vec![0u8; pixel_count * 4];
            reader
                .next_frame(&mut rgba_buf)
                .map_err(|e| EngineError::RuntimeError(format!("failed to decode PNG frame for \"{name}\": {e}")))?;
            rgba_buf
        }
        other => {
            return Err(EngineError::RuntimeError(format!(
                "image resource \"{name}\" has unsupported PNG color type {other:?}"
            )))
        }
    };

    let resource = Resource::new(name, full_path.to_string_lossy(), ResourceType::IMAGE);
    Ok((resource, ImageData { width, height, pixels }))
}
