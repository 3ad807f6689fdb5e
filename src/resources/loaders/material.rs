//! `.mat` material config loader (spec §3 "Material"), ported from
//! `resources/loaders/material_loader.cpp`'s line-based `key=value` parser.
//! Same recovery policy as the shader config parser: malformed lines warn
//! and are skipped, never fail the whole load.

use std::fs;
use std::path::Path;

use crate::error::{EngineError, EngineResult};
use crate::resources::resource::{Resource, ResourceType};

pub const MAX_NAME_LENGTH: usize = 256;

#[derive(Debug, Clone)]
pub struct MaterialConfig {
    pub name: String,
    pub shader: String,
    pub auto_release: bool,
    pub diffuse_color: [f32; 4],
    pub shininess: f32,
    pub diffuse_map_name: String,
    pub specular_map_name: String,
    pub normal_map_name: String,
}

impl Default for MaterialConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            shader: String::new(),
            auto_release: true,
            diffuse_color: [1.0; 4],
            shininess: 32.0,
            diffuse_map_name: String::new(),
            specular_map_name: String::new(),
            normal_map_name: String::new(),
        }
    }
}

pub fn load(full_path: &Path, name: &str) -> EngineResult<(Resource, MaterialConfig)> {
    let source = fs::read_to_string(full_path)
        .map_err(|e| EngineError::RuntimeError(format!("failed to read material resource \"{name}\": {e}")))?;
    let config = parse(name, &source);
    let resource = Resource::new(name, full_path.to_string_lossy(), ResourceType::MATERIAL);
    Ok((resource, config))
}

fn parse(default_name: &str, source: &str) -> MaterialConfig {
    let mut config = MaterialConfig {
        name: default_name.to_string(),
        ..Default::default()
    };

    for (line_number, raw_line) in source.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((var, val)) = line.split_once('=') else {
            log::warn!(
                "MaterialLoader: line {} has an unexpected number of '=' tokens: \"{line}\"",
                line_number + 1
            );
            continue;
        };
        let var = var.trim().to_ascii_lowercase();
        let val = val.trim();

        match var.as_str() {
            "version" => {}
            "name" => {
                if val.len() <= MAX_NAME_LENGTH {
                    config.name = val.to_string();
                } else {
                    log::warn!(
                        "MaterialLoader: material name at line {} is too long ({} > {MAX_NAME_LENGTH})",
                        line_number + 1,
                        val.len()
                    );
                }
            }
            "shader" => config.shader = val.to_string(),
            "diffuse_map_name" => config.diffuse_map_name = val.to_string(),
            "specular_map_name" => config.specular_map_name = val.to_string(),
            "normal_map_name" => config.normal_map_name = val.to_string(),
            "auto_release" => match val.to_ascii_lowercase().as_str() {
                "true" | "1" => config.auto_release = true,
                "false" | "0" => config.auto_release = false,
                other => log::warn!(
                    "MaterialLoader: invalid auto_release value \"{other}\" at line {}",
                    line_number + 1
                ),
            },
            "diffuse_color" => match parse_vec4(val) {
                Ok(color) => config.diffuse_color = color,
                Err(msg) => log::warn!("MaterialLoader: line {}: {msg}", line_number + 1),
            },
            "shininess" => match val.parse::<f32>() {
                Ok(value) => config.shininess = value,
                Err(_) => log::warn!(
                    "MaterialLoader: couldn't parse shininess as float at line {}",
                    line_number + 1
                ),
            },
            other => log::warn!(
                "MaterialLoader: invalid variable \"{other}\" at line {}",
                line_number + 1
            ),
        }
    }

    config
}

fn parse_vec4(s: &str) -> Result<[f32; 4], String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != 4 {
        return Err("wrong argument count for vec4".into());
    }
    let mut out = [0.0f32; 4];
    for (i, part) in parts.iter().enumerate() {
        out[i] = part
            .parse::<f32>()
            .map_err(|_| "couldn't parse floats for vec4".to_string())?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_complete_material() {
        let src = "name=bricks\nshader=world_shader\ndiffuse_map_name=bricks_d\n\
                   diffuse_color=1.0, 0.5, 0.5, 1.0\nshininess=16.0\n";
        let cfg = parse("default", src);
        assert_eq!(cfg.name, "bricks");
        assert_eq!(cfg.shader, "world_shader");
        assert_eq!(cfg.diffuse_map_name, "bricks_d");
        assert_eq!(cfg.diffuse_color, [1.0, 0.5, 0.5, 1.0]);
        assert_eq!(cfg.shininess, 16.0);
    }

    #[test]
    fn malformed_line_falls_back_to_defaults() {
        let cfg = parse("default", "diffuse_color=1.0, 0.5\n");
        assert_eq!(cfg.diffuse_color, [1.0; 4]);
    }
}
