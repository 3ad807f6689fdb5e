//! `.shadercfg` text parser (spec §6), ported line-for-line from the
//! original engine's `ShaderLoader::load` + `parse_attribute_config`/
//! `parse_uniform_config` (`resources/loaders/shader_loader.cpp`). The
//! format is a line-based `key=value` config with `#` comments; malformed
//! lines are logged and skipped rather than failing the whole parse, except
//! that a genuinely empty/absent config (no lines at all) is still a valid
//! shader with zero attributes and uniforms.

use std::fmt;

use crate::error::EngineError;

pub const MAX_NAME_LENGTH: usize = 256;
pub const MAX_INSTANCE_COUNT: u32 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    Float32,
    Vec2,
    Vec3,
    Vec4,
    Int8,
    Int16,
    Int32,
    Uint8,
    Uint16,
    Uint32,
}

impl AttributeType {
    pub fn size(self) -> u32 {
        use AttributeType::*;
        match self {
            Float32 => 4,
            Vec2 => 8,
            Vec3 => 12,
            Vec4 => 16,
            Int8 | Uint8 => 1,
            Int16 | Uint16 => 2,
            Int32 | Uint32 => 4,
        }
    }

    fn parse(s: &str) -> Option<Self> {
        use AttributeType::*;
        Some(match s.to_ascii_lowercase().as_str() {
            "float32" => Float32,
            "vec2" => Vec2,
            "vec3" => Vec3,
            "vec4" => Vec4,
            "int8" => Int8,
            "int16" => Int16,
            "int32" => Int32,
            "uint8" => Uint8,
            "uint16" => Uint16,
            "uint32" => Uint32,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformType {
    Float32,
    Vec2,
    Vec3,
    Vec4,
    Int8,
    Int16,
    Int32,
    Uint8,
    Uint16,
    Uint32,
    Matrix4,
    Sampler,
    Custom,
}

impl UniformType {
    /// Byte size of the value, or `0` for `Sampler`/`Custom` which don't
    /// occupy a uniform-buffer byte range (spec §6's type list).
    pub fn size(self) -> u32 {
        use UniformType::*;
        match self {
            Float32 => 4,
            Vec2 => 8,
            Vec3 => 12,
            Vec4 => 16,
            Int8 | Uint8 => 1,
            Int16 | Uint16 => 2,
            Int32 | Uint32 => 4,
            Matrix4 => 64,
            Sampler | Custom => 0,
        }
    }

    pub fn is_sampler(self) -> bool {
        matches!(self, UniformType::Sampler)
    }

    fn parse(s: &str) -> Option<Self> {
        use UniformType::*;
        Some(match s.to_ascii_lowercase().as_str() {
            "float32" => Float32,
            "vec2" => Vec2,
            "vec3" => Vec3,
            "vec4" => Vec4,
            "int8" => Int8,
            "int16" => Int16,
            "int32" => Int32,
            "uint8" => Uint8,
            "uint16" => Uint16,
            "uint32" => Uint32,
            "mat4" => Matrix4,
            "sampler" => Sampler,
            "custom" => Custom,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Global,
    Instance,
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    None,
    Front,
    Back,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShaderStageMask(u8);

impl ShaderStageMask {
    pub const VERTEX: u8 = 0x1;
    pub const GEOMETRY: u8 = 0x2;
    pub const FRAGMENT: u8 = 0x4;
    pub const COMPUTE: u8 = 0x8;

    pub fn contains(self, stage: u8) -> bool {
        self.0 & stage != 0
    }

    pub fn bits(self) -> u8 {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: String,
    pub size: u32,
    pub attribute_type: AttributeType,
}

#[derive(Debug, Clone)]
pub struct UniformConfig {
    pub name: String,
    pub size: u32,
    pub uniform_type: UniformType,
    pub scope: Scope,
}

/// Parsed `.shadercfg` contents: the shader frontend's construction
/// argument (spec §4.5 "Construction takes a parsed config").
#[derive(Debug, Clone)]
pub struct ShaderConfig {
    pub name: String,
    pub render_pass_name: String,
    pub shader_stages: ShaderStageMask,
    pub attributes: Vec<Attribute>,
    pub uniforms: Vec<UniformConfig>,
    pub cull_mode: CullMode,
}

impl fmt::Display for ShaderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShaderConfig(\"{}\")", self.name)
    }
}

/// Parses `.shadercfg` source text. Unrecognized or malformed lines are
/// logged at `warn` and skipped — they never turn the whole parse into a
/// hard failure, mirroring the source's per-line recovery.
pub fn parse(default_name: &str, source: &str) -> Result<ShaderConfig, EngineError> {
    let mut name = default_name.to_string();
    let mut render_pass_name = String::new();
    let mut stages = ShaderStageMask::default();
    let mut attributes = Vec::new();
    let mut uniforms = Vec::new();
    let mut cull_mode = CullMode::Back;

    for (line_number, raw_line) in source.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((var, val)) = line.split_once('=') else {
            log::warn!(
                "ShaderLoader: malformed line {} (expected `key=value`): \"{line}\"",
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
                    name = val.to_string();
                } else {
                    log::warn!(
                        "ShaderLoader: shader name at line {} is too long ({} > {MAX_NAME_LENGTH})",
                        line_number + 1,
                        val.len()
                    );
                }
            }
            "renderpass" => render_pass_name = val.to_string(),
            "stages" => {
                for stage in val.split(',') {
                    match stage.trim().to_ascii_lowercase().as_str() {
                        "vertex" => stages = ShaderStageMask(stages.0 | ShaderStageMask::VERTEX),
                        "geometry" => stages = ShaderStageMask(stages.0 | ShaderStageMask::GEOMETRY),
                        "fragment" => stages = ShaderStageMask(stages.0 | ShaderStageMask::FRAGMENT),
                        "compute" => stages = ShaderStageMask(stages.0 | ShaderStageMask::COMPUTE),
                        other => log::warn!(
                            "ShaderLoader: invalid shader stage \"{other}\" at line {}",
                            line_number + 1
                        ),
                    }
                }
            }
            "cull_mode" => {
                cull_mode = match val.to_ascii_lowercase().as_str() {
                    "none" => CullMode::None,
                    "front" => CullMode::Front,
                    "back" => CullMode::Back,
                    "both" => CullMode::Both,
                    other => {
                        log::warn!(
                            "ShaderLoader: invalid cull_mode \"{other}\" at line {}, keeping default",
                            line_number + 1
                        );
                        cull_mode
                    }
                };
            }
            "attribute" => match parse_attribute(val) {
                Ok(attr) => attributes.push(attr),
                Err(msg) => log::warn!("ShaderLoader: line {}: {msg}", line_number + 1),
            },
            "uniform" => match parse_uniform(val) {
                Ok(uniform) => uniforms.push(uniform),
                Err(msg) => log::warn!("ShaderLoader: line {}: {msg}", line_number + 1),
            },
            other => log::warn!(
                "ShaderLoader: invalid variable \"{other}\" at line {}",
                line_number + 1
            ),
        }
    }

    Ok(ShaderConfig {
        name,
        render_pass_name,
        shader_stages: stages,
        attributes,
        uniforms,
        cull_mode,
    })
}

fn parse_attribute(s: &str) -> Result<Attribute, String> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 2 {
        return Err("wrong attribute argument format passed".into());
    }
    let attribute_type = AttributeType::parse(parts[0].trim())
        .ok_or_else(|| format!("invalid attribute type \"{}\"", parts[0].trim()))?;
    Ok(Attribute {
        name: parts[1].trim().to_string(),
        size: attribute_type.size(),
        attribute_type,
    })
}

fn parse_uniform(s: &str) -> Result<UniformConfig, String> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 3 {
        return Err("invalid argument count for uniform passed".into());
    }
    let uniform_type = UniformType::parse(parts[0].trim())
        .ok_or_else(|| format!("invalid uniform type \"{}\"", parts[0].trim()))?;
    let scope = match parts[1].trim().parse::<u8>() {
        Ok(0) => Scope::Global,
        Ok(1) => Scope::Instance,
        Ok(2) => Scope::Local,
        _ => return Err("only uniform scopes 0, 1 and 2 are allowed".into()),
    };
    Ok(UniformConfig {
        name: parts[2].trim().to_string(),
        size: uniform_type.size(),
        uniform_type,
        scope,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_attribute_and_global_uniform() {
        let cfg = parse(
            "test",
            "attribute=vec3, position\nuniform=mat4, 0, projection\n",
        )
        .unwrap();

        assert_eq!(cfg.attributes.len(), 1);
        assert_eq!(cfg.attributes[0].name, "position");
        assert_eq!(cfg.attributes[0].size, 12);

        assert_eq!(cfg.uniforms.len(), 1);
        assert_eq!(cfg.uniforms[0].name, "projection");
        assert_eq!(cfg.uniforms[0].size, 64);
        assert_eq!(cfg.uniforms[0].scope, Scope::Global);
    }

    #[test]
    fn skips_comments_and_blank_lines() {
        let cfg = parse("test", "# a comment\n\nname=demo\n").unwrap();
        assert_eq!(cfg.name, "demo");
    }

    #[test]
    fn malformed_uniform_line_is_skipped_not_fatal() {
        let cfg = parse("test", "uniform=mat4, 9, projection\n").unwrap();
        assert!(cfg.uniforms.is_empty());
    }

    #[test]
    fn parses_stage_list() {
        let cfg = parse("test", "stages=vertex, fragment\n").unwrap();
        assert!(cfg.shader_stages.contains(ShaderStageMask::VERTEX));
        assert!(cfg.shader_stages.contains(ShaderStageMask::FRAGMENT));
        assert!(!cfg.shader_stages.contains(ShaderStageMask::COMPUTE));
    }
}
