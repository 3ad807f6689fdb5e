//! Resource metadata header (spec §3 "Resource"), grounded on
//! `resources/resource.hpp`. `full_path`/`loader_type` are set-once in the
//! original (a second `Property` setter call logs an error and is ignored);
//! here that's expressed as plain fields assigned once at construction,
//! since nothing in this port mutates a `Resource` after loading.

/// Identifies which loader produced a [`Resource`] / the asset-subfolder
/// name that loader reads from (spec §3, `resources/loaders/resource_loader.hpp`'s
/// `ResourceType`).
pub struct ResourceType;

impl ResourceType {
    pub const TEXT: &'static str = "Text";
    pub const BINARY: &'static str = "Binary";
    pub const IMAGE: &'static str = "Image";
    pub const MATERIAL: &'static str = "Material";
    pub const STATIC_MESH: &'static str = "StaticMesh";
    pub const SHADER: &'static str = "Shader";
    pub const MESH: &'static str = "Mesh";

    pub fn is_custom(type_name: &str) -> bool {
        ![
            Self::TEXT,
            Self::BINARY,
            Self::IMAGE,
            Self::MATERIAL,
            Self::STATIC_MESH,
            Self::SHADER,
            Self::MESH,
        ]
        .iter()
        .any(|known| known.eq_ignore_ascii_case(type_name))
    }
}

#[derive(Debug, Clone)]
pub struct Resource {
    pub name: String,
    pub full_path: String,
    pub loader_type: String,
}

impl Resource {
    pub fn new(name: impl Into<String>, full_path: impl Into<String>, loader_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            full_path: full_path.into(),
            loader_type: loader_type.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_every_builtin_resource_type() {
        for ty in [
            ResourceType::TEXT,
            ResourceType::BINARY,
            ResourceType::IMAGE,
            ResourceType::MATERIAL,
            ResourceType::STATIC_MESH,
            ResourceType::SHADER,
            ResourceType::MESH,
        ] {
            assert!(!ResourceType::is_custom(ty));
        }
        assert!(ResourceType::is_custom("ParticleSystem"));
    }
}
