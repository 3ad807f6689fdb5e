//! Descriptor set / binding / push-constant layout computation (spec §4.5
//! "Layout computation", "Descriptor pool sizing"), grounded on the uniform
//! offset bookkeeping of `vulkan_material_shader.cpp`/`vulkan_shader.cpp`'s
//! `add_binding`/`process_uniforms`. The flat `uniform=type,scope,name`
//! config format (§6) carries no explicit set/binding structure, so this is
//! where that structure is derived: every non-sampler Global uniform lands
//! in one binding at set 0; every sampler at Global scope gets its own
//! binding at set 0; Instance scope works the same at set 1; Local scope
//! uniforms become push constants instead of a descriptor set entry.

use crate::error::{EngineError, EngineResult};
use crate::shader::config::{AttributeType, Scope, ShaderConfig, UniformConfig};

pub const GLOBAL_SET_INDEX: u32 = 0;
pub const INSTANCE_SET_INDEX: u32 = 1;
pub const PUSH_CONSTANT_MAX_BYTES: u32 = 128;
pub const PUSH_CONSTANT_ALIGNMENT: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingType {
    Uniform,
    Sampler,
    Storage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ByteRange {
    pub offset: u64,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct UniformLayout {
    pub name: String,
    pub byte_range: ByteRange,
    pub array_index: u32,
    pub binding_index: u32,
    pub set_index: u32,
    pub scope: Scope,
}

#[derive(Debug, Clone)]
pub struct BindingLayout {
    pub set_index: u32,
    pub binding_index: u32,
    pub byte_range: ByteRange,
    pub total_size: u64,
    pub binding_type: BindingType,
    pub count: u32,
    /// Indices into [`ShaderLayout::uniforms`].
    pub uniforms: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct DescriptorSetLayout {
    pub set_index: u32,
    pub scope: Scope,
    pub bindings: Vec<BindingLayout>,
    /// Binding-aligned size of one instance of this set (spec §4.5: "stride
    /// is align(byte_range.size, required_ubo_alignment)").
    pub stride: u64,
    pub texture_map_count: u32,
}

#[derive(Debug, Clone)]
pub struct AttributeLayout {
    pub name: String,
    pub offset: u32,
    pub size: u32,
    pub attribute_type: AttributeType,
}

#[derive(Debug, Clone)]
pub struct ShaderLayout {
    pub attributes: Vec<AttributeLayout>,
    pub attribute_stride: u32,
    pub uniforms: Vec<UniformLayout>,
    pub descriptor_sets: Vec<DescriptorSetLayout>,
    pub push_constants: Vec<UniformLayout>,
    pub push_constant_size: u64,
    pub global_stride: u64,
    pub instance_stride: u64,
}

fn align_up(value: u64, alignment: u64) -> u64 {
    if alignment == 0 {
        return value;
    }
    (value + alignment - 1) / alignment * alignment
}

/// Computes the full layout for `config` given the device's
/// `required_ubo_alignment` (spec §8 property 5: "recomputing layout is
/// deterministic: every uniform's (set_index, binding_index, offset, size)
/// is a pure function of the config plus required_ubo_alignment").
pub fn compute_layout(config: &ShaderConfig, required_ubo_alignment: u64) -> EngineResult<ShaderLayout> {
    let mut attributes = Vec::with_capacity(config.attributes.len());
    let mut attribute_offset = 0u32;
    for attr in &config.attributes {
        attributes.push(AttributeLayout {
            name: attr.name.clone(),
            offset: attribute_offset,
            size: attr.size,
            attribute_type: attr.attribute_type,
        });
        attribute_offset += attr.size;
    }

    let mut uniforms = Vec::new();

    let global_set = build_descriptor_set(
        GLOBAL_SET_INDEX,
        Scope::Global,
        &config.uniforms,
        required_ubo_alignment,
        &mut uniforms,
    );
    let instance_set = build_descriptor_set(
        INSTANCE_SET_INDEX,
        Scope::Instance,
        &config.uniforms,
        required_ubo_alignment,
        &mut uniforms,
    );

    let global_stride = global_set.stride;
    let instance_stride = instance_set.stride;

    let (push_constants, push_constant_size) = build_push_constants(&config.uniforms)?;

    Ok(ShaderLayout {
        attributes,
        attribute_stride: attribute_offset,
        uniforms,
        descriptor_sets: vec![global_set, instance_set],
        push_constants,
        push_constant_size,
        global_stride,
        instance_stride,
    })
}

fn build_descriptor_set(
    set_index: u32,
    scope: Scope,
    configs: &[UniformConfig],
    required_ubo_alignment: u64,
    uniforms_out: &mut Vec<UniformLayout>,
) -> DescriptorSetLayout {
    let scoped: Vec<&UniformConfig> = configs.iter().filter(|u| u.scope == scope).collect();

    let mut bindings = Vec::new();
    let mut texture_map_count = 0u32;

    // One uniform binding (index 0) holding every non-sampler uniform in
    // this scope, sequentially packed.
    let non_samplers: Vec<&&UniformConfig> =
        scoped.iter().filter(|u| !u.uniform_type.is_sampler()).collect();
    if !non_samplers.is_empty() {
        let mut running_offset = 0u64;
        let mut uniform_indices = Vec::new();
        for cfg in &non_samplers {
            let idx = uniforms_out.len();
            uniforms_out.push(UniformLayout {
                name: cfg.name.clone(),
                byte_range: ByteRange {
                    offset: running_offset,
                    size: cfg.size as u64,
                },
                array_index: 0,
                binding_index: 0,
                set_index,
                scope,
            });
            uniform_indices.push(idx);
            running_offset += cfg.size as u64;
        }
        bindings.push(BindingLayout {
            set_index,
            binding_index: 0,
            byte_range: ByteRange {
                offset: 0,
                size: running_offset,
            },
            total_size: running_offset,
            binding_type: BindingType::Uniform,
            count: 1,
            uniforms: uniform_indices,
        });
    }

    // Each sampler uniform gets its own binding, in declaration order.
    let mut next_binding_index = if bindings.is_empty() { 0 } else { 1 };
    for cfg in scoped.iter().filter(|u| u.uniform_type.is_sampler()) {
        let binding_index = next_binding_index;
        next_binding_index += 1;
        texture_map_count += 1;
        let idx = uniforms_out.len();
        uniforms_out.push(UniformLayout {
            name: cfg.name.clone(),
            byte_range: ByteRange { offset: 0, size: 0 },
            array_index: texture_map_count - 1,
            binding_index,
            set_index,
            scope,
        });
        bindings.push(BindingLayout {
            set_index,
            binding_index,
            byte_range: ByteRange { offset: 0, size: 0 },
            total_size: 0,
            binding_type: BindingType::Sampler,
            count: 1,
            uniforms: vec![idx],
        });
    }

    let total_size: u64 = bindings.iter().map(|b| b.total_size).sum();
    let stride = align_up(total_size, required_ubo_alignment);

    DescriptorSetLayout {
        set_index,
        scope,
        bindings,
        stride,
        texture_map_count,
    }
}

fn build_push_constants(configs: &[UniformConfig]) -> EngineResult<(Vec<UniformLayout>, u64)> {
    let mut push_constants = Vec::new();
    let mut offset = 0u64;

    for cfg in configs.iter().filter(|u| u.scope == Scope::Local) {
        let aligned_offset = align_up(offset, PUSH_CONSTANT_ALIGNMENT as u64);
        let size = cfg.size as u64;
        if aligned_offset + size > PUSH_CONSTANT_MAX_BYTES as u64 {
            return Err(EngineError::RuntimeErrorCode {
                code: 3,
                message: format!(
                    "push constant \"{}\" overflows the {PUSH_CONSTANT_MAX_BYTES}-byte window \
                     (would end at {})",
                    cfg.name,
                    aligned_offset + size
                ),
            });
        }
        push_constants.push(UniformLayout {
            name: cfg.name.clone(),
            byte_range: ByteRange {
                offset: aligned_offset,
                size,
            },
            array_index: 0,
            binding_index: u32::MAX,
            set_index: u32::MAX,
            scope: Scope::Local,
        });
        offset = aligned_offset + size;
    }

    Ok((push_constants, offset))
}

/// Counts of uniform/sampler/storage binding-uses across all non-local
/// uniforms, each scaled by `max_instance_count * max_frames_in_flight` and
/// bounded below by 1 per type (spec §4.5 "Descriptor pool sizing").
pub fn descriptor_pool_sizes(
    layout: &ShaderLayout,
    max_instance_count: u32,
    max_frames_in_flight: u32,
) -> [(BindingType, u32); 3] {
    let scale = max_instance_count.max(1) * max_frames_in_flight.max(1);
    let mut uniform_count = 0u32;
    let mut sampler_count = 0u32;
    let mut storage_count = 0u32;

    for set in &layout.descriptor_sets {
        for binding in &set.bindings {
            match binding.binding_type {
                BindingType::Uniform => uniform_count += 1,
                BindingType::Sampler => sampler_count += 1,
                BindingType::Storage => storage_count += 1,
            }
        }
    }

    [
        (BindingType::Uniform, (uniform_count * scale).max(1)),
        (BindingType::Sampler, (sampler_count * scale).max(1)),
        (BindingType::Storage, (storage_count * scale).max(1)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::config::parse;

    #[test]
    fn layout_is_deterministic_for_fixed_config_and_alignment() {
        let cfg = parse(
            "test",
            "attribute=vec3, position\nuniform=mat4, 0, projection\n",
        )
        .unwrap();

        let a = compute_layout(&cfg, 64).unwrap();
        let b = compute_layout(&cfg, 64).unwrap();

        assert_eq!(a.global_stride, b.global_stride);
        assert_eq!(a.global_stride, 64);
        assert_eq!(a.descriptor_sets[0].bindings[0].uniforms.len(), 1);
    }

    #[test]
    fn push_constant_overflow_is_rejected() {
        let mut cfg = parse("test", "").unwrap();
        // 8 matrices (64 bytes each) is 512 bytes, well past the 128-byte window.
        for i in 0..8 {
            cfg.uniforms.push(UniformConfig {
                name: format!("m{i}"),
                size: 64,
                uniform_type: crate::shader::config::UniformType::Matrix4,
                scope: Scope::Local,
            });
        }
        let err = compute_layout(&cfg, 64).unwrap_err();
        assert!(matches!(err, EngineError::RuntimeErrorCode { code: 3, .. }));
    }

    #[test]
    fn sampler_uniforms_get_their_own_binding() {
        let cfg = parse(
            "test",
            "uniform=sampler, 0, diffuse_texture\nuniform=sampler, 0, normal_texture\n",
        )
        .unwrap();
        let layout = compute_layout(&cfg, 64).unwrap();
        let global = &layout.descriptor_sets[0];
        assert_eq!(global.texture_map_count, 2);
        assert_eq!(global.bindings.len(), 2);
    }
}
