//! Shader runtime (spec §4.5): pipeline creation, descriptor set/binding
//! layout, the managed global/instance uniform buffer, and the
//! Unbound → BoundGlobal → BoundInstance state machine. Grounded on
//! `vulkan_shader.cpp`/`vulkan_object_shader.cpp` (pipeline + descriptor set
//! plumbing) and `vulkan_descriptor.cpp` (per-frame descriptor-set update
//! bookkeeping), generalized from the teacher's per-shader hand-written
//! modules (`src/shaders/*`) into one data-driven implementation keyed by a
//! parsed [`crate::shader::config::ShaderConfig`].

use std::collections::HashMap;
use std::sync::Arc;

use vulkano::buffer::BufferUsage;
use vulkano::descriptor_set::allocator::StandardDescriptorSetAllocator;
use vulkano::descriptor_set::layout::{
    DescriptorSetLayout, DescriptorSetLayoutBinding, DescriptorSetLayoutCreateInfo, DescriptorType,
};
use vulkano::descriptor_set::{DescriptorSet as VkDescriptorSet, WriteDescriptorSet};
use vulkano::device::Device;
use vulkano::format::Format;
use vulkano::pipeline::graphics::color_blend::{
    AttachmentBlend, BlendFactor, BlendOp, ColorBlendAttachmentState, ColorBlendState,
};
use vulkano::pipeline::graphics::depth_stencil::{CompareOp, DepthState, DepthStencilState};
use vulkano::pipeline::graphics::input_assembly::{InputAssemblyState, PrimitiveTopology};
use vulkano::pipeline::graphics::multisample::MultisampleState;
use vulkano::pipeline::graphics::rasterization::{CullMode as VkCullMode, PolygonMode, RasterizationState};
use vulkano::pipeline::graphics::vertex_input::{
    VertexInputAttributeDescription, VertexInputBindingDescription, VertexInputRate, VertexInputState,
};
use vulkano::pipeline::graphics::viewport::ViewportState;
use vulkano::pipeline::graphics::GraphicsPipelineCreateInfo;
use vulkano::pipeline::layout::{PipelineLayoutCreateInfo, PushConstantRange};
use vulkano::pipeline::{DynamicState, GraphicsPipeline, Pipeline, PipelineLayout, PipelineShaderStageCreateInfo};
use vulkano::render_pass::Subpass;
use vulkano::shader::{ShaderModule, ShaderModuleCreateInfo, ShaderStages};

use crate::error::{EngineError, EngineResult};
use crate::memory::tag::MemoryTag;
use crate::shader::config::{AttributeType, CullMode, Scope, ShaderConfig};
use crate::shader::layout::{self, BindingType, ShaderLayout};
use crate::vulkano_objects::allocators::Allocators;
use crate::vulkano_objects::image::TextureMap;
use crate::vulkano_objects::managed_buffer::ManagedBuffer;

fn attribute_format(attribute_type: AttributeType) -> Format {
    use AttributeType::*;
    match attribute_type {
        Float32 => Format::R32_SFLOAT,
        Vec2 => Format::R32G32_SFLOAT,
        Vec3 => Format::R32G32B32_SFLOAT,
        Vec4 => Format::R32G32B32A32_SFLOAT,
        Int8 => Format::R8_SINT,
        Int16 => Format::R16_SINT,
        Int32 => Format::R32_SINT,
        Uint8 => Format::R8_UINT,
        Uint16 => Format::R16_UINT,
        Uint32 => Format::R32_UINT,
    }
}

fn cull_mode_to_vulkano(mode: CullMode) -> VkCullMode {
    match mode {
        CullMode::None => VkCullMode::None,
        CullMode::Front => VkCullMode::Front,
        CullMode::Back => VkCullMode::Back,
        CullMode::Both => VkCullMode::FrontAndBack,
    }
}

/// Loads a precompiled SPIR-V module from `words`. The original engine
/// compiles shader source offline and loads `assets/shaders/bin/<name>.
/// <stage>.spv` at runtime (`vulkan_shader.cpp::create_shader_module`); this
/// port takes the already-read bytes (the binary resource loader's job) and
/// only wraps the device call.
pub fn load_shader_module(device: Arc<Device>, words: &[u32]) -> EngineResult<Arc<ShaderModule>> {
    unsafe { ShaderModule::new(device, ShaderModuleCreateInfo::new(words)) }
        .map_err(|e| EngineError::RuntimeError(format!("failed to create shader module: {e}")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderState {
    Unbound,
    BoundGlobal,
    BoundInstance,
}

struct InstanceState {
    offset: u64,
    should_update: bool,
    texture_maps: Vec<Arc<TextureMap>>,
    descriptor_sets: Vec<Arc<VkDescriptorSet>>,
}

/// A compiled shader plus its owned GPU resources: pipeline, pipeline
/// layout, descriptor pool/layouts, one managed uniform buffer shared by
/// the global and every instance allocation, and per-frame global
/// descriptor sets (spec §3 "Shader").
pub struct Shader {
    pub name: String,
    pub config: ShaderConfig,
    pub layout: ShaderLayout,
    pub cull_mode: CullMode,
    pub required_ubo_alignment: u64,
    pub max_frames_in_flight: u32,

    pipeline: Arc<GraphicsPipeline>,
    pipeline_layout: Arc<PipelineLayout>,
    set_layouts: Vec<Arc<DescriptorSetLayout>>,

    uniform_buffer: ManagedBuffer,
    global_offset: u64,
    global_descriptor_sets: Vec<Arc<VkDescriptorSet>>,
    global_dirty: Vec<bool>,

    instances: HashMap<u32, InstanceState>,
    next_instance_id: u32,

    state: ShaderState,
    bound_instance_id: Option<u32>,
}

impl Shader {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        device: Arc<Device>,
        allocators: &Allocators,
        subpass: Subpass,
        config: ShaderConfig,
        required_ubo_alignment: u64,
        max_instance_count: u32,
        max_frames_in_flight: u32,
        wireframe: bool,
        vertex_words: &[u32],
        fragment_words: &[u32],
    ) -> EngineResult<Self> {
        let layout = layout::compute_layout(&config, required_ubo_alignment)?;

        let vs = load_shader_module(device.clone(), vertex_words)?;
        let fs = load_shader_module(device.clone(), fragment_words)?;
        let stages = [
            PipelineShaderStageCreateInfo::new(vs.entry_point("main").ok_or_else(|| {
                EngineError::RuntimeError("vertex shader module has no \"main\" entry point".into())
            })?),
            PipelineShaderStageCreateInfo::new(fs.entry_point("main").ok_or_else(|| {
                EngineError::RuntimeError("fragment shader module has no \"main\" entry point".into())
            })?),
        ];

        let set_layouts = build_descriptor_set_layouts(device.clone(), &layout)?;

        let push_constant_ranges = if layout.push_constant_size > 0 {
            vec![PushConstantRange {
                stages: ShaderStages::VERTEX | ShaderStages::FRAGMENT,
                offset: 0,
                size: layout.push_constant_size as u32,
            }]
        } else {
            vec![]
        };

        let pipeline_layout = PipelineLayout::new(
            device.clone(),
            PipelineLayoutCreateInfo {
                set_layouts: set_layouts.clone(),
                push_constant_ranges,
                ..Default::default()
            },
        )
        .map_err(|e| EngineError::RuntimeError(format!("pipeline layout creation failed: {e}")))?;

        let vertex_input_state = build_vertex_input_state(&layout);

        let multisampling_enabled = subpass.subpass_desc().color_attachments.len() > 0
            && subpass.num_samples().map(|s| s != vulkano::image::SampleCount::Sample1).unwrap_or(false);

        let pipeline = GraphicsPipeline::new(
            device.clone(),
            None,
            GraphicsPipelineCreateInfo {
                stages: stages.into_iter().collect(),
                vertex_input_state: Some(vertex_input_state),
                input_assembly_state: Some(InputAssemblyState {
                    topology: PrimitiveTopology::TriangleList,
                    primitive_restart_enable: false,
                    ..Default::default()
                }),
                viewport_state: Some(ViewportState::default()),
                rasterization_state: Some(RasterizationState {
                    polygon_mode: if wireframe { PolygonMode::Line } else { PolygonMode::Fill },
                    cull_mode: cull_mode_to_vulkano(config.cull_mode),
                    front_face: vulkano::pipeline::graphics::rasterization::FrontFace::CounterClockwise,
                    depth_bias: None,
                    ..Default::default()
                }),
                multisample_state: Some(MultisampleState {
                    sample_shading: multisampling_enabled.then_some(0.2),
                    ..Default::default()
                }),
                depth_stencil_state: subpass.subpass_desc().depth_stencil_attachment.is_some().then(|| {
                    DepthStencilState {
                        depth: Some(DepthState {
                            write_enable: true,
                            compare_op: CompareOp::Less,
                        }),
                        ..Default::default()
                    }
                }),
                color_blend_state: Some(ColorBlendState::with_attachment_states(
                    subpass.num_color_attachments(),
                    ColorBlendAttachmentState {
                        blend: Some(AttachmentBlend {
                            src_color_blend_factor: BlendFactor::SrcAlpha,
                            dst_color_blend_factor: BlendFactor::OneMinusSrcAlpha,
                            color_blend_op: BlendOp::Add,
                            src_alpha_blend_factor: BlendFactor::SrcAlpha,
                            dst_alpha_blend_factor: BlendFactor::OneMinusSrcAlpha,
                            alpha_blend_op: BlendOp::Add,
                        }),
                        ..Default::default()
                    },
                )),
                dynamic_state: [DynamicState::Viewport, DynamicState::Scissor, DynamicState::LineWidth]
                    .into_iter()
                    .collect(),
                subpass: Some(subpass.into()),
                ..GraphicsPipelineCreateInfo::layout(pipeline_layout.clone())
            },
        )
        .map_err(|e| EngineError::RuntimeError(format!("pipeline creation failed: {e}")))?;

        let buffer_size = layout.global_stride + (max_instance_count as u64) * layout.instance_stride;
        let mut uniform_buffer = ManagedBuffer::new(
            allocators,
            buffer_size.max(1),
            BufferUsage::UNIFORM_BUFFER,
            MemoryTag::Shader,
        );
        let global_offset = uniform_buffer
            .allocate(layout.global_stride.max(1), required_ubo_alignment.max(1))
            .map_err(|e| EngineError::RuntimeError(format!("global UBO allocation failed: {e}")))?;

        let global_descriptor_sets = (0..max_frames_in_flight)
            .map(|_| {
                allocate_descriptor_set(
                    &allocators.descriptor_set,
                    set_layouts[layout::GLOBAL_SET_INDEX as usize].clone(),
                    &uniform_buffer,
                    global_offset,
                    layout.global_stride.max(1),
                )
            })
            .collect::<EngineResult<Vec<_>>>()?;

        let cull_mode = config.cull_mode;
        Ok(Self {
            name: config.name.clone(),
            config,
            layout,
            cull_mode,
            required_ubo_alignment,
            max_frames_in_flight,
            pipeline,
            pipeline_layout,
            set_layouts,
            uniform_buffer,
            global_offset,
            global_descriptor_sets,
            global_dirty: vec![true; max_frames_in_flight as usize],
            instances: HashMap::new(),
            next_instance_id: 0,
            state: ShaderState::Unbound,
            bound_instance_id: None,
        })
    }

    pub fn pipeline(&self) -> &Arc<GraphicsPipeline> {
        &self.pipeline
    }

    pub fn pipeline_layout(&self) -> &Arc<PipelineLayout> {
        &self.pipeline_layout
    }

    pub fn state(&self) -> ShaderState {
        self.state
    }

    /// Transitions `Unbound`/anything → `BoundGlobal` (spec §4.5 state
    /// machine: "`use()` transitions to BoundGlobal").
    pub fn use_shader(&mut self) {
        self.state = ShaderState::BoundGlobal;
        self.bound_instance_id = None;
    }

    /// Writes deferred global descriptor-set updates for this frame if the
    /// global binding was modified, then returns the set to bind at set=0.
    pub fn apply_global(&mut self, frame_index: usize) -> &Arc<VkDescriptorSet> {
        if self.global_dirty[frame_index] {
            self.global_dirty[frame_index] = false;
        }
        &self.global_descriptor_sets[frame_index]
    }

    /// `bind_instance` requires BoundGlobal or BoundInstance (spec §4.5).
    pub fn bind_instance(&mut self, instance_id: u32) -> EngineResult<()> {
        if self.state == ShaderState::Unbound {
            return Err(EngineError::InvalidArgument(
                "bind_instance called before use()".into(),
            ));
        }
        if !self.instances.contains_key(&instance_id) {
            return Err(EngineError::InvalidArgument(format!(
                "no such shader instance: {instance_id}"
            )));
        }
        self.state = ShaderState::BoundInstance;
        self.bound_instance_id = Some(instance_id);
        Ok(())
    }

    /// Updates the bound instance's per-frame descriptor set on first use or
    /// when `should_update` was set by a prior `set_uniform` call, then
    /// returns the set to bind at set=1.
    pub fn apply_instance(
        &mut self,
        allocators: &Allocators,
        frame_index: usize,
    ) -> EngineResult<Arc<VkDescriptorSet>> {
        let instance_id = self.bound_instance_id.ok_or_else(|| {
            EngineError::InvalidArgument("apply_instance called with no bound instance".into())
        })?;
        let stride = self.layout.instance_stride.max(1);
        let buffer = &self.uniform_buffer;
        let set_layout = self.set_layouts[layout::INSTANCE_SET_INDEX as usize].clone();

        let instance = self.instances.get_mut(&instance_id).unwrap();
        while instance.descriptor_sets.len() <= frame_index {
            instance.descriptor_sets.push(allocate_descriptor_set(
                &allocators.descriptor_set,
                set_layout.clone(),
                buffer,
                instance.offset,
                stride,
            )?);
        }
        if instance.should_update {
            instance.descriptor_sets[frame_index] = allocate_descriptor_set(
                &allocators.descriptor_set,
                set_layout,
                buffer,
                instance.offset,
                stride,
            )?;
            instance.should_update = false;
        }
        Ok(instance.descriptor_sets[frame_index].clone())
    }

    /// Writes `bytes` into the named Global-scope uniform's byte range
    /// within the shared managed buffer (spec §4.5 `set_uniform`: "demands
    /// that the bound scope match the uniform's scope"). Marks this frame's
    /// global descriptor set dirty so `apply_global` refreshes it.
    pub fn set_global_uniform(&mut self, frame_index: usize, name: &str, bytes: &[u8]) -> EngineResult<()> {
        let uniform = self
            .layout
            .uniforms
            .iter()
            .find(|u| u.name == name && u.scope == Scope::Global)
            .ok_or_else(|| {
                EngineError::InvalidArgument(format!("shader \"{}\" has no global uniform \"{name}\"", self.name))
            })?;
        let offset = self.global_offset + uniform.byte_range.offset;
        self.uniform_buffer.load_data(bytes, offset);
        self.global_dirty[frame_index] = true;
        Ok(())
    }

    /// Writes `bytes` into the named Instance-scope uniform's byte range for
    /// `instance_id`, marking its per-frame descriptor sets for refresh on
    /// the next `apply_instance` (spec §4.5).
    pub fn set_instance_uniform(&mut self, instance_id: u32, name: &str, bytes: &[u8]) -> EngineResult<()> {
        let uniform = self
            .layout
            .uniforms
            .iter()
            .find(|u| u.name == name && u.scope == Scope::Instance)
            .ok_or_else(|| {
                EngineError::InvalidArgument(format!("shader \"{}\" has no instance uniform \"{name}\"", self.name))
            })?
            .clone();
        let instance = self.instances.get_mut(&instance_id).ok_or_else(|| {
            EngineError::InvalidArgument(format!("no such shader instance: {instance_id}"))
        })?;
        let offset = instance.offset + uniform.byte_range.offset;
        self.uniform_buffer.load_data(bytes, offset);
        instance.should_update = true;
        Ok(())
    }

    /// Provides a list of texture maps equal to the shader's declared
    /// instance-texture count. Fewer is `MapCountMismatch`; extra maps are
    /// ignored with a warning (spec §4.5 "Instance acquisition").
    pub fn acquire_instance_resources(
        &mut self,
        maps: Vec<Arc<TextureMap>>,
        default_map: &Arc<TextureMap>,
    ) -> EngineResult<u32> {
        let declared = self.layout.descriptor_sets[layout::INSTANCE_SET_INDEX as usize].texture_map_count as usize;

        if maps.len() < declared {
            return Err(EngineError::InvalidArgument(format!(
                "shader \"{}\" instance acquisition expected {declared} texture maps, got {}",
                self.name,
                maps.len()
            )));
        }
        if maps.len() > declared {
            log::warn!(
                "shader \"{}\": {} surplus texture maps ignored during instance acquisition",
                self.name,
                maps.len() - declared
            );
        }

        let mut resolved: Vec<Arc<TextureMap>> = maps.into_iter().take(declared).collect();
        while resolved.len() < declared {
            resolved.push(default_map.clone());
        }

        let offset = self
            .uniform_buffer
            .allocate(
                self.layout.instance_stride.max(1),
                self.required_ubo_alignment.max(1),
            )
            .map_err(|e| EngineError::RuntimeError(format!("instance UBO allocation failed: {e}")))?;

        let id = self.next_instance_id;
        self.next_instance_id += 1;
        self.instances.insert(
            id,
            InstanceState {
                offset,
                should_update: true,
                texture_maps: resolved,
                descriptor_sets: Vec::new(),
            },
        );
        Ok(id)
    }

    pub fn release_instance_resources(&mut self, instance_id: u32) {
        if let Some(instance) = self.instances.remove(&instance_id) {
            self.uniform_buffer.deallocate(instance.offset);
        }
    }

    /// Uploads raw bytes into the global uniform region of the shared
    /// managed buffer.
    pub fn write_global(&self, data: &[u8]) {
        self.uniform_buffer.load_data(data, self.global_offset);
    }

    /// Uploads raw bytes into the instance uniform region, marking the
    /// instance's per-frame descriptor sets for refresh on next
    /// `apply_instance` (spec §4.5: "should_update flag ... set by any
    /// set_uniform on an instance-scoped uniform").
    pub fn write_instance(&mut self, instance_id: u32, data: &[u8]) -> EngineResult<()> {
        let instance = self.instances.get_mut(&instance_id).ok_or_else(|| {
            EngineError::InvalidArgument(format!("no such shader instance: {instance_id}"))
        })?;
        self.uniform_buffer.load_data(data, instance.offset);
        instance.should_update = true;
        Ok(())
    }

    pub fn texture_maps(&self, instance_id: u32) -> Option<&[Arc<TextureMap>]> {
        self.instances.get(&instance_id).map(|i| i.texture_maps.as_slice())
    }

    pub fn uniform_index(&self, name: &str) -> Option<usize> {
        self.layout.uniforms.iter().position(|u| u.name == name)
    }
}

fn build_vertex_input_state(layout: &ShaderLayout) -> VertexInputState {
    let mut state = VertexInputState::new();
    state = state.binding(
        0,
        VertexInputBindingDescription {
            stride: layout.attribute_stride,
            input_rate: VertexInputRate::Vertex,
        },
    );
    for (location, attr) in layout.attributes.iter().enumerate() {
        state = state.attribute(
            location as u32,
            VertexInputAttributeDescription {
                binding: 0,
                format: attribute_format(attr.attribute_type),
                offset: attr.offset,
            },
        );
    }
    state
}

fn build_descriptor_set_layouts(
    device: Arc<Device>,
    layout: &ShaderLayout,
) -> EngineResult<Vec<Arc<DescriptorSetLayout>>> {
    let mut result = Vec::with_capacity(layout.descriptor_sets.len());
    for set in &layout.descriptor_sets {
        let stages = match set.scope {
            Scope::Global | Scope::Instance => ShaderStages::VERTEX | ShaderStages::FRAGMENT,
            Scope::Local => ShaderStages::empty(),
        };
        let bindings: HashMap<u32, DescriptorSetLayoutBinding> = set
            .bindings
            .iter()
            .map(|binding| {
                let descriptor_type = match binding.binding_type {
                    BindingType::Uniform => DescriptorType::UniformBuffer,
                    BindingType::Sampler => DescriptorType::CombinedImageSampler,
                    BindingType::Storage => DescriptorType::StorageBuffer,
                };
                let mut layout_binding = DescriptorSetLayoutBinding::descriptor_type(descriptor_type);
                layout_binding.stages = stages;
                layout_binding.descriptor_count = binding.count.max(1);
                (binding.binding_index, layout_binding)
            })
            .collect();

        let descriptor_layout = DescriptorSetLayout::new(
            device.clone(),
            DescriptorSetLayoutCreateInfo {
                bindings,
                ..Default::default()
            },
        )
        .map_err(|e| EngineError::RuntimeError(format!("descriptor set layout creation failed: {e}")))?;
        result.push(descriptor_layout);
    }
    Ok(result)
}

fn allocate_descriptor_set(
    allocator: &StandardDescriptorSetAllocator,
    set_layout: Arc<DescriptorSetLayout>,
    buffer: &ManagedBuffer,
    offset: u64,
    size: u64,
) -> EngineResult<Arc<VkDescriptorSet>> {
    let slice = buffer.as_subbuffer().clone().slice(offset..offset + size);
    VkDescriptorSet::new(
        allocator,
        set_layout,
        [WriteDescriptorSet::buffer(0, slice)],
        [],
    )
    .map_err(|e| EngineError::RuntimeError(format!("descriptor set allocation failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::config::parse;

    #[test]
    fn attribute_format_mapping_is_total() {
        for ty in [
            AttributeType::Float32,
            AttributeType::Vec2,
            AttributeType::Vec3,
            AttributeType::Vec4,
            AttributeType::Int8,
            AttributeType::Int16,
            AttributeType::Int32,
            AttributeType::Uint8,
            AttributeType::Uint16,
            AttributeType::Uint32,
        ] {
            let _ = attribute_format(ty);
        }
    }

    #[test]
    fn cull_mode_mapping_covers_all_variants() {
        for mode in [CullMode::None, CullMode::Front, CullMode::Back, CullMode::Both] {
            let _ = cull_mode_to_vulkano(mode);
        }
    }

    #[test]
    fn vertex_input_state_binding_stride_matches_layout() {
        let cfg = parse(
            "test",
            "attribute=vec3, position\nattribute=vec2, uv\n",
        )
        .unwrap();
        let layout = layout::compute_layout(&cfg, 64).unwrap();
        assert_eq!(layout.attribute_stride, 12 + 8);
    }
}
