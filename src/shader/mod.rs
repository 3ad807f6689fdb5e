//! Shader runtime (spec §3/§4.5): the `.shadercfg` parser, the
//! config→descriptor-set/push-constant layout computation, and the
//! pipeline-owning [`shader::Shader`] runtime itself.

pub mod config;
pub mod layout;
pub mod shader;

pub use config::{AttributeType, CullMode, Scope, ShaderConfig, UniformConfig, UniformType};
pub use layout::{compute_layout, descriptor_pool_sizes, BindingType, ShaderLayout};
pub use shader::{load_shader_module, Shader, ShaderState};
