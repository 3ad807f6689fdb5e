pub mod error;
pub mod event;
pub mod input;
pub mod math;
pub mod memory;
pub mod profiler;
pub mod render;
pub mod resources;
pub mod shader;
pub mod systems;
mod vertex_data;
pub mod vulkano_objects;

pub use vertex_data::{Vertex2d, Vertex3d, VertexFull};

#[cfg(test)]
mod tests {
    #[test]
    fn it_works() {
        let result = 2 + 2;
        assert_eq!(result, 4);
    }
}
