pub mod frame_driver;
pub mod modules;

pub use frame_driver::FrameDriver;
pub use modules::{FramePacket, RenderModule};
