pub mod allocators;
pub mod buffers;
pub mod device;
pub mod image;
pub mod instance;
pub mod managed_buffer;
pub mod physical_device;
pub mod render_pass;
pub mod render_target;
pub mod swapchain;
