// Backend module - Vulkan abstraction layer
//
// Thin wrapper around ash. The context owns the lifecycle; drawables see
// only the FrameContext view.

pub mod buffer;
pub mod context;
pub mod device;
pub mod pacing;
pub mod shader;
pub mod swapchain;
pub mod sync;

pub use context::{FrameContext, RenderContext};
pub use device::VulkanDevice;
