// Scene drawables
//
// Each drawable owns its geometry and pipeline, rebuilds the pipeline when
// the context's swapchain version moves past its cached one, and records
// draws into an already-open render pass. The registry of drawables lives
// in the application layer; the render loop only ever sees one opaque
// record callback.

pub mod cube;
mod pipeline;
pub mod plane;

pub use cube::CubeRenderer;
pub use plane::PlaneRenderer;

use anyhow::Result;
use ash::vk;
use glam::Mat4;

use crate::backend::FrameContext;

/// Where build.rs leaves the compiled SPIR-V blobs.
pub const SHADER_DIR: &str = "shaders";

pub trait Drawable {
    /// Create device resources (geometry buffers, first pipeline).
    fn init(&mut self, frame: &FrameContext) -> Result<()>;

    /// Rebuild the pipeline if the swapchain was rebuilt since it was
    /// created. Cheap when nothing changed.
    fn ensure_pipeline(&mut self, frame: &FrameContext) -> Result<()>;

    /// Record draw commands. The render pass is already begun.
    fn record(&mut self, cmd: vk::CommandBuffer, frame: &FrameContext, mvp: Mat4) -> Result<()>;

    /// Destroy device resources. Must be safe on a partially-initialized
    /// drawable.
    fn release(&mut self);
}

/// Dynamic viewport/scissor covering the current extent. Called by every
/// drawable on every record, which is what lets pure size changes skip
/// pipeline rebuilds.
pub(crate) fn set_viewport_scissor(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    extent: vk::Extent2D,
) {
    let viewport = vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    };
    let scissor = vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent,
    };

    unsafe {
        device.cmd_set_viewport(cmd, 0, &[viewport]);
        device.cmd_set_scissor(cmd, 0, &[scissor]);
    }
}
