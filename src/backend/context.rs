// Rendering context - device, swapchain-dependent resources, present loop
//
// Owns everything with a lifecycle: the device, the surface (which may be
// lost and recreated), the swapchain resource group (rebuilt on resize or
// presentation-error feedback), the per-frame sync slots, and the frame
// ledger. All mutation happens from the single thread driving draw_frame.

use std::sync::Arc;

use anyhow::{Context, Result};
use ash::vk;
use winit::window::Window;

use super::pacing::{FrameLedger, TickGate, FRAMES_IN_FLIGHT};
use super::swapchain::{AcquireOutcome, PresentOutcome, Swapchain};
use super::sync::FrameSync;
use super::VulkanDevice;
use crate::config::Config;

/// What the context exposes to drawables while a frame is being recorded:
/// enough to build a pipeline against the current render pass and to detect
/// staleness, nothing more.
pub struct FrameContext<'a> {
    pub device: &'a Arc<VulkanDevice>,
    pub render_pass: vk::RenderPass,
    pub extent: vk::Extent2D,
    pub swapchain_version: u64,
}

/// Swapchain plus everything derived from it. Built and replaced as one
/// unit so the context never holds a partially-consistent mix of old and
/// new resources.
struct SwapchainResources {
    swapchain: Swapchain,
    render_pass: vk::RenderPass,
    framebuffers: Vec<vk::Framebuffer>,
    command_pool: vk::CommandPool,
    command_buffers: Vec<vk::CommandBuffer>,
}

impl SwapchainResources {
    fn build(
        device: &Arc<VulkanDevice>,
        surface: vk::SurfaceKHR,
        width: u32,
        height: u32,
        present_mode: vk::PresentModeKHR,
    ) -> Result<Self> {
        let swapchain = Swapchain::new(device.clone(), surface, width, height, present_mode)?;
        let render_pass = create_render_pass(device, swapchain.format)?;
        let framebuffers =
            create_framebuffers(device, &swapchain.image_views, render_pass, swapchain.extent)?;

        let pool_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(device.graphics_queue_family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

        let command_pool = unsafe {
            device.device.create_command_pool(&pool_info, None)
                .context("Failed to create command pool")?
        };

        // One command buffer per swapchain image, re-recorded every frame
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(swapchain.images.len() as u32);

        let command_buffers = unsafe {
            device.device.allocate_command_buffers(&alloc_info)
                .context("Failed to allocate command buffers")?
        };

        Ok(Self {
            swapchain,
            render_pass,
            framebuffers,
            command_pool,
            command_buffers,
        })
    }

    /// Destroy in dependency order: command buffers, command pool,
    /// framebuffers, render pass, then (via Swapchain's Drop) image views
    /// and the chain itself.
    fn destroy(self, device: &ash::Device) {
        let Self {
            swapchain,
            render_pass,
            framebuffers,
            command_pool,
            command_buffers,
        } = self;

        unsafe {
            if !command_buffers.is_empty() {
                device.free_command_buffers(command_pool, &command_buffers);
            }
            device.destroy_command_pool(command_pool, None);
            for fb in framebuffers {
                device.destroy_framebuffer(fb, None);
            }
            device.destroy_render_pass(render_pass, None);
        }

        drop(swapchain);
    }
}

pub struct RenderContext {
    window: Arc<Window>,
    device: Arc<VulkanDevice>,
    surface: vk::SurfaceKHR,
    resources: Option<SwapchainResources>,
    frame_sync: Vec<FrameSync>,
    ledger: FrameLedger,
    preferred_present_mode: vk::PresentModeKHR,
    clear_color: [f32; 4],
    wait_stages: [vk::PipelineStageFlags; 1],
}

impl RenderContext {
    /// Bootstrap the whole stack: device, surface, swapchain resource
    /// group, sync slots. Any failure here is fatal to startup.
    pub fn new(window: Arc<Window>, config: &Config) -> Result<Self> {
        let enable_validation = cfg!(debug_assertions) && config.debug.validation_layers;
        let (device, surface) =
            VulkanDevice::new(&window, &config.window.title, enable_validation)?;

        let preferred_present_mode = config.present_mode();
        let size = window.inner_size();
        let resources = SwapchainResources::build(
            &device,
            surface,
            size.width,
            size.height,
            preferred_present_mode,
        )?;

        let extent = resources.swapchain.extent;
        let image_count = resources.swapchain.images.len();

        let frame_sync = FrameSync::create_slots(&device.device, FRAMES_IN_FLIGHT)?;

        log::info!("Rendering context initialized");

        Ok(Self {
            window,
            device,
            surface,
            resources: Some(resources),
            frame_sync,
            ledger: FrameLedger::new(extent.width, extent.height, image_count),
            preferred_present_mode,
            clear_color: config.graphics.clear_color,
            wait_stages: [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT],
        })
    }

    pub fn device(&self) -> &Arc<VulkanDevice> {
        &self.device
    }

    /// Current presentable extent as (width, height).
    pub fn extent(&self) -> (u32, u32) {
        self.ledger.extent()
    }

    pub fn frame_count(&self) -> u64 {
        self.ledger.frames()
    }

    /// Ask for a swapchain rebuild before the next frame (resize callback,
    /// fullscreen toggle).
    pub fn request_recreate(&mut self) {
        self.ledger.request_recreate();
    }

    /// The drawable-facing view of the current resources.
    pub fn frame_context(&self) -> Result<FrameContext<'_>> {
        let resources = self.resources.as_ref().context("Swapchain not initialized")?;
        Ok(FrameContext {
            device: &self.device,
            render_pass: resources.render_pass,
            extent: resources.swapchain.extent,
            swapchain_version: self.ledger.swapchain_version(),
        })
    }

    /// Draw one frame: acquire, record through `record`, submit, present.
    ///
    /// Returns Ok(false) when the tick was cleanly abandoned (minimized
    /// window, swapchain invalidation, surface loss) - those are recovered
    /// conditions, not errors. Returns Err only for fatal protocol
    /// failures.
    pub fn draw_frame<F>(&mut self, record: F) -> Result<bool>
    where
        F: FnOnce(vk::CommandBuffer, &FrameContext) -> Result<()>,
    {
        let size = self.window.inner_size();
        match self.ledger.begin_tick(size.width, size.height) {
            TickGate::SkipZeroSized => return Ok(false),
            TickGate::RecreateFirst => {
                self.rebuild_swapchain()?;
                if self.ledger.recreate_pending() {
                    // Still zero-sized; try again next tick
                    return Ok(false);
                }
            }
            TickGate::Render => {}
        }

        let slot = self.ledger.slot();
        let image_available = self.frame_sync[slot].image_available;
        let render_finished = self.frame_sync[slot].render_finished;
        let in_flight = self.frame_sync[slot].in_flight_fence;

        // Bound how far the CPU may run ahead of the GPU
        unsafe {
            self.device.device.wait_for_fences(&[in_flight], true, u64::MAX)
                .context("Failed waiting for in-flight fence")?;
        }

        let acquire = self
            .resources
            .as_ref()
            .context("Swapchain not initialized")?
            .swapchain
            .acquire_next_image(u64::MAX, image_available)?;

        let image_index = match acquire {
            AcquireOutcome::Ready { index, suboptimal } => {
                if suboptimal {
                    log::debug!("Acquired suboptimal swapchain image");
                }
                index
            }
            AcquireOutcome::OutOfDate => {
                self.ledger.request_recreate();
                return Ok(false);
            }
            AcquireOutcome::SurfaceLost => {
                self.recover_surface()?;
                return Ok(false);
            }
        };

        // The acquired image may still be in flight from a submission out
        // of a different slot; wait for that slot's fence before reusing
        // its command buffer
        if let Some(prior_slot) = self.ledger.claim_image(image_index as usize) {
            let prior_fence = self.frame_sync[prior_slot].in_flight_fence;
            unsafe {
                self.device.device.wait_for_fences(&[prior_fence], true, u64::MAX)
                    .context("Failed waiting for prior image fence")?;
            }
        }

        unsafe {
            self.device.device.reset_fences(&[in_flight])
                .context("Failed to reset in-flight fence")?;
        }

        let resources = self.resources.as_ref().context("Swapchain not initialized")?;
        let cmd = resources.command_buffers[image_index as usize];
        let frame = FrameContext {
            device: &self.device,
            render_pass: resources.render_pass,
            extent: resources.swapchain.extent,
            swapchain_version: self.ledger.swapchain_version(),
        };

        let device = &self.device.device;
        unsafe {
            device.reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())
                .context("Failed to reset command buffer")?;

            let begin_info = vk::CommandBufferBeginInfo::builder();
            device.begin_command_buffer(cmd, &begin_info)
                .context("Failed to begin command buffer")?;

            let clear_values = [vk::ClearValue {
                color: vk::ClearColorValue { float32: self.clear_color },
            }];
            let rp_begin = vk::RenderPassBeginInfo::builder()
                .render_pass(resources.render_pass)
                .framebuffer(resources.framebuffers[image_index as usize])
                .render_area(vk::Rect2D {
                    offset: vk::Offset2D { x: 0, y: 0 },
                    extent: resources.swapchain.extent,
                })
                .clear_values(&clear_values);
            device.cmd_begin_render_pass(cmd, &rp_begin, vk::SubpassContents::INLINE);
        }

        // The loop knows nothing about what gets drawn
        record(cmd, &frame)?;

        unsafe {
            device.cmd_end_render_pass(cmd);
            device.end_command_buffer(cmd)
                .context("Failed to end command buffer")?;
        }

        let wait_semaphores = [image_available];
        let signal_semaphores = [render_finished];
        let command_buffers = [cmd];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&self.wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            device.queue_submit(
                self.device.graphics_queue,
                &[submit_info.build()],
                in_flight,
            )
            .context("Failed to submit draw commands")?;
        }

        let outcome = resources.swapchain.present(
            self.device.present_queue,
            image_index,
            &signal_semaphores,
        )?;

        match outcome {
            PresentOutcome::Presented { suboptimal } => {
                if suboptimal {
                    self.ledger.request_recreate();
                }
            }
            PresentOutcome::OutOfDate => self.ledger.request_recreate(),
            PresentOutcome::SurfaceLost => self.recover_surface()?,
        }

        // The frame was submitted either way
        self.ledger.advance_frame();

        Ok(true)
    }

    /// The rebuild protocol: idle-wait, teardown, rebuild, version bump.
    ///
    /// Declines to run while the framebuffer is zero-sized; the pending
    /// flag stays set so the first non-zero tick rebuilds.
    fn rebuild_swapchain(&mut self) -> Result<()> {
        let size = self.window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Ok(());
        }

        self.device.wait_idle()?;
        self.teardown_swapchain();

        let resources = SwapchainResources::build(
            &self.device,
            self.surface,
            size.width,
            size.height,
            self.preferred_present_mode,
        )?;

        self.ledger.swapchain_rebuilt(
            resources.swapchain.extent.width,
            resources.swapchain.extent.height,
            resources.swapchain.images.len(),
        );
        self.resources = Some(resources);

        log::debug!(
            "Swapchain rebuilt: {}x{} (version {})",
            size.width,
            size.height,
            self.ledger.swapchain_version()
        );

        Ok(())
    }

    /// Idempotent: a second call without an intervening build is a no-op.
    fn teardown_swapchain(&mut self) {
        if let Some(resources) = self.resources.take() {
            resources.destroy(&self.device.device);
        }
    }

    /// The platform reported the surface itself gone. Drop everything that
    /// referenced it, build a fresh surface, and let the next tick rebuild
    /// the chain - the one-tick stall is the accepted cost.
    fn recover_surface(&mut self) -> Result<()> {
        log::warn!("Surface lost; recreating");

        self.device.wait_idle()?;
        self.teardown_swapchain();

        unsafe {
            self.device.surface_loader.destroy_surface(self.surface, None);
        }
        self.surface = self
            .device
            .recreate_surface(&self.window)
            .context("Failed to recreate lost surface")?;

        self.ledger.request_recreate();
        Ok(())
    }

    /// Tear everything down after a full idle-wait. Idempotent, and also
    /// invoked from Drop.
    pub fn cleanup(&mut self) {
        if self.frame_sync.is_empty() && self.resources.is_none()
            && self.surface == vk::SurfaceKHR::null()
        {
            return;
        }

        log::info!("Cleaning up rendering context...");

        let _ = self.device.wait_idle();

        for sync in self.frame_sync.drain(..) {
            sync.destroy(&self.device.device);
        }

        self.teardown_swapchain();

        if self.surface != vk::SurfaceKHR::null() {
            unsafe {
                self.device.surface_loader.destroy_surface(self.surface, None);
            }
            self.surface = vk::SurfaceKHR::null();
        }
        // Messenger, device and instance go down with the last VulkanDevice
        // reference, in that order
    }
}

impl Drop for RenderContext {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Single color attachment, cleared on load, presentable at the end. The
/// external dependency holds the attachment write until prior reads of the
/// image (presentation) are done.
fn create_render_pass(device: &VulkanDevice, format: vk::Format) -> Result<vk::RenderPass> {
    let color_attachment = vk::AttachmentDescription::builder()
        .format(format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
        .build();

    let color_attachment_ref = vk::AttachmentReference::builder()
        .attachment(0)
        .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
        .build();

    let color_attachments = [color_attachment_ref];
    let subpass = vk::SubpassDescription::builder()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_attachments)
        .build();

    let dependency = vk::SubpassDependency::builder()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .src_access_mask(vk::AccessFlags::empty())
        .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
        .build();

    let attachments = [color_attachment];
    let subpasses = [subpass];
    let dependencies = [dependency];

    let render_pass_info = vk::RenderPassCreateInfo::builder()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);

    unsafe {
        device.device.create_render_pass(&render_pass_info, None)
            .context("Failed to create render pass")
    }
}

/// One framebuffer per swapchain image view, sized to the chain.
fn create_framebuffers(
    device: &VulkanDevice,
    image_views: &[vk::ImageView],
    render_pass: vk::RenderPass,
    extent: vk::Extent2D,
) -> Result<Vec<vk::Framebuffer>> {
    image_views
        .iter()
        .map(|&image_view| {
            let attachments = [image_view];
            let framebuffer_info = vk::FramebufferCreateInfo::builder()
                .render_pass(render_pass)
                .attachments(&attachments)
                .width(extent.width)
                .height(extent.height)
                .layers(1);

            unsafe {
                device.device.create_framebuffer(&framebuffer_info, None)
                    .context("Failed to create framebuffer")
            }
        })
        .collect()
}
