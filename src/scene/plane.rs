// Ground plane drawable
//
// A huge XZ quad at y=0 drawn as a 4-vertex triangle strip.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use ash::vk;
use glam::Mat4;

use super::pipeline::{build_pipeline, PipelineParams};
use super::{set_viewport_scissor, Drawable, SHADER_DIR};
use crate::backend::buffer::HostBuffer;
use crate::backend::{FrameContext, VulkanDevice};

const PLANE_HALF_EXTENT: f32 = 1000.0;

#[derive(Default)]
pub struct PlaneRenderer {
    device: Option<Arc<VulkanDevice>>,
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
    vbo: HostBuffer,
    known_version: u64,
}

impl PlaneRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    fn create_pipeline(&mut self, frame: &FrameContext) -> Result<()> {
        self.known_version = frame.swapchain_version;

        // Position only, tightly packed
        let bindings = [vk::VertexInputBindingDescription::builder()
            .binding(0)
            .stride((3 * std::mem::size_of::<f32>()) as u32)
            .input_rate(vk::VertexInputRate::VERTEX)
            .build()];
        let attributes = [vk::VertexInputAttributeDescription::builder()
            .binding(0)
            .location(0)
            .format(vk::Format::R32G32B32_SFLOAT)
            .offset(0)
            .build()];

        let shader_dir = Path::new(SHADER_DIR);
        let (pipeline, layout) = build_pipeline(
            frame,
            &PipelineParams {
                vert_shader: &shader_dir.join("plane.vert.spv"),
                frag_shader: &shader_dir.join("plane.frag.spv"),
                bindings: &bindings,
                attributes: &attributes,
                topology: vk::PrimitiveTopology::TRIANGLE_STRIP,
            },
        )?;

        self.pipeline = pipeline;
        self.layout = layout;
        Ok(())
    }

    fn destroy_pipeline(&mut self) {
        let Some(device) = self.device.as_ref() else { return };
        unsafe {
            if self.pipeline != vk::Pipeline::null() {
                device.device.destroy_pipeline(self.pipeline, None);
                self.pipeline = vk::Pipeline::null();
            }
            if self.layout != vk::PipelineLayout::null() {
                device.device.destroy_pipeline_layout(self.layout, None);
                self.layout = vk::PipelineLayout::null();
            }
        }
    }
}

impl Drawable for PlaneRenderer {
    fn init(&mut self, frame: &FrameContext) -> Result<()> {
        self.device = Some(frame.device.clone());

        // Strip order (0,1,2,3) forms two triangles covering the quad
        let h = PLANE_HALF_EXTENT;
        let verts: [f32; 12] = [
            -h, 0.0, -h, //
            h, 0.0, -h, //
            -h, 0.0, h, //
            h, 0.0, h,
        ];

        self.vbo = HostBuffer::new(
            frame.device,
            std::mem::size_of_val(&verts) as vk::DeviceSize,
            vk::BufferUsageFlags::VERTEX_BUFFER,
        )
        .context("Failed to create plane vertex buffer")?;
        self.vbo.upload(frame.device, bytemuck::cast_slice(&verts), 0)?;

        self.create_pipeline(frame)
    }

    fn ensure_pipeline(&mut self, frame: &FrameContext) -> Result<()> {
        if self.known_version != frame.swapchain_version {
            self.destroy_pipeline();
            self.create_pipeline(frame)?;
        }
        Ok(())
    }

    fn record(&mut self, cmd: vk::CommandBuffer, frame: &FrameContext, mvp: Mat4) -> Result<()> {
        self.ensure_pipeline(frame)?;

        let device = &frame.device.device;
        set_viewport_scissor(device, cmd, frame.extent);

        unsafe {
            device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, self.pipeline);
            device.cmd_push_constants(
                cmd,
                self.layout,
                vk::ShaderStageFlags::VERTEX,
                0,
                bytemuck::bytes_of(&mvp),
            );
            device.cmd_bind_vertex_buffers(cmd, 0, &[self.vbo.buffer], &[0]);
            device.cmd_draw(cmd, 4, 1, 0, 0);
        }

        Ok(())
    }

    fn release(&mut self) {
        self.destroy_pipeline();
        if let Some(device) = self.device.take() {
            self.vbo.destroy(&device.device);
        }
    }
}
