// Floating cube drawable
//
// A 2x2x2 cube with a distinct color per face, 36 vertices of interleaved
// position + color. The application layer places it above the ground via
// its model matrix.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use ash::vk;
use glam::Mat4;

use super::pipeline::{build_pipeline, PipelineParams};
use super::{set_viewport_scissor, Drawable, SHADER_DIR};
use crate::backend::buffer::HostBuffer;
use crate::backend::{FrameContext, VulkanDevice};

/// Floats per vertex: 3 position + 3 color
const VERTEX_STRIDE: usize = 6;

#[derive(Default)]
pub struct CubeRenderer {
    device: Option<Arc<VulkanDevice>>,
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
    vbo: HostBuffer,
    vertex_count: u32,
    known_version: u64,
}

/// Two triangles per face, one flat color per face.
fn cube_vertices() -> Vec<f32> {
    // Corner positions of a cube spanning [-1, 1] on each axis
    let c: [[f32; 3]; 8] = [
        [-1.0, -1.0, -1.0],
        [1.0, -1.0, -1.0],
        [1.0, 1.0, -1.0],
        [-1.0, 1.0, -1.0],
        [-1.0, -1.0, 1.0],
        [1.0, -1.0, 1.0],
        [1.0, 1.0, 1.0],
        [-1.0, 1.0, 1.0],
    ];

    // (corner indices as two fans from the first corner, face color)
    let faces: [([usize; 4], [f32; 3]); 6] = [
        ([4, 5, 6, 7], [0.86, 0.30, 0.26]), // +Z
        ([1, 0, 3, 2], [0.94, 0.58, 0.22]), // -Z
        ([5, 1, 2, 6], [0.30, 0.62, 0.86]), // +X
        ([0, 4, 7, 3], [0.38, 0.74, 0.36]), // -X
        ([7, 6, 2, 3], [0.92, 0.82, 0.30]), // +Y
        ([0, 1, 5, 4], [0.58, 0.42, 0.78]), // -Y
    ];

    let mut verts = Vec::with_capacity(36 * VERTEX_STRIDE);
    for (corners, color) in faces {
        for i in [0usize, 1, 2, 0, 2, 3] {
            verts.extend_from_slice(&c[corners[i]]);
            verts.extend_from_slice(&color);
        }
    }
    verts
}

impl CubeRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    fn create_pipeline(&mut self, frame: &FrameContext) -> Result<()> {
        self.known_version = frame.swapchain_version;

        let bindings = [vk::VertexInputBindingDescription::builder()
            .binding(0)
            .stride((VERTEX_STRIDE * std::mem::size_of::<f32>()) as u32)
            .input_rate(vk::VertexInputRate::VERTEX)
            .build()];
        let attributes = [
            vk::VertexInputAttributeDescription::builder()
                .binding(0)
                .location(0)
                .format(vk::Format::R32G32B32_SFLOAT)
                .offset(0)
                .build(),
            vk::VertexInputAttributeDescription::builder()
                .binding(0)
                .location(1)
                .format(vk::Format::R32G32B32_SFLOAT)
                .offset((3 * std::mem::size_of::<f32>()) as u32)
                .build(),
        ];

        let shader_dir = Path::new(SHADER_DIR);
        let (pipeline, layout) = build_pipeline(
            frame,
            &PipelineParams {
                vert_shader: &shader_dir.join("cube.vert.spv"),
                frag_shader: &shader_dir.join("cube.frag.spv"),
                bindings: &bindings,
                attributes: &attributes,
                topology: vk::PrimitiveTopology::TRIANGLE_LIST,
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

impl Drawable for CubeRenderer {
    fn init(&mut self, frame: &FrameContext) -> Result<()> {
        self.device = Some(frame.device.clone());

        let verts = cube_vertices();
        self.vertex_count = (verts.len() / VERTEX_STRIDE) as u32;

        self.vbo = HostBuffer::new(
            frame.device,
            (verts.len() * std::mem::size_of::<f32>()) as vk::DeviceSize,
            vk::BufferUsageFlags::VERTEX_BUFFER,
        )
        .context("Failed to create cube vertex buffer")?;
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
            device.cmd_draw(cmd, self.vertex_count, 1, 0, 0);
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_has_36_vertices() {
        let verts = cube_vertices();
        assert_eq!(verts.len(), 36 * VERTEX_STRIDE);
    }

    #[test]
    fn each_face_is_flat_colored() {
        let verts = cube_vertices();
        for face in verts.chunks(6 * VERTEX_STRIDE) {
            let color = &face[3..6];
            for vertex in face.chunks(VERTEX_STRIDE) {
                assert_eq!(&vertex[3..6], color);
            }
        }
    }

    #[test]
    fn positions_stay_on_the_unit_cube() {
        let verts = cube_vertices();
        for vertex in verts.chunks(VERTEX_STRIDE) {
            for &p in &vertex[..3] {
                assert!(p == 1.0 || p == -1.0);
            }
        }
    }
}
