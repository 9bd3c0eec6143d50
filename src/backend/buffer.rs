// Host-visible buffer primitive
//
// Drawables stage their geometry through these: allocate once at init,
// upload synchronously, destroy at release. Not meant for per-frame
// streaming.

use anyhow::{Context, Result};
use ash::vk;

use super::VulkanDevice;

/// A buffer backed by host-visible, host-coherent memory.
///
/// A `Default`-initialized value holds null handles; `destroy` on it is a
/// no-op, so partially-initialized drawables can always release safely.
#[derive(Default)]
pub struct HostBuffer {
    pub buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    pub size: vk::DeviceSize,
}

impl HostBuffer {
    pub fn new(
        device: &VulkanDevice,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
    ) -> Result<Self> {
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe {
            device.device.create_buffer(&buffer_info, None)
                .context("Failed to create buffer")?
        };

        let mem_requirements = unsafe {
            device.device.get_buffer_memory_requirements(buffer)
        };

        let memory_type_index = find_memory_type(
            device,
            mem_requirements.memory_type_bits,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;

        // Allocate the reported requirement, which may exceed `size` due to
        // alignment
        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(mem_requirements.size)
            .memory_type_index(memory_type_index);

        let memory = unsafe {
            device.device.allocate_memory(&alloc_info, None)
                .context("Failed to allocate buffer memory")?
        };

        unsafe {
            device.device.bind_buffer_memory(buffer, memory, 0)
                .context("Failed to bind buffer memory")?;
        }

        Ok(Self { buffer, memory, size })
    }

    /// Map, copy, unmap. Synchronous; intended for static geometry upload.
    pub fn upload(&self, device: &VulkanDevice, data: &[u8], offset: vk::DeviceSize) -> Result<()> {
        debug_assert!(offset + data.len() as vk::DeviceSize <= self.size);

        unsafe {
            let ptr = device.device.map_memory(
                self.memory,
                offset,
                data.len() as vk::DeviceSize,
                vk::MemoryMapFlags::empty(),
            ).context("Failed to map buffer memory")? as *mut u8;

            ptr.copy_from_nonoverlapping(data.as_ptr(), data.len());
            device.device.unmap_memory(self.memory);
        }

        Ok(())
    }

    /// Free the buffer and its backing memory. Safe on a never-allocated
    /// buffer and safe to call twice.
    pub fn destroy(&mut self, device: &ash::Device) {
        unsafe {
            if self.buffer != vk::Buffer::null() {
                device.destroy_buffer(self.buffer, None);
                self.buffer = vk::Buffer::null();
            }
            if self.memory != vk::DeviceMemory::null() {
                device.free_memory(self.memory, None);
                self.memory = vk::DeviceMemory::null();
            }
        }
        self.size = 0;
    }
}

/// Find a suitable memory type index
fn find_memory_type(
    device: &VulkanDevice,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> Result<u32> {
    let mem_properties = unsafe {
        device.instance.get_physical_device_memory_properties(device.physical_device)
    };

    for i in 0..mem_properties.memory_type_count {
        let has_type = (type_filter & (1 << i)) != 0;
        let has_properties = mem_properties.memory_types[i as usize]
            .property_flags
            .contains(properties);

        if has_type && has_properties {
            return Ok(i);
        }
    }

    anyhow::bail!("No memory type satisfies {:?}", properties)
}
