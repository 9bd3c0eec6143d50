// Shader module loading
//
// Shaders are externally-compiled SPIR-V blobs (see build.rs) loaded by
// path when a drawable builds its pipeline.

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use ash::util::read_spv;
use ash::vk;

use super::VulkanDevice;

/// Load a SPIR-V file and create a shader module from it.
pub fn load_shader_module<P: AsRef<Path>>(
    device: &VulkanDevice,
    path: P,
) -> Result<vk::ShaderModule> {
    let path = path.as_ref();
    let mut file = File::open(path)
        .with_context(|| format!("Failed to open shader {:?}", path))?;

    // read_spv handles the byte-to-word conversion and alignment
    let code = read_spv(&mut file)
        .with_context(|| format!("Failed to read SPIR-V from {:?}", path))?;

    let create_info = vk::ShaderModuleCreateInfo::builder().code(&code);

    unsafe {
        device.device.create_shader_module(&create_info, None)
            .with_context(|| format!("Failed to create shader module from {:?}", path))
    }
}
