use crate::core::VulkanContext;
use ash::{version::DeviceV1_0, vk};
use snafu::{ResultExt, Snafu};
use std::{
    ffi::CString,
    io::Cursor,
    path::{Path, PathBuf},
    sync::Arc,
};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility = "pub(crate)")]
pub enum Error {
    #[snafu(display("Failed to read shader file {}: {}", path.display(), source))]
    ShaderFileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Failed to read SPIR-V from shader source: {}", source))]
    SpirvRead { source: std::io::Error },

    #[snafu(display("Failed to create shader module: {}", source))]
    ShaderModuleCreation { source: vk::Result },
}

pub struct Shader {
    context: Arc<VulkanContext>,
    module: vk::ShaderModule,
    stage: vk::ShaderStageFlags,
    entry_point_name: CString,
}

impl Shader {
    pub const ENTRY_POINT: &'static str = "main";

    pub fn from_file<P: AsRef<Path>>(
        context: Arc<VulkanContext>,
        path: P,
        stage: vk::ShaderStageFlags,
    ) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).context(ShaderFileRead {
            path: path.to_path_buf(),
        })?;
        Self::from_bytes(context, &bytes, stage)
    }

    /// Builds a shader module from SPIR-V already in memory, such as
    /// an `include_bytes!` payload.
    pub fn from_bytes(
        context: Arc<VulkanContext>,
        bytes: &[u8],
        stage: vk::ShaderStageFlags,
    ) -> Result<Self> {
        let shader_source = ash::util::read_spv(&mut Cursor::new(bytes)).context(SpirvRead)?;
        let shader_create_info = vk::ShaderModuleCreateInfo::builder()
            .code(&shader_source)
            .build();
        let module = unsafe {
            context
                .logical_device()
                .logical_device()
                .create_shader_module(&shader_create_info, None)
                .context(ShaderModuleCreation)?
        };

        let entry_point_name = CString::new(Self::ENTRY_POINT)
            .expect("Failed to create CString for shader entry point name!");

        Ok(Shader {
            module,
            context,
            stage,
            entry_point_name,
        })
    }

    /// Borrows the entry point name, so the shader must outlive pipeline creation.
    pub fn state_info(&self) -> vk::PipelineShaderStageCreateInfo {
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(self.stage)
            .module(self.module)
            .name(&self.entry_point_name)
            .build()
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        unsafe {
            self.context
                .logical_device()
                .logical_device()
                .destroy_shader_module(self.module, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_point_converts_to_a_c_string() {
        let entry_point_name = CString::new(Shader::ENTRY_POINT).expect("Invalid entry point");
        assert_eq!(entry_point_name.as_bytes_with_nul(), b"main\0");
    }
}
