use crate::core::{surface::surface_extension_names, DebugLayer, LayerNameVec};
use ash::{
    extensions::ext::DebugUtils,
    version::{EntryV1_0, InstanceV1_0},
    vk,
};
use snafu::{ResultExt, Snafu};
use std::{
    ffi::{CStr, CString},
    os::raw::c_char,
};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility = "pub(crate)")]
pub enum Error {
    #[snafu(display("Failed to create entry: {}", source))]
    EntryLoading { source: ash::LoadingError },

    #[snafu(display("Failed to create instance: {}", source))]
    InstanceCreation { source: ash::InstanceError },

    #[snafu(display("Failed to enumerate instance properties: {}", source))]
    InstancePropertiesEnumeration { source: vk::Result },

    #[snafu(display("Failed to create a c-string from the application name: {}", source))]
    AppNameCreation { source: std::ffi::NulError },

    #[snafu(display("Failed to create a c-string from the engine name: {}", source))]
    EngineNameCreation { source: std::ffi::NulError },
}

trait ApplicationDescription {
    const APPLICATION_NAME: &'static str;
    const APPLICATION_VERSION: u32;
    const API_VERSION: u32;
    const ENGINE_VERSION: u32;
    const ENGINE_NAME: &'static str;
}

impl ApplicationDescription for Instance {
    const APPLICATION_NAME: &'static str = "Voortman3D";
    const APPLICATION_VERSION: u32 = vk::make_version(1, 0, 0);
    const API_VERSION: u32 = vk::make_version(1, 0, 0);
    const ENGINE_VERSION: u32 = vk::make_version(1, 0, 0);
    const ENGINE_NAME: &'static str = "Voortman3DCore";
}

pub struct Instance {
    entry: ash::Entry,
    instance: ash::Instance,
    validation_enabled: bool,
}

impl Instance {
    pub fn new() -> Result<Self> {
        let entry = ash::Entry::new().context(EntryLoading)?;

        let validation_enabled = DebugLayer::validation_layers_requested()
            && Self::required_layers_supported(&entry)?;

        let app_name = CString::new(Instance::APPLICATION_NAME).context(AppNameCreation)?;
        let engine_name = CString::new(Instance::ENGINE_NAME).context(EngineNameCreation)?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .engine_name(&engine_name)
            .api_version(Instance::API_VERSION)
            .application_version(Instance::APPLICATION_VERSION)
            .engine_version(Instance::ENGINE_VERSION);

        let instance_extensions = Self::instance_extension_names(&entry, validation_enabled)?;
        let layer_name_vec = Self::layers(validation_enabled);
        let layer_name_pointers = layer_name_vec.layer_name_pointers();
        let instance_create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&instance_extensions)
            .enabled_layer_names(&layer_name_pointers);

        let instance = unsafe {
            entry
                .create_instance(&instance_create_info, None)
                .context(InstanceCreation)?
        };

        Ok(Instance {
            entry,
            instance,
            validation_enabled,
        })
    }

    pub fn entry(&self) -> &ash::Entry {
        &self.entry
    }

    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    pub fn validation_enabled(&self) -> bool {
        self.validation_enabled
    }

    /// Layers enabled on this instance, also passed on to the logical device.
    pub fn enabled_layers(&self) -> LayerNameVec {
        Self::layers(self.validation_enabled)
    }

    fn layers(validation_enabled: bool) -> LayerNameVec {
        let mut layer_name_vec = LayerNameVec::new();
        if validation_enabled {
            layer_name_vec
                .layer_names
                .extend(DebugLayer::debug_layer_names().layer_names);
        }
        layer_name_vec
    }

    fn instance_extension_names(
        entry: &ash::Entry,
        validation_enabled: bool,
    ) -> Result<Vec<*const c_char>> {
        let mut instance_extension_names = surface_extension_names();
        if validation_enabled {
            instance_extension_names.push(DebugUtils::name().as_ptr());
        }

        // Conditional rendering depends on this extension on Vulkan 1.0
        let properties2 = vk::KhrGetPhysicalDeviceProperties2Fn::name();
        let available = entry
            .enumerate_instance_extension_properties()
            .context(InstancePropertiesEnumeration)?;
        let properties2_supported = available.iter().any(|extension| {
            let name = unsafe { CStr::from_ptr(extension.extension_name.as_ptr()) };
            name == properties2
        });
        if properties2_supported {
            instance_extension_names.push(properties2.as_ptr());
        }

        Ok(instance_extension_names)
    }

    fn required_layers_supported(entry: &ash::Entry) -> Result<bool> {
        let available_layers = entry
            .enumerate_instance_layer_properties()
            .context(InstancePropertiesEnumeration)?;

        for layer_name in DebugLayer::debug_layer_names().layer_names.iter() {
            let supported = available_layers.iter().any(|layer| {
                let name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
                name.to_str().map_or(false, |name| name == layer_name.name())
            });

            if !supported {
                log::warn!(
                    "Validation layer not supported, continuing without it: {}",
                    layer_name.name()
                );
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        unsafe {
            self.instance.destroy_instance(None);
        }
    }
}
