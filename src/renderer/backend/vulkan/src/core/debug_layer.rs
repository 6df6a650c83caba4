use crate::core::Instance;
use ash::{
    extensions::ext::DebugUtils,
    vk::{
        self, Bool32, DebugUtilsMessageSeverityFlagsEXT, DebugUtilsMessageTypeFlagsEXT,
        DebugUtilsMessengerCallbackDataEXT, DebugUtilsMessengerEXT,
    },
};
use snafu::{ResultExt, Snafu};
use std::{
    ffi::{CStr, CString},
    os::raw::{c_char, c_void},
};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility = "pub(crate)")]
pub enum Error {
    #[snafu(display("Failed to create debug utils messenger: {:?}", source))]
    DebugUtilsMessengerCreationFailed { source: vk::Result },
}

pub struct DebugLayer {
    debug_utils: DebugUtils,
    debug_utils_messenger: DebugUtilsMessengerEXT,
}

impl DebugLayer {
    pub fn new(instance: &Instance) -> Result<Option<Self>> {
        if !instance.validation_enabled() {
            return Ok(None);
        }

        let debug_utils = DebugUtils::new(instance.entry(), instance.instance());
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                DebugUtilsMessageSeverityFlagsEXT::ERROR
                    | DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | DebugUtilsMessageSeverityFlagsEXT::INFO
                    | DebugUtilsMessageSeverityFlagsEXT::VERBOSE,
            )
            .message_type(
                DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(vulkan_debug_callback))
            .build();
        let debug_utils_messenger = unsafe {
            debug_utils
                .create_debug_utils_messenger(&create_info, None)
                .context(DebugUtilsMessengerCreationFailed)?
        };
        Ok(Some(DebugLayer {
            debug_utils,
            debug_utils_messenger,
        }))
    }

    pub fn validation_layers_requested() -> bool {
        // Enable validation layers only in debug mode
        cfg!(debug_assertions)
    }

    pub fn debug_layer_names() -> LayerNameVec {
        LayerNameVec {
            layer_names: vec![LayerName::new("VK_LAYER_KHRONOS_validation")],
        }
    }
}

impl Drop for DebugLayer {
    fn drop(&mut self) {
        unsafe {
            self.debug_utils
                .destroy_debug_utils_messenger(self.debug_utils_messenger, None);
        }
    }
}

pub struct LayerName {
    name: String,
    name_c_string: CString,
}

impl LayerName {
    pub fn new(name: &str) -> Self {
        // Layer names are compile-time literals without interior nul bytes
        let name_c_string = CString::new(name).unwrap_or_default();
        Self {
            name: String::from(name),
            name_c_string,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn name_pointer(&self) -> *const c_char {
        self.name_c_string.as_ptr()
    }
}

impl PartialEq for LayerName {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }
}

impl Eq for LayerName {}

#[derive(Default)]
pub struct LayerNameVec {
    pub layer_names: Vec<LayerName>,
}

impl LayerNameVec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layer_name_pointers(&self) -> Vec<*const c_char> {
        self.layer_names
            .iter()
            .map(|layer_name| layer_name.name_pointer())
            .collect::<Vec<_>>()
    }
}

// Forwards validation messages to the log
unsafe extern "system" fn vulkan_debug_callback(
    flags: DebugUtilsMessageSeverityFlagsEXT,
    type_flags: DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const DebugUtilsMessengerCallbackDataEXT,
    _: *mut c_void,
) -> Bool32 {
    let type_flag = if type_flags.contains(DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "Validation"
    } else if type_flags.contains(DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "Performance"
    } else {
        "General"
    };

    let message = format!(
        "[{}] {:?}",
        type_flag,
        CStr::from_ptr((*p_callback_data).p_message)
    );

    if flags.contains(DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        log::error!("{}", message);
    } else if flags.contains(DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        log::warn!("{}", message);
    } else if flags.contains(DebugUtilsMessageSeverityFlagsEXT::INFO) {
        log::info!("{}", message);
    } else {
        log::trace!("{}", message);
    }
    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_name_pointers_are_nul_terminated() {
        let layers = DebugLayer::debug_layer_names();
        let pointers = layers.layer_name_pointers();
        assert_eq!(pointers.len(), 1);
        let name = unsafe { CStr::from_ptr(pointers[0]) };
        assert_eq!(name.to_str().unwrap(), "VK_LAYER_KHRONOS_validation");
    }

    #[test]
    fn layer_names_compare_by_value() {
        assert!(LayerName::new("a") == LayerName::new("a"));
        assert!(LayerName::new("a") != LayerName::new("b"));
    }
}
