use crate::core::Instance;
use ash::{
    extensions::khr::Surface as AshSurface,
    version::{EntryV1_0, InstanceV1_0},
    vk,
    vk::SurfaceKHR,
};
use snafu::{ResultExt, Snafu};
use std::os::raw::c_char;
use winit::window::Window;

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility = "pub(crate)")]
pub enum Error {
    #[snafu(display("Failed to create window surface: {}", source))]
    SurfaceCreation { source: vk::Result },

    #[snafu(display("The window does not expose a supported native handle"))]
    UnsupportedWindowHandle,
}

pub struct Surface {
    surface: AshSurface,
    surface_khr: SurfaceKHR,
}

impl Surface {
    pub fn new(instance: &Instance, window: &Window) -> Result<Self> {
        let surface = AshSurface::new(instance.entry(), instance.instance());
        let surface_khr = unsafe { create_surface(instance.entry(), instance.instance(), window)? };

        Ok(Surface {
            surface,
            surface_khr,
        })
    }

    pub fn surface(&self) -> &AshSurface {
        &self.surface
    }

    pub fn surface_khr(&self) -> ash::vk::SurfaceKHR {
        self.surface_khr
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        unsafe {
            self.surface.destroy_surface(self.surface_khr, None);
        }
    }
}

#[cfg(target_os = "windows")]
pub fn surface_extension_names() -> Vec<*const c_char> {
    use ash::extensions::khr::Win32Surface;
    vec![AshSurface::name().as_ptr(), Win32Surface::name().as_ptr()]
}

#[cfg(target_os = "linux")]
pub fn surface_extension_names() -> Vec<*const c_char> {
    use ash::extensions::khr::XlibSurface;
    vec![AshSurface::name().as_ptr(), XlibSurface::name().as_ptr()]
}

#[cfg(target_os = "windows")]
unsafe fn create_surface<E: EntryV1_0, I: InstanceV1_0>(
    entry: &E,
    instance: &I,
    window: &Window,
) -> Result<vk::SurfaceKHR> {
    use ash::extensions::khr::Win32Surface;
    use raw_window_handle::{HasRawWindowHandle, RawWindowHandle};

    let handle = match window.raw_window_handle() {
        RawWindowHandle::Windows(handle) => handle,
        _ => return UnsupportedWindowHandle.fail(),
    };

    let win32_create_info = vk::Win32SurfaceCreateInfoKHR::builder()
        .hwnd(handle.hwnd)
        .hinstance(handle.hinstance)
        .build();
    let win32_surface_loader = Win32Surface::new(entry, instance);
    win32_surface_loader
        .create_win32_surface(&win32_create_info, None)
        .context(SurfaceCreation)
}

#[cfg(target_os = "linux")]
unsafe fn create_surface<E: EntryV1_0, I: InstanceV1_0>(
    entry: &E,
    instance: &I,
    window: &Window,
) -> Result<vk::SurfaceKHR> {
    use ash::extensions::khr::XlibSurface;
    use snafu::OptionExt;
    use winit::platform::unix::WindowExtUnix;

    let x11_display = window.xlib_display().context(UnsupportedWindowHandle)?;
    let x11_window = window.xlib_window().context(UnsupportedWindowHandle)?;
    let x11_create_info = vk::XlibSurfaceCreateInfoKHR::builder()
        .window(x11_window)
        .dpy(x11_display as *mut vk::Display);

    let xlib_surface_loader = XlibSurface::new(entry, instance);
    xlib_surface_loader
        .create_xlib_surface(&x11_create_info, None)
        .context(SurfaceCreation)
}
