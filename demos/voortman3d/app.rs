use crate::{
    config::{Config, PlcConfig},
    overlay::{Overlay, OverlayAction},
    plc::{self, PlcBridge},
};
use imgui::{FontConfig, FontSource};
use imgui_winit_support::{HiDpiMode, WinitPlatform};
use std::{error::Error, path::Path, time::Instant};
use voortman3d_backend_vulkan::Renderer;
use voortman3d_core::{camera::Camera, input::Input, scene::Model, DeltaTime};
use winit::{
    dpi::{LogicalSize, PhysicalSize},
    event::{Event, KeyboardInput, VirtualKeyCode, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    window::{Window, WindowBuilder},
};

type Result<T, E = Box<dyn Error>> = std::result::Result<T, E>;

#[cfg(feature = "twincat")]
type PlcClient = plc::AdsClient;

#[cfg(not(feature = "twincat"))]
type PlcClient = plc::OfflineClient;

const SAW_HEIGHT_KEY: u32 = 0;

#[cfg(feature = "twincat")]
fn create_plc_client(config: &PlcConfig) -> PlcClient {
    plc::AdsClient::new(&config.router_address, &config.ams_net_id)
}

#[cfg(not(feature = "twincat"))]
fn create_plc_client(_config: &PlcConfig) -> PlcClient {
    plc::OfflineClient::default()
}

pub struct App {
    event_loop: EventLoop<()>,
    viewer: Viewer,
}

/// Everything the event loop drives. The renderer is declared before the
/// window so it is torn down while the surface is still valid.
struct Viewer {
    plc: Option<PlcBridge<PlcClient>>,
    overlay: Overlay,
    renderer: Renderer,
    platform: WinitPlatform,
    imgui: imgui::Context,
    camera: Camera,
    input: Input,
    config: Config,
    frame_count: u64,
    window: Window,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let event_loop = EventLoop::new();
        let window = WindowBuilder::new()
            .with_title(config.window.title.as_str())
            .with_inner_size(LogicalSize::new(config.window.width, config.window.height))
            .build(&event_loop)?;

        let mut imgui = imgui::Context::create();
        imgui.set_ini_filename(None);
        let mut platform = WinitPlatform::init(&mut imgui);
        platform.attach_window(imgui.io_mut(), &window, HiDpiMode::Default);

        let hidpi_factor = platform.hidpi_factor();
        let font_size = (13.0 * hidpi_factor) as f32;
        imgui.fonts().add_font(&[FontSource::DefaultFontData {
            config: Some(FontConfig {
                size_pixels: font_size,
                ..FontConfig::default()
            }),
        }]);
        imgui.io_mut().font_global_scale = (1.0 / hidpi_factor) as f32;

        let mut renderer =
            Renderer::new(&window, &mut imgui, config.rendering.renderer_settings())?;

        let model = Model::load_or_empty(&config.model.path, config.model.load_options());
        renderer.load_model(model)?;

        let camera = config.camera.create_camera(renderer.aspect_ratio());
        renderer.update_camera(&camera);

        let overlay = Overlay::new(&config.window.title, renderer.model());
        let plc = Self::connect_plc(&config.plc);

        log::debug!("Running application");

        Ok(Self {
            event_loop,
            viewer: Viewer {
                plc,
                overlay,
                renderer,
                platform,
                imgui,
                camera,
                input: Input::default(),
                config,
                frame_count: 0,
                window,
            },
        })
    }

    fn connect_plc(config: &PlcConfig) -> Option<PlcBridge<PlcClient>> {
        if !config.enabled {
            return None;
        }
        let mut bridge = PlcBridge::new(create_plc_client(config), config.port);
        if bridge.connect() {
            bridge.resolve_handle(SAW_HEIGHT_KEY, &config.variable);
        }
        Some(bridge)
    }

    pub fn run(self) {
        let App {
            event_loop,
            mut viewer,
        } = self;
        let mut last_frame = Instant::now();

        event_loop.run(move |event, _, control_flow| {
            *control_flow = ControlFlow::Poll;

            viewer
                .platform
                .handle_event(viewer.imgui.io_mut(), &viewer.window, &event);

            match event {
                Event::NewEvents(_) => {
                    last_frame = viewer.imgui.io_mut().update_delta_time(last_frame);
                }
                Event::MainEventsCleared => {
                    if let Err(error) = viewer.frame() {
                        log::error!("{}", error);
                        *control_flow = ControlFlow::Exit;
                    }
                }
                Event::WindowEvent { event, .. } => {
                    if let Err(error) = viewer.handle_window_event(event, control_flow) {
                        log::error!("{}", error);
                        *control_flow = ControlFlow::Exit;
                    }
                }
                Event::LoopDestroyed => viewer.renderer.wait_idle(),
                _ => {}
            }
        });
    }
}

impl Viewer {
    fn handle_window_event(
        &mut self,
        event: WindowEvent,
        control_flow: &mut ControlFlow,
    ) -> Result<()> {
        let (capture_mouse, capture_keyboard) = {
            let io = self.imgui.io();
            (io.want_capture_mouse, io.want_capture_keyboard)
        };

        match event {
            WindowEvent::KeyboardInput {
                input:
                    KeyboardInput {
                        virtual_keycode: Some(keycode),
                        state,
                        ..
                    },
                ..
            } if !capture_keyboard => {
                if keycode == VirtualKeyCode::Escape {
                    *control_flow = ControlFlow::Exit;
                }
                self.input.set_key_state(keycode, state);
            }
            WindowEvent::MouseInput { button, state, .. } if !capture_mouse => {
                self.input.set_mouse_button(button, state);
            }
            WindowEvent::MouseWheel { delta, .. } if !capture_mouse => {
                self.input.scroll(delta);
            }
            WindowEvent::CursorMoved { position, .. } => self.input.move_cursor(position),
            WindowEvent::Focused(false) => self.input.release_all(),
            WindowEvent::Resized(PhysicalSize { width, height }) => {
                self.renderer.recreate_swapchain([width, height])?;
                if width > 0 && height > 0 {
                    self.camera.update_aspect_ratio(self.renderer.aspect_ratio());
                }
            }
            WindowEvent::DroppedFile(path) => {
                if is_gltf(&path) {
                    self.load_model(&path)?;
                } else {
                    log::warn!("Ignoring dropped file '{}'", path.display());
                }
            }
            WindowEvent::CloseRequested => *control_flow = ControlFlow::Exit,
            _ => {}
        }
        Ok(())
    }

    fn frame(&mut self) -> Result<()> {
        self.frame_count += 1;
        self.poll_plc();

        let delta_time = DeltaTime(self.imgui.io().delta_time as f64);
        if self.imgui.io().want_capture_mouse {
            self.input.release_all();
        }
        self.camera.update(&self.input, &delta_time);
        self.input.end_frame();
        self.renderer.update_camera(&self.camera);

        self.platform
            .prepare_frame(self.imgui.io_mut(), &self.window)?;
        let ui = self.imgui.frame();
        let actions = self.overlay.build(&ui, &self.renderer);
        self.platform.prepare_render(&ui, &self.window);
        let draw_data = ui.render();

        let window_size = self.window.inner_size();
        self.renderer
            .render([window_size.width, window_size.height], draw_data);

        self.apply(actions)
    }

    fn poll_plc(&mut self) {
        let interval = self.config.plc.poll_interval_frames.max(1);
        if self.frame_count % interval != 0 {
            return;
        }
        if let Some(bridge) = self.plc.as_mut() {
            bridge.read_value(SAW_HEIGHT_KEY, &mut self.overlay.saw_height);
        }
    }

    fn apply(&mut self, actions: Vec<OverlayAction>) -> Result<()> {
        for action in actions {
            match action {
                OverlayAction::ShowAll => self.renderer.show_all_nodes(),
                OverlayAction::HideAll => self.renderer.hide_all_nodes(),
                OverlayAction::SetWireframe(wireframe) => self.renderer.set_wireframe(wireframe),
                OverlayAction::SetNodeVisible(index, visible) => {
                    self.renderer.set_node_visible(index, visible);
                }
                OverlayAction::SetSawHeight(saw_height) => self.overlay.saw_height = saw_height,
                OverlayAction::Reload => {
                    let path = self.config.model.path.clone();
                    self.load_model(&path)?;
                }
            }
        }
        Ok(())
    }

    fn load_model(&mut self, path: &Path) -> Result<()> {
        let model = Model::load_or_empty(path, self.config.model.load_options());
        self.renderer.load_model(model)?;
        self.overlay.refresh(self.renderer.model());
        Ok(())
    }
}

fn is_gltf(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .map_or(false, |extension| {
            extension.eq_ignore_ascii_case("gltf") || extension.eq_ignore_ascii_case("glb")
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_gltf_files_are_accepted() {
        assert!(is_gltf(Path::new("models/saw_station.gltf")));
        assert!(is_gltf(Path::new("C:/models/Station.GLB")));
        assert!(!is_gltf(Path::new("models/saw_station.bin")));
        assert!(!is_gltf(Path::new("models/gltf")));
    }

    #[test]
    fn disabled_plc_is_never_opened() {
        let config = PlcConfig {
            enabled: false,
            ..Default::default()
        };
        assert!(App::connect_plc(&config).is_none());
    }

    #[cfg(not(feature = "twincat"))]
    #[test]
    fn default_plc_opens_an_inert_bridge() {
        let mut bridge = App::connect_plc(&PlcConfig::default()).expect("enabled by default");
        assert!(!bridge.is_connected());
        let mut saw_height = 12.5;
        assert!(!bridge.read_value(SAW_HEIGHT_KEY, &mut saw_height));
        assert_eq!(saw_height, 12.5);
    }
}
