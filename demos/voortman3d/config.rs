use crate::plc;
use nalgebra_glm as glm;
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use voortman3d_backend_vulkan::RendererSettings;
use voortman3d_core::{
    camera::Camera,
    scene::{ConditionalScope, LoadOptions},
};

pub const DEFAULT_CONFIG_PATH: &str = "voortman3d.json";

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Failed to read config file '{}': {}", path.display(), source))]
    ReadConfig { path: PathBuf, source: io::Error },

    #[snafu(display("Failed to parse config file '{}': {}", path.display(), source))]
    ParseConfig {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub model: ModelConfig,
    pub camera: CameraConfig,
    pub rendering: RenderingConfig,
    pub plc: PlcConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            title: "Voortman3D".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub path: PathBuf,
    pub flip_y: bool,
    pub pre_transform_vertices: bool,
    pub pre_multiply_vertex_colors: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("assets/models/saw_station.gltf"),
            flip_y: false,
            pre_transform_vertices: false,
            pre_multiply_vertex_colors: false,
        }
    }
}

impl ModelConfig {
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            pre_transform_vertices: self.pre_transform_vertices,
            pre_multiply_vertex_colors: self.pre_multiply_vertex_colors,
            flip_y: self.flip_y,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_degrees: f32,
    pub znear: f32,
    pub zfar: f32,
    pub rotation: [f32; 3],
    pub translation: [f32; 3],
    pub rotation_speed: f32,
    pub movement_speed: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_degrees: 45.0,
            znear: 0.1,
            zfar: 512.0,
            rotation: [-26.5, -37.0, 0.0],
            translation: [0.07, -0.06, -0.6],
            rotation_speed: 0.25,
            movement_speed: 0.5,
        }
    }
}

impl CameraConfig {
    pub fn create_camera(&self, aspect_ratio: f32) -> Camera {
        let mut camera = Camera::default();
        camera.rotation_speed = self.rotation_speed;
        camera.movement_speed = self.movement_speed;
        camera.set_perspective(self.fov_degrees, aspect_ratio, self.znear, self.zfar);
        camera.set_rotation(glm::make_vec3(&self.rotation));
        camera.set_translation(glm::make_vec3(&self.translation));
        camera
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderingConfig {
    pub batch_conditional_per_node: bool,
    pub background_color: [f32; 4],
    pub shader_directory: PathBuf,
}

impl Default for RenderingConfig {
    fn default() -> Self {
        Self {
            batch_conditional_per_node: false,
            background_color: [0.39, 0.58, 0.93, 1.0],
            shader_directory: PathBuf::from("assets/shaders"),
        }
    }
}

impl RenderingConfig {
    pub fn renderer_settings(&self) -> RendererSettings {
        RendererSettings {
            shader_directory: self.shader_directory.clone(),
            conditional_scope: if self.batch_conditional_per_node {
                ConditionalScope::Node
            } else {
                ConditionalScope::Primitive
            },
            clear_color: self.background_color,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlcConfig {
    /// Opens the PLC port at start-up. Builds without the `twincat` feature
    /// use an offline client that never connects, leaving the saw height to the overlay.
    pub enabled: bool,
    pub port: u16,
    /// Host and TCP port of the ADS router.
    pub router_address: String,
    pub ams_net_id: String,
    pub variable: String,
    pub poll_interval_frames: u64,
}

impl Default for PlcConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: plc::DEFAULT_PORT,
            router_address: "127.0.0.1:48898".to_string(),
            ams_net_id: "127.0.0.1.1.1".to_string(),
            variable: "MAIN.fSawHeight".to_string(),
            poll_interval_frames: 6,
        }
    }
}

impl Config {
    /// Reads the file at `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                log::info!("No config file at '{}', using defaults", path.display());
                return Ok(Self::default());
            }
            Err(error) => return Err(error).context(ReadConfig { path }),
        };
        Self::from_json(&contents).context(ParseConfig { path })
    }

    pub fn from_json(contents: &str) -> serde_json::Result<Self> {
        serde_json::from_str(contents)
    }

    /// The first command-line argument, or `voortman3d.json`.
    pub fn path_from_args<I: Iterator<Item = String>>(mut args: I) -> PathBuf {
        args.nth(1)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let config = Config::from_json("{}").expect("valid json");
        assert_eq!(config, Config::default());
        assert_eq!(config.plc.port, 851);
        assert_eq!(config.plc.variable, "MAIN.fSawHeight");
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let json = r#"{
            "window": { "width": 800 },
            "rendering": { "batch_conditional_per_node": true }
        }"#;
        let config = Config::from_json(json).expect("valid json");
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 720);
        assert_eq!(
            config.rendering.renderer_settings().conditional_scope,
            ConditionalScope::Node
        );
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(Config::from_json("{ \"window\": ").is_err());
        assert!(Config::from_json(r#"{ "window": { "width": "wide" } }"#).is_err());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = Config::load(Path::new("does/not/exist/voortman3d.json"))
            .expect("missing file is not an error");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn path_comes_from_the_first_argument() {
        let args = vec!["voortman3d".to_string(), "site.json".to_string()];
        assert_eq!(
            Config::path_from_args(args.into_iter()),
            PathBuf::from("site.json")
        );
        let args = vec!["voortman3d".to_string()];
        assert_eq!(
            Config::path_from_args(args.into_iter()),
            PathBuf::from(DEFAULT_CONFIG_PATH)
        );
    }

    #[test]
    fn model_options_map_onto_load_options() {
        let model = ModelConfig {
            flip_y: true,
            pre_transform_vertices: true,
            ..ModelConfig::default()
        };
        let options = model.load_options();
        assert!(options.flip_y);
        assert!(options.pre_transform_vertices);
        assert!(!options.pre_multiply_vertex_colors);
    }
}
