//! Pipeline Configuration
//!
//! [`PipelineConfig`] is the serde-loadable setup for a pipeline.
//! [`ConfigFragment`] is the generated `#define` header that shaders include
//! to see runtime values (window size, camera planes, feature flags).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use umbra_shader::{ShaderDefine, ShaderVariant};

use crate::command::COMMAND_QUEUE_LIMIT;
use crate::error::PipelineError;
use crate::record::MAX_LIGHTS;
use crate::shadow::ShadowConfig;

/// Virtual path of the generated configuration fragment
pub const CONFIG_FRAGMENT_PATH: &str = "/$$umbra/config.inc";

/// Pipeline setup
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Light table capacity
    pub max_lights: usize,

    /// Command queue capacity (also the per-frame drain limit)
    pub command_queue_limit: usize,

    /// Base path for on-disk shaders
    pub shader_base_path: PathBuf,

    /// Scene color is written to sRGB textures
    pub srgb: bool,

    /// Color targets clear to transparent black, keeping an alpha channel
    pub alpha: bool,

    /// Import host scene lights on `prepare_scene`
    pub import_scene_lights: bool,

    pub shadows: ShadowConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_lights: MAX_LIGHTS,
            command_queue_limit: COMMAND_QUEUE_LIMIT,
            shader_base_path: PathBuf::from("shaders"),
            srgb: false,
            alpha: false,
            import_scene_lights: true,
            shadows: ShadowConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        let mut config: Self = serde_json::from_str(json)?;
        config.validate();
        Ok(config)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, PipelineError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validate and clamp values
    pub fn validate(&mut self) {
        self.max_lights = self.max_lights.clamp(1, 1024);
        self.command_queue_limit = self.command_queue_limit.max(1);
        self.shadows.validate();
    }
}

/// Values exported to shaders through the generated fragment
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConfigFragment {
    pub depth_to_color: bool,
    pub has_pcf: bool,
    pub has_srgb: bool,
    pub camera_near: f32,
    pub camera_far: f32,
    pub window_width: u32,
    pub window_height: u32,
}

impl ConfigFragment {
    /// Define set in output order
    pub fn to_variant(&self) -> ShaderVariant {
        ShaderVariant::new("config").with_defines(vec![
            ShaderDefine::flag("DEPTH2COLOR", self.depth_to_color),
            ShaderDefine::flag("HAS_PCF", self.has_pcf),
            ShaderDefine::flag("HAS_SRGB", self.has_srgb),
            ShaderDefine::with_value("CAMERA_NEAR", format_float(self.camera_near)),
            ShaderDefine::with_value("CAMERA_FAR", format_float(self.camera_far)),
            ShaderDefine::with_value("WINDOW_WIDTH", self.window_width),
            ShaderDefine::with_value("WINDOW_HEIGHT", self.window_height),
        ])
    }

    /// Fragment text
    pub fn render(&self) -> String {
        self.to_variant().generate_header()
    }
}

/// Always print a decimal point so GLSL reads the value as a float
fn format_float(value: f32) -> String {
    let text = value.to_string();
    if text.contains('.') || text.contains('e') || !value.is_finite() {
        text
    } else {
        format!("{}.0", text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment() -> ConfigFragment {
        ConfigFragment {
            depth_to_color: false,
            has_pcf: true,
            has_srgb: false,
            camera_near: 0.1,
            camera_far: 1000.0,
            window_width: 1280,
            window_height: 720,
        }
    }

    #[test]
    fn test_fragment_text() {
        let text = fragment().render();
        assert_eq!(
            text,
            "#define DEPTH2COLOR 0\n\
             #define HAS_PCF 1\n\
             #define HAS_SRGB 0\n\
             #define CAMERA_NEAR 0.1\n\
             #define CAMERA_FAR 1000.0\n\
             #define WINDOW_WIDTH 1280\n\
             #define WINDOW_HEIGHT 720\n"
        );
    }

    #[test]
    fn test_variant_lookup() {
        let variant = fragment().to_variant();
        assert_eq!(variant.value_of("WINDOW_HEIGHT"), Some("720"));
        assert_eq!(variant.value_of("HAS_PCF"), Some("1"));
    }

    #[test]
    fn test_config_json() {
        let config = PipelineConfig::from_json(
            r#"{ "max_lights": 8, "shadows": { "tile_size": 256, "max_updates": 12 } }"#,
        )
        .unwrap();
        assert_eq!(config.max_lights, 8);
        assert!(!config.alpha);
        assert_eq!(config.command_queue_limit, COMMAND_QUEUE_LIMIT);
        assert_eq!(config.shadows.tile_size, 256);
        assert_eq!(config.shadows.max_updates, 12);

        let json = config.to_json().unwrap();
        assert_eq!(PipelineConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_config_json_errors() {
        let result = PipelineConfig::from_json("{ not json");
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_validate_clamps() {
        let mut config = PipelineConfig {
            max_lights: 0,
            command_queue_limit: 0,
            ..Default::default()
        };
        config.validate();
        assert_eq!(config.max_lights, 1);
        assert_eq!(config.command_queue_limit, 1);
    }
}
