//! Editor configuration.

use kurbo::{Rect, Size};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Viewport limits. All unbounded unless set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub min_scale: Option<f64>,
    pub max_scale: Option<f64>,
    /// World-space region the viewport center is kept inside.
    pub pan_bounds: Option<Rect>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Edge length of newly placed stickers and custom shapes.
    pub default_sticker_size: f64,
    pub default_text_size: Size,
    pub default_font_size: f64,
    pub default_text_color: String,
    /// Visual scale-up applied while a shape is pressed.
    pub pressed_emphasis: f64,
    /// Name given to a child world whose parent shape has no name.
    pub child_world_fallback_name: String,
    pub camera: CameraConfig,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            default_sticker_size: 100.0,
            default_text_size: Size::new(200.0, 60.0),
            default_font_size: 24.0,
            default_text_color: "#1A1A1A".to_string(),
            pressed_emphasis: 1.05,
            child_world_fallback_name: "Inner World".to_string(),
            camera: CameraConfig::default(),
        }
    }
}

impl EditorConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = EditorConfig::from_json(r#"{ "default_font_size": 30.0 }"#).unwrap();
        assert_eq!(config.default_font_size, 30.0);
        assert_eq!(config.default_sticker_size, 100.0);
        assert!(config.camera.pan_bounds.is_none());
    }

    #[test]
    fn test_camera_limits_from_json() {
        let json = r#"{ "camera": { "min_scale": 0.25, "max_scale": 4.0 } }"#;
        let config = EditorConfig::from_json(json).unwrap();
        assert_eq!(config.camera.min_scale, Some(0.25));
        assert_eq!(config.camera.max_scale, Some(4.0));
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(matches!(EditorConfig::from_json("{ nope"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_json_roundtrip_default() {
        let config = EditorConfig::default();
        let back = EditorConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(config, back);
    }
}
