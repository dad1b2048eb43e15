//! Background presets and placement templates for new shapes.

use kurbo::{Point, Size};
use peniko::Color;

use crate::config::EditorConfig;
use crate::model::{ShapeDraft, ShapeKind, WorldId};

/// A named background color offered when creating a world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackgroundPreset {
    pub name: &'static str,
    pub color: &'static str,
}

pub const BACKGROUND_PRESETS: &[BackgroundPreset] = &[
    BackgroundPreset { name: "Sky", color: "#E3F2FD" },
    BackgroundPreset { name: "Meadow", color: "#E8F5E9" },
    BackgroundPreset { name: "Dawn", color: "#FFF3E0" },
    BackgroundPreset { name: "Lavender", color: "#F3E5F5" },
    BackgroundPreset { name: "Paper", color: "#F8F9FA" },
    BackgroundPreset { name: "Night", color: "#1A237E" },
];

/// Parse `#RRGGBB` or `#RRGGBBAA`.
pub fn parse_hex_color(input: &str) -> Option<Color> {
    let hex = input.trim().strip_prefix('#')?;
    if !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    match hex.len() {
        6 => Some(Color::from_rgba8(channel(0)?, channel(2)?, channel(4)?, 255)),
        8 => Some(Color::from_rgba8(channel(0)?, channel(2)?, channel(4)?, channel(6)?)),
        _ => None,
    }
}

/// Something the user can drop onto the canvas from the asset tray.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeTemplate {
    pub kind: ShapeKind,
    pub name: String,
    pub icon: Option<String>,
    /// Overrides the configured default size.
    pub size: Option<Size>,
}

impl ShapeTemplate {
    pub fn sticker(name: impl Into<String>, icon: impl Into<String>) -> Self {
        Self {
            kind: ShapeKind::Sticker,
            name: name.into(),
            icon: Some(icon.into()),
            size: None,
        }
    }

    pub fn custom(name: impl Into<String>, icon: impl Into<String>) -> Self {
        Self {
            kind: ShapeKind::Custom,
            name: name.into(),
            icon: Some(icon.into()),
            size: None,
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self {
            kind: ShapeKind::Text,
            name: content.into(),
            icon: None,
            size: None,
        }
    }

    pub fn with_size(mut self, size: Size) -> Self {
        self.size = Some(size);
        self
    }

    /// Build a draft centered on `center` (world space).
    pub fn to_draft(&self, world_id: &WorldId, center: Point, config: &EditorConfig) -> ShapeDraft {
        let is_text = self.kind == ShapeKind::Text;
        let size = self.size.unwrap_or(if is_text {
            config.default_text_size
        } else {
            Size::new(config.default_sticker_size, config.default_sticker_size)
        });
        ShapeDraft {
            world_id: world_id.clone(),
            kind: self.kind,
            x: center.x,
            y: center.y,
            width: size.width,
            height: size.height,
            rotation: 0.0,
            name: self.name.clone(),
            icon: if is_text { None } else { self.icon.clone() },
            font_size: is_text.then_some(config.default_font_size),
            color: is_text.then(|| config.default_text_color.clone()),
            emotion: None,
            intention: None,
            image_url: None,
            border_radius: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_color() {
        let color = parse_hex_color("#E3F2FD").unwrap().to_rgba8();
        assert_eq!((color.r, color.g, color.b, color.a), (0xE3, 0xF2, 0xFD, 0xFF));

        let color = parse_hex_color("#00000080").unwrap().to_rgba8();
        assert_eq!(color.a, 0x80);

        assert!(parse_hex_color("E3F2FD").is_none());
        assert!(parse_hex_color("#E3F2").is_none());
        assert!(parse_hex_color("#GGGGGG").is_none());
    }

    #[test]
    fn test_presets_are_valid_colors() {
        for preset in BACKGROUND_PRESETS {
            assert!(parse_hex_color(preset.color).is_some(), "{}", preset.name);
        }
    }

    #[test]
    fn test_text_template_uses_text_defaults() {
        let config = EditorConfig::default();
        let world_id = "w1".to_string();
        let draft = ShapeTemplate::text("Hello").to_draft(&world_id, Point::new(5.0, 6.0), &config);
        assert_eq!(draft.kind, ShapeKind::Text);
        assert_eq!(draft.font_size, Some(config.default_font_size));
        assert_eq!(draft.color.as_deref(), Some(config.default_text_color.as_str()));
        assert!(draft.icon.is_none());
        assert_eq!((draft.x, draft.y), (5.0, 6.0));
    }

    #[test]
    fn test_sticker_template_is_square() {
        let config = EditorConfig::default();
        let world_id = "w1".to_string();
        let template = ShapeTemplate::sticker("Tree", "leaf");
        let draft = template.to_draft(&world_id, Point::ZERO, &config);
        assert_eq!(draft.width, draft.height);
        assert!(draft.font_size.is_none());
        assert!(draft.has_valid_size());
    }
}
