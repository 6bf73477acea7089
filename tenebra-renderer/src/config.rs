use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::RenderMode;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Internal resolution. `None` picks the largest power of two fitting the window.
    pub gbuffer_size: Option<(u32, u32)>,
    pub point_light_intensity: f32,
    /// Light-radius constant; a point light's proxy radius is this times its intensity.
    pub point_light_radius: f32,
    pub directional_light_intensity: f32,
    pub ambient: [f32; 3],
    pub light_glyph_scale: f32,
    pub light_glyph_alpha: f32,
    pub proxy_alpha: f32,
    pub draw_light_sources: bool,
    pub require_lights: bool,
    pub discard_depth_stencil: bool,
    pub animation_speed: f32,
    pub initial_mode: RenderMode,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            gbuffer_size: None,
            point_light_intensity: 100.0,
            point_light_radius: 50.0,
            directional_light_intensity: 3.0,
            ambient: [0.0; 3],
            light_glyph_scale: 1.0,
            light_glyph_alpha: 0.8,
            proxy_alpha: 0.75,
            draw_light_sources: true,
            require_lights: true,
            discard_depth_stencil: true,
            animation_speed: 1.0,
            initial_mode: RenderMode::Deferred,
        }
    }
}

impl RendererConfig {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    pub fn has_ambient(&self) -> bool {
        self.ambient.iter().any(|&c| c > 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_files_keep_defaults() {
        let config: RendererConfig = toml::from_str(
            r#"
            point_light_radius = 4.0
            gbuffer_size = [256, 128]
            initial_mode = "Normals"
            "#,
        )
        .unwrap();

        assert_eq!(config.point_light_radius, 4.0);
        assert_eq!(config.gbuffer_size, Some((256, 128)));
        assert_eq!(config.initial_mode, RenderMode::Normals);
        assert_eq!(config.point_light_intensity, 100.0);
        assert!(!config.has_ambient());
    }
}
