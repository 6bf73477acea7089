use serde::{Deserialize, Serialize};

use crate::{GBufferAttachment, RendererConfig};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RenderMode {
    Albedo,
    Normals,
    Depth,
    #[default]
    Deferred,
    Geometry,
}

impl RenderMode {
    pub const ALL: [Self; 5] = [
        Self::Albedo,
        Self::Normals,
        Self::Depth,
        Self::Deferred,
        Self::Geometry,
    ];

    fn position(self) -> usize {
        Self::ALL.iter().position(|&mode| mode == self).unwrap_or(0)
    }

    pub fn next(self) -> Self {
        Self::ALL[(self.position() + 1) % Self::ALL.len()]
    }

    pub fn previous(self) -> Self {
        Self::ALL[(self.position() + Self::ALL.len() - 1) % Self::ALL.len()]
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Albedo => "Albedo",
            Self::Normals => "Normals",
            Self::Depth => "Depth",
            Self::Deferred => "Deferred",
            Self::Geometry => "Geometry",
        }
    }
}

/// The passes one frame runs, chosen once at the start of the frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FramePlan {
    /// Geometry, stencil restamp, ambient (optional), directional lights, point lights, light
    /// sources (optional).
    Deferred { ambient: bool, light_sources: bool },
    /// Geometry, then a blit of one gbuffer attachment.
    Visualize(GBufferAttachment),
    /// Flat-coloured scene, light sources and translucent proxies, no gbuffer.
    GeometryDebug,
}

impl FramePlan {
    pub fn new(mode: RenderMode, config: &RendererConfig) -> Self {
        match mode {
            RenderMode::Albedo => Self::Visualize(GBufferAttachment::Albedo),
            RenderMode::Normals => Self::Visualize(GBufferAttachment::Normal),
            RenderMode::Depth => Self::Visualize(GBufferAttachment::Depth),
            RenderMode::Deferred => Self::Deferred {
                ambient: config.has_ambient(),
                light_sources: config.draw_light_sources,
            },
            RenderMode::Geometry => Self::GeometryDebug,
        }
    }

    pub fn uses_gbuffer(&self) -> bool {
        !matches!(self, Self::GeometryDebug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modes_cycle_both_ways() {
        let mut mode = RenderMode::default();
        for _ in 0..RenderMode::ALL.len() {
            mode = mode.next();
        }
        assert_eq!(mode, RenderMode::Deferred);

        assert_eq!(RenderMode::Albedo.previous(), RenderMode::Geometry);
        assert_eq!(RenderMode::Geometry.next(), RenderMode::Albedo);
        assert_eq!(RenderMode::Deferred.previous(), RenderMode::Depth);
    }

    #[test]
    fn plans_follow_modes() {
        let config = RendererConfig::default();

        assert_eq!(
            FramePlan::new(RenderMode::Deferred, &config),
            FramePlan::Deferred {
                ambient: false,
                light_sources: true
            }
        );
        assert_eq!(
            FramePlan::new(RenderMode::Depth, &config),
            FramePlan::Visualize(GBufferAttachment::Depth)
        );
        assert!(!FramePlan::new(RenderMode::Geometry, &config).uses_gbuffer());
    }
}
