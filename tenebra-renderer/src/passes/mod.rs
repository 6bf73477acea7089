//! Frame passes. Each pass records draws, every draw carrying its complete pipeline state.

mod ambient_light;
mod directional_light;
mod geometry;
mod geometry_debug;
mod light_sources;
mod point_lights;
mod stencil_stamp;
mod visualize;

pub use ambient_light::AmbientLightPass;
pub use directional_light::DirectionalLightPass;
pub use geometry::GeometryPass;
pub use geometry_debug::GeometryDebugPass;
pub use light_sources::LightSourcesPass;
pub use point_lights::PointLightsPass;
pub use stencil_stamp::StencilStampPass;
pub use visualize::GBufferVisualizePass;

use crate::{CameraState, GBuffer, MeshHandle, RendererConfig, Scene, ScreenParams, Viewport};

/// Read-only inputs shared by every pass of a frame.
pub struct FrameContext<'a> {
    pub camera: &'a CameraState,
    pub gbuffer: &'a GBuffer,
    /// Gbuffer region on the presentation surface.
    pub viewport: Viewport,
    pub scene: &'a Scene,
    /// Light volume mesh.
    pub proxy: MeshHandle,
    pub config: &'a RendererConfig,
}

impl FrameContext<'_> {
    pub fn screen(&self) -> ScreenParams {
        ScreenParams::new(self.viewport.as_vec4(), &self.camera.proj, self.camera.far)
    }
}
