//! Render techniques and their typed inputs.
//!
//! Each technique has a `#[repr(C)]` uniform block whose layout matches the WGSL struct of the
//! same name, and a fixed set of bind slots.

use glam::{Mat4, Vec4};

use crate::Target;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Technique {
    GBufferFill,
    PointLight,
    DirectionalLight,
    AmbientLight,
    SolidColour,
    LightGlyph,
    TextureBlit,
    DepthBlit,
}

/// Bind group slots used by a technique.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TechniqueBindings {
    pub uniforms: u32,
    /// Diffuse + bump textures.
    pub material: Option<u32>,
    /// Gbuffer colour attachments.
    pub gbuffer: Option<u32>,
}

pub const GBUFFER_SLOT: u32 = 1;

impl Technique {
    pub const ALL: [Self; 8] = [
        Self::GBufferFill,
        Self::PointLight,
        Self::DirectionalLight,
        Self::AmbientLight,
        Self::SolidColour,
        Self::LightGlyph,
        Self::TextureBlit,
        Self::DepthBlit,
    ];

    pub const fn bindings(self) -> TechniqueBindings {
        match self {
            Self::GBufferFill => TechniqueBindings {
                uniforms: 0,
                material: Some(1),
                gbuffer: None,
            },
            Self::SolidColour | Self::LightGlyph => TechniqueBindings {
                uniforms: 0,
                material: None,
                gbuffer: None,
            },
            Self::PointLight
            | Self::DirectionalLight
            | Self::AmbientLight
            | Self::TextureBlit
            | Self::DepthBlit => TechniqueBindings {
                uniforms: 0,
                material: None,
                gbuffer: Some(GBUFFER_SLOT),
            },
        }
    }

    pub const fn target(self) -> Target {
        match self {
            Self::GBufferFill => Target::GBuffer,
            _ => Target::Presentation,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::GBufferFill => "GBufferFill",
            Self::PointLight => "PointLight",
            Self::DirectionalLight => "DirectionalLight",
            Self::AmbientLight => "AmbientLight",
            Self::SolidColour => "SolidColour",
            Self::LightGlyph => "LightGlyph",
            Self::TextureBlit => "TextureBlit",
            Self::DepthBlit => "DepthBlit",
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GBufferFillUniforms {
    pub world_view_proj: Mat4,
    pub world_view: Mat4,
    /// Inverse-transpose of the upper 3x3 of `world_view`, stored in a 4x4.
    pub world_view_inverse_transpose: Mat4,
    pub diffuse_color: Vec4,
    pub specular_power: f32,
    pub far_clip: f32,
    pub _padding: [f32; 2],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SolidColourUniforms {
    pub world_view_proj: Mat4,
    pub color: Vec4,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightGlyphUniforms {
    pub world_view_proj: Mat4,
    pub world_view: Mat4,
    pub color: Vec4,
}

/// Shared by every technique that reads the gbuffer from the presentation surface.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ScreenParams {
    /// Gbuffer region on the presentation surface: x, y, width, height.
    pub viewport: Vec4,
    /// `1 / proj[0][0]`, `1 / proj[1][1]`, far clip, unused.
    pub projection: Vec4,
}

impl ScreenParams {
    pub fn new(viewport: Vec4, proj: &Mat4, far_clip: f32) -> Self {
        Self {
            viewport,
            projection: glam::vec4(
                1.0 / proj.x_axis.x,
                1.0 / proj.y_axis.y,
                far_clip,
                0.0,
            ),
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PointLightUniforms {
    /// Scaled proxy transform.
    pub world_view_proj: Mat4,
    /// rgb = colour × intensity.
    pub light_color: Vec4,
    /// xyz = view-space position, w = influence radius.
    pub light_position: Vec4,
    pub screen: ScreenParams,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DirectionalLightUniforms {
    pub light_color: Vec4,
    /// View-space direction the light travels in.
    pub light_direction: Vec4,
    pub screen: ScreenParams,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct AmbientLightUniforms {
    pub color: Vec4,
    pub screen: ScreenParams,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BlitUniforms {
    pub screen: ScreenParams,
    /// 0 = albedo, 1 = normal. Ignored by the depth blit.
    pub attachment: u32,
    pub _padding: [u32; 3],
}

/// Largest uniform block, every block is bound through a slot of this size.
pub const MAX_UNIFORMS_SIZE: usize = 256;
