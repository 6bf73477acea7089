use thiserror::Error;

use crate::{MeshHandle, TextureHandle};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IncompleteReason {
    #[error("invalid dimensions {width}x{height} (max {max})")]
    Dimensions { width: u32, height: u32, max: u32 },
    #[error("unsupported format {0}")]
    UnsupportedFormat(String),
    #[error("{0}")]
    Backend(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocationError {
    #[error("{target} framebuffer incomplete: {reason}")]
    Incomplete {
        target: &'static str,
        reason: IncompleteReason,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("the scene does not contain any camera")]
    MissingCamera,
    #[error("the scene does not contain any light")]
    NoLights,
    #[error("the scene does not contain any material")]
    NoMaterials,
    #[error("mesh {mesh}: only indexed geometry is supported ({reason})")]
    UnsupportedGeometry { mesh: usize, reason: &'static str },
    #[error("light {light}: only point and directional light sources are supported, found {kind}")]
    UnsupportedLight { light: usize, kind: &'static str },
    #[error("material {material}: invalid texture ({reason})")]
    InvalidTexture {
        material: usize,
        reason: &'static str,
    },
    #[error("mesh node {node} uses material {material} which does not exist")]
    MissingMaterial { node: usize, material: usize },
}

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("the gbuffer has not been allocated")]
    GBufferNotAllocated,
    #[error("gbuffer attachments are not bound for reading at slot {expected}")]
    GBufferNotBound { expected: u32 },
    #[error("{technique} cannot be drawn outside of a {expected} pass")]
    TargetMismatch {
        technique: &'static str,
        expected: &'static str,
    },
    #[error("draw issued outside of a render pass")]
    NoActivePass,
    #[error("unknown mesh {0:?}")]
    UnknownMesh(MeshHandle),
    #[error("unknown texture {0:?}")]
    UnknownTexture(TextureHandle),
    #[error("effect {technique}: {reason}")]
    Effect {
        technique: &'static str,
        reason: String,
    },
    #[error(transparent)]
    Surface(#[from] wgpu::SurfaceError),
}

#[derive(Error, Debug)]
pub enum RendererError {
    #[error(transparent)]
    Allocation(#[from] AllocationError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}
