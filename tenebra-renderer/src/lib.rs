#![warn(clippy::all)]

pub use wgpu;

mod animation;
mod backend;
mod camera;
mod commands;
mod config;
mod engine;
mod error;
mod frame;
mod gbuffer;
mod icosphere;
mod input;
mod light;
mod material;
mod mesh;
mod scene;
mod state;
mod technique;

pub mod gpu;
pub mod passes;
pub mod raster;

pub use animation::AnimationClock;
pub use backend::{Backend, MeshHandle, TextureHandle};
pub use camera::{CameraDesc, CameraState};
pub use commands::{ActivePass, Clear, Command, CommandList, Draw, Target, Viewport};
pub use config::{ConfigError, RendererConfig};
pub use engine::Engine;
pub use error::{AllocationError, BackendError, IncompleteReason, LoadError, RendererError};
pub use frame::{FramePlan, RenderMode};
pub use gbuffer::{GBuffer, GBufferAttachment};
pub use icosphere::Icosphere;
pub use input::InputEvent;
pub use light::{attenuation, DirectionalLight, LightDesc, LightKind, PointLight};
pub use material::{Material, MaterialDesc, TextureData};
pub use mesh::{MeshData, Vertex};
pub use scene::{MeshNode, NodeInstance, Scene, SceneDesc, SceneProvider};
pub use state::{
    BlendMode, CompareFunction, CullMode, DepthState, PipelineState, StencilFaceState,
    StencilOperation, StencilState,
};
pub use technique::*;

pub mod prelude {
    pub use super::gpu::{Renderer, WgpuBackend};
    pub use super::{
        Backend, CameraDesc, Engine, InputEvent, LightDesc, LightKind, MaterialDesc, MeshData,
        MeshNode, RenderMode, RendererConfig, SceneDesc, SceneProvider, TextureData,
    };
}
