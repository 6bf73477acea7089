use crate::{AllocationError, BackendError, CommandList, MeshData, TextureData};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshHandle(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u32);

/// Executes recorded frames.
///
/// Implementations own every GPU-side object (targets, meshes, textures, programs); the engine
/// only ever refers to them through handles and [`CommandList`]s.
pub trait Backend {
    /// Size of the presentation surface in pixels.
    fn surface_size(&self) -> (u32, u32);

    fn max_texture_dimension(&self) -> u32;

    fn resize(&mut self, size: (u32, u32));

    /// (Re)creates the off-screen gbuffer targets, reporting incomplete targets.
    fn allocate_gbuffer(&mut self, width: u32, height: u32) -> Result<(), AllocationError>;

    fn upload_mesh(&mut self, mesh: &MeshData) -> MeshHandle;

    fn upload_texture(&mut self, texture: &TextureData) -> TextureHandle;

    fn submit(&mut self, commands: &CommandList) -> Result<(), BackendError>;
}
