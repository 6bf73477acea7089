#[cfg(feature = "gltf")]
pub use gltf;
pub use renderer;

pub mod prelude {
    #[cfg(feature = "gltf")]
    pub use super::gltf::GltfScene;
    pub use super::renderer::prelude::*;
}
