use crate::{
    AllocationError, Backend, Clear, Command, CommandList, IncompleteReason, Target, Viewport,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GBufferAttachment {
    Albedo,
    Normal,
    Depth,
}

impl GBufferAttachment {
    pub const ALL: [Self; 3] = [Self::Albedo, Self::Normal, Self::Depth];

    pub fn format(self) -> wgpu::TextureFormat {
        match self {
            Self::Albedo => GBuffer::ALBEDO_FORMAT,
            Self::Normal => GBuffer::NORMAL_FORMAT,
            Self::Depth => GBuffer::DEPTH_FORMAT,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Albedo => "GBuffer albedo texture",
            Self::Normal => "GBuffer normal texture",
            Self::Depth => "GBuffer depth texture",
        }
    }

    /// Offset of the attachment from the gbuffer's base slot.
    pub fn index(self) -> u32 {
        self as u32
    }
}

/// Off-screen geometry buffer. The backend owns the textures; this value owns their size and
/// the commands that bind them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GBuffer {
    width: u32,
    height: u32,
}

impl GBuffer {
    pub const ALBEDO_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
    pub const NORMAL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Float;
    pub const DEPTH_STENCIL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;

    pub const RENDER_TARGETS: [Option<wgpu::ColorTargetState>; 3] = [
        Some(wgpu::ColorTargetState {
            format: Self::ALBEDO_FORMAT,
            blend: None,
            write_mask: wgpu::ColorWrites::ALL,
        }),
        Some(wgpu::ColorTargetState {
            format: Self::NORMAL_FORMAT,
            blend: None,
            write_mask: wgpu::ColorWrites::ALL,
        }),
        Some(wgpu::ColorTargetState {
            format: Self::DEPTH_FORMAT,
            blend: None,
            write_mask: wgpu::ColorWrites::ALL,
        }),
    ];

    pub fn allocate(
        backend: &mut impl Backend,
        width: u32,
        height: u32,
    ) -> Result<Self, AllocationError> {
        let max = backend.max_texture_dimension();
        if width == 0 || height == 0 || width > max || height > max {
            return Err(AllocationError::Incomplete {
                target: "gbuffer",
                reason: IncompleteReason::Dimensions { width, height, max },
            });
        }

        backend.allocate_gbuffer(width, height)?;
        log::info!("Allocated {width}x{height} gbuffer");

        Ok(Self { width, height })
    }

    /// Largest power of two fitting the window, or the requested size clamped to it.
    pub fn fit(requested: Option<(u32, u32)>, window: (u32, u32)) -> (u32, u32) {
        match requested {
            Some((width, height)) => {
                let size = (width.min(window.0), height.min(window.1));
                if size != (width, height) {
                    log::warn!(
                        "Requested gbuffer size {width}x{height} exceeds the window, using {}x{}",
                        size.0,
                        size.1
                    );
                }
                size
            }
            None => {
                let side = window.0.min(window.1).max(1);
                let pot = 1 << (u32::BITS - 1 - side.leading_zeros());
                (pot, pot)
            }
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    pub fn viewport(&self) -> Viewport {
        Viewport::new(self.width, self.height)
    }

    /// Binds the gbuffer as the render target at its own resolution, clearing colour to opaque
    /// black and stencil to 0.
    pub fn bind_for_writing(&self, commands: &mut CommandList) {
        commands.begin_pass("GBuffer", Target::GBuffer, self.viewport(), Clear::ALL);
    }

    pub fn bind_attachments_for_reading(&self, commands: &mut CommandList, slot_base: u32) {
        commands.push(Command::BindGBuffer { slot_base });
    }

    pub fn discard_depth_stencil_after_geometry(&self, commands: &mut CommandList) {
        commands.push(Command::DiscardDepthStencil);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::RasterBackend;

    #[test]
    fn default_size_is_largest_power_of_two() {
        assert_eq!(GBuffer::fit(None, (800, 600)), (512, 512));
        assert_eq!(GBuffer::fit(None, (1024, 1024)), (1024, 1024));
        assert_eq!(GBuffer::fit(None, (1, 1)), (1, 1));
    }

    #[test]
    fn requested_size_is_clamped_to_window() {
        assert_eq!(GBuffer::fit(Some((1024, 300)), (800, 600)), (800, 300));
    }

    #[test]
    fn allocate_rejects_invalid_dimensions() {
        let mut backend = RasterBackend::new(16, 16);

        assert!(matches!(
            GBuffer::allocate(&mut backend, 0, 16),
            Err(AllocationError::Incomplete {
                reason: IncompleteReason::Dimensions { width: 0, .. },
                ..
            })
        ));

        let too_big = backend.max_texture_dimension() + 1;
        assert!(GBuffer::allocate(&mut backend, too_big, 16).is_err());

        let gbuffer = GBuffer::allocate(&mut backend, 8, 4).unwrap();
        assert_eq!(gbuffer.size(), (8, 4));
    }

    #[test]
    fn bind_for_writing_clears_everything() {
        let gbuffer = GBuffer { width: 4, height: 2 };
        let mut commands = CommandList::new();
        gbuffer.bind_for_writing(&mut commands);

        assert_eq!(
            commands.iter().next(),
            Some(&Command::BeginPass {
                label: "GBuffer",
                target: Target::GBuffer,
                viewport: Viewport::new(4, 2),
                clear: Clear::ALL,
            })
        );
    }
}
