use glam::Vec4;

use crate::{Clear, PipelineState};

use super::rasterizer::Fragment;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TexelFormat {
    /// 8 bits per channel, normalized.
    Unorm8,
    /// Normalized range, full precision. Stands in for the presentation surface.
    Unorm,
    /// Unclamped 32-bit float.
    Float,
}

impl TexelFormat {
    /// Texel storage emulating a g-buffer attachment format, if the format is renderable here.
    pub fn for_attachment(format: wgpu::TextureFormat) -> Option<Self> {
        match format {
            wgpu::TextureFormat::Rgba8Unorm => Some(Self::Unorm8),
            wgpu::TextureFormat::R32Float => Some(Self::Float),
            _ => None,
        }
    }

    pub fn store(self, value: Vec4) -> Vec4 {
        match self {
            Self::Unorm8 => (value.clamp(Vec4::ZERO, Vec4::ONE) * 255.0).round() / 255.0,
            Self::Unorm => value.clamp(Vec4::ZERO, Vec4::ONE),
            Self::Float => value,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ColorAttachment {
    pub format: TexelFormat,
    pub texels: Vec<Vec4>,
}

/// Colour attachments plus a combined depth/stencil, all of one size.
#[derive(Clone, Debug, PartialEq)]
pub struct Framebuffer {
    pub width: u32,
    pub height: u32,
    pub colors: Vec<ColorAttachment>,
    pub depth: Vec<f32>,
    pub stencil: Vec<u8>,
}

/// Per-attachment fragment shader outputs.
pub type FragmentOutput = [Option<Vec4>; 3];

impl Framebuffer {
    pub fn new(width: u32, height: u32, formats: &[TexelFormat]) -> Self {
        let len = (width * height) as usize;

        Self {
            width,
            height,
            colors: formats
                .iter()
                .map(|&format| ColorAttachment {
                    format,
                    texels: vec![Vec4::ZERO; len],
                })
                .collect(),
            depth: vec![1.0; len],
            stencil: vec![0; len],
        }
    }

    pub fn index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height).then(|| (y * self.width + x) as usize)
    }

    /// Clears the whole target, viewport notwithstanding.
    pub fn clear(&mut self, clear: &Clear) {
        if let Some(color) = clear.color {
            for attachment in &mut self.colors {
                let value = attachment.format.store(Vec4::from(color));
                attachment.texels.fill(value);
            }
        }
        if let Some(depth) = clear.depth {
            self.depth.fill(depth);
        }
        if let Some(stencil) = clear.stencil {
            self.clear_stencil(stencil);
        }
    }

    pub fn clear_stencil(&mut self, value: u8) {
        self.stencil.fill(value);
    }

    pub fn color(&self, attachment: usize, x: u32, y: u32) -> Option<Vec4> {
        let index = self.index(x, y)?;
        Some(self.colors.get(attachment)?.texels[index])
    }

    /// Texel fetch, zero outside the target.
    pub fn load(&self, attachment: usize, x: i64, y: i64) -> Vec4 {
        if x < 0 || y < 0 {
            return Vec4::ZERO;
        }
        self.color(attachment, x as u32, y as u32)
            .unwrap_or(Vec4::ZERO)
    }

    pub fn stencil(&self, x: u32, y: u32) -> Option<u8> {
        self.index(x, y).map(|index| self.stencil[index])
    }

    pub fn depth(&self, x: u32, y: u32) -> Option<f32> {
        self.index(x, y).map(|index| self.depth[index])
    }

    /// Stencil test, depth test, stencil update, depth write then blending, in that order.
    /// `shade` only runs for fragments that survive the tests.
    pub fn process(
        &mut self,
        state: &PipelineState,
        fragment: &Fragment,
        shade: impl FnOnce() -> FragmentOutput,
    ) {
        let Some(index) = self.index(fragment.x, fragment.y) else {
            return;
        };

        if let Some(stencil) = &state.stencil {
            let stored = self.stencil[index];
            if !stencil.test(fragment.front_facing, stored) {
                let face = stencil.face(fragment.front_facing);
                self.stencil[index] = stencil.update(face.fail, stored);
                return;
            }
        }

        let depth_passes = state
            .depth
            .compare
            .is_none_or(|compare| compare.passes(fragment.depth, self.depth[index]));

        if let Some(stencil) = &state.stencil {
            let face = stencil.face(fragment.front_facing);
            let op = if depth_passes {
                face.pass
            } else {
                face.depth_fail
            };
            self.stencil[index] = stencil.update(op, self.stencil[index]);
        }

        if !depth_passes {
            return;
        }

        if state.depth.write {
            self.depth[index] = fragment.depth;
        }

        if !state.color_writes {
            return;
        }

        for (attachment, output) in self.colors.iter_mut().zip(shade()) {
            if let Some(src) = output {
                let dst = attachment.texels[index];
                attachment.texels[index] = attachment.format.store(state.blend.apply(src, dst));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::{DirectionalLightPass, GeometryPass, PointLightsPass};
    use crate::raster::rasterizer::Varyings;
    use glam::Vec2;

    fn fragment(depth: f32, front_facing: bool) -> Fragment {
        Fragment {
            x: 1,
            y: 0,
            position: Vec2::new(1.5, 0.5),
            depth,
            front_facing,
            varyings: Varyings::default(),
        }
    }

    #[test]
    fn unorm8_quantizes() {
        let stored = TexelFormat::Unorm8.store(Vec4::new(0.5, 1.5, -1.0, 0.2));
        assert_eq!(stored, Vec4::new(128.0 / 255.0, 1.0, 0.0, 51.0 / 255.0));
    }

    #[test]
    fn geometry_state_stamps_and_writes_depth() {
        let mut framebuffer = Framebuffer::new(2, 1, &[TexelFormat::Unorm8; 3]);
        framebuffer.clear(&Clear::ALL);

        framebuffer.process(&GeometryPass::STATE, &fragment(0.5, true), || {
            [Some(Vec4::ONE), Some(Vec4::ONE), Some(Vec4::splat(0.25))]
        });

        assert_eq!(framebuffer.stencil(1, 0), Some(1));
        assert_eq!(framebuffer.stencil(0, 0), Some(0));
        assert_eq!(framebuffer.depth(1, 0), Some(0.5));
        assert_eq!(framebuffer.color(2, 1, 0), Some(Vec4::splat(0.25)));
    }

    #[test]
    fn depth_fail_updates_stencil_without_shading() {
        let mut framebuffer = Framebuffer::new(2, 1, &[TexelFormat::Unorm]);
        framebuffer.clear(&Clear::ALL);
        framebuffer.depth.fill(0.5);

        // back face behind the stored surface
        framebuffer.process(&PointLightsPass::MARK_STATE, &fragment(0.75, false), || {
            unreachable!()
        });
        assert_eq!(framebuffer.stencil(1, 0), Some(255));

        // front face in front of it
        framebuffer.process(&PointLightsPass::MARK_STATE, &fragment(0.25, true), || {
            unreachable!()
        });
        assert_eq!(framebuffer.stencil(1, 0), Some(255));
    }

    #[test]
    fn stencil_fail_skips_the_fragment() {
        let mut framebuffer = Framebuffer::new(2, 1, &[TexelFormat::Unorm]);
        framebuffer.clear(&Clear::ALL);

        framebuffer.process(&DirectionalLightPass::STATE, &fragment(0.0, true), || {
            [Some(Vec4::ONE), None, None]
        });

        assert_eq!(framebuffer.color(0, 1, 0), Some(Vec4::new(0.0, 0.0, 0.0, 1.0)));
        assert_eq!(framebuffer.stencil(1, 0), Some(0));
    }
}
