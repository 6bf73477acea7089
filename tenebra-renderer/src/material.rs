use glam::{Vec2, Vec3, Vec4};

use crate::{Backend, LoadError, TextureHandle};

/// Decoded RGBA8 texture, rows top to bottom.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<[u8; 4]>,
}

impl TextureData {
    pub fn solid(rgba: [u8; 4]) -> Self {
        Self {
            width: 1,
            height: 1,
            pixels: vec![rgba],
        }
    }

    pub fn default_diffuse() -> Self {
        Self::solid([255, 255, 255, 255])
    }

    /// Flat tangent-space normal.
    pub fn default_bump() -> Self {
        Self::solid([128, 128, 255, 255])
    }

    /// Non-empty, with exactly one pixel per texel.
    pub fn is_complete(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.pixels.len() as u64 == self.width as u64 * self.height as u64
    }

    pub fn validate(&self, material: usize) -> Result<(), LoadError> {
        if self.width == 0 || self.height == 0 {
            return Err(LoadError::InvalidTexture {
                material,
                reason: "empty texture",
            });
        }
        if !self.is_complete() {
            return Err(LoadError::InvalidTexture {
                material,
                reason: "pixel count does not match the texture size",
            });
        }
        Ok(())
    }

    /// Nearest-texel lookup with repeat addressing. Incomplete textures sample as white.
    pub fn sample(&self, uv: Vec2) -> Vec4 {
        if self.width == 0 || self.height == 0 {
            return Vec4::ONE;
        }

        let x = ((uv.x - uv.x.floor()) * self.width as f32) as u32;
        let y = ((uv.y - uv.y.floor()) * self.height as f32) as u32;
        let index = (y.min(self.height - 1) * self.width + x.min(self.width - 1)) as usize;

        match self.pixels.get(index) {
            Some(&[r, g, b, a]) => Vec4::new(r as f32, g as f32, b as f32, a as f32) / 255.0,
            None => Vec4::ONE,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MaterialDesc {
    pub diffuse: Option<TextureData>,
    pub bump: Option<TextureData>,
    pub specular_power: f32,
    pub diffuse_color: Vec3,
}

impl MaterialDesc {
    pub fn validate(&self, material: usize) -> Result<(), LoadError> {
        for texture in [&self.diffuse, &self.bump].into_iter().flatten() {
            texture.validate(material)?;
        }
        Ok(())
    }
}

impl Default for MaterialDesc {
    fn default() -> Self {
        Self {
            diffuse: None,
            bump: None,
            specular_power: 0.0,
            diffuse_color: Vec3::ONE,
        }
    }
}

/// Material resolved against uploaded textures.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Material {
    pub diffuse: TextureHandle,
    pub bump: TextureHandle,
    pub specular_power: f32,
    pub diffuse_color: Vec3,
}

impl Material {
    /// Uploads every material's textures, substituting the 1x1 defaults for missing ones.
    pub fn load_all(backend: &mut impl Backend, descs: &[MaterialDesc]) -> Vec<Self> {
        let default_diffuse = backend.upload_texture(&TextureData::default_diffuse());
        let default_bump = backend.upload_texture(&TextureData::default_bump());

        descs
            .iter()
            .enumerate()
            .map(|(index, desc)| {
                let diffuse = match &desc.diffuse {
                    Some(texture) => backend.upload_texture(texture),
                    None => {
                        log::debug!("Material {index}: no diffuse texture, using default");
                        default_diffuse
                    }
                };

                let bump = match &desc.bump {
                    Some(texture) => backend.upload_texture(texture),
                    None => {
                        log::debug!("Material {index}: no bump texture, using default");
                        default_bump
                    }
                };

                Self {
                    diffuse,
                    bump,
                    specular_power: desc.specular_power,
                    diffuse_color: desc.diffuse_color,
                }
            })
            .collect()
    }
}
