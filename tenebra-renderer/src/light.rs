use glam::{Mat4, Vec3};

use crate::{Icosphere, RendererConfig};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LightKind {
    Point,
    Directional,
    /// Reported by scene providers, rejected at load time.
    Spot,
}

impl LightKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Point => "point",
            Self::Directional => "directional",
            Self::Spot => "spot",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightDesc {
    pub kind: LightKind,
    pub color: Vec3,
    pub intensity: f32,
    /// Scene node driving the light's transform.
    pub node: usize,
}

impl LightDesc {
    pub fn point(node: usize, color: Vec3) -> Self {
        Self {
            kind: LightKind::Point,
            color,
            intensity: 1.0,
            node,
        }
    }

    pub fn directional(node: usize, color: Vec3) -> Self {
        Self {
            kind: LightKind::Directional,
            color,
            intensity: 1.0,
            node,
        }
    }
}

/// Light value at distance `d` for an influence radius `radius`.
///
/// Inverse-square up to `A = radius / 1.5`, then continued linearly (matching value and slope
/// at `A`) down to zero at `radius`.
pub fn attenuation(d: f32, radius: f32) -> f32 {
    let a = radius / 1.5;
    if d >= radius {
        0.0
    } else if d < a {
        let d = d.max(1e-3);
        1.0 / (d * d)
    } else {
        ((3.0 * a - 2.0 * d) / (a * a * a)).max(0.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointLight {
    pub node: usize,
    /// Colour × intensity.
    pub radiance: Vec3,
    /// Displayed colour of the light source.
    pub color: Vec3,
    pub transform: Mat4,
    /// Radius of the influence sphere, and uniform scale of the proxy.
    pub radius: f32,
}

impl PointLight {
    pub fn new(desc: &LightDesc, config: &RendererConfig) -> Self {
        Self {
            node: desc.node,
            radiance: desc.color * desc.intensity * config.point_light_intensity,
            color: desc.color,
            transform: Mat4::IDENTITY,
            radius: config.point_light_radius * desc.intensity,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.transform.transform_point3(Vec3::ZERO)
    }

    pub fn view_position(&self, view: &Mat4) -> Vec3 {
        (*view * self.transform).transform_point3(Vec3::ZERO)
    }

    /// World transform of the proxy sphere: translation only, uniformly scaled to the radius.
    pub fn proxy_transform(&self) -> Mat4 {
        Mat4::from_translation(self.position()) * Mat4::from_scale(Vec3::splat(self.radius))
    }

    /// Whether `eye` may lie inside the proxy, including its near-plane slack.
    pub fn contains_eye(&self, eye: Vec3, near_slack: f32) -> bool {
        eye.distance(self.position()) <= self.radius * Icosphere::OUTER_RADIUS + near_slack
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirectionalLight {
    pub node: usize,
    pub radiance: Vec3,
    pub transform: Mat4,
    /// World-space direction the light travels in.
    pub direction: Vec3,
}

impl DirectionalLight {
    /// Canonical direction before the node transform is applied.
    pub const DOWN: Vec3 = Vec3::NEG_Y;

    pub fn new(desc: &LightDesc, config: &RendererConfig) -> Self {
        Self {
            node: desc.node,
            radiance: desc.color * desc.intensity * config.directional_light_intensity,
            transform: Mat4::IDENTITY,
            direction: Self::DOWN,
        }
    }

    pub fn update(&mut self, transform: Mat4) {
        self.transform = transform;
        self.direction = transform.transform_vector3(Self::DOWN).normalize_or(Self::DOWN);
    }

    pub fn view_direction(&self, view: &Mat4) -> Vec3 {
        view.transform_vector3(self.direction).normalize_or(Self::DOWN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn attenuation_is_continuous_and_bounded_by_radius() {
        let radius = 6.0;
        let a = radius / 1.5;

        assert_relative_eq!(attenuation(a - 1e-4, radius), attenuation(a, radius), epsilon = 1e-3);
        assert_relative_eq!(attenuation(2.0, radius), 0.25);
        assert_eq!(attenuation(radius, radius), 0.0);
        assert_eq!(attenuation(radius * 2.0, radius), 0.0);
        assert!(attenuation(radius - 0.01, radius) > 0.0);
    }

    #[test]
    fn directional_light_follows_node_rotation() {
        let mut light = DirectionalLight::new(
            &LightDesc::directional(0, Vec3::ONE),
            &RendererConfig::default(),
        );
        assert_eq!(light.direction, Vec3::NEG_Y);
        assert_eq!(light.radiance, Vec3::splat(3.0));

        light.update(Mat4::from_rotation_x(std::f32::consts::FRAC_PI_2));
        assert_relative_eq!(light.direction.z, -1.0, epsilon = 1e-5);
    }

    #[test]
    fn proxy_scale_comes_from_radius_constant() {
        let config = RendererConfig {
            point_light_radius: 5.0,
            ..Default::default()
        };
        let mut light = PointLight::new(
            &LightDesc {
                intensity: 2.0,
                ..LightDesc::point(0, Vec3::X)
            },
            &config,
        );
        light.transform = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));

        assert_eq!(light.radius, 10.0);
        let edge = light.proxy_transform().transform_point3(Vec3::X);
        assert_relative_eq!(edge.x, 11.0);
        assert!(light.contains_eye(Vec3::new(1.0, 2.0, 12.0), 0.0));
        assert!(!light.contains_eye(Vec3::new(1.0, 2.0, 20.0), 0.0));
    }
}
