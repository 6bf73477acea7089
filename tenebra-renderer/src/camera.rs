use glam::{Mat4, Vec3};

/// Camera as described by the scene at a given time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraDesc {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view, in radians.
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraDesc {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 5.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y: std::f32::consts::FRAC_PI_4,
            near: 0.1,
            far: 100.0,
        }
    }
}

/// Per-frame camera matrices, read-only while passes record.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraState {
    pub view: Mat4,
    pub proj: Mat4,
    pub view_proj: Mat4,
    pub inv_view: Mat4,
    pub eye: Vec3,
    pub near: f32,
    pub far: f32,
}

impl CameraState {
    pub fn new(desc: &CameraDesc, aspect: f32) -> Self {
        let view = Mat4::look_at_rh(desc.position, desc.target, desc.up);
        let proj = Mat4::perspective_rh(desc.fov_y, aspect, desc.near, desc.far);

        Self {
            view,
            proj,
            view_proj: proj * view,
            inv_view: view.inverse(),
            eye: desc.position,
            near: desc.near,
            far: desc.far,
        }
    }

    /// Distance from the eye to the corners of the near plane.
    pub fn near_corner_distance(&self) -> f32 {
        let half_height = self.near / self.proj.y_axis.y;
        let half_width = self.near / self.proj.x_axis.x;
        Vec3::new(half_width, half_height, self.near).length()
    }
}

impl Default for CameraState {
    fn default() -> Self {
        Self::new(&CameraDesc::default(), 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn matrices_are_consistent() {
        let camera = CameraState::new(
            &CameraDesc {
                position: Vec3::new(3.0, 4.0, 5.0),
                target: Vec3::new(0.0, 1.0, 0.0),
                ..Default::default()
            },
            1.5,
        );

        assert_relative_eq!(
            camera.inv_view.transform_point3(Vec3::ZERO).x,
            3.0,
            epsilon = 1e-5
        );
        assert_eq!(camera.view_proj, camera.proj * camera.view);

        let target = camera.view.transform_point3(Vec3::new(0.0, 1.0, 0.0));
        assert_relative_eq!(target.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(target.y, 0.0, epsilon = 1e-5);
        assert!(target.z < 0.0);
    }

    #[test]
    fn near_corners_are_beyond_near_plane() {
        let camera = CameraState::default();
        assert!(camera.near_corner_distance() > camera.near);
    }
}
