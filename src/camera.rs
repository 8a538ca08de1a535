//! Host Camera Contract
//!
//! The effect never owns a camera. Each frame the host hands over a
//! [`CameraFrame`]: the world-to-camera matrix, the GPU projection matrix and
//! the intrinsics needed to derive the projection scale.

use glam::{Mat4, UVec2, Vec3};

/// Per-frame snapshot of the primary camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraFrame {
    /// World-to-camera (view) matrix.
    pub view: Mat4,
    /// Projection matrix as consumed by the GPU.
    pub projection: Mat4,
    /// Vertical field of view in degrees.
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
}

impl CameraFrame {
    /// Builds a right-handed perspective camera looking along `forward`.
    #[must_use]
    pub fn perspective(
        position: Vec3,
        forward: Vec3,
        up: Vec3,
        fov_y_degrees: f32,
        near: f32,
        far: f32,
        width: u32,
        height: u32,
    ) -> Self {
        let aspect = width.max(1) as f32 / height.max(1) as f32;
        Self {
            view: Mat4::look_to_rh(position, forward, up),
            projection: Mat4::perspective_rh(fov_y_degrees.to_radians(), aspect, near, far),
            fov_y_degrees,
            near,
            far,
            width,
            height,
        }
    }

    /// `projection * view`.
    #[inline]
    #[must_use]
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    /// Output resolution in pixels.
    #[inline]
    #[must_use]
    pub fn resolution(&self) -> UVec2 {
        UVec2::new(self.width, self.height)
    }

    /// World-space camera position.
    #[inline]
    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.view.inverse().w_axis.truncate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_recovered_from_view() {
        let cam = CameraFrame::perspective(
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::NEG_Z,
            Vec3::Y,
            60.0,
            0.1,
            100.0,
            1920,
            1080,
        );
        assert!((cam.position() - Vec3::new(1.0, 2.0, 3.0)).length() < 1e-4);
        assert_eq!(cam.resolution(), UVec2::new(1920, 1080));
    }
}
