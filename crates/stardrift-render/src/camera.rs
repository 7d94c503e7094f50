//! Perspective camera for the backdrop scene.

use crate::pipeline::CameraUniform;
use crate::surface::PhysicalSize;
use glam::{Mat4, Quat, Vec3};

/// Distance of the default camera from the world origin along +Z.
pub const DEFAULT_CAMERA_DISTANCE: f32 = 5.0;

/// Default vertical field of view in degrees.
pub const DEFAULT_FOV_DEGREES: f32 = 75.0;

/// A perspective camera that generates view and projection matrices.
#[derive(Debug, Clone)]
pub struct Camera {
    /// World-space position.
    pub position: Vec3,
    /// Rotation as a unit quaternion.
    pub rotation: Quat,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    /// Width / height.
    pub aspect_ratio: f32,
    /// Near clip plane distance (always positive).
    pub near: f32,
    /// Far clip plane distance (always positive, > near).
    pub far: f32,
}

impl Camera {
    /// Compute the view matrix (inverse of camera transform).
    pub fn view_matrix(&self) -> Mat4 {
        (Mat4::from_translation(self.position) * Mat4::from_quat(self.rotation)).inverse()
    }

    /// Compute the projection matrix with reverse-Z.
    pub fn projection_matrix(&self) -> Mat4 {
        // Near maps to z=1, far to z=0.
        Mat4::perspective_rh(self.fov_y, self.aspect_ratio, self.far, self.near)
    }

    /// Update the aspect ratio. Degenerate sizes are ignored so a minimized
    /// window never produces a NaN projection.
    pub fn set_aspect_ratio(&mut self, width: f32, height: f32) -> bool {
        if width <= 0.0 || height <= 0.0 {
            return false;
        }
        self.aspect_ratio = width / height;
        true
    }

    /// Convert the camera to a uniform for the point-sprite shaders.
    ///
    /// `pixel_ratio` scales the sprite size clamp so sprites look the same
    /// on high-DPI displays.
    pub fn to_uniform(&self, viewport: PhysicalSize, pixel_ratio: f32) -> CameraUniform {
        let width = viewport.width.max(1) as f32;
        let height = viewport.height.max(1) as f32;
        CameraUniform {
            view: self.view_matrix().to_cols_array_2d(),
            proj: self.projection_matrix().to_cols_array_2d(),
            viewport: [width, height, pixel_ratio, height * 0.5],
        }
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, DEFAULT_CAMERA_DISTANCE),
            rotation: Quat::IDENTITY,
            fov_y: DEFAULT_FOV_DEGREES.to_radians(),
            aspect_ratio: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}
