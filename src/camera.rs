//! Perspective cameras.
//!
//! [`Camera`] looks from a fixed eye at the origin. [`OrbitCamera`] wraps a
//! `Camera` and moves its eye over a sphere around the origin. Both implement
//! [`Renderable3D`], which is all the render loop needs from a camera.

use glam::{Mat4, Vec3};

/// Horizontal field of view in degrees.
pub const HORIZONTAL_FOV_DEGREES: f32 = 90.0;
/// Near clipping plane in world units.
pub const NEAR_PLANE: f32 = 0.1;
/// Far clipping plane in world units.
pub const FAR_PLANE: f32 = 200.0;

/// Something the render loop refreshes once per frame before any draw.
pub trait Renderable3D {
    /// Recompute the view and view-projection matrices.
    fn render(&mut self);

    /// Update the aspect ratio from the drawable surface size.
    ///
    /// `height` must be at least 1.
    fn set_aspect_ratio(&mut self, width: u32, height: u32);

    /// The matrices computed by the last [`render`](Renderable3D::render).
    fn camera(&self) -> &Camera;
}

/// Fixed-position perspective camera.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    aspect: f32,
    eye: Vec3,
    target: Vec3,
    up: Vec3,
    view: Mat4,
    view_projection: Mat4,
}

impl Camera {
    /// Camera at `(0, 0, -10)` looking at the origin with +Y up.
    pub fn new() -> Self {
        Self {
            aspect: 16.0 / 9.0,
            eye: Vec3::new(0.0, 0.0, -10.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            view: Mat4::IDENTITY,
            view_projection: Mat4::IDENTITY,
        }
    }

    /// Camera sized for a surface of `width` × `height`.
    pub fn with_surface_size(width: u32, height: u32) -> Self {
        let mut camera = Self::new();
        camera.set_aspect_ratio(width, height);
        camera
    }

    /// Width divided by height.
    #[inline]
    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    /// Camera position.
    #[inline]
    pub fn eye(&self) -> Vec3 {
        self.eye
    }

    /// World-to-camera transform.
    #[inline]
    pub fn view(&self) -> Mat4 {
        self.view
    }

    /// Projection composed with [`view`](Self::view).
    #[inline]
    pub fn view_projection(&self) -> Mat4 {
        self.view_projection
    }

    /// Vertical field of view in radians for the current aspect.
    pub fn vertical_fov(&self) -> f32 {
        HORIZONTAL_FOV_DEGREES.to_radians() / self.aspect
    }

    /// Projection matrix for the current aspect.
    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.vertical_fov(), self.aspect, NEAR_PLANE, FAR_PLANE)
    }

    pub(crate) fn set_eye(&mut self, eye: Vec3) {
        self.eye = eye;
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderable3D for Camera {
    fn render(&mut self) {
        self.view = Mat4::look_at_rh(self.eye, self.target, self.up);
        self.view_projection = self.projection() * self.view;
    }

    fn set_aspect_ratio(&mut self, width: u32, height: u32) {
        debug_assert!(height > 0, "surface height must be clamped to at least 1");
        self.aspect = width as f32 / height as f32;
    }

    fn camera(&self) -> &Camera {
        self
    }
}

/// Camera orbiting the origin.
///
/// The owning scene mutates the angles between frames. Altitude is not
/// clamped; values past ±π/2 flip the view over the pole.
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitCamera {
    /// Horizontal angle in radians.
    pub azimuth: f32,
    /// Vertical angle in radians.
    pub altitude: f32,
    /// Distance from the origin.
    pub distance: f32,
    camera: Camera,
}

impl OrbitCamera {
    /// Orbit camera at distance 10 on the +Z axis.
    pub fn new() -> Self {
        Self {
            azimuth: 0.0,
            altitude: 0.0,
            distance: 10.0,
            camera: Camera::new(),
        }
    }

    /// Orbit camera sized for a surface of `width` × `height`.
    pub fn with_surface_size(width: u32, height: u32) -> Self {
        let mut camera = Self::new();
        camera.set_aspect_ratio(width, height);
        camera
    }

    /// Eye position for the current angles and distance.
    pub fn position(&self) -> Vec3 {
        let x = self.distance * self.altitude.cos() * self.azimuth.sin();
        let y = self.distance * self.altitude.sin();
        let z = self.distance * self.altitude.cos() * self.azimuth.cos();
        Vec3::new(x, y, z)
    }
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderable3D for OrbitCamera {
    fn render(&mut self) {
        self.camera.set_eye(self.position());
        self.camera.render();
    }

    fn set_aspect_ratio(&mut self, width: u32, height: u32) {
        self.camera.set_aspect_ratio(width, height);
    }

    fn camera(&self) -> &Camera {
        &self.camera
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, TAU};

    #[test]
    fn test_camera_default_eye() {
        let camera = Camera::new();
        assert_eq!(camera.eye(), Vec3::new(0.0, 0.0, -10.0));
        assert_eq!(camera.view(), Mat4::IDENTITY);
    }

    #[test]
    fn test_set_aspect_ratio() {
        let mut camera = Camera::new();
        camera.set_aspect_ratio(800, 600);
        camera.render();
        assert_eq!(camera.aspect(), 800.0 / 600.0);
    }

    #[test]
    fn test_vertical_fov_tracks_aspect() {
        let mut camera = Camera::new();
        camera.set_aspect_ratio(1, 1);
        assert!((camera.vertical_fov() - FRAC_PI_2).abs() < 1e-6);
        camera.set_aspect_ratio(2, 1);
        assert!((camera.vertical_fov() - FRAC_PI_2 / 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_origin_projects_to_screen_centre() {
        let mut camera = Camera::with_surface_size(1280, 720);
        camera.render();
        let clip = camera.view_projection() * glam::Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-5);
        assert!(ndc.y.abs() < 1e-5);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn test_orbit_position() {
        let mut orbit = OrbitCamera::new();
        assert!(orbit.position().abs_diff_eq(Vec3::new(0.0, 0.0, 10.0), 1e-5));

        orbit.azimuth = FRAC_PI_2;
        assert!(orbit.position().abs_diff_eq(Vec3::new(10.0, 0.0, 0.0), 1e-4));

        orbit.azimuth = 0.0;
        orbit.altitude = FRAC_PI_2;
        orbit.distance = 2.5;
        assert!(orbit.position().abs_diff_eq(Vec3::new(0.0, 2.5, 0.0), 1e-5));
    }

    #[test]
    fn test_orbit_render_stores_eye() {
        let mut orbit = OrbitCamera::with_surface_size(800, 600);
        orbit.azimuth = 1.2;
        orbit.altitude = 0.3;
        orbit.distance = 2.5;
        orbit.render();
        assert!(orbit.camera().eye().abs_diff_eq(orbit.position(), 1e-6));
    }

    #[test]
    fn test_orbit_altitude_is_unclamped() {
        let mut orbit = OrbitCamera::new();
        orbit.altitude = 10.0;
        orbit.render();
        assert_eq!(orbit.altitude, 10.0);
    }

    #[test]
    fn test_orbit_full_turn() {
        let mut a = OrbitCamera::with_surface_size(800, 600);
        a.azimuth = 0.7;
        a.render();

        let mut b = a.clone();
        b.azimuth += TAU;
        b.render();

        assert!(a.camera().view().abs_diff_eq(b.camera().view(), 1e-4));
        assert!(a
            .camera()
            .view_projection()
            .abs_diff_eq(b.camera().view_projection(), 1e-4));
    }
}
