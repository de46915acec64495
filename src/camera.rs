//! Fixed-orientation camera.
//!
//! The camera never rotates during interaction; users rotate the scene
//! instead (see [`crate::app::input`]). That keeps the projection matrix
//! stable except on resize, and the view matrix dependent only on zoom,
//! which makes both cheap to cache. The view matrix and world position are
//! recomputed lazily on read after invalidation; the projection is
//! recomputed eagerly on every viewport change so it is never stale.

use glam::{Mat4, Quat, Vec3, Vec4Swizzles};

use crate::config::CameraSettings;

pub struct Camera {
    zoom: f32,
    rotation: Quat,
    width: u32,
    height: u32,
    fov_y_deg: f32,
    near: f32,
    far: f32,
    view: Mat4,
    projection: Mat4,
    view_dirty: bool,
    cached_position: Option<Vec3>,
}

impl Camera {
    /// Builds the camera with its fixed isometric-style orientation
    /// (yaw composed after pitch) and recomputes the projection for the
    /// initial viewport.
    pub fn new(width: u32, height: u32, settings: &CameraSettings) -> Self {
        let pitch = Quat::from_rotation_x(settings.default_rotation_x_deg.to_radians());
        let yaw = Quat::from_rotation_y(settings.default_rotation_y_deg.to_radians());

        let mut camera = Self {
            zoom: settings.default_zoom,
            rotation: yaw * pitch,
            width,
            height,
            fov_y_deg: settings.field_of_view_deg,
            near: settings.near_plane,
            far: settings.far_plane,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            view_dirty: true,
            cached_position: None,
        };
        camera.set_viewport(width, height);
        camera
    }

    /// Recomputes the perspective projection immediately. A zero or
    /// negative height falls back to an aspect of 1.0 rather than dividing
    /// by zero.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;

        let aspect = if height > 0 {
            width as f32 / height as f32
        } else {
            1.0
        };
        self.projection = Mat4::perspective_rh(self.fov_y_deg.to_radians(), aspect, self.near, self.far);
    }

    /// Returns the cached view matrix, recomputing it first if zoom or
    /// rotation changed since the last read. Repeated calls without
    /// intervening mutation return bit-identical matrices.
    pub fn get_view_matrix(&mut self) -> Mat4 {
        if self.view_dirty {
            let eye = self.rotation * Vec3::new(0.0, 0.0, self.zoom);
            let up = self.rotation * Vec3::Y;
            self.view = Mat4::look_at_rh(eye, Vec3::ZERO, up);
            self.view_dirty = false;
        }
        self.view
    }

    pub fn get_projection_matrix(&self) -> Mat4 {
        self.projection
    }

    /// World-space eye position, cached alongside the view matrix and
    /// invalidated with it, never independently.
    pub fn position(&mut self) -> Vec3 {
        if self.cached_position.is_none() || self.view_dirty {
            self.cached_position = Some(self.rotation * Vec3::new(0.0, 0.0, self.zoom));
        }
        self.cached_position.unwrap_or(Vec3::ZERO)
    }

    /// Normalized direction from the eye toward the origin.
    pub fn view_direction(&mut self) -> Vec3 {
        (Vec3::ZERO - self.position()).normalize()
    }

    /// Unprojects the screen point at the near and far planes and returns
    /// the normalized direction between them. Screen Y is flipped because
    /// pointer coordinates are top-left origin while the projection is
    /// bottom-left.
    pub fn screen_ray(&mut self, x: f32, y: f32, width: u32, height: u32) -> Vec3 {
        let view = self.get_view_matrix();
        let proj = self.get_projection_matrix();
        let inverse = (proj * view).inverse();

        let w = (width.max(1)) as f32;
        let h = (height.max(1)) as f32;
        let ndc_x = 2.0 * x / w - 1.0;
        let ndc_y = 2.0 * (h - y) / h - 1.0;

        let near = unproject(inverse, Vec3::new(ndc_x, ndc_y, 0.0));
        let far = unproject(inverse, Vec3::new(ndc_x, ndc_y, 1.0));
        (far - near).normalize()
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// No-op when the zoom is unchanged, otherwise marks the view and
    /// position caches dirty.
    pub fn set_zoom(&mut self, zoom: f32) {
        if self.zoom != zoom {
            self.zoom = zoom;
            self.view_dirty = true;
            self.cached_position = None;
        }
    }

    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    /// Low-level escape hatch. The standard interaction flow never rotates
    /// the camera (the scene rotates instead); this exists for API
    /// completeness and tests only.
    pub fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation;
        self.view_dirty = true;
        self.cached_position = None;
    }

    /// Forces the next view/position read to recompute even when nothing
    /// changed.
    pub fn invalidate_cache(&mut self) {
        self.view_dirty = true;
        self.cached_position = None;
    }
}

fn unproject(inverse_view_proj: Mat4, ndc: Vec3) -> Vec3 {
    let clip = inverse_view_proj * ndc.extend(1.0);
    clip.xyz() / clip.w
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CameraSettings;

    fn camera(width: u32, height: u32) -> Camera {
        Camera::new(width, height, &CameraSettings::default())
    }

    fn mat_is_finite(m: Mat4) -> bool {
        m.to_cols_array().iter().all(|v| v.is_finite())
    }

    #[test]
    fn aspect_matches_viewport() {
        let mut cam = camera(800, 600);
        cam.set_viewport(1920, 1080);
        // m00 = 1 / (aspect * tan(fov/2)), so the ratio of m11 to m00 is the aspect.
        let proj = cam.get_projection_matrix();
        let aspect = proj.y_axis.y / proj.x_axis.x;
        assert!((aspect - 1920.0 / 1080.0).abs() < 1e-5);
    }

    #[test]
    fn zero_height_viewport_falls_back_to_square_aspect() {
        let mut cam = camera(800, 600);
        cam.set_viewport(800, 0);
        let proj = cam.get_projection_matrix();
        assert!(mat_is_finite(proj));
        assert!((proj.y_axis.y / proj.x_axis.x - 1.0).abs() < 1e-6);
    }

    #[test]
    fn view_matrix_is_cached_bit_identical() {
        let mut cam = camera(800, 600);
        let first = cam.get_view_matrix();
        let second = cam.get_view_matrix();
        assert_eq!(first.to_cols_array(), second.to_cols_array());
    }

    #[test]
    fn zoom_change_invalidates_view() {
        let mut cam = camera(800, 600);
        let before = cam.get_view_matrix();
        cam.set_zoom(cam.zoom() * 2.0);
        let after = cam.get_view_matrix();
        assert_ne!(before.to_cols_array(), after.to_cols_array());
    }

    #[test]
    fn equal_zoom_is_a_no_op() {
        let mut cam = camera(800, 600);
        let before = cam.get_view_matrix();
        cam.set_zoom(cam.zoom());
        let after = cam.get_view_matrix();
        assert_eq!(before.to_cols_array(), after.to_cols_array());
    }

    #[test]
    fn invalidate_cache_recomputes_to_same_value() {
        let mut cam = camera(800, 600);
        let before = cam.get_view_matrix();
        cam.invalidate_cache();
        let after = cam.get_view_matrix();
        assert_eq!(before.to_cols_array(), after.to_cols_array());
    }

    #[test]
    fn position_tracks_zoom() {
        let mut cam = camera(800, 600);
        let near = cam.position();
        cam.set_zoom(10.0);
        let far = cam.position();
        assert!((near.length() - 5.0).abs() < 1e-4);
        assert!((far.length() - 10.0).abs() < 1e-4);
    }

    #[test]
    fn view_direction_points_at_origin() {
        let mut cam = camera(800, 600);
        let dir = cam.view_direction();
        let expected = (-cam.position()).normalize();
        assert!((dir - expected).length() < 1e-6);
        assert!((dir.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn screen_rays_are_unit_length() {
        let mut cam = camera(800, 600);
        for &(x, y) in &[(0.0, 0.0), (400.0, 300.0), (799.0, 599.0), (13.0, 521.0)] {
            let ray = cam.screen_ray(x, y, 800, 600);
            assert!((ray.length() - 1.0).abs() < 1e-6, "ray {ray:?} at ({x},{y})");
        }
    }

    #[test]
    fn center_screen_ray_looks_at_origin() {
        let mut cam = camera(800, 600);
        let ray = cam.screen_ray(400.0, 300.0, 800, 600);
        let expected = cam.view_direction();
        assert!((ray - expected).length() < 1e-4);
    }

    #[test]
    fn set_rotation_moves_the_eye() {
        let mut cam = camera(800, 600);
        cam.set_rotation(Quat::IDENTITY);
        let position = cam.position();
        assert!((position - Vec3::new(0.0, 0.0, 5.0)).length() < 1e-5);
    }
}
