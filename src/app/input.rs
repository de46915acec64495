//! Pointer-to-transform mapping.
//!
//! The camera never moves during interaction; drags and wheel events mutate
//! the scene transform instead, using the camera's basis vectors so motion
//! feels camera-relative. Left drag rotates (virtual trackball), right drag
//! pans, the wheel dollies the scene along the view direction. Pan and
//! dolly speeds scale with the fitted scene size so interaction feels the
//! same for millimeter and kilometer models.

use glam::{Quat, Vec2};

use crate::camera::Camera;
use crate::config::InputSettings;
use crate::pick::{self, PickResult};
use crate::scene::SceneGraph;

/// Pointer buttons the mapper cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Left,
    Right,
}

/// Small state machine over the two drag buttons and the last pointer
/// position; everything else is computed per event.
#[derive(Debug, Default)]
pub struct InputMapper {
    left_down: bool,
    right_down: bool,
    last_pos: Vec2,
}

impl InputMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        self.left_down || self.right_down
    }

    /// Records button state; any press re-anchors the drag reference point.
    pub fn on_button(&mut self, button: PointerButton, pressed: bool, x: f32, y: f32) {
        match button {
            PointerButton::Left => self.left_down = pressed,
            PointerButton::Right => self.right_down = pressed,
        }
        if pressed {
            self.last_pos = Vec2::new(x, y);
        }
    }

    /// Applies the pointer delta since the last event to the scene
    /// transform. Left button wins when both are held.
    pub fn on_drag(
        &mut self,
        scene: &mut SceneGraph,
        camera: &mut Camera,
        x: f32,
        y: f32,
        settings: &InputSettings,
    ) {
        let current = Vec2::new(x, y);
        let delta = current - self.last_pos;
        self.last_pos = current;

        // Camera-space right and up in world space: rows of the view
        // matrix's rotational part.
        let view = camera.get_view_matrix();
        let cam_right = view.row(0).truncate();
        let cam_up = view.row(1).truncate();

        if self.left_down {
            // Horizontal motion rotates about the camera's up axis,
            // vertical about its right axis; composing dx outermost gives
            // the trackball feel.
            let rot_h = Quat::from_axis_angle(cam_up, delta.x * settings.rotation_sensitivity);
            let rot_v = Quat::from_axis_angle(cam_right, delta.y * settings.rotation_sensitivity);
            scene.rotation = (rot_h * rot_v * scene.rotation).normalize();
        } else if self.right_down {
            let sensitivity = scene.scale * settings.pan_sensitivity_factor;
            scene.translation += cam_right * delta.x * sensitivity;
            scene.translation -= cam_up * delta.y * sensitivity;
        }
    }

    /// Dollies by translating the scene along the fixed camera's view
    /// direction; the camera itself never moves, which keeps its caches
    /// stable.
    pub fn on_wheel(
        &self,
        scene: &mut SceneGraph,
        camera: &mut Camera,
        delta: f32,
        settings: &InputSettings,
    ) {
        let sensitivity = scene.scale * settings.zoom_sensitivity_factor;
        scene.translation += camera.view_direction() * delta * sensitivity;
    }

    /// Resolves a click into a selection toggle; see [`crate::pick`].
    pub fn on_pick(
        &self,
        scene: &mut SceneGraph,
        camera: &mut Camera,
        width: u32,
        height: u32,
        x: f32,
        y: f32,
        settings: &InputSettings,
    ) -> Option<PickResult> {
        pick::pick(scene, camera, width, height, x, y, settings)
    }
}
