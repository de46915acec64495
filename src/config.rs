//! Viewer configuration.
//!
//! All tunable constants live in one [`ViewerConfig`] constructed at startup
//! and passed by reference into the camera, input mapper, picker, mesh
//! validation and renderer. Nothing in the core reads ambient global state.

/// Camera projection and default-pose settings.
#[derive(Debug, Clone)]
pub struct CameraSettings {
    /// Default distance from the origin along the camera's local +Z.
    pub default_zoom: f32,
    /// Zoom applied on reset/fit is the scene scale times this, so the
    /// eye always clears the fitted bounds.
    pub reset_zoom_multiplier: f32,
    /// Fixed pitch of the isometric-style viewpoint, in degrees.
    pub default_rotation_x_deg: f32,
    /// Fixed yaw of the isometric-style viewpoint, in degrees.
    pub default_rotation_y_deg: f32,
    /// Vertical field of view in degrees.
    pub field_of_view_deg: f32,
    pub near_plane: f32,
    pub far_plane: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            default_zoom: 5.0,
            reset_zoom_multiplier: 5.0,
            default_rotation_x_deg: -35.264,
            default_rotation_y_deg: -45.0,
            field_of_view_deg: 45.0,
            near_plane: 0.1,
            far_plane: 10000.0,
        }
    }
}

/// Pointer-to-transform mapping settings.
#[derive(Debug, Clone)]
pub struct InputSettings {
    /// Radians of scene rotation per pixel of drag.
    pub rotation_sensitivity: f32,
    /// Pan speed per pixel, scaled by the scene's fitted size.
    pub pan_sensitivity_factor: f32,
    /// Dolly speed per wheel step, scaled by the scene's fitted size.
    pub zoom_sensitivity_factor: f32,
    /// Picks abort when the model matrix determinant falls below this.
    pub matrix_determinant_threshold: f32,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            rotation_sensitivity: 0.005,
            pan_sensitivity_factor: 0.01,
            zoom_sensitivity_factor: 0.1,
            matrix_determinant_threshold: 1e-10,
        }
    }
}

/// Mesh validation and acceleration-structure settings.
#[derive(Debug, Clone)]
pub struct MeshSettings {
    /// Largest absolute coordinate a vertex may carry.
    pub max_coordinate_value: f32,
    /// Floor for the fitted scene scale, keeps transforms invertible.
    pub scale_epsilon: f32,
    /// Origin of the throwaway ray used to warm the BVH after build.
    pub warmup_ray_origin: [f32; 3],
    /// Direction of the throwaway warm-up ray.
    pub warmup_ray_direction: [f32; 3],
}

impl Default for MeshSettings {
    fn default() -> Self {
        Self {
            max_coordinate_value: 1e6,
            scale_epsilon: 1e-6,
            warmup_ray_origin: [1000.0, 1000.0, 1000.0],
            warmup_ray_direction: [0.0, 0.0, -1.0],
        }
    }
}

/// Colors and gizmo sizing consumed by the renderer.
#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub background_color: [f32; 3],
    pub default_mesh_color: [f32; 3],
    pub selected_mesh_color: [f32; 3],
    /// Axis gizmo length relative to the fitted scene scale.
    pub axis_scale_multiplier: f32,
    pub ambient_strength: f32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            background_color: [0.12, 0.12, 0.12],
            default_mesh_color: [0.65, 0.65, 0.75],
            selected_mesh_color: [0.3, 0.6, 0.9],
            axis_scale_multiplier: 1.25,
            ambient_strength: 0.3,
        }
    }
}

/// Mesh file screening applied before parsing.
#[derive(Debug, Clone)]
pub struct FileSettings {
    pub supported_extensions: Vec<&'static str>,
    pub max_file_size: u64,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            supported_extensions: vec!["stl", "obj"],
            max_file_size: 100 * 1024 * 1024,
        }
    }
}

/// Top-level configuration container, built once in `main`.
#[derive(Debug, Clone, Default)]
pub struct ViewerConfig {
    pub camera: CameraSettings,
    pub input: InputSettings,
    pub mesh: MeshSettings,
    pub render: RenderSettings,
    pub files: FileSettings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_constants() {
        let config = ViewerConfig::default();
        assert_eq!(config.camera.default_zoom, 5.0);
        assert_eq!(config.camera.reset_zoom_multiplier, 5.0);
        assert_eq!(config.camera.field_of_view_deg, 45.0);
        assert_eq!(config.input.rotation_sensitivity, 0.005);
        assert_eq!(config.input.matrix_determinant_threshold, 1e-10);
        assert_eq!(config.mesh.max_coordinate_value, 1e6);
        assert_eq!(config.render.axis_scale_multiplier, 1.25);
    }

    #[test]
    fn file_settings_cover_supported_formats() {
        let files = FileSettings::default();
        assert!(files.supported_extensions.contains(&"stl"));
        assert!(files.supported_extensions.contains(&"obj"));
        assert!(files.max_file_size > 0);
    }
}
