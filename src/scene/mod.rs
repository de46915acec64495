//! Scene graph: mesh list plus the single shared rigid transform.
//!
//! All meshes share one rotation/translation pair and a bounds-derived
//! center and scale. The model matrix is composed exactly as
//! `Translate(translation) * Rotate(rotation) * Translate(-center)`;
//! the renderer and the picker both go through [`SceneGraph::model_matrix`]
//! so they can never disagree on the composition.

pub mod bvh;
pub mod mesh;

use glam::{Mat4, Quat, Vec3};

use crate::config::MeshSettings;
use mesh::MeshAsset;

/// Default scene pose applied on reset and fit-to-view. Distinct from the
/// camera's own fixed rotation; the two compose visually but are
/// independent state.
const DEFAULT_POSE: Quat = Quat::from_xyzw(
    0.0,
    -std::f32::consts::FRAC_1_SQRT_2,
    0.0,
    std::f32::consts::FRAC_1_SQRT_2,
);

pub struct SceneGraph {
    /// Insertion order is load order; deletion iterates high-to-low so
    /// earlier indices stay stable.
    pub meshes: Vec<MeshAsset>,
    pub rotation: Quat,
    pub translation: Vec3,
    pub center: Vec3,
    pub scale: f32,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    pub fn new() -> Self {
        Self {
            meshes: Vec::new(),
            rotation: Quat::IDENTITY,
            translation: Vec3::ZERO,
            center: Vec3::ZERO,
            scale: 1.0,
        }
    }

    pub fn add_mesh(&mut self, mesh: MeshAsset) {
        log::debug!(
            "scene: added mesh '{}' ({} triangles)",
            mesh.name,
            mesh.triangle_count()
        );
        self.meshes.push(mesh);
    }

    /// Removes every selected mesh, releasing GPU resources first.
    /// Iterates from the highest index down so pending indices stay valid.
    pub fn remove_selected(&mut self) -> usize {
        let mut removed = 0;
        for index in (0..self.meshes.len()).rev() {
            if self.meshes[index].selected {
                self.meshes[index].release_gpu();
                let mesh = self.meshes.remove(index);
                log::info!("scene: removed mesh '{}'", mesh.name);
                removed += 1;
            }
        }
        removed
    }

    /// Releases every mesh and resets the transform.
    pub fn clear(&mut self) {
        for mesh in &mut self.meshes {
            mesh.release_gpu();
        }
        self.meshes.clear();
        self.reset_transformations();
    }

    /// Bounding box across all visible meshes' raw vertices. Returns the
    /// degenerate `(0,0,0)/(0,0,0)` pair when nothing is visible; callers
    /// must not derive a scale from that.
    pub fn get_bounds(&self) -> (Vec3, Vec3) {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        let mut any = false;
        for mesh in self.meshes.iter().filter(|m| m.visible) {
            let (mesh_min, mesh_max) = mesh.bounds();
            min = min.min(mesh_min);
            max = max.max(mesh_max);
            any = true;
        }
        if !any {
            return (Vec3::ZERO, Vec3::ZERO);
        }
        (min, max)
    }

    /// Recomputes `center` and `scale` from the visible bounds and resets
    /// the pose. The sole source of truth for framing the scene; call it
    /// after any load or delete that changes the visible set. Returns the
    /// new scale.
    pub fn fit_to_view(&mut self, settings: &MeshSettings) -> f32 {
        if self.meshes.is_empty() {
            return 1.0;
        }

        let (min, max) = self.get_bounds();
        self.center = (min + max) * 0.5;
        let size = (max - min).max_element();
        // Epsilon floor keeps the transform invertible for point-like scenes.
        self.scale = size.max(settings.scale_epsilon);

        self.reset_transformations();
        log::debug!(
            "scene: fit to view, center={:?} scale={}",
            self.center,
            self.scale
        );
        self.scale
    }

    /// Restores the default pose without touching `center`/`scale`.
    pub fn reset_transformations(&mut self) {
        self.rotation = DEFAULT_POSE.normalize();
        self.translation = Vec3::ZERO;
    }

    /// `Translate(translation) * Rotate(rotation) * Translate(-center)`,
    /// in exactly this order everywhere.
    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.translation)
            * Mat4::from_quat(self.rotation)
            * Mat4::from_translation(-self.center)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::mesh::MeshGeometry;

    fn settings() -> MeshSettings {
        MeshSettings::default()
    }

    fn box_mesh(name: &str, min: [f32; 3], max: [f32; 3]) -> MeshAsset {
        // Two opposing corner triangles are enough to pin the bounds.
        let geometry = MeshGeometry {
            name: name.to_string(),
            vertices: vec![
                min,
                [max[0], min[1], min[2]],
                [min[0], max[1], min[2]],
                max,
                [min[0], max[1], max[2]],
                [max[0], min[1], max[2]],
            ],
            indices: vec![[0, 1, 2], [3, 4, 5]],
            normals: vec![[0.0, 0.0, 1.0]; 6],
        };
        MeshAsset::new(geometry, &settings()).expect("valid test mesh")
    }

    fn point_mesh() -> MeshAsset {
        let geometry = MeshGeometry {
            name: "point".to_string(),
            vertices: vec![[2.0, 2.0, 2.0], [2.0, 2.0, 2.0], [2.0, 2.0, 2.0]],
            indices: vec![[0, 1, 2]],
            normals: vec![[0.0, 0.0, 1.0]; 3],
        };
        MeshAsset::new(geometry, &settings()).expect("valid test mesh")
    }

    #[test]
    fn fit_to_view_on_empty_scene_returns_one() {
        let mut scene = SceneGraph::new();
        assert_eq!(scene.fit_to_view(&settings()), 1.0);
        assert_eq!(scene.scale, 1.0);
    }

    #[test]
    fn fit_to_view_centers_unit_cube() {
        let mut scene = SceneGraph::new();
        scene.add_mesh(box_mesh("cube", [-1.0, -1.0, -1.0], [1.0, 1.0, 1.0]));
        let scale = scene.fit_to_view(&settings());
        assert_eq!(scale, 2.0);
        assert!(scene.center.abs_diff_eq(Vec3::ZERO, 1e-6));
        assert_eq!(scene.translation, Vec3::ZERO);
    }

    #[test]
    fn fit_to_view_clamps_point_like_scenes() {
        let mut scene = SceneGraph::new();
        scene.add_mesh(point_mesh());
        let scale = scene.fit_to_view(&settings());
        assert!(scale >= 1e-6);
        assert!(scale > 0.0);
    }

    #[test]
    fn bounds_skip_hidden_meshes() {
        let mut scene = SceneGraph::new();
        scene.add_mesh(box_mesh("near", [-1.0, -1.0, -1.0], [1.0, 1.0, 1.0]));
        scene.add_mesh(box_mesh("far", [10.0, 10.0, 10.0], [20.0, 20.0, 20.0]));
        scene.meshes[1].visible = false;
        let (min, max) = scene.get_bounds();
        assert!(min.abs_diff_eq(Vec3::splat(-1.0), 1e-6));
        assert!(max.abs_diff_eq(Vec3::splat(1.0), 1e-6));
    }

    #[test]
    fn all_hidden_yields_degenerate_bounds() {
        let mut scene = SceneGraph::new();
        scene.add_mesh(box_mesh("cube", [-1.0, -1.0, -1.0], [1.0, 1.0, 1.0]));
        scene.meshes[0].visible = false;
        let (min, max) = scene.get_bounds();
        assert_eq!(min, Vec3::ZERO);
        assert_eq!(max, Vec3::ZERO);
    }

    #[test]
    fn remove_selected_keeps_remaining_order() {
        let mut scene = SceneGraph::new();
        for name in ["a", "b", "c", "d"] {
            scene.add_mesh(box_mesh(name, [-1.0, -1.0, -1.0], [1.0, 1.0, 1.0]));
        }
        scene.meshes[1].selected = true;
        scene.meshes[3].selected = true;
        let removed = scene.remove_selected();
        assert_eq!(removed, 2);
        let names: Vec<&str> = scene.meshes.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn clear_empties_the_scene_and_resets_the_transform() {
        let mut scene = SceneGraph::new();
        scene.add_mesh(box_mesh("cube", [-1.0, -1.0, -1.0], [1.0, 1.0, 1.0]));
        scene.rotation = Quat::from_rotation_z(1.0);
        scene.translation = Vec3::new(1.0, 2.0, 3.0);

        scene.clear();

        assert!(scene.meshes.is_empty());
        assert_eq!(scene.translation, Vec3::ZERO);
        assert!(scene.rotation.abs_diff_eq(DEFAULT_POSE.normalize(), 1e-6));
    }

    #[test]
    fn reset_restores_default_pose_but_keeps_framing() {
        let mut scene = SceneGraph::new();
        scene.add_mesh(box_mesh("cube", [0.0, 0.0, 0.0], [4.0, 4.0, 4.0]));
        scene.fit_to_view(&settings());
        scene.rotation = Quat::from_rotation_z(1.0);
        scene.translation = Vec3::new(1.0, 2.0, 3.0);
        let center = scene.center;
        let scale = scene.scale;

        scene.reset_transformations();
        assert_eq!(scene.translation, Vec3::ZERO);
        assert!((scene.rotation.length() - 1.0).abs() < 1e-6);
        assert_eq!(scene.center, center);
        assert_eq!(scene.scale, scale);
    }

    #[test]
    fn model_matrix_round_trips_points() {
        let mut scene = SceneGraph::new();
        scene.rotation = Quat::from_axis_angle(Vec3::new(0.3, 0.9, 0.1).normalize(), 1.2);
        scene.translation = Vec3::new(4.0, -2.0, 7.5);
        scene.center = Vec3::new(0.5, 0.25, -1.0);

        let model = scene.model_matrix();
        let inverse = model.inverse();
        for &p in &[
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(-5.0, 0.2, 9.0),
        ] {
            let round_trip = model.transform_point3(inverse.transform_point3(p));
            assert!((round_trip - p).length() < 1e-4, "{p:?} -> {round_trip:?}");
        }
    }

    #[test]
    fn model_matrix_composition_order() {
        let mut scene = SceneGraph::new();
        scene.center = Vec3::new(1.0, 0.0, 0.0);
        scene.translation = Vec3::new(0.0, 5.0, 0.0);
        // Rotation is identity, so the model transform must move the center
        // to the translation exactly.
        scene.rotation = Quat::IDENTITY;
        let moved = scene.model_matrix().transform_point3(scene.center);
        assert!(moved.abs_diff_eq(Vec3::new(0.0, 5.0, 0.0), 1e-6));
    }
}
