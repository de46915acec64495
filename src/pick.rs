//! Ray picking.
//!
//! Converts a screen coordinate into a world-space ray, transforms the ray
//! into the scene's model space via the inverse model matrix, queries each
//! visible mesh's BVH and toggles the selection flag of the nearest hit.
//! Picking is a toggle, not an exclusive select; several meshes may be
//! selected at once.

use glam::{Mat4, Vec3};

use crate::camera::Camera;
use crate::config::InputSettings;
use crate::scene::SceneGraph;

/// Outcome of a successful pick.
#[derive(Debug, Clone, PartialEq)]
pub struct PickResult {
    pub mesh_index: usize,
    pub mesh_name: String,
    /// Hit point in the mesh's local (model) space.
    pub model_point: Vec3,
    /// The same point mapped back through the model matrix.
    pub world_point: Vec3,
    /// Selection state of the mesh after the toggle.
    pub selected: bool,
}

/// Resolves a pick at screen position `(x, y)`. Returns `None` when no
/// visible mesh is hit or the model transform is too degenerate to invert;
/// neither case changes any state.
pub fn pick(
    scene: &mut SceneGraph,
    camera: &mut Camera,
    width: u32,
    height: u32,
    x: f32,
    y: f32,
    settings: &InputSettings,
) -> Option<PickResult> {
    let origin_ws = camera.position();
    let direction_ws = camera.screen_ray(x, y, width, height);
    let model = scene.model_matrix();
    resolve_pick(
        scene,
        model,
        origin_ws,
        direction_ws,
        settings.matrix_determinant_threshold,
    )
}

/// Core pick path, parameterized on the model matrix so degenerate
/// transforms can be exercised directly.
pub fn resolve_pick(
    scene: &mut SceneGraph,
    model: Mat4,
    origin_ws: Vec3,
    direction_ws: Vec3,
    determinant_threshold: f32,
) -> Option<PickResult> {
    // A near-singular matrix cannot be inverted safely; abort this pick
    // rather than propagate garbage coordinates.
    let det = model.determinant();
    if det.abs() < determinant_threshold {
        log::debug!("pick aborted: |det|={:.3e} below threshold", det.abs());
        return None;
    }
    let inverse = model.inverse();

    let origin_ms = inverse.transform_point3(origin_ws);
    let direction_ms = inverse.transform_vector3(direction_ws).normalize();

    let mut nearest_distance = f32::INFINITY;
    let mut nearest: Option<(usize, Vec3)> = None;
    for (index, mesh) in scene.meshes.iter().enumerate() {
        if !mesh.visible {
            continue;
        }
        // A failed query against one mesh must not abort the others.
        let Some(hit) = mesh.nearest_hit(origin_ms, direction_ms) else {
            continue;
        };
        if hit.distance < nearest_distance {
            nearest_distance = hit.distance;
            nearest = Some((index, hit.point));
        }
    }

    let (mesh_index, model_point) = nearest?;
    let mesh = &mut scene.meshes[mesh_index];
    mesh.selected = !mesh.selected;
    let world_point = model.transform_point3(model_point);
    let result = PickResult {
        mesh_index,
        mesh_name: mesh.name.clone(),
        model_point,
        world_point,
        selected: mesh.selected,
    };
    log::info!(
        "toggled selection on {}. model coords: {:.3}, {:.3}, {:.3}; world coords: {:.3}, {:.3}, {:.3}",
        result.mesh_name,
        model_point.x,
        model_point.y,
        model_point.z,
        world_point.x,
        world_point.y,
        world_point.z
    );
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CameraSettings, InputSettings, MeshSettings};
    use crate::scene::mesh::{MeshAsset, MeshGeometry};
    use glam::Quat;

    fn quad_mesh(name: &str, z: f32) -> MeshAsset {
        let geometry = MeshGeometry {
            name: name.to_string(),
            vertices: vec![
                [-1.0, -1.0, z],
                [1.0, -1.0, z],
                [1.0, 1.0, z],
                [-1.0, 1.0, z],
            ],
            indices: vec![[0, 1, 2], [0, 2, 3]],
            normals: vec![[0.0, 0.0, 1.0]; 4],
        };
        MeshAsset::new(geometry, &MeshSettings::default()).expect("valid test mesh")
    }

    fn scene_with_quad() -> SceneGraph {
        let mut scene = SceneGraph::new();
        scene.add_mesh(quad_mesh("quad", 0.0));
        // Identity pose so model space == world space.
        scene.rotation = Quat::IDENTITY;
        scene
    }

    #[test]
    fn straight_ray_hits_and_toggles() {
        let mut scene = scene_with_quad();
        let result = resolve_pick(
            &mut scene,
            Mat4::IDENTITY,
            Vec3::new(0.0, 0.0, 5.0),
            Vec3::new(0.0, 0.0, -1.0),
            1e-10,
        )
        .expect("ray through the quad");
        assert_eq!(result.mesh_index, 0);
        assert_eq!(result.mesh_name, "quad");
        assert!(result.selected);
        assert!(result.model_point.abs_diff_eq(Vec3::ZERO, 1e-4));
        assert!(result.world_point.abs_diff_eq(Vec3::ZERO, 1e-4));
        assert!(scene.meshes[0].selected);
    }

    #[test]
    fn picking_twice_restores_selection_state() {
        let mut scene = scene_with_quad();
        let ray = (Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, -1.0));
        let first = resolve_pick(&mut scene, Mat4::IDENTITY, ray.0, ray.1, 1e-10).unwrap();
        assert!(first.selected);
        let second = resolve_pick(&mut scene, Mat4::IDENTITY, ray.0, ray.1, 1e-10).unwrap();
        assert!(!second.selected);
        assert!(!scene.meshes[0].selected);
    }

    #[test]
    fn nearest_mesh_wins() {
        let mut scene = SceneGraph::new();
        scene.add_mesh(quad_mesh("far", -3.0));
        scene.add_mesh(quad_mesh("near", 0.0));
        let result = resolve_pick(
            &mut scene,
            Mat4::IDENTITY,
            Vec3::new(0.0, 0.0, 5.0),
            Vec3::new(0.0, 0.0, -1.0),
            1e-10,
        )
        .unwrap();
        assert_eq!(result.mesh_name, "near");
        assert!(!scene.meshes[0].selected);
        assert!(scene.meshes[1].selected);
    }

    #[test]
    fn hidden_meshes_are_not_pickable() {
        let mut scene = scene_with_quad();
        scene.meshes[0].visible = false;
        let result = resolve_pick(
            &mut scene,
            Mat4::IDENTITY,
            Vec3::new(0.0, 0.0, 5.0),
            Vec3::new(0.0, 0.0, -1.0),
            1e-10,
        );
        assert!(result.is_none());
    }

    #[test]
    fn degenerate_model_matrix_aborts_the_pick() {
        let mut scene = scene_with_quad();
        let model = Mat4::from_scale(Vec3::splat(1e-4));
        // det = 1e-12, below the 1e-10 threshold.
        let result = resolve_pick(
            &mut scene,
            model,
            Vec3::new(0.0, 0.0, 5.0),
            Vec3::new(0.0, 0.0, -1.0),
            1e-10,
        );
        assert!(result.is_none());
        assert!(!scene.meshes[0].selected);
    }

    #[test]
    fn miss_changes_nothing() {
        let mut scene = scene_with_quad();
        let result = resolve_pick(
            &mut scene,
            Mat4::IDENTITY,
            Vec3::new(50.0, 50.0, 5.0),
            Vec3::new(0.0, 0.0, -1.0),
            1e-10,
        );
        assert!(result.is_none());
        assert!(!scene.meshes[0].selected);
    }

    #[test]
    fn world_point_maps_through_the_model_matrix() {
        let mut scene = scene_with_quad();
        let model = Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0));
        let result = resolve_pick(
            &mut scene,
            model,
            Vec3::new(10.0, 0.0, 5.0),
            Vec3::new(0.0, 0.0, -1.0),
            1e-10,
        )
        .expect("translated quad is under the ray");
        assert!(result.model_point.abs_diff_eq(Vec3::ZERO, 1e-4));
        assert!(result
            .world_point
            .abs_diff_eq(Vec3::new(10.0, 0.0, 0.0), 1e-4));
    }

    #[test]
    fn screen_center_pick_through_camera_hits_fitted_mesh() {
        let mut scene = scene_with_quad();
        scene.fit_to_view(&MeshSettings::default());
        let mut camera = Camera::new(800, 600, &CameraSettings::default());
        let result = pick(
            &mut scene,
            &mut camera,
            800,
            600,
            400.0,
            300.0,
            &InputSettings::default(),
        );
        // The fitted quad sits at the origin the camera looks at.
        let result = result.expect("center pick should hit the fitted quad");
        assert!(result.selected);
    }
}
