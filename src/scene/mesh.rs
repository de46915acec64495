//! Validated mesh assets.
//!
//! A [`MeshAsset`] wraps immutable vertex/index/normal buffers, a BVH for
//! ray picking, and the mutable `visible`/`selected` flags the UI toggles.
//! Construction is atomic: geometry is validated up front and a failed
//! check rejects the whole asset with a descriptive [`ValidationError`].

use glam::Vec3;

use crate::config::MeshSettings;
use crate::render::GpuMesh;
use crate::scene::bvh::{Bvh, RayHit};

/// Raw geometry as delivered by the loader collaborator.
#[derive(Debug, Clone, Default)]
pub struct MeshGeometry {
    pub name: String,
    pub vertices: Vec<[f32; 3]>,
    /// Triangle index triples. May be empty, in which case vertices are
    /// treated as an ordered triangle soup.
    pub indices: Vec<[u32; 3]>,
    /// Per-vertex normals; must match the vertex count.
    pub normals: Vec<[f32; 3]>,
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("mesh has no vertices")]
    NoVertices,
    #[error("mesh contains invalid vertex data (NaN or Inf values)")]
    NonFiniteVertex,
    #[error("mesh coordinates too large: max={max:.2e}, limit={limit:.2e}")]
    CoordinatesTooLarge { max: f32, limit: f32 },
    #[error("face indices reference non-existent vertices (index {index} >= {vertex_count})")]
    IndexOutOfRange { index: u32, vertex_count: usize },
    #[error("normal count ({normals}) doesn't match vertex count ({vertices})")]
    NormalCountMismatch { normals: usize, vertices: usize },
    #[error("mesh contains invalid normal data (NaN or Inf values)")]
    NonFiniteNormal,
}

/// An immutable mesh plus its acceleration structure and display state.
pub struct MeshAsset {
    pub name: String,
    vertices: Vec<[f32; 3]>,
    indices: Vec<[u32; 3]>,
    normals: Vec<[f32; 3]>,
    bvh: Bvh,
    pub visible: bool,
    pub selected: bool,
    /// GPU buffers, attached lazily by the renderer on the owning thread.
    pub(crate) gpu: Option<GpuMesh>,
}

impl MeshAsset {
    /// Validates the geometry and builds the BVH. Either every check passes
    /// and the asset is fully constructed, or the first failure is returned
    /// and nothing is kept.
    pub fn new(geometry: MeshGeometry, settings: &MeshSettings) -> Result<Self, ValidationError> {
        validate_geometry(&geometry, settings)?;

        let MeshGeometry {
            name,
            vertices,
            mut indices,
            normals,
        } = geometry;

        // Soup meshes get sequential indices, matching how they render.
        if indices.is_empty() {
            indices = (0..vertices.len() as u32 / 3)
                .map(|t| [t * 3, t * 3 + 1, t * 3 + 2])
                .collect();
        }

        let bvh = Bvh::build(&vertices, &indices);
        let asset = Self {
            name,
            vertices,
            indices,
            normals,
            bvh,
            visible: true,
            selected: false,
            gpu: None,
        };

        // One throwaway query from far outside the bounds forces any lazy
        // traversal state so the first real pick pays no build cost.
        let origin = Vec3::from(settings.warmup_ray_origin);
        let direction = Vec3::from(settings.warmup_ray_direction);
        let _ = asset.bvh.nearest_hit(origin, direction);

        Ok(asset)
    }

    pub fn vertices(&self) -> &[[f32; 3]] {
        &self.vertices
    }

    pub fn indices(&self) -> &[[u32; 3]] {
        &self.indices
    }

    pub fn normals(&self) -> &[[f32; 3]] {
        &self.normals
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len()
    }

    /// Axis-aligned bounds of the raw (untransformed) vertices.
    pub fn bounds(&self) -> (Vec3, Vec3) {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for v in &self.vertices {
            let p = Vec3::from(*v);
            min = min.min(p);
            max = max.max(p);
        }
        (min, max)
    }

    /// Nearest model-space ray intersection against this mesh.
    pub fn nearest_hit(&self, origin: Vec3, direction: Vec3) -> Option<RayHit> {
        self.bvh.nearest_hit(origin, direction)
    }

    /// Drops the GPU buffers ahead of removal from the scene.
    pub(crate) fn release_gpu(&mut self) {
        self.gpu = None;
    }
}

fn validate_geometry(
    geometry: &MeshGeometry,
    settings: &MeshSettings,
) -> Result<(), ValidationError> {
    if geometry.vertices.is_empty() {
        return Err(ValidationError::NoVertices);
    }

    let mut max_abs = 0.0f32;
    for v in &geometry.vertices {
        for &c in v {
            if !c.is_finite() {
                return Err(ValidationError::NonFiniteVertex);
            }
            max_abs = max_abs.max(c.abs());
        }
    }
    if max_abs > settings.max_coordinate_value {
        return Err(ValidationError::CoordinatesTooLarge {
            max: max_abs,
            limit: settings.max_coordinate_value,
        });
    }

    let vertex_count = geometry.vertices.len();
    for tri in &geometry.indices {
        for &index in tri {
            if index as usize >= vertex_count {
                return Err(ValidationError::IndexOutOfRange {
                    index,
                    vertex_count,
                });
            }
        }
    }

    if geometry.normals.len() != vertex_count {
        return Err(ValidationError::NormalCountMismatch {
            normals: geometry.normals.len(),
            vertices: vertex_count,
        });
    }
    for n in &geometry.normals {
        if n.iter().any(|c| !c.is_finite()) {
            return Err(ValidationError::NonFiniteNormal);
        }
    }

    Ok(())
}
