//! Background mesh loading.
//!
//! Disk I/O and parsing run on a worker thread; results flow back to the
//! owning thread over a channel as plain validated-ready geometry. The
//! worker never touches GPU resources or the scene: constructing the actual
//! [`crate::scene::mesh::MeshAsset`] happens on the owning thread when the
//! app drains the channel each frame. Cancellation is cooperative, checked
//! between files, and never drops results that already completed.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;

use glam::Vec3;

use crate::config::FileSettings;
use crate::scene::mesh::MeshGeometry;

/// One loader outcome per requested file, plus a terminal `Canceled`
/// marker when the batch stops early.
#[derive(Debug)]
pub enum LoadResult {
    Loaded(MeshGeometry),
    Failed { path: PathBuf, reason: String },
    Canceled,
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported mesh format: '{extension}'")]
    UnsupportedFormat { extension: String },
    #[error("file too large: {size} bytes (limit {limit})")]
    TooLarge { size: u64, limit: u64 },
    #[error("failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },
}

/// Handle to an in-flight batch load. Dropping the handle does not cancel
/// the worker; call [`LoadBatch::cancel`] for that.
pub struct LoadBatch {
    rx: Receiver<LoadResult>,
    cancel: Arc<AtomicBool>,
    finished: bool,
}

impl LoadBatch {
    /// Requests cooperative cancellation. The worker finishes the file it
    /// is on, sends a final [`LoadResult::Canceled`] and stops; results
    /// already sent stay in the channel.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Drains every result currently in the channel. Called once per frame
    /// from the owning thread.
    pub fn poll(&mut self) -> Vec<LoadResult> {
        let mut results = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(result) => results.push(result),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.finished = true;
                    break;
                }
            }
        }
        results
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

/// Starts a worker thread loading `paths` in order.
pub fn spawn_load(paths: Vec<PathBuf>, files: FileSettings) -> LoadBatch {
    let (tx, rx) = mpsc::channel();
    let cancel = Arc::new(AtomicBool::new(false));
    let worker_cancel = Arc::clone(&cancel);
    thread::Builder::new()
        .name("meshview-loader".to_string())
        .spawn(move || run_worker(&paths, &files, &tx, &worker_cancel))
        .expect("failed to spawn loader thread");
    LoadBatch {
        rx,
        cancel,
        finished: false,
    }
}

/// Worker body, separated from the thread spawn for deterministic tests.
fn run_worker(
    paths: &[PathBuf],
    files: &FileSettings,
    tx: &Sender<LoadResult>,
    cancel: &AtomicBool,
) {
    for path in paths {
        if cancel.load(Ordering::Relaxed) {
            log::info!("loader: batch canceled before {}", path.display());
            let _ = tx.send(LoadResult::Canceled);
            return;
        }
        let result = match load_mesh_file(path, files) {
            Ok(geometry) => {
                log::info!(
                    "loader: parsed '{}' ({} vertices)",
                    geometry.name,
                    geometry.vertices.len()
                );
                LoadResult::Loaded(geometry)
            }
            Err(err) => {
                log::warn!("loader: {} failed: {err}", path.display());
                LoadResult::Failed {
                    path: path.clone(),
                    reason: err.to_string(),
                }
            }
        };
        if tx.send(result).is_err() {
            // Receiver gone, nobody cares about the rest of the batch.
            return;
        }
    }
}

/// Screens and parses a single mesh file into raw geometry.
pub fn load_mesh_file(path: &Path, files: &FileSettings) -> Result<MeshGeometry, LoadError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    if !files.supported_extensions.iter().any(|e| *e == extension) {
        return Err(LoadError::UnsupportedFormat { extension });
    }

    let metadata = std::fs::metadata(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    if metadata.len() > files.max_file_size {
        return Err(LoadError::TooLarge {
            size: metadata.len(),
            limit: files.max_file_size,
        });
    }

    let name = path
        .file_name()
        .and_then(|value| value.to_str())
        .unwrap_or("mesh")
        .to_string();

    match extension.as_str() {
        "stl" => read_stl(path, name),
        "obj" => read_obj(path, name),
        other => Err(LoadError::UnsupportedFormat {
            extension: other.to_string(),
        }),
    }
}

fn read_stl(path: &Path, name: String) -> Result<MeshGeometry, LoadError> {
    let mut file = File::open(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let stl = stl_io::read_stl(&mut file).map_err(|err| LoadError::Parse {
        path: path.display().to_string(),
        reason: err.to_string(),
    })?;

    let vertices: Vec<[f32; 3]> = stl
        .vertices
        .iter()
        .map(|v| [v[0], v[1], v[2]])
        .collect();
    let indices: Vec<[u32; 3]> = stl
        .faces
        .iter()
        .map(|face| {
            [
                face.vertices[0] as u32,
                face.vertices[1] as u32,
                face.vertices[2] as u32,
            ]
        })
        .collect();
    // STL carries per-facet normals only; views want smooth shading.
    let normals = smooth_vertex_normals(&vertices, &indices);

    Ok(MeshGeometry {
        name,
        vertices,
        indices,
        normals,
    })
}

/// Minimal OBJ reader: `v` positions and `f` faces, polygons fanned into
/// triangles. Normals are resynthesized rather than trusting `vn` blocks,
/// which frequently disagree with the position indexing in the wild.
fn read_obj(path: &Path, name: String) -> Result<MeshGeometry, LoadError> {
    let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let parse_err = |reason: String| LoadError::Parse {
        path: path.display().to_string(),
        reason,
    };

    let mut vertices: Vec<[f32; 3]> = Vec::new();
    let mut indices: Vec<[u32; 3]> = Vec::new();

    for (line_number, line) in text.lines().enumerate() {
        let mut fields = line.split_whitespace();
        match fields.next() {
            Some("v") => {
                let mut coords = [0.0f32; 3];
                for coord in &mut coords {
                    let field = fields
                        .next()
                        .ok_or_else(|| parse_err(format!("short vertex at line {}", line_number + 1)))?;
                    *coord = field.parse().map_err(|_| {
                        parse_err(format!("bad vertex coordinate at line {}", line_number + 1))
                    })?;
                }
                vertices.push(coords);
            }
            Some("f") => {
                let mut face: Vec<u32> = Vec::new();
                for field in fields {
                    // "i", "i/t", "i//n" and "i/t/n" all start with the
                    // position index; negative values count from the end.
                    let position = field.split('/').next().unwrap_or(field);
                    let raw: i64 = position.parse().map_err(|_| {
                        parse_err(format!("bad face index at line {}", line_number + 1))
                    })?;
                    let resolved = if raw < 0 {
                        vertices.len() as i64 + raw
                    } else {
                        raw - 1
                    };
                    if resolved < 0 || resolved >= vertices.len() as i64 {
                        return Err(parse_err(format!(
                            "face index out of range at line {}",
                            line_number + 1
                        )));
                    }
                    face.push(resolved as u32);
                }
                if face.len() < 3 {
                    return Err(parse_err(format!(
                        "face with fewer than 3 vertices at line {}",
                        line_number + 1
                    )));
                }
                for i in 1..face.len() - 1 {
                    indices.push([face[0], face[i], face[i + 1]]);
                }
            }
            _ => {}
        }
    }

    let normals = smooth_vertex_normals(&vertices, &indices);
    Ok(MeshGeometry {
        name,
        vertices,
        indices,
        normals,
    })
}

/// Area-weighted smooth vertex normals. Isolated vertices fall back to +Z
/// so the result always passes finiteness validation.
pub fn smooth_vertex_normals(vertices: &[[f32; 3]], indices: &[[u32; 3]]) -> Vec<[f32; 3]> {
    let mut accumulated = vec![Vec3::ZERO; vertices.len()];
    for tri in indices {
        let v0 = Vec3::from(vertices[tri[0] as usize]);
        let v1 = Vec3::from(vertices[tri[1] as usize]);
        let v2 = Vec3::from(vertices[tri[2] as usize]);
        // Unnormalized cross product weights by triangle area.
        let face_normal = (v1 - v0).cross(v2 - v0);
        for &index in tri {
            accumulated[index as usize] += face_normal;
        }
    }
    accumulated
        .into_iter()
        .map(|n| {
            if n.length_squared() > 1e-12 {
                n.normalize().to_array()
            } else {
                [0.0, 0.0, 1.0]
            }
        })
        .collect()
}
