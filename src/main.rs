//! meshview - interactive 3D mesh inspection
//!
//! Loads STL/OBJ files given on the command line into a single scene,
//! fits them to view, and lets the user orbit, pan, zoom and pick.

mod app;
mod assets;
mod camera;
mod config;
mod pick;
mod render;
mod scene;

use std::path::PathBuf;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let paths: Vec<PathBuf> = std::env::args().skip(1).map(PathBuf::from).collect();
    if paths.is_empty() {
        log::info!("no files given; usage: meshview <mesh.stl> [mesh.obj ...]");
    }

    app::run(paths);
}
