//! Window lifecycle and event routing.
//!
//! `App` owns everything with a lifetime: window, GPU context, renderer,
//! scene, camera and the in-flight load batch. Window events are routed to
//! the [`input::InputMapper`], which mutates the scene transform; the
//! camera stays fixed apart from viewport changes.

pub mod input;

use std::path::PathBuf;
use std::sync::Arc;

use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowAttributes, WindowId};

use crate::assets::{self, LoadBatch, LoadResult};
use crate::camera::Camera;
use crate::config::ViewerConfig;
use crate::render::{GpuContext, Renderer};
use crate::scene::mesh::MeshAsset;
use crate::scene::SceneGraph;
use input::{InputMapper, PointerButton};

/// A left release after less than this much pointer travel counts as a
/// click (pick) rather than the end of an orbit drag.
const CLICK_TRAVEL_THRESHOLD: f32 = 3.0;

/// Display toggles driven from the keyboard.
#[derive(Debug, Clone, Copy)]
pub struct ViewOptions {
    pub wireframe: bool,
    pub show_axes: bool,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            wireframe: false,
            show_axes: true,
        }
    }
}

pub struct App {
    config: ViewerConfig,
    paths: Vec<PathBuf>,
    window: Option<Arc<Window>>,
    gpu: Option<GpuContext>,
    renderer: Option<Renderer>,
    camera: Camera,
    scene: SceneGraph,
    input: InputMapper,
    options: ViewOptions,
    load: Option<LoadBatch>,
    cursor: (f32, f32),
    /// Pointer travel since the last left press, for click detection.
    drag_travel: f32,
}

impl App {
    pub fn new(config: ViewerConfig, paths: Vec<PathBuf>) -> Self {
        let camera = Camera::new(1280, 720, &config.camera);
        Self {
            config,
            paths,
            window: None,
            gpu: None,
            renderer: None,
            camera,
            scene: SceneGraph::new(),
            input: InputMapper::new(),
            options: ViewOptions::default(),
            load: None,
            cursor: (0.0, 0.0),
            drag_travel: 0.0,
        }
    }

    fn handle_key(&mut self, code: KeyCode, event_loop: &ActiveEventLoop) {
        match code {
            KeyCode::Escape => {
                if let Some(batch) = &self.load {
                    batch.cancel();
                }
                event_loop.exit();
            }
            KeyCode::KeyW => {
                self.options.wireframe = !self.options.wireframe;
                if self.options.wireframe
                    && self.gpu.as_ref().is_some_and(|g| !g.supports_wireframe)
                {
                    log::warn!("wireframe unsupported on this adapter, rendering solid");
                }
                log::debug!("wireframe: {}", self.options.wireframe);
            }
            KeyCode::KeyA => {
                self.options.show_axes = !self.options.show_axes;
                log::debug!("axes: {}", self.options.show_axes);
            }
            KeyCode::KeyR => {
                self.reset_view();
                log::info!("view reset");
            }
            KeyCode::Delete | KeyCode::KeyX => {
                let removed = self.scene.remove_selected();
                if removed > 0 {
                    log::info!("removed {} selected mesh(es)", removed);
                    self.reset_view();
                }
            }
            KeyCode::KeyC => {
                let count = self.scene.meshes.len();
                self.scene.clear();
                self.reset_view();
                if count > 0 {
                    log::info!("cleared {} mesh(es)", count);
                }
            }
            _ => {}
        }
    }

    /// Reframes the scene and pulls the camera back far enough to clear
    /// the fitted bounds. The single framing path, run after loads,
    /// deletes, clears and explicit resets.
    fn reset_view(&mut self) {
        let scale = self.scene.fit_to_view(&self.config.mesh);
        self.camera
            .set_zoom(scale * self.config.camera.reset_zoom_multiplier);
    }

    /// Drains finished loader results into the scene. Fits the view once
    /// the whole batch is done so partial loads don't make the camera jump
    /// per file.
    fn drain_loader(&mut self) {
        let Some(batch) = &mut self.load else {
            return;
        };

        for result in batch.poll() {
            match result {
                LoadResult::Loaded(geometry) => {
                    let name = geometry.name.clone();
                    match MeshAsset::new(geometry, &self.config.mesh) {
                        Ok(asset) => {
                            log::info!("loaded {} ({} triangles)", name, asset.triangle_count());
                            self.scene.add_mesh(asset);
                        }
                        Err(err) => log::warn!("rejected {}: {}", name, err),
                    }
                }
                LoadResult::Failed { path, reason } => {
                    log::warn!("failed to load {}: {}", path.display(), reason);
                }
                LoadResult::Canceled => log::info!("mesh loading canceled"),
            }
        }

        if batch.is_finished() {
            self.load = None;
            if !self.scene.meshes.is_empty() {
                self.reset_view();
                log::info!(
                    "fit {} mesh(es), scene scale {:.3}, zoom {:.3}",
                    self.scene.meshes.len(),
                    self.scene.scale,
                    self.camera.zoom()
                );
            }
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        self.drain_loader();

        let (Some(gpu), Some(renderer)) = (&mut self.gpu, &mut self.renderer) else {
            return;
        };
        match renderer.render(
            gpu,
            &mut self.scene,
            &mut self.camera,
            &self.options,
            &self.config,
        ) {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let (w, h) = (gpu.width(), gpu.height());
                gpu.resize(w, h);
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("out of GPU memory, exiting");
                event_loop.exit();
            }
            Err(err) => log::warn!("surface error: {err:?}"),
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attrs = WindowAttributes::default()
            .with_title("meshview")
            .with_inner_size(PhysicalSize::new(1280u32, 720u32))
            .with_resizable(true);

        let window = Arc::new(
            event_loop
                .create_window(window_attrs)
                .expect("Failed to create window"),
        );

        let gpu = GpuContext::new(window.clone());
        let renderer = Renderer::new(&gpu);
        self.camera.set_viewport(gpu.width(), gpu.height());
        self.gpu = Some(gpu);
        self.renderer = Some(renderer);
        self.window = Some(window);

        if !self.paths.is_empty() {
            let paths = std::mem::take(&mut self.paths);
            log::info!("loading {} file(s) in the background", paths.len());
            self.load = Some(assets::spawn_load(paths, self.config.files.clone()));
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                if let Some(batch) = &self.load {
                    batch.cancel();
                }
                event_loop.exit();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed && !event.repeat {
                    if let PhysicalKey::Code(code) = event.physical_key {
                        self.handle_key(code, event_loop);
                    }
                }
            }
            WindowEvent::Resized(new_size) => {
                if let Some(gpu) = &mut self.gpu {
                    gpu.resize(new_size.width, new_size.height);
                }
                self.camera.set_viewport(new_size.width, new_size.height);
            }
            WindowEvent::CursorMoved { position, .. } => {
                let (x, y) = (position.x as f32, position.y as f32);
                if self.input.is_dragging() {
                    let (px, py) = self.cursor;
                    self.drag_travel += ((x - px).powi(2) + (y - py).powi(2)).sqrt();
                    self.input
                        .on_drag(&mut self.scene, &mut self.camera, x, y, &self.config.input);
                }
                self.cursor = (x, y);
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let button = match button {
                    MouseButton::Left => PointerButton::Left,
                    MouseButton::Right => PointerButton::Right,
                    _ => return,
                };
                let pressed = state == ElementState::Pressed;
                let (x, y) = self.cursor;
                self.input.on_button(button, pressed, x, y);

                if pressed {
                    self.drag_travel = 0.0;
                } else if button == PointerButton::Left
                    && self.drag_travel < CLICK_TRAVEL_THRESHOLD
                {
                    if let Some(gpu) = &self.gpu {
                        let (w, h) = (gpu.width(), gpu.height());
                        self.input.on_pick(
                            &mut self.scene,
                            &mut self.camera,
                            w,
                            h,
                            x,
                            y,
                            &self.config.input,
                        );
                    }
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let steps = wheel_steps(delta);
                self.input
                    .on_wheel(&mut self.scene, &mut self.camera, steps, &self.config.input);
            }
            WindowEvent::RedrawRequested => {
                self.redraw(event_loop);
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

/// Converts a winit scroll delta into dolly steps. The sign is flipped:
/// winit reports scroll-up as positive, and scroll-up must pull the scene
/// toward the camera (negative delta in [`InputMapper::on_wheel`] terms).
fn wheel_steps(delta: MouseScrollDelta) -> f32 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => -y,
        // Touchpads report pixels; one wheel line is roughly 40.
        MouseScrollDelta::PixelDelta(pos) => -(pos.y as f32) / 40.0,
    }
}

pub fn run(paths: Vec<PathBuf>) {
    let config = ViewerConfig::default();

    let event_loop = EventLoop::new().expect("Failed to create event loop");
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config, paths);
    event_loop.run_app(&mut app).expect("Event loop error");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::mesh::MeshGeometry;
    use winit::dpi::PhysicalPosition;

    fn cube_mesh(half_extent: f32) -> MeshAsset {
        let h = half_extent;
        // Two opposing corner triangles pin the bounds.
        let geometry = MeshGeometry {
            name: "cube".to_string(),
            vertices: vec![
                [-h, -h, -h],
                [h, -h, -h],
                [-h, h, -h],
                [h, h, h],
                [-h, h, h],
                [h, -h, h],
            ],
            indices: vec![[0, 1, 2], [3, 4, 5]],
            normals: vec![[0.0, 0.0, 1.0]; 6],
        };
        MeshAsset::new(geometry, &crate::config::MeshSettings::default()).expect("valid cube")
    }

    #[test]
    fn reset_view_pulls_the_eye_clear_of_large_scenes() {
        let mut app = App::new(ViewerConfig::default(), Vec::new());
        app.scene.add_mesh(cube_mesh(50.0));

        app.reset_view();

        // 100-unit cube: scale 100, zoom 100 * 5.0, eye well outside the
        // 50-unit half extent.
        assert_eq!(app.scene.scale, 100.0);
        assert_eq!(app.camera.zoom(), 500.0);
        assert!(app.camera.position().length() > 50.0);
    }

    #[test]
    fn reset_view_on_empty_scene_restores_default_zoom() {
        let mut app = App::new(ViewerConfig::default(), Vec::new());
        app.reset_view();
        assert_eq!(app.camera.zoom(), app.config.camera.reset_zoom_multiplier);
    }

    #[test]
    fn reset_view_reframes_after_removal() {
        let mut app = App::new(ViewerConfig::default(), Vec::new());
        app.scene.add_mesh(cube_mesh(50.0));
        app.scene.add_mesh(cube_mesh(1.0));
        app.reset_view();
        assert_eq!(app.scene.scale, 100.0);

        app.scene.meshes[0].selected = true;
        app.scene.remove_selected();
        app.reset_view();

        assert_eq!(app.scene.scale, 2.0);
        assert_eq!(app.camera.zoom(), 10.0);
    }

    #[test]
    fn scroll_up_maps_to_negative_dolly_steps() {
        assert_eq!(wheel_steps(MouseScrollDelta::LineDelta(0.0, 1.0)), -1.0);
        assert_eq!(wheel_steps(MouseScrollDelta::LineDelta(0.0, -2.0)), 2.0);
        let pixels = MouseScrollDelta::PixelDelta(PhysicalPosition::new(0.0, 80.0));
        assert_eq!(wheel_steps(pixels), -2.0);
    }
}
