//! wgpu renderer for the mesh viewer.
//!
//! One solid-shaded pipeline, an optional wireframe variant (gated on
//! adapter support for line polygon fill), and a line pipeline for the
//! axis gizmo. Uniforms follow a two-group layout: group 0 holds the
//! per-frame camera data, group 1 the per-object transform and color.

pub mod gpu;

pub use gpu::GpuContext;

use glam::{Mat4, Vec3};
use wgpu::util::DeviceExt;

use crate::app::ViewOptions;
use crate::camera::Camera;
use crate::config::ViewerConfig;
use crate::scene::mesh::MeshAsset;
use crate::scene::SceneGraph;

/// Per-frame camera uniforms, mirrored in `shaders.wgsl`.
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct FrameUniforms {
    view: [[f32; 4]; 4],
    projection: [[f32; 4]; 4],
    camera_pos: [f32; 3],
    ambient_strength: f32,
}

/// Per-object uniforms. Three instances live on the GPU each frame, one
/// per bind group (default meshes, selected meshes, axis gizmo), so a
/// single render pass never rewrites a buffer between draws.
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct ObjectUniforms {
    model: [[f32; 4]; 4],
    normal_matrix: [[f32; 4]; 4],
    color: [f32; 4],
}

/// Interleaved position + normal, 24 bytes per vertex.
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct MeshVertex {
    position: [f32; 3],
    normal: [f32; 3],
}

impl MeshVertex {
    const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3],
    };
}

/// Position + color vertex for the axis gizmo lines.
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct LineVertex {
    position: [f32; 3],
    color: [f32; 3],
}

impl LineVertex {
    const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<LineVertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3],
    };
}

/// Unit axis lines from the origin: X red, Y green, Z blue. Scaled to the
/// fitted scene size at draw time through the object uniform's model matrix.
const AXIS_VERTICES: [LineVertex; 6] = [
    LineVertex { position: [0.0, 0.0, 0.0], color: [1.0, 0.2, 0.2] },
    LineVertex { position: [1.0, 0.0, 0.0], color: [1.0, 0.2, 0.2] },
    LineVertex { position: [0.0, 0.0, 0.0], color: [0.2, 1.0, 0.2] },
    LineVertex { position: [0.0, 1.0, 0.0], color: [0.2, 1.0, 0.2] },
    LineVertex { position: [0.0, 0.0, 0.0], color: [0.3, 0.5, 1.0] },
    LineVertex { position: [0.0, 0.0, 1.0], color: [0.3, 0.5, 1.0] },
];

/// GPU-resident geometry for one mesh asset. Created lazily by the
/// renderer the first frame the asset is visible and dropped through
/// [`MeshAsset::release_gpu`] when the asset leaves the scene.
pub struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

impl GpuMesh {
    fn upload(gpu: &GpuContext, mesh: &MeshAsset) -> Self {
        let vertices: Vec<MeshVertex> = mesh
            .vertices()
            .iter()
            .zip(mesh.normals())
            .map(|(&position, &normal)| MeshVertex { position, normal })
            .collect();
        let indices: Vec<u32> = mesh.indices().iter().flatten().copied().collect();

        let vertex_buffer = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("mesh vertices"),
                contents: bytemuck::cast_slice(&vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let index_buffer = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("mesh indices"),
                contents: bytemuck::cast_slice(&indices),
                usage: wgpu::BufferUsages::INDEX,
            });

        Self {
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
        }
    }
}

pub struct Renderer {
    solid_pipeline: wgpu::RenderPipeline,
    /// Present only when the adapter supports `POLYGON_MODE_LINE`.
    wireframe_pipeline: Option<wgpu::RenderPipeline>,
    line_pipeline: wgpu::RenderPipeline,
    frame_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    default_object: ObjectBinding,
    selected_object: ObjectBinding,
    axes_object: ObjectBinding,
    axis_vertex_buffer: wgpu::Buffer,
    depth_view: wgpu::TextureView,
    depth_size: (u32, u32),
}

/// A uniform buffer paired with its bind group.
struct ObjectBinding {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl ObjectBinding {
    fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, label: &str) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: std::mem::size_of::<ObjectUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });
        Self { buffer, bind_group }
    }

    fn write(&self, queue: &wgpu::Queue, model: Mat4, color: [f32; 3]) {
        let uniforms = ObjectUniforms {
            model: model.to_cols_array_2d(),
            normal_matrix: model.inverse().transpose().to_cols_array_2d(),
            color: [color[0], color[1], color[2], 1.0],
        };
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[uniforms]));
    }
}

impl Renderer {
    pub fn new(gpu: &GpuContext) -> Self {
        let device = &gpu.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("viewer shaders"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders.wgsl").into()),
        });

        let uniform_layout_entry = wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("frame uniforms layout"),
            entries: &[uniform_layout_entry],
        });
        let object_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("object uniforms layout"),
            entries: &[uniform_layout_entry],
        });

        let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frame uniforms"),
            size: std::mem::size_of::<FrameUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("frame uniforms"),
            layout: &frame_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_buffer.as_entire_binding(),
            }],
        });

        let default_object = ObjectBinding::new(device, &object_layout, "default mesh uniforms");
        let selected_object = ObjectBinding::new(device, &object_layout, "selected mesh uniforms");
        let axes_object = ObjectBinding::new(device, &object_layout, "axis gizmo uniforms");

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("viewer pipeline layout"),
            bind_group_layouts: &[&frame_layout, &object_layout],
            push_constant_ranges: &[],
        });

        let mesh_pipeline = |label: &str, polygon_mode: wgpu::PolygonMode| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_mesh"),
                    buffers: &[MeshVertex::LAYOUT],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_mesh"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: gpu.config.format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    // Imported meshes often carry inconsistent winding, so
                    // an inspection tool renders both faces.
                    cull_mode: None,
                    polygon_mode,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: wgpu::TextureFormat::Depth32Float,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        };

        let solid_pipeline = mesh_pipeline("solid mesh pipeline", wgpu::PolygonMode::Fill);
        let wireframe_pipeline = gpu
            .supports_wireframe
            .then(|| mesh_pipeline("wireframe mesh pipeline", wgpu::PolygonMode::Line));

        let line_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("axis line pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_line"),
                buffers: &[LineVertex::LAYOUT],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_line"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: gpu.config.format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::LineList,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: wgpu::TextureFormat::Depth32Float,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let axis_vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("axis gizmo vertices"),
            contents: bytemuck::cast_slice(&AXIS_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let depth_view = create_depth_view(gpu);

        Self {
            solid_pipeline,
            wireframe_pipeline,
            line_pipeline,
            frame_buffer,
            frame_bind_group,
            default_object,
            selected_object,
            axes_object,
            axis_vertex_buffer,
            depth_view,
            depth_size: (gpu.width(), gpu.height()),
        }
    }

    fn ensure_depth_size(&mut self, gpu: &GpuContext) {
        if self.depth_size != (gpu.width(), gpu.height()) {
            self.depth_view = create_depth_view(gpu);
            self.depth_size = (gpu.width(), gpu.height());
        }
    }

    /// Draws one frame. `SurfaceError::Lost` and `Outdated` are returned to
    /// the caller, which reconfigures the surface and retries next frame.
    pub fn render(
        &mut self,
        gpu: &GpuContext,
        scene: &mut SceneGraph,
        camera: &mut Camera,
        options: &ViewOptions,
        config: &ViewerConfig,
    ) -> Result<(), wgpu::SurfaceError> {
        self.ensure_depth_size(gpu);

        for mesh in &mut scene.meshes {
            if mesh.visible && mesh.gpu.is_none() {
                let uploaded = GpuMesh::upload(gpu, mesh);
                mesh.gpu = Some(uploaded);
            }
        }

        let frame_uniforms = FrameUniforms {
            view: camera.get_view_matrix().to_cols_array_2d(),
            projection: camera.get_projection_matrix().to_cols_array_2d(),
            camera_pos: camera.position().to_array(),
            ambient_strength: config.render.ambient_strength,
        };
        gpu.queue
            .write_buffer(&self.frame_buffer, 0, bytemuck::cast_slice(&[frame_uniforms]));

        let model = scene.model_matrix();
        self.default_object
            .write(&gpu.queue, model, config.render.default_mesh_color);
        self.selected_object
            .write(&gpu.queue, model, config.render.selected_mesh_color);

        // The gizmo shares the scene's rotation and translation but is
        // anchored at the pivot and scaled to the fitted extent.
        let axis_model = Mat4::from_translation(scene.translation)
            * Mat4::from_quat(scene.rotation)
            * Mat4::from_scale(Vec3::splat(
                scene.scale * config.render.axis_scale_multiplier,
            ));
        self.axes_object
            .write(&gpu.queue, axis_model, [1.0, 1.0, 1.0]);

        let frame = gpu.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame encoder"),
            });

        {
            let bg = config.render.background_color;
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("viewer pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: bg[0] as f64,
                            g: bg[1] as f64,
                            b: bg[2] as f64,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            let mesh_pipeline = match (&self.wireframe_pipeline, options.wireframe) {
                (Some(wire), true) => wire,
                _ => &self.solid_pipeline,
            };
            pass.set_pipeline(mesh_pipeline);
            pass.set_bind_group(0, &self.frame_bind_group, &[]);

            for mesh in scene.meshes.iter().filter(|m| m.visible) {
                let Some(buffers) = mesh.gpu.as_ref() else {
                    continue;
                };
                let object = if mesh.selected {
                    &self.selected_object
                } else {
                    &self.default_object
                };
                pass.set_bind_group(1, &object.bind_group, &[]);
                pass.set_vertex_buffer(0, buffers.vertex_buffer.slice(..));
                pass.set_index_buffer(buffers.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..buffers.index_count, 0, 0..1);
            }

            if options.show_axes {
                pass.set_pipeline(&self.line_pipeline);
                pass.set_bind_group(1, &self.axes_object.bind_group, &[]);
                pass.set_vertex_buffer(0, self.axis_vertex_buffer.slice(..));
                pass.draw(0..AXIS_VERTICES.len() as u32, 0..1);
            }
        }

        gpu.queue.submit(std::iter::once(encoder.finish()));
        frame.present();

        Ok(())
    }
}

fn create_depth_view(gpu: &GpuContext) -> wgpu::TextureView {
    let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("depth texture"),
        size: wgpu::Extent3d {
            width: gpu.width(),
            height: gpu.height(),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Depth32Float,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}
