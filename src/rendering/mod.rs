//! Instanced cell renderer. Each frame draws the transition between two
//! adjacent ring slots, animated by the phase uniform.

use std::f32::consts::PI;

use wgpu::{
    Buffer, BufferUsages, CommandEncoderDescriptor, Device, FragmentState, LoadOp,
    MultisampleState, Operations, PipelineLayoutDescriptor, PrimitiveState, Queue,
    RenderPassColorAttachment, RenderPassDescriptor, RenderPipeline, RenderPipelineDescriptor,
    StoreOp, TextureFormat, TextureView, VertexState,
    util::{BufferInitDescriptor, DeviceExt},
};

use crate::{
    sim::{GridDimensions, ring::BufferRing},
    util::Color,
};

/// One cell quad as two triangles, inset so neighbouring cells keep a gap.
#[rustfmt::skip]
pub const CELL_VERTICES: [[f32; 2]; 6] = [
    [-0.8, -0.8], [ 0.8, -0.8], [ 0.8,  0.8],
    [-0.8, -0.8], [ 0.8,  0.8], [-0.8,  0.8],
];

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];

/// How a cell changed between the previous and current generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Born,
    Alive,
    Dying,
    Dead,
}

impl Transition {
    pub fn classify(previous: u32, current: u32) -> Self {
        match (previous != 0, current != 0) {
            (false, true) => Transition::Born,
            (true, true) => Transition::Alive,
            (true, false) => Transition::Dying,
            (false, false) => Transition::Dead,
        }
    }

    /// Quad scale; dead cells are not drawn.
    pub fn scale(self) -> f32 {
        match self {
            Transition::Dead => 0.0,
            _ => 1.0,
        }
    }

    /// Color the fragment shader produces for this transition.
    pub fn color(self, hue: Color, phase: f32) -> Color {
        match self {
            Transition::Born => Color::BASE.lerp(&hue, 0.5 * (phase * PI + PI).cos() + 0.5),
            Transition::Dying => Color::BASE.lerp(&hue, 0.5 * (phase * PI).cos() + 0.5),
            Transition::Alive => hue,
            Transition::Dead => Color::BASE,
        }
    }
}

/// Position-dependent cell color: red follows x, green follows y, blue is `1 - x`.
pub fn cell_hue(x: u32, y: u32, dims: GridDimensions) -> Color {
    let u = x as f32 / dims.width as f32;
    let v = y as f32 / dims.height as f32;
    Color::rgba(u, v, 1.0 - u, 1.0)
}

/// Grid coordinate of a draw instance.
pub fn instance_cell(instance: u32, dims: GridDimensions) -> (u32, u32) {
    (instance % dims.width, instance / dims.width)
}

pub struct CellRenderer {
    pipeline: RenderPipeline,
    vertex_buffer: Buffer,
    instances: u32,
}

impl CellRenderer {
    pub fn new(device: &Device, format: TextureFormat, ring: &BufferRing) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("cell render shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("./render.wgsl").into()),
        });

        let vertex_buffer = device.create_buffer_init(&BufferInitDescriptor {
            label: Some("cell vertices"),
            contents: bytemuck::cast_slice(&CELL_VERTICES),
            usage: BufferUsages::VERTEX,
        });

        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("cell render pipeline layout"),
            bind_group_layouts: &[ring.render_layout(), ring.phase_layout()],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("cell render pipeline"),
            layout: Some(&pipeline_layout),
            vertex: VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &VERTEX_ATTRIBUTES,
                }],
                compilation_options: Default::default(),
            },
            fragment: Some(FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: None,
            multisample: MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
            cache: None,
        });

        Self {
            pipeline,
            vertex_buffer,
            instances: ring.dims().cell_count() as u32,
        }
    }

    /// Clears `view` to the base color and draws every cell for the
    /// `previous -> current` transition at `phase`.
    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &self,
        device: &Device,
        queue: &Queue,
        view: &TextureView,
        ring: &BufferRing,
        previous: usize,
        current: usize,
        phase: f32,
    ) {
        queue.write_buffer(ring.phase_buffer(), 0, bytemuck::bytes_of(&phase));

        let mut encoder = device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("cell render encoder"),
        });

        {
            let mut render_pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("cell render pass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(Color::BASE.as_wgpu()),
                        store: StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            render_pass.set_pipeline(&self.pipeline);
            render_pass.set_bind_group(0, ring.render_bind_group(previous, current), &[]);
            render_pass.set_bind_group(1, ring.phase_bind_group(), &[]);
            render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
            render_pass.draw(0..CELL_VERTICES.len() as u32, 0..self.instances);
        }

        queue.submit(std::iter::once(encoder.finish()));
    }
}
