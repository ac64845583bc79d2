use wgpu::{
    CommandEncoderDescriptor, ComputePassDescriptor, ComputePipeline, Device,
    PipelineLayoutDescriptor, Queue,
};

use crate::sim::{GridDimensions, ring::BufferRing};

/// Side length of the square compute workgroup. Must match `shader.wgsl`.
pub const WORKGROUP_SIZE: u32 = 10;

/// Compute pipeline advancing one ring slot to the next with the Conway rule.
pub struct SimulationPipeline {
    pipeline: ComputePipeline,
    dims: GridDimensions,
}

impl SimulationPipeline {
    pub fn new(device: &Device, ring: &BufferRing) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("life simulation shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("./shader.wgsl").into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("simulation pipeline layout"),
            bind_group_layouts: &[ring.compute_layout()],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("simulation compute pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("cs_main"),
            compilation_options: Default::default(),
            cache: None,
        });

        Self {
            pipeline,
            dims: ring.dims(),
        }
    }

    /// Workgroups per axis, rounded up so partial edge tiles are covered.
    pub fn workgroup_counts(dims: GridDimensions) -> (u32, u32) {
        (
            dims.width.div_ceil(WORKGROUP_SIZE),
            dims.height.div_ceil(WORKGROUP_SIZE),
        )
    }

    /// Queues one generation: overwrites `output` from `input`, which stays untouched.
    pub fn step(&self, device: &Device, queue: &Queue, ring: &BufferRing, input: usize, output: usize) {
        let (groups_x, groups_y) = Self::workgroup_counts(self.dims);

        let mut encoder = device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("simulation step encoder"),
        });

        {
            let mut pass = encoder.begin_compute_pass(&ComputePassDescriptor {
                label: Some("simulation step compute pass"),
                ..Default::default()
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, ring.compute_bind_group(input, output), &[]);
            pass.dispatch_workgroups(groups_x, groups_y, 1);
        }

        queue.submit(std::iter::once(encoder.finish()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workgroups_cover_partial_tiles() {
        assert_eq!(SimulationPipeline::workgroup_counts(GridDimensions::new(10, 10)), (1, 1));
        assert_eq!(SimulationPipeline::workgroup_counts(GridDimensions::new(4, 4)), (1, 1));
        assert_eq!(SimulationPipeline::workgroup_counts(GridDimensions::new(21, 30)), (3, 3));
        assert_eq!(SimulationPipeline::workgroup_counts(GridDimensions::new(101, 1)), (11, 1));
    }
}
