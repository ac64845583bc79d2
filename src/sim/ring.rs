//! Ring of four GPU-resident generations plus the uniforms and bind groups
//! that the compute and render passes read them through.
//!
//! For step `s` the compute pass reads slot `s % 4` and writes `(s + 1) % 4`,
//! while the render pass shows `(s - 1) % 4 -> s % 4`. Rendering therefore
//! lags the newest write by one generation, so a slot is never sampled while a
//! queued dispatch may still be writing it.

use wgpu::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, Buffer, BufferBindingType, BufferUsages, Device, ShaderStages,
    util::{BufferInitDescriptor, DeviceExt},
};

use crate::sim::{Generation, GridDimensions};

pub const RING_SIZE: usize = 4;

const SLOT_LABELS: [&str; RING_SIZE] = ["A", "B", "C", "D"];

/// Slot holding the generation displayed as "current" at `step`.
pub fn current_slot(step: u64) -> usize {
    (step % RING_SIZE as u64) as usize
}

/// Slot the compute pass writes at `step`.
pub fn next_slot(step: u64) -> usize {
    (current_slot(step) + 1) % RING_SIZE
}

/// Slot displayed as "previous" at `step`.
pub fn previous_slot(step: u64) -> usize {
    (current_slot(step) + RING_SIZE - 1) % RING_SIZE
}

pub struct BufferRing {
    dims: GridDimensions,
    cells: [Buffer; RING_SIZE],
    phase_buf: Buffer,
    compute_layout: BindGroupLayout,
    render_layout: BindGroupLayout,
    phase_layout: BindGroupLayout,
    /// Indexed by input slot: reads `i`, writes `i + 1`.
    compute_bind_groups: [BindGroup; RING_SIZE],
    /// Indexed by current slot: previous `i - 1`, current `i`.
    render_bind_groups: [BindGroup; RING_SIZE],
    phase_bind_group: BindGroup,
}

impl BufferRing {
    /// Allocates the ring and uploads `initial` into slot 0. Slots 1..4 start zeroed.
    pub fn new(device: &Device, initial: &Generation) -> Self {
        let dims = initial.dims;
        let cells: [Buffer; RING_SIZE] = std::array::from_fn(|slot| {
            let label = format!("cell state {}", SLOT_LABELS[slot]);
            let usage = BufferUsages::STORAGE | BufferUsages::COPY_DST | BufferUsages::COPY_SRC;
            if slot == 0 {
                device.create_buffer_init(&BufferInitDescriptor {
                    label: Some(label.as_str()),
                    contents: bytemuck::cast_slice(&initial.cells),
                    usage,
                })
            } else {
                device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(label.as_str()),
                    size: dims.generation_size(),
                    usage,
                    mapped_at_creation: false,
                })
            }
        });

        let grid_buf = device.create_buffer_init(&BufferInitDescriptor {
            label: Some("grid dimensions buffer"),
            contents: bytemuck::cast_slice(&[dims.width as f32, dims.height as f32]),
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        });

        let phase_buf = device.create_buffer_init(&BufferInitDescriptor {
            label: Some("phase buffer"),
            contents: bytemuck::bytes_of(&0.0f32),
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        });

        let compute_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("compute cells bind group layout"),
            entries: &[
                uniform_entry(0, ShaderStages::COMPUTE),
                storage_entry(1, ShaderStages::COMPUTE, true),
                storage_entry(2, ShaderStages::COMPUTE, false),
            ],
        });

        let render_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("render cells bind group layout"),
            entries: &[
                uniform_entry(0, ShaderStages::VERTEX),
                storage_entry(1, ShaderStages::VERTEX | ShaderStages::FRAGMENT, true),
                storage_entry(2, ShaderStages::VERTEX | ShaderStages::FRAGMENT, true),
            ],
        });

        let phase_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("phase bind group layout"),
            entries: &[uniform_entry(0, ShaderStages::FRAGMENT)],
        });

        let compute_bind_groups = std::array::from_fn(|input| {
            let output = (input + 1) % RING_SIZE;
            let label = format!(
                "compute bind group ({} -> {})",
                SLOT_LABELS[input], SLOT_LABELS[output]
            );
            device.create_bind_group(&BindGroupDescriptor {
                label: Some(label.as_str()),
                layout: &compute_layout,
                entries: &[
                    BindGroupEntry {
                        binding: 0,
                        resource: grid_buf.as_entire_binding(),
                    },
                    BindGroupEntry {
                        binding: 1,
                        resource: cells[input].as_entire_binding(),
                    },
                    BindGroupEntry {
                        binding: 2,
                        resource: cells[output].as_entire_binding(),
                    },
                ],
            })
        });

        let render_bind_groups = std::array::from_fn(|current| {
            let previous = (current + RING_SIZE - 1) % RING_SIZE;
            let label = format!(
                "render bind group ({} -> {})",
                SLOT_LABELS[previous], SLOT_LABELS[current]
            );
            device.create_bind_group(&BindGroupDescriptor {
                label: Some(label.as_str()),
                layout: &render_layout,
                entries: &[
                    BindGroupEntry {
                        binding: 0,
                        resource: grid_buf.as_entire_binding(),
                    },
                    BindGroupEntry {
                        binding: 1,
                        resource: cells[previous].as_entire_binding(),
                    },
                    BindGroupEntry {
                        binding: 2,
                        resource: cells[current].as_entire_binding(),
                    },
                ],
            })
        });

        let phase_bind_group = device.create_bind_group(&BindGroupDescriptor {
            label: Some("phase bind group"),
            layout: &phase_layout,
            entries: &[BindGroupEntry {
                binding: 0,
                resource: phase_buf.as_entire_binding(),
            }],
        });

        Self {
            dims,
            cells,
            phase_buf,
            compute_layout,
            render_layout,
            phase_layout,
            compute_bind_groups,
            render_bind_groups,
            phase_bind_group,
        }
    }

    pub fn dims(&self) -> GridDimensions {
        self.dims
    }

    pub fn compute_layout(&self) -> &BindGroupLayout {
        &self.compute_layout
    }

    pub fn render_layout(&self) -> &BindGroupLayout {
        &self.render_layout
    }

    pub fn phase_layout(&self) -> &BindGroupLayout {
        &self.phase_layout
    }

    /// Bind group reading `input` and writing `output`. Only adjacent pairs exist.
    pub fn compute_bind_group(&self, input: usize, output: usize) -> &BindGroup {
        debug_assert_eq!(output, (input + 1) % RING_SIZE, "compute pairs are adjacent");
        &self.compute_bind_groups[input]
    }

    /// Bind group showing the transition `previous -> current`.
    pub fn render_bind_group(&self, previous: usize, current: usize) -> &BindGroup {
        debug_assert_eq!(
            previous,
            (current + RING_SIZE - 1) % RING_SIZE,
            "render pairs are adjacent"
        );
        &self.render_bind_groups[current]
    }

    pub fn phase_bind_group(&self) -> &BindGroup {
        &self.phase_bind_group
    }

    pub fn phase_buffer(&self) -> &Buffer {
        &self.phase_buf
    }

    /// Copies one slot back to the CPU. Blocks until the GPU has caught up.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn read_slot(
        &self,
        device: &Device,
        queue: &wgpu::Queue,
        slot: usize,
    ) -> Result<Generation, anyhow::Error> {
        let size = self.dims.generation_size();
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("cell state readback buffer"),
            size,
            usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("readback encoder"),
        });
        encoder.copy_buffer_to_buffer(&self.cells[slot], 0, &staging, 0, size);
        queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |v| {
            let _ = tx.send(v);
        });
        device.poll(wgpu::PollType::wait_indefinitely())?;
        rx.recv()
            .map_err(|_| anyhow::anyhow!("readback callback dropped without mapping slot {slot}"))??;

        let cells = {
            let view = slice.get_mapped_range();
            bytemuck::cast_slice::<u8, u32>(&view[..]).to_vec()
        };
        staging.unmap();
        Ok(Generation {
            dims: self.dims,
            cells,
        })
    }
}

fn uniform_entry(binding: u32, visibility: ShaderStages) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn storage_entry(binding: u32, visibility: ShaderStages, read_only: bool) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_functions_agree() {
        for s in 0..64u64 {
            assert_eq!(next_slot(s), current_slot(s + 1));
            if s > 0 {
                assert_eq!(previous_slot(s), current_slot(s - 1));
            }
            assert!(current_slot(s) < RING_SIZE);
        }
        assert_eq!(previous_slot(0), 3);
    }

    #[test]
    fn write_never_touches_displayed_slots() {
        for s in 0..16u64 {
            let write = next_slot(s);
            assert_ne!(write, current_slot(s));
            assert_ne!(write, previous_slot(s));
        }
    }

    #[test]
    fn slots_survive_large_steps() {
        let s = u64::MAX;
        assert_eq!(current_slot(s), (s % 4) as usize);
        assert_eq!(next_slot(s), ((s % 4 + 1) % 4) as usize);
        assert_eq!(previous_slot(s), ((s - 1) % 4) as usize);
    }
}
