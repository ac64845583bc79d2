//! Device acquisition and the integrated renderer that owns one simulation
//! instance: surface, buffer ring, compute and render pipelines, step clock.
//!
//! Everything here is built once and replaced wholesale when the grid changes.

use std::sync::Arc;

use wgpu::{
    Adapter, CompositeAlphaMode, Device, Instance, Queue, Surface, SurfaceConfiguration,
    TextureUsages, TextureViewDescriptor,
};
use winit::window::Window;

use crate::{
    clock::StepClock,
    config::LifeConfig,
    rendering::CellRenderer,
    sim::{Generation, GridDimensions, gpucompute::SimulationPipeline, ring::BufferRing},
    util,
};

/// Fatal initialization failures. Missing GPU capability is not transient, so
/// none of these are retried.
#[derive(Debug, thiserror::Error)]
pub enum GpuInitError {
    #[error("no usable GPU device: {0}")]
    DeviceUnavailable(String),
    #[error("surface cannot be configured: {0}")]
    SurfaceConfiguration(String),
}

/// Adapter, device and queue shared by the compute and render passes.
pub struct GpuContext {
    pub instance: Instance,
    pub adapter: Adapter,
    pub device: Arc<Device>,
    pub queue: Arc<Queue>,
}

impl GpuContext {
    /// Acquires a device without a presentation surface.
    pub async fn headless() -> Result<Self, GpuInitError> {
        let instance = Instance::new(&wgpu::InstanceDescriptor::default());
        Self::request(instance, None).await
    }

    async fn request(
        instance: Instance,
        compatible_surface: Option<&Surface<'_>>,
    ) -> Result<Self, GpuInitError> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface,
            })
            .await
            .map_err(|e| GpuInitError::DeviceUnavailable(e.to_string()))?;

        log::info!("Using adapter: {:?}", adapter.get_info());

        // Compute for the simulation, storage reads in the vertex stage for rendering.
        let required = wgpu::DownlevelFlags::COMPUTE_SHADERS | wgpu::DownlevelFlags::VERTEX_STORAGE;
        let downlevel_caps = adapter.get_downlevel_capabilities();
        if !downlevel_caps.flags.contains(required) {
            return Err(GpuInitError::DeviceUnavailable(format!(
                "adapter lacks {:?}",
                required.difference(downlevel_caps.flags)
            )));
        }

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("lifesim device"),
                required_features: wgpu::Features::empty(),
                required_limits: adapter.limits(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::MemoryUsage,
                trace: wgpu::Trace::Off,
            })
            .await
            .map_err(|e| GpuInitError::DeviceUnavailable(e.to_string()))?;

        Ok(Self {
            instance,
            adapter,
            device: Arc::new(device),
            queue: Arc::new(queue),
        })
    }

    /// Binds `surface` to the device with the platform's preferred format and
    /// opaque compositing.
    pub fn configure_surface(
        &self,
        surface: &Surface<'_>,
        width: u32,
        height: u32,
    ) -> Result<SurfaceConfiguration, GpuInitError> {
        let caps = surface.get_capabilities(&self.adapter);
        // The first reported format is the preferred one.
        let format = caps.formats.first().copied().ok_or_else(|| {
            GpuInitError::SurfaceConfiguration("surface reports no formats for this adapter".into())
        })?;
        let alpha_mode = if caps.alpha_modes.contains(&CompositeAlphaMode::Opaque) {
            CompositeAlphaMode::Opaque
        } else {
            let fallback = caps.alpha_modes.first().copied().ok_or_else(|| {
                GpuInitError::SurfaceConfiguration("surface reports no alpha modes".into())
            })?;
            log::warn!("opaque compositing unsupported, using {fallback:?}");
            fallback
        };

        let surface_config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&self.device, &surface_config);
        Ok(surface_config)
    }
}

/// One running simulation: the GPU side of both clocks.
pub struct GpuLifeRenderer {
    gpu: GpuContext,
    surface: Surface<'static>,
    surface_config: SurfaceConfiguration,
    ring: BufferRing,
    simulation: SimulationPipeline,
    cells: CellRenderer,
    clock: StepClock,
    window: Arc<Window>,
}

impl GpuLifeRenderer {
    /// Acquires the device, seeds the first generation and builds every GPU
    /// resource for one instance.
    pub async fn new(window: Arc<Window>, config: &LifeConfig) -> Result<Self, GpuInitError> {
        let instance = Instance::new(&wgpu::InstanceDescriptor::default());

        // Create surface first to find compatible adapter
        let surface = instance
            .create_surface(window.clone())
            .map_err(|e| GpuInitError::SurfaceConfiguration(e.to_string()))?;

        let gpu = GpuContext::request(instance, Some(&surface)).await?;

        let size = window.inner_size();
        let surface_config = gpu.configure_surface(&surface, size.width, size.height)?;

        let dims = config.grid_dimensions((size.width, size.height));
        let ring = {
            let initial = Generation::seed(dims, &config.initial_state);
            log::info!(
                "Seeded {}x{} grid with {} live cells",
                dims.width,
                dims.height,
                initial.live_count()
            );
            BufferRing::new(&gpu.device, &initial)
        };
        let simulation = SimulationPipeline::new(&gpu.device, &ring);
        let cells = CellRenderer::new(&gpu.device, surface_config.format, &ring);

        log::info!(
            "Simulation ticks every {} ({} per fade cycle)",
            humantime::format_duration(config.tick_period()),
            humantime::format_duration(config.tick_interval)
        );

        Ok(Self {
            gpu,
            surface,
            surface_config,
            ring,
            simulation,
            cells,
            clock: StepClock::new(util::now_ms(), config.tick_interval),
            window,
        })
    }

    /// Starts the phase clock and computes the generation after the seed so
    /// that step 1 has something to show. Call right before the tick timer starts.
    pub fn prime(&mut self) {
        self.clock.restart(util::now_ms());
        self.dispatch(self.clock.step());
    }

    /// Simulation clock callback: advance the counter, then queue the compute
    /// pass for the new step.
    pub fn tick(&self) {
        let step = self.clock.advance();
        log::trace!("tick {step}");
        self.dispatch(step);
    }

    fn dispatch(&self, step: u64) {
        let (input, output) = StepClock::compute_slots(step);
        self.simulation
            .step(&self.gpu.device, &self.gpu.queue, &self.ring, input, output);
    }

    /// Render clock callback: draw the transition for the current step at the
    /// current phase.
    pub fn render_frame(&self) -> Result<(), wgpu::SurfaceError> {
        let step = self.clock.step();
        let phase = self.clock.phase(util::now_ms(), step);
        let (previous, current) = StepClock::display_slots(step);

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&TextureViewDescriptor::default());

        self.cells.render(
            &self.gpu.device,
            &self.gpu.queue,
            &view,
            &self.ring,
            previous,
            current,
            phase,
        );

        output.present();
        Ok(())
    }

    /// Reconfigures the surface. Grid and buffers are untouched.
    pub fn resize_surface(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.surface_config.width = width;
            self.surface_config.height = height;
            self.surface.configure(&self.gpu.device, &self.surface_config);
        }
    }

    /// Request a redraw of the window
    /// Call this after rendering to keep the animation loop going
    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }

    pub fn dimensions(&self) -> GridDimensions {
        self.ring.dims()
    }

    pub fn surface_size(&self) -> (u32, u32) {
        (self.surface_config.width, self.surface_config.height)
    }

    pub fn steps(&self) -> u64 {
        self.clock.step()
    }
}
