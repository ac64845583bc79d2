use std::sync::Arc;

use wasm_bindgen::prelude::*;
use winit::{
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    window::{Window, WindowAttributes},
};

#[cfg(target_arch = "wasm32")]
use web_sys::HtmlCanvasElement;
#[cfg(target_arch = "wasm32")]
use winit::platform::web::WindowAttributesExtWebSys;

use crate::{clock::Ticker, config::LifeConfig, gpu::GpuLifeRenderer, sim::InitialState};

pub mod clock;
pub mod config;
pub mod gpu;
pub mod rendering;
pub mod sim;
pub mod util;

/// Events delivered to the winit event loop.
///
/// `epoch` identifies the simulation instance a message belongs to; anything
/// from an instance that has since been torn down is dropped.
pub enum LifeMessage {
    Initialized {
        epoch: u64,
        renderer: Box<GpuLifeRenderer>,
    },
    Error {
        epoch: u64,
        message: String,
    },
    Tick {
        epoch: u64,
    },
    Destroy,
}

impl LifeMessage {
    /// Instance the message belongs to. `Destroy` addresses whichever one is running.
    pub fn epoch(&self) -> Option<u64> {
        match self {
            LifeMessage::Initialized { epoch, .. }
            | LifeMessage::Error { epoch, .. }
            | LifeMessage::Tick { epoch } => Some(*epoch),
            LifeMessage::Destroy => None,
        }
    }

    /// True when the message comes from an instance other than `current`.
    pub fn is_stale(&self, current: u64) -> bool {
        self.epoch().is_some_and(|epoch| epoch != current)
    }
}

/// What a window resize does to the running instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResizeAction {
    Ignore,
    /// Tear everything down and build a new grid for the new viewport.
    Rebuild,
    /// Keep the grid, only reconfigure the surface.
    Reconfigure,
}

pub fn resize_action(track_window: bool, current: (u32, u32), new: (u32, u32)) -> ResizeAction {
    if new.0 == 0 || new.1 == 0 || new == current {
        ResizeAction::Ignore
    } else if track_window {
        ResizeAction::Rebuild
    } else {
        ResizeAction::Reconfigure
    }
}

struct Application {
    config: LifeConfig,
    proxy: EventLoopProxy<LifeMessage>,
    window: Option<Arc<Window>>,
    renderer: Option<GpuLifeRenderer>,
    ticker: Option<Ticker>,
    epoch: u64,
    /// Set when initialization fails; there is no retry.
    #[cfg_attr(target_arch = "wasm32", allow(dead_code))]
    fatal: Option<String>,
    #[cfg(target_arch = "wasm32")]
    canvas_id: String,
}

impl Application {
    fn new(event_loop: &EventLoop<LifeMessage>, config: LifeConfig) -> Self {
        Self {
            config: config.normalized(),
            proxy: event_loop.create_proxy(),
            window: None,
            renderer: None,
            ticker: None,
            epoch: 0,
            fatal: None,
            #[cfg(target_arch = "wasm32")]
            canvas_id: String::from("life-surface"),
        }
    }

    #[cfg(target_arch = "wasm32")]
    fn window_attributes(&self) -> Result<WindowAttributes, String> {
        let dom_window = web_sys::window().ok_or("No window")?;
        let canvas: HtmlCanvasElement = dom_window
            .document()
            .ok_or("No document")?
            .get_element_by_id(&self.canvas_id)
            .ok_or_else(|| format!("could not get element with id `{}`", self.canvas_id))?
            .dyn_into()
            .map_err(|_| format!("`{}` is not a canvas", self.canvas_id))?;

        let (width, height) = if self.config.track_window {
            let px = |v: Result<JsValue, JsValue>| {
                v.ok().and_then(|v| v.as_f64()).unwrap_or(0.0) as u32
            };
            (px(dom_window.inner_width()), px(dom_window.inner_height()))
        } else {
            (self.config.canvas_width, self.config.canvas_height)
        };
        canvas.set_width(width.max(1));
        canvas.set_height(height.max(1));

        Ok(WindowAttributes::default().with_canvas(Some(canvas)))
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn window_attributes(&self) -> Result<WindowAttributes, String> {
        Ok(WindowAttributes::default()
            .with_title("lifesim")
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.canvas_width,
                self.config.canvas_height,
            )))
    }

    /// Starts building a fresh instance for the current window. The result
    /// arrives as `LifeMessage::Initialized` or `LifeMessage::Error`.
    fn spawn_instance(&mut self) {
        let Some(window) = self.window.clone() else {
            return;
        };
        self.epoch += 1;
        let epoch = self.epoch;
        let config = self.config.clone();
        let proxy = self.proxy.clone();

        let init = async move {
            let message = match GpuLifeRenderer::new(window, &config).await {
                Ok(renderer) => LifeMessage::Initialized {
                    epoch,
                    renderer: Box::new(renderer),
                },
                Err(e) => LifeMessage::Error {
                    epoch,
                    message: e.to_string(),
                },
            };
            let _ = proxy.send_event(message);
        };

        #[cfg(target_arch = "wasm32")]
        wasm_bindgen_futures::spawn_local(init);

        // On native, use pollster to block on the future
        #[cfg(not(target_arch = "wasm32"))]
        pollster::block_on(init);
    }

    /// Starts both clocks for a freshly built instance.
    fn start_loops(&mut self, mut renderer: GpuLifeRenderer) {
        renderer.prime();

        let proxy = self.proxy.clone();
        let epoch = self.epoch;
        self.ticker = Some(Ticker::start(self.config.tick_period(), move || {
            let _ = proxy.send_event(LifeMessage::Tick { epoch });
        }));

        // Request first redraw to kick off the animation loop
        renderer.request_redraw();
        self.renderer = Some(renderer);
    }

    /// Stops the simulation clock before releasing any GPU resource.
    fn teardown(&mut self) {
        self.ticker = None;
        if let Some(renderer) = self.renderer.take() {
            log::info!(
                "Tearing down {}x{} instance after {} steps",
                renderer.dimensions().width,
                renderer.dimensions().height,
                renderer.steps()
            );
        }
    }

    fn reinitialize(&mut self) {
        log::info!("Window resized, rebuilding simulation");
        self.teardown();
        self.spawn_instance();
    }
}

impl winit::application::ApplicationHandler<LifeMessage> for Application {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attrs = match self.window_attributes() {
            Ok(attrs) => attrs,
            Err(e) => {
                log::error!("failed to prepare window: {e}");
                return;
            }
        };
        match event_loop.create_window(attrs) {
            Ok(window) => {
                self.window = Some(Arc::new(window));
                self.spawn_instance();
            }
            Err(e) => log::error!("failed to create window: {e}"),
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                self.teardown();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                let Some(ref renderer) = self.renderer else {
                    return;
                };
                let new = (size.width, size.height);
                match resize_action(self.config.track_window, renderer.surface_size(), new) {
                    ResizeAction::Ignore => {}
                    ResizeAction::Rebuild => self.reinitialize(),
                    ResizeAction::Reconfigure => {
                        if let Some(ref mut renderer) = self.renderer {
                            renderer.resize_surface(new.0, new.1);
                        }
                    }
                }
            }
            WindowEvent::RedrawRequested => {
                let Some(ref mut renderer) = self.renderer else {
                    return;
                };
                match renderer.render_frame() {
                    Ok(()) => renderer.request_redraw(),
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        // Reconfigure the surface
                        let (w, h) = renderer.surface_size();
                        renderer.resize_surface(w, h);
                        renderer.request_redraw();
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        log::error!("Out of memory!");
                        self.teardown();
                        event_loop.exit();
                    }
                    Err(e) => {
                        log::warn!("Surface error: {e:?}");
                        renderer.request_redraw();
                    }
                }
            }
            _ => (),
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: LifeMessage) {
        if event.is_stale(self.epoch) {
            log::debug!("dropping message from stale instance {:?}", event.epoch());
            return;
        }
        match event {
            LifeMessage::Initialized { renderer, .. } => {
                log::info!("GPU renderer initialized successfully");
                self.start_loops(*renderer);
            }
            LifeMessage::Error { message, .. } => {
                log::error!("GPU initialization error: {message}");
                self.fatal = Some(message);
                event_loop.exit();
            }
            LifeMessage::Tick { .. } => {
                if let Some(ref renderer) = self.renderer {
                    renderer.tick();
                }
            }
            LifeMessage::Destroy => {
                self.teardown();
                event_loop.exit();
            }
        }
    }
}

/// Runs a simulation window until it is closed.
///
/// Fails if the event loop cannot start or the GPU cannot be initialized.
#[cfg(not(target_arch = "wasm32"))]
pub fn run(config: LifeConfig) -> anyhow::Result<()> {
    let event_loop = EventLoop::<LifeMessage>::with_user_event().build()?;
    let mut app = Application::new(&event_loop, config);
    event_loop.run_app(&mut app)?;
    match app.fatal.take() {
        Some(message) => Err(anyhow::anyhow!(message)),
        None => Ok(()),
    }
}

/// Installs a stderr logger with RFC 3339 timestamps.
#[cfg(not(target_arch = "wasm32"))]
pub fn init_logging(level: log::LevelFilter) -> anyhow::Result<()> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                humantime::format_rfc3339_seconds(std::time::SystemTime::now()),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .level_for("wgpu_core", log::LevelFilter::Warn)
        .level_for("wgpu_hal", log::LevelFilter::Warn)
        .level_for("naga", log::LevelFilter::Warn)
        .chain(std::io::stderr())
        .apply()?;
    Ok(())
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn initialize() {
    console_error_panic_hook::set_once();
    let _ = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {}] {}",
                record.level(),
                record.target(),
                message
            ))
        })
        .level(log::LevelFilter::Debug)
        .level_for("wgpu_core", log::LevelFilter::Warn)
        .level_for("wgpu_hal", log::LevelFilter::Warn)
        .chain(fern::Output::call(console_log::log))
        .apply();
}

/// Configuration handed over from JavaScript.
#[wasm_bindgen]
#[derive(Clone, Default)]
pub struct LifeOptions {
    config: LifeConfig,
}

#[wasm_bindgen]
impl LifeOptions {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_grid_width(&mut self, value: u32) {
        self.config.grid_width = value;
    }

    pub fn set_grid_height(&mut self, value: u32) {
        self.config.grid_height = value;
    }

    /// Full fade cycle in milliseconds; the simulation steps every half.
    pub fn set_update_interval(&mut self, millis: u32) {
        self.config.tick_interval = std::time::Duration::from_millis(millis as u64);
    }

    pub fn set_canvas_width(&mut self, value: u32) {
        self.config.canvas_width = value;
    }

    pub fn set_canvas_height(&mut self, value: u32) {
        self.config.canvas_height = value;
    }

    pub fn set_reinit_on_window_resize(&mut self, value: bool) {
        self.config.track_window = value;
    }

    /// Row-major state for the whole grid.
    pub fn set_initial_cells(&mut self, cells: Vec<u32>) {
        self.config.initial_state = InitialState::Flat(cells);
    }

    /// Row-major pattern `pattern_width` cells wide, centered in the grid.
    pub fn set_initial_pattern(&mut self, cells: Vec<u32>, pattern_width: u32) {
        self.config.initial_state = InitialState::from_pattern_cells(&cells, pattern_width as usize);
    }
}

impl LifeOptions {
    pub fn config(&self) -> &LifeConfig {
        &self.config
    }
}

#[cfg(target_arch = "wasm32")]
thread_local! {
    static PROXY: std::cell::RefCell<Option<EventLoopProxy<LifeMessage>>> = const { std::cell::RefCell::new(None) };
}

/// Start the simulation on the canvas with id `canvas_id`.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub fn start(canvas_id: &str, options: &LifeOptions) -> Result<(), JsValue> {
    use winit::platform::web::EventLoopExtWebSys;

    log::info!("Starting life simulation on `{canvas_id}`");

    let event_loop = EventLoop::<LifeMessage>::with_user_event()
        .build()
        .map_err(|e| JsValue::from_str(&format!("Failed to create event loop: {e}")))?;

    let mut app = Application::new(&event_loop, options.config.clone());
    app.canvas_id = canvas_id.to_owned();
    PROXY.with(|p| *p.borrow_mut() = Some(app.proxy.clone()));

    event_loop.spawn_app(app);
    Ok(())
}

/// Controller for the running simulation
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub struct LifeController;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
impl LifeController {
    /// Stops both clocks and releases the GPU resources. Call when the
    /// hosting view goes away.
    pub fn destroy() {
        PROXY.with(|p| {
            if let Some(proxy) = p.borrow_mut().take() {
                let _ = proxy.send_event(LifeMessage::Destroy);
            }
        });
    }
}
