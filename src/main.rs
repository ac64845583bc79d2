#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    use std::time::Duration;

    use lifesim::{config::LifeConfig, sim::InitialState};

    lifesim::init_logging(log::LevelFilter::Info)?;

    let glider = vec![vec![0, 1, 0], vec![0, 0, 1], vec![1, 1, 1]];
    lifesim::run(LifeConfig {
        grid_width: 64,
        grid_height: 64,
        tick_interval: Duration::from_millis(1000),
        canvas_width: 960,
        canvas_height: 720,
        track_window: true,
        initial_state: InitialState::Pattern(glider),
    })
}

// The web build starts through the `wasm_bindgen(start)` entry point.
#[cfg(target_arch = "wasm32")]
fn main() {}
