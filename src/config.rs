use std::time::Duration;

use crate::sim::{GridDimensions, InitialState};

pub const DEFAULT_GRID_WIDTH: u32 = 10;
pub const DEFAULT_GRID_HEIGHT: u32 = 10;
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(5000);
pub const DEFAULT_CANVAS_WIDTH: u32 = 100;
pub const DEFAULT_CANVAS_HEIGHT: u32 = 100;

/// Everything the presentation layer hands to a simulation instance.
#[derive(Clone, Debug, PartialEq)]
pub struct LifeConfig {
    pub grid_width: u32,
    pub grid_height: u32,
    /// One full fade cycle. The simulation advances every half interval.
    pub tick_interval: Duration,
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// Follow the window size and rebuild the whole pipeline on every resize.
    pub track_window: bool,
    pub initial_state: InitialState,
}

impl Default for LifeConfig {
    fn default() -> Self {
        Self {
            grid_width: DEFAULT_GRID_WIDTH,
            grid_height: DEFAULT_GRID_HEIGHT,
            tick_interval: DEFAULT_TICK_INTERVAL,
            canvas_width: DEFAULT_CANVAS_WIDTH,
            canvas_height: DEFAULT_CANVAS_HEIGHT,
            track_window: false,
            initial_state: InitialState::Random,
        }
    }
}

impl LifeConfig {
    /// Replaces zero values with their defaults.
    pub fn normalized(mut self) -> Self {
        fn or_default(v: u32, default: u32) -> u32 {
            if v == 0 { default } else { v }
        }
        self.grid_width = or_default(self.grid_width, DEFAULT_GRID_WIDTH);
        self.grid_height = or_default(self.grid_height, DEFAULT_GRID_HEIGHT);
        self.canvas_width = or_default(self.canvas_width, DEFAULT_CANVAS_WIDTH);
        self.canvas_height = or_default(self.canvas_height, DEFAULT_CANVAS_HEIGHT);
        if self.tick_interval.is_zero() {
            self.tick_interval = DEFAULT_TICK_INTERVAL;
        }
        self
    }

    /// Grid for a surface of `viewport` pixels. Only `track_window` lets the
    /// viewport change the height.
    pub fn grid_dimensions(&self, viewport: (u32, u32)) -> GridDimensions {
        if self.track_window && viewport.0 > 0 && viewport.1 > 0 {
            GridDimensions::fit_to_viewport(self.grid_width, viewport.0, viewport.1)
        } else {
            GridDimensions::new(self.grid_width, self.grid_height)
        }
    }

    /// Period of the simulation timer.
    pub fn tick_period(&self) -> Duration {
        self.tick_interval / 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_component_inputs() {
        let c = LifeConfig::default();
        assert_eq!((c.grid_width, c.grid_height), (10, 10));
        assert_eq!(c.tick_interval, Duration::from_millis(5000));
        assert_eq!((c.canvas_width, c.canvas_height), (100, 100));
        assert!(!c.track_window);
        assert_eq!(c.initial_state, InitialState::Random);
    }

    #[test]
    fn zeros_fall_back_to_defaults() {
        let c = LifeConfig {
            grid_width: 0,
            grid_height: 32,
            tick_interval: Duration::ZERO,
            canvas_width: 0,
            canvas_height: 0,
            ..Default::default()
        }
        .normalized();
        assert_eq!((c.grid_width, c.grid_height), (10, 32));
        assert_eq!(c.tick_interval, DEFAULT_TICK_INTERVAL);
        assert_eq!((c.canvas_width, c.canvas_height), (100, 100));
    }

    #[test]
    fn tracking_derives_height_from_viewport() {
        let c = LifeConfig {
            grid_width: 80,
            grid_height: 5,
            track_window: true,
            ..Default::default()
        };
        assert_eq!(c.grid_dimensions((1600, 900)), GridDimensions::new(80, 45));
        let fixed = LifeConfig {
            track_window: false,
            ..c
        };
        assert_eq!(fixed.grid_dimensions((1600, 900)), GridDimensions::new(80, 5));
    }

    #[test]
    fn timer_runs_at_half_interval() {
        let c = LifeConfig {
            tick_interval: Duration::from_millis(1000),
            ..Default::default()
        };
        assert_eq!(c.tick_period(), Duration::from_millis(500));
    }
}
