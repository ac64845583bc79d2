//! The two clocks: a fixed-interval tick source that advances the simulation
//! and the per-frame phase that animates between ticks.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use crate::sim::ring;

/// Phase for a frame drawn `elapsed_ms` after start while the counter reads `step`.
///
/// Counts half tick intervals since start, minus the steps taken. It is 0 at
/// the instant a tick lands and climbs continuously until the next one.
pub fn phase_at(elapsed_ms: f64, tick_interval_ms: f64, step: u64) -> f32 {
    (elapsed_ms / (tick_interval_ms / 2.0) - step as f64) as f32
}

/// Monotonic step counter plus the start time the phase is measured from.
///
/// Only the simulation clock advances the counter; every reader takes one
/// snapshot per callback and derives its ring slots from it.
pub struct StepClock {
    step: AtomicU64,
    started_at_ms: f64,
    tick_interval_ms: f64,
}

impl StepClock {
    pub fn new(started_at_ms: f64, tick_interval: Duration) -> Self {
        Self {
            step: AtomicU64::new(0),
            started_at_ms,
            tick_interval_ms: tick_interval.as_secs_f64() * 1000.0,
        }
    }

    /// Moves the phase origin to `started_at_ms`, the instant the tick timer starts.
    pub fn restart(&mut self, started_at_ms: f64) {
        self.started_at_ms = started_at_ms;
    }

    pub fn step(&self) -> u64 {
        self.step.load(Ordering::Acquire)
    }

    /// Increments the counter and returns the new step.
    pub fn advance(&self) -> u64 {
        self.step.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn phase(&self, now_ms: f64, step: u64) -> f32 {
        phase_at(now_ms - self.started_at_ms, self.tick_interval_ms, step)
    }

    /// `(previous, current)` ring slots to display at `step`.
    pub fn display_slots(step: u64) -> (usize, usize) {
        (ring::previous_slot(step), ring::current_slot(step))
    }

    /// `(input, output)` ring slots the compute pass uses at `step`.
    pub fn compute_slots(step: u64) -> (usize, usize) {
        (ring::current_slot(step), ring::next_slot(step))
    }
}

/// Fixed-interval callback source. Dropping it cancels the timer; no callback
/// runs after `drop` returns.
pub struct Ticker {
    #[cfg(target_arch = "wasm32")]
    _interval: gloo_timers::callback::Interval,
    #[cfg(not(target_arch = "wasm32"))]
    stop: std::sync::Arc<std::sync::atomic::AtomicBool>,
    #[cfg(not(target_arch = "wasm32"))]
    handle: Option<std::thread::JoinHandle<()>>,
}

impl Ticker {
    #[cfg(target_arch = "wasm32")]
    pub fn start<F>(period: Duration, on_tick: F) -> Self
    where
        F: FnMut() + 'static,
    {
        let millis = period.as_millis().clamp(1, u32::MAX as u128) as u32;
        Self {
            _interval: gloo_timers::callback::Interval::new(millis, on_tick),
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn start<F>(period: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        use std::{
            sync::{Arc, atomic::AtomicBool},
            thread,
            time::Instant,
        };

        let period = period.max(Duration::from_millis(1));
        let stop = Arc::new(AtomicBool::new(false));
        let s = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("lifesim-ticker".into())
            .spawn(move || {
                let mut next = Instant::now() + period;
                while !s.load(Ordering::Acquire) {
                    let now = Instant::now();
                    if now < next {
                        thread::park_timeout(next - now);
                        continue;
                    }
                    on_tick();
                    next += period;
                }
            })
            .ok();
        if handle.is_none() {
            log::error!("failed to spawn ticker thread; simulation will not advance");
        }
        Self { stop, handle }
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            if handle.join().is_err() {
                log::warn!("ticker thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_is_zero_on_tick_boundaries() {
        let interval = 1000.0;
        for step in 0..10u64 {
            // ticks land every half interval
            let at_tick = step as f64 * interval / 2.0;
            assert_eq!(phase_at(at_tick, interval, step), 0.0);
        }
    }

    #[test]
    fn phase_climbs_between_ticks() {
        let interval = 1000.0;
        let a = phase_at(3.0 * 500.0 + 100.0, interval, 3);
        let b = phase_at(3.0 * 500.0 + 400.0, interval, 3);
        assert!((a - 0.2).abs() < 1e-6);
        assert!((b - 0.8).abs() < 1e-6);
        assert!(b > a);
    }

    #[test]
    fn phase_is_periodic_modulo_step() {
        let interval = 5000.0;
        let t = 1234.0;
        let base = phase_at(t, interval, 0);
        // one full tick interval spans two steps
        let later = phase_at(t + interval, interval, 2);
        assert!((base - later).abs() < 1e-5);
    }

    #[test]
    fn phase_runs_past_one_when_ticks_are_late() {
        assert!((phase_at(1500.0, 1000.0, 1) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn clock_measures_from_start() {
        let clock = StepClock::new(10_000.0, Duration::from_millis(1000));
        assert_eq!(clock.phase(10_000.0, 0), 0.0);
        assert!((clock.phase(10_250.0, 0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn restart_moves_phase_origin() {
        let mut clock = StepClock::new(1_000.0, Duration::from_millis(1000));
        // setup took 300 ms before the timer started
        clock.restart(1_300.0);
        assert_eq!(clock.phase(1_300.0, 0), 0.0);
        // first tick lands one period after the restart
        assert_eq!(clock.phase(1_800.0, 1), 0.0);
        assert!((clock.phase(2_050.0, 1) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn advance_is_monotonic() {
        let clock = StepClock::new(0.0, Duration::from_millis(1000));
        assert_eq!(clock.step(), 0);
        assert_eq!(clock.advance(), 1);
        assert_eq!(clock.advance(), 2);
        assert_eq!(clock.step(), 2);
    }

    #[test]
    fn display_lags_compute_by_one() {
        for step in 0..12u64 {
            let (_, written) = StepClock::compute_slots(step);
            let (_, shown_next) = StepClock::display_slots(step + 1);
            assert_eq!(written, shown_next);
            let (previous, current) = StepClock::display_slots(step);
            assert_ne!(written, previous);
            assert_ne!(written, current);
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn ticker_fires_and_stops_on_drop() {
        use std::sync::{Arc, atomic::AtomicUsize};

        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let ticker = Ticker::start(Duration::from_millis(5), move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        std::thread::sleep(Duration::from_millis(100));
        drop(ticker);
        let after_drop = count.load(Ordering::SeqCst);
        assert!(after_drop > 0);
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(count.load(Ordering::SeqCst), after_drop);
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn long_period_ticker_drops_promptly() {
        let ticker = Ticker::start(Duration::from_secs(60), || {});
        let started = std::time::Instant::now();
        drop(ticker);
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
