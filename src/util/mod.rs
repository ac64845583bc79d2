/// Linear RGBA color with components in `0.0..=1.0`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    /// Background and fade target. Dead and fading cells blend into it.
    pub const BASE: Color = Color::gray(22.0 / 255.0);

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
    pub const fn gray(v: f32) -> Self {
        Self::rgba(v, v, v, 1.0)
    }
    pub fn lerp(&self, other: &Color, factor: f32) -> Color {
        Color {
            r: self.r + (other.r - self.r) * factor,
            g: self.g + (other.g - self.g) * factor,
            b: self.b + (other.b - self.b) * factor,
            a: self.a + (other.a - self.a) * factor,
        }
    }
    pub fn as_wgpu(&self) -> wgpu::Color {
        wgpu::Color {
            r: self.r as f64,
            g: self.g as f64,
            b: self.b as f64,
            a: self.a as f64,
        }
    }
}

/// Wall clock in milliseconds.
#[cfg(target_arch = "wasm32")]
pub fn now_ms() -> f64 {
    js_sys::Date::now()
}

/// Monotonic milliseconds since the first call in this process.
#[cfg(not(target_arch = "wasm32"))]
pub fn now_ms() -> f64 {
    use std::{sync::OnceLock, time::Instant};
    static ORIGIN: OnceLock<Instant> = OnceLock::new();
    ORIGIN.get_or_init(Instant::now).elapsed().as_secs_f64() * 1000.0
}
