use crate::config::{EngineConfig, ScalingMode};

/// Size of the element hosting the surface, in logical pixels, plus the
/// device pixel ratio reported by the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContainerBounds {
    pub width: f32,
    pub height: f32,
    pub pixel_ratio: f32,
}

impl ContainerBounds {
    #[inline]
    pub const fn new(width: f32, height: f32, pixel_ratio: f32) -> Self {
        Self { width, height, pixel_ratio }
    }
}

/// Logical (display) and device-pixel (actual) surface dimensions.
///
/// Drawing coordinates are always logical; the surface scales by `pixel_ratio`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub display_width: u32,
    pub display_height: u32,
    pub actual_width: u32,
    pub actual_height: u32,
    pub pixel_ratio: f32,
}

impl Viewport {
    pub fn logical(width: u32, height: u32) -> Self {
        Self {
            display_width: width,
            display_height: height,
            actual_width: width,
            actual_height: height,
            pixel_ratio: 1.0,
        }
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.display_width as f32
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.display_height as f32
    }
}

const MIN_PIXEL_RATIO: f32 = 0.25;
const MAX_PIXEL_RATIO: f32 = 8.0;

/// Computes the viewport from container bounds and coalesces resize bursts.
///
/// Resize and orientation events only park the latest bounds; the engine
/// applies them with [`ViewportManager::take_pending`] at a tick boundary so
/// no draw command ever sees a half-updated viewport.
pub struct ViewportManager {
    base_width: u32,
    base_height: u32,
    mode: ScalingMode,
    debounce_ms: f64,

    current: Viewport,
    pending: Option<(ContainerBounds, f64)>,
}

impl ViewportManager {
    pub fn new(cfg: &EngineConfig) -> Self {
        Self {
            base_width: cfg.width,
            base_height: cfg.height,
            mode: cfg.scaling_mode,
            debounce_ms: cfg.resize_debounce_ms as f64,
            current: Viewport::logical(cfg.width, cfg.height),
            pending: None,
        }
    }

    #[inline]
    pub fn current(&self) -> Viewport {
        self.current
    }

    #[inline]
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Recompute immediately. Idempotent for identical bounds.
    pub fn recompute(&mut self, bounds: ContainerBounds) -> Viewport {
        self.current = self.compute(bounds);
        self.current
    }

    /// Park `bounds`; each new request pushes the deadline out again.
    pub fn request_resize(&mut self, bounds: ContainerBounds, now_ms: f64) {
        self.pending = Some((bounds, now_ms + self.debounce_ms));
    }

    pub fn orientation_changed(&mut self, bounds: ContainerBounds, now_ms: f64) {
        self.request_resize(bounds, now_ms);
    }

    /// Apply the parked bounds once the debounce delay has elapsed.
    /// Returns the new viewport only if it differs from the current one.
    pub fn take_pending(&mut self, now_ms: f64) -> Option<Viewport> {
        let (bounds, deadline) = self.pending?;
        if now_ms < deadline {
            return None;
        }
        self.pending = None;

        let before = self.current;
        let after = self.recompute(bounds);
        (after != before).then_some(after)
    }

    fn compute(&self, bounds: ContainerBounds) -> Viewport {
        let ratio = if bounds.pixel_ratio.is_finite() && bounds.pixel_ratio > 0.0 {
            bounds.pixel_ratio.clamp(MIN_PIXEL_RATIO, MAX_PIXEL_RATIO)
        } else {
            1.0
        };

        let usable = bounds.width.is_finite()
            && bounds.height.is_finite()
            && bounds.width >= 1.0
            && bounds.height >= 1.0;

        let (bw, bh) = (self.base_width as f32, self.base_height as f32);
        let (dw, dh) = match self.mode {
            _ if !usable => (bw, bh),
            ScalingMode::Fixed => (bw, bh),
            ScalingMode::Stretch => (bounds.width, bounds.height),
            ScalingMode::Fit => {
                let s = (bounds.width / bw).min(bounds.height / bh);
                (bw * s, bh * s)
            }
        };

        let display_width = (dw.floor() as u32).max(1);
        let display_height = (dh.floor() as u32).max(1);

        Viewport {
            display_width,
            display_height,
            actual_width: (display_width as f32 * ratio).round() as u32,
            actual_height: (display_height as f32 * ratio).round() as u32,
            pixel_ratio: ratio,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(mode: ScalingMode) -> ViewportManager {
        let cfg = EngineConfig { scaling_mode: mode, ..EngineConfig::default() };
        ViewportManager::new(&cfg)
    }

    #[test]
    fn fit_keeps_aspect_ratio() {
        let mut vm = manager(ScalingMode::Fit);
        let vp = vm.recompute(ContainerBounds::new(1600.0, 900.0, 2.0));
        assert_eq!((vp.display_width, vp.display_height), (1200, 900));
        assert_eq!((vp.actual_width, vp.actual_height), (2400, 1800));
        assert_eq!(vp.pixel_ratio, 2.0);
    }

    #[test]
    fn stretch_and_fixed() {
        let mut vm = manager(ScalingMode::Stretch);
        let vp = vm.recompute(ContainerBounds::new(1000.0, 500.0, 1.0));
        assert_eq!((vp.display_width, vp.display_height), (1000, 500));

        let mut vm = manager(ScalingMode::Fixed);
        let vp = vm.recompute(ContainerBounds::new(1000.0, 500.0, 1.5));
        assert_eq!((vp.display_width, vp.display_height), (800, 600));
        assert_eq!((vp.actual_width, vp.actual_height), (1200, 900));
    }

    #[test]
    fn recompute_is_idempotent() {
        let mut vm = manager(ScalingMode::Fit);
        let b = ContainerBounds::new(1023.0, 767.0, 1.25);
        let a = vm.recompute(b);
        let c = vm.recompute(b);
        assert_eq!(a, c);
    }

    #[test]
    fn degenerate_bounds_fall_back() {
        let mut vm = manager(ScalingMode::Stretch);
        let vp = vm.recompute(ContainerBounds::new(0.0, f32::NAN, 0.0));
        assert_eq!((vp.display_width, vp.display_height), (800, 600));
        assert_eq!(vp.pixel_ratio, 1.0);
    }

    #[test]
    fn resize_burst_is_coalesced() {
        let mut vm = manager(ScalingMode::Stretch);
        vm.request_resize(ContainerBounds::new(500.0, 400.0, 1.0), 0.0);
        vm.request_resize(ContainerBounds::new(640.0, 480.0, 1.0), 50.0);

        // Deadline moved to 150 by the second request.
        assert_eq!(vm.take_pending(120.0), None);
        assert!(vm.has_pending());

        let vp = vm.take_pending(150.0).expect("applied");
        assert_eq!((vp.display_width, vp.display_height), (640, 480));
        assert!(!vm.has_pending());
    }

    #[test]
    fn unchanged_pending_reports_nothing() {
        let mut vm = manager(ScalingMode::Stretch);
        let b = ContainerBounds::new(640.0, 480.0, 1.0);
        vm.recompute(b);
        vm.orientation_changed(b, 0.0);
        assert_eq!(vm.take_pending(1000.0), None);
        assert!(!vm.has_pending());
    }
}
