//! Parallax star field drawn behind everything else.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Frame interval the star speeds are tuned for (60 fps).
pub const REFERENCE_FRAME_MS: f64 = 1000.0 / 60.0;

/// Y a wrapped star restarts from, just above the top edge.
pub const WRAP_Y: f32 = -5.0;

pub const MIN_DEPTH: f32 = 1.0;
pub const MAX_DEPTH: f32 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Star {
    pub x: f32,
    pub y: f32,
    /// In [1, 4). Lower is closer: bigger and brighter.
    pub depth: f32,
    /// In [0, 1].
    pub brightness: f32,
    pub speed: f32,
}

impl Star {
    #[inline]
    pub fn size(&self) -> f32 {
        (MAX_DEPTH - self.depth) * 0.5
    }

    #[inline]
    pub fn alpha(&self) -> f32 {
        self.brightness * (MAX_DEPTH - self.depth) / 3.0
    }
}

pub struct StarField {
    stars: Vec<Star>,
    rng: StdRng,
    base_speed: f32,
}

impl StarField {
    pub fn new(base_speed: f32) -> Self {
        Self::from_rng(StdRng::from_os_rng(), base_speed)
    }

    /// Deterministic field, for replays and tests.
    pub fn with_seed(seed: u64, base_speed: f32) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed), base_speed)
    }

    fn from_rng(rng: StdRng, base_speed: f32) -> Self {
        Self { stars: Vec::new(), rng, base_speed }
    }

    #[inline]
    pub fn stars(&self) -> &[Star] {
        &self.stars
    }

    /// Direct access for scripted scenes.
    #[inline]
    pub fn stars_mut(&mut self) -> &mut [Star] {
        &mut self.stars
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.stars.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.stars.is_empty()
    }

    /// Replace the whole batch with `count` fresh stars spread over the area.
    pub fn reset(&mut self, count: usize, width: f32, height: f32) {
        let (w, h) = (width.max(1.0), height.max(1.0));
        let base = self.base_speed;
        let rng = &mut self.rng;

        self.stars.clear();
        self.stars.extend((0..count).map(|_| Star {
            x: rng.random_range(0.0..w),
            y: rng.random_range(0.0..h),
            depth: rng.random_range(MIN_DEPTH..MAX_DEPTH),
            brightness: rng.random_range(0.0..=1.0),
            speed: base * rng.random_range(0.5..1.5),
        }));
    }

    /// Move every star down and wrap the ones that left the bottom edge.
    pub fn advance(&mut self, delta_ms: f64, width: f32, height: f32) {
        let step = (delta_ms / REFERENCE_FRAME_MS) as f32;
        let w = width.max(1.0);

        for star in &mut self.stars {
            star.y += star.speed * star.depth * step;
            if star.y > height {
                star.y = WRAP_Y;
                star.x = self.rng.random_range(0.0..w);
            }
        }
    }
}
