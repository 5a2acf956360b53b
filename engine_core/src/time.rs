/// Потолок FPS: тик не двигает игру меньше чем на 1/120 с.
pub const MAX_FPS: f64 = 120.0;
/// Пол FPS: тик не двигает игру больше чем на 1/30 с.
pub const MIN_FPS: f64 = 30.0;

pub const MIN_FRAME_TIME_MS: f64 = 1000.0 / MAX_FPS;
pub const MAX_FRAME_TIME_MS: f64 = 1000.0 / MIN_FPS;

/// Clamp a raw frame delta into `[MIN_FRAME_TIME_MS, MAX_FRAME_TIME_MS]`.
/// Отрицательная или NaN дельта (часы пошли назад) → минимум.
#[inline]
pub fn clamp_delta(raw_ms: f64) -> f64 {
    if raw_ms.is_nan() {
        return MIN_FRAME_TIME_MS;
    }
    raw_ms.clamp(MIN_FRAME_TIME_MS, MAX_FRAME_TIME_MS)
}

/// Источник delta time для цикла. Timestamps приходят от хоста, в мс.
#[derive(Debug, Clone)]
pub struct FrameClock {
    last_ms: Option<f64>,

    /// delta time (мс) текущего тика (clamped)
    pub delta_ms: f64,

    /// сырая delta time (мс), без clamp
    pub raw_delta_ms: f64,

    /// игровое время (мс) с запуска
    pub elapsed_ms: f64,

    pub frame_count: u64,
}

impl FrameClock {
    pub fn new() -> Self {
        Self {
            last_ms: None,
            delta_ms: 0.0,
            raw_delta_ms: 0.0,
            elapsed_ms: 0.0,
            frame_count: 0,
        }
    }

    /// Следующая дельта считается от `now_ms`.
    pub fn reset(&mut self, now_ms: f64) {
        self.last_ms = Some(now_ms);
    }

    /// Compute this tick's clamped delta. The first tick after construction
    /// gets the minimum frame time.
    pub fn advance(&mut self, now_ms: f64) -> f64 {
        let raw = match self.last_ms {
            Some(last) => now_ms - last,
            None => MIN_FRAME_TIME_MS,
        };
        self.last_ms = Some(now_ms);

        self.raw_delta_ms = raw;
        self.delta_ms = clamp_delta(raw);
        self.elapsed_ms += self.delta_ms;
        self.delta_ms
    }

    /// индекс кадра +1
    #[inline]
    pub fn end_frame(&mut self) {
        self.frame_count = self.frame_count.wrapping_add(1);
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}
