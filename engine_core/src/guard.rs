/// Error budget for the frame loop.
///
/// Counts failures inside a rolling window. When the window has elapsed the
/// next failure starts a new window with a count of 1. Reaching `max_errors`
/// inside one window is the only path to an emergency stop.
pub struct ErrorGuard {
    max_errors: u32,
    reset_interval_ms: f64,

    count: u32,
    last_reset_ms: Option<f64>,
    last_error: Option<String>,
}

impl ErrorGuard {
    pub fn new(max_errors: u32, reset_interval_ms: u64) -> Self {
        Self {
            max_errors: max_errors.max(1),
            reset_interval_ms: reset_interval_ms as f64,
            count: 0,
            last_reset_ms: None,
            last_error: None,
        }
    }

    /// Count one failure at `now_ms`. Returns `true` once the threshold is reached.
    pub fn record(&mut self, error: &dyn std::fmt::Display, now_ms: f64) -> bool {
        let expired = match self.last_reset_ms {
            Some(t) => now_ms - t > self.reset_interval_ms,
            None => true,
        };

        if expired {
            self.count = 1;
            self.last_reset_ms = Some(now_ms);
        } else {
            self.count += 1;
        }
        self.last_error = Some(error.to_string());

        self.exceeded()
    }

    #[inline]
    pub fn exceeded(&self) -> bool {
        self.count >= self.max_errors
    }

    #[inline]
    pub fn count(&self) -> u32 {
        self.count
    }

    #[inline]
    pub fn max_errors(&self) -> u32 {
        self.max_errors
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn reset(&mut self) {
        self.count = 0;
        self.last_reset_ms = None;
        self.last_error = None;
    }
}
