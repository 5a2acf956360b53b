use std::collections::VecDeque;
use std::time::Duration;

use crate::config::EngineConfig;
use crate::log::Logger;

/// Average FPS below `target * PERFORMANCE_WARNING_RATIO` raises a warning.
pub const PERFORMANCE_WARNING_RATIO: f64 = 0.5;
/// Минимальный интервал между двумя предупреждениями.
pub const PERFORMANCE_WARNING_COOLDOWN_MS: f64 = 5_000.0;

/// Снимок метрик кадра (только чтение).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Metrics {
    /// мгновенный FPS по сырой дельте последнего кадра
    pub fps: f64,
    /// средний FPS по скользящему окну
    pub average_fps: f64,
    /// Wall-clock time between the last two ticks (ms).
    pub frame_time: f64,
    /// время рендера последнего кадра (мс)
    pub render_time: f64,
    /// Process memory in bytes, when the host can tell.
    pub memory_usage: Option<u64>,
}

/// FPS below target, reported by [`Telemetry::record_frame`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceWarning {
    pub average_fps: f64,
    pub target_fps: f64,
}

/// Владеет [`Metrics`]. Пишет сюда только цикл кадра.
pub struct Telemetry {
    log: Logger,
    metrics: Metrics,

    samples: VecDeque<f64>,
    sample_size: usize,
    target_fps: f64,

    fps_log_enabled: bool,
    fps_log_period_ms: f64,
    fps_last_log_ms: Option<f64>,

    last_warning_ms: Option<f64>,
}

impl Telemetry {
    pub fn new(cfg: &EngineConfig) -> Self {
        let sample_size = cfg.fps_sample_size.max(1);
        Self {
            log: Logger::new("Telemetry"),
            metrics: Metrics::default(),
            samples: VecDeque::with_capacity(sample_size),
            sample_size,
            target_fps: cfg.target_fps as f64,
            fps_log_enabled: cfg.log_fps,
            fps_log_period_ms: cfg.fps_log_period_ms as f64,
            fps_last_log_ms: None,
            last_warning_ms: None,
        }
    }

    pub fn configure_fps_logging(&mut self, enabled: bool, period_ms: f64) {
        self.fps_log_enabled = enabled;
        self.fps_log_period_ms = period_ms.max(250.0);
    }

    /// Записать сырую дельту кадра. Возвращает предупреждение, если среднее
    /// сильно ниже target (не чаще раза в cooldown).
    pub fn record_frame(&mut self, raw_delta_ms: f64, now_ms: f64) -> Option<PerformanceWarning> {
        if !raw_delta_ms.is_finite() || raw_delta_ms <= 0.0 {
            return None;
        }

        let fps = 1000.0 / raw_delta_ms;
        if self.samples.len() == self.sample_size {
            self.samples.pop_front();
        }
        self.samples.push_back(fps);

        self.metrics.fps = fps;
        self.metrics.frame_time = raw_delta_ms;
        self.metrics.average_fps = self.samples.iter().sum::<f64>() / self.samples.len() as f64;

        self.maybe_log(now_ms);
        self.check_performance(now_ms)
    }

    #[inline]
    pub fn record_render(&mut self, dur: Duration) {
        self.metrics.render_time = dur.as_secs_f64() * 1000.0;
    }

    #[inline]
    pub fn set_memory_usage(&mut self, bytes: Option<u64>) {
        self.metrics.memory_usage = bytes;
    }

    #[inline]
    pub fn snapshot(&self) -> Metrics {
        self.metrics
    }

    /// Number of samples currently in the rolling window.
    #[inline]
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    fn maybe_log(&mut self, now_ms: f64) {
        if !self.fps_log_enabled {
            return;
        }
        let due = match self.fps_last_log_ms {
            Some(t) => now_ms - t >= self.fps_log_period_ms,
            None => true,
        };
        if due {
            self.fps_last_log_ms = Some(now_ms);
            self.log.info(format!(
                "fps={:.1} avg={:.1} frame_ms={:.2} render_ms={:.2}",
                self.metrics.fps, self.metrics.average_fps, self.metrics.frame_time, self.metrics.render_time
            ));
        }
    }

    fn check_performance(&mut self, now_ms: f64) -> Option<PerformanceWarning> {
        if self.samples.len() < self.sample_size {
            return None;
        }
        if self.metrics.average_fps >= self.target_fps * PERFORMANCE_WARNING_RATIO {
            return None;
        }
        if let Some(t) = self.last_warning_ms {
            if now_ms - t < PERFORMANCE_WARNING_COOLDOWN_MS {
                return None;
            }
        }

        self.last_warning_ms = Some(now_ms);
        self.log.warn(format!(
            "average fps {:.1} below target {:.0}",
            self.metrics.average_fps, self.target_fps
        ));
        Some(PerformanceWarning { average_fps: self.metrics.average_fps, target_fps: self.target_fps })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn telemetry(sample_size: usize) -> Telemetry {
        let cfg = EngineConfig { fps_sample_size: sample_size, ..EngineConfig::default() };
        Telemetry::new(&cfg)
    }

    #[test]
    fn rolling_average_drops_old_samples() {
        let mut t = telemetry(3);
        t.record_frame(10.0, 0.0); // 100
        t.record_frame(20.0, 20.0); // 50
        t.record_frame(25.0, 45.0); // 40
        assert_relative_eq!(t.snapshot().average_fps, 190.0 / 3.0);

        t.record_frame(50.0, 95.0); // 20, evicts 100
        assert_eq!(t.sample_count(), 3);
        assert_relative_eq!(t.snapshot().average_fps, 110.0 / 3.0);
        assert_relative_eq!(t.snapshot().fps, 20.0);
        assert_relative_eq!(t.snapshot().frame_time, 50.0);
    }

    #[test]
    fn non_positive_deltas_are_ignored() {
        let mut t = telemetry(3);
        assert!(t.record_frame(0.0, 0.0).is_none());
        assert!(t.record_frame(-5.0, 0.0).is_none());
        assert!(t.record_frame(f64::NAN, 0.0).is_none());
        assert_eq!(t.sample_count(), 0);
    }

    #[test]
    fn slow_frames_warn_once_per_cooldown() {
        let mut t = telemetry(2);
        // 10 fps при target 60.
        assert!(t.record_frame(100.0, 0.0).is_none());
        let w = t.record_frame(100.0, 100.0).expect("window full and slow");
        assert_relative_eq!(w.average_fps, 10.0);
        assert_relative_eq!(w.target_fps, 60.0);

        assert!(t.record_frame(100.0, 200.0).is_none());
        assert!(t.record_frame(100.0, 100.0 + PERFORMANCE_WARNING_COOLDOWN_MS).is_some());
    }

    #[test]
    fn healthy_frames_do_not_warn() {
        let mut t = telemetry(2);
        assert!(t.record_frame(16.0, 0.0).is_none());
        assert!(t.record_frame(17.0, 17.0).is_none());
    }

    #[test]
    fn render_time_in_ms() {
        let mut t = telemetry(2);
        t.record_render(Duration::from_micros(2500));
        assert_relative_eq!(t.snapshot().render_time, 2.5);
    }
}
