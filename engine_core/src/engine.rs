use std::future::Future;
use std::time::Instant;

use crate::{
    config::{ContextType, EngineConfig},
    error::{catch_panic, EngineError, EngineResult},
    events::{EngineEvent, EventBus},
    guard::ErrorGuard,
    log::Logger,
    registry::{DispatchReport, System, SystemRegistry},
    render::RenderPipeline,
    scheduler::{FrameScheduler, TickHandle, TickHost},
    state::{GameState, StateChange, StateMachine},
    surface::DrawSurface,
    telemetry::{Metrics, Telemetry},
    time::FrameClock,
    viewport::{ContainerBounds, Viewport, ViewportManager},
};

/// The game engine: one explicit instance, driven by a [`TickHost`].
///
/// Every tick runs on the caller's thread: pending viewport changes are
/// applied first, then systems update, then the frame is rendered and the
/// next tick is scheduled.
pub struct Engine {
    cfg: EngineConfig,
    log: Logger,

    state: StateMachine,
    running: bool,
    paused: bool,
    paused_by_visibility: bool,
    destroyed: bool,

    systems: SystemRegistry,
    render: RenderPipeline,
    viewport: ViewportManager,

    clock: FrameClock,
    telemetry: Telemetry,
    guard: ErrorGuard,
    events: EventBus,
    scheduler: FrameScheduler,
}

impl Engine {
    /// Build an engine around `surface`. Setup problems are fatal here.
    /// With `auto_start` the engine is started before returning.
    pub fn new(
        cfg: EngineConfig,
        surface: Box<dyn DrawSurface>,
        host: Box<dyn TickHost>,
    ) -> EngineResult<Self> {
        let cfg = cfg.validated();
        if cfg.context_type != ContextType::TwoD {
            return Err(EngineError::Setup(format!(
                "unsupported context type {:?}, only 2d is available",
                cfg.context_type
            )));
        }

        let render = RenderPipeline::new(surface, &cfg);
        Self::with_pipeline(cfg, render, host)
    }

    /// Same as [`Engine::new`] with a pre-built pipeline (custom star field,
    /// background, ...). `cfg` must already be validated.
    pub fn with_pipeline(
        cfg: EngineConfig,
        render: RenderPipeline,
        host: Box<dyn TickHost>,
    ) -> EngineResult<Self> {
        let mut engine = Self {
            log: Logger::new("Engine"),
            state: StateMachine::new(),
            running: false,
            paused: false,
            paused_by_visibility: false,
            destroyed: false,
            systems: SystemRegistry::new(),
            render,
            viewport: ViewportManager::new(&cfg),
            clock: FrameClock::new(),
            telemetry: Telemetry::new(&cfg),
            guard: ErrorGuard::new(cfg.max_errors, cfg.error_reset_interval_ms),
            events: EventBus::new(),
            scheduler: FrameScheduler::new(host),
            cfg,
        };

        let initial = engine.viewport.current();
        engine
            .render
            .apply_viewport(initial)
            .map_err(|e| EngineError::Setup(format!("surface configuration failed: {e}")))?;

        engine.log.info(format!(
            "created {}x{} batching={} target_fps={}",
            engine.cfg.width, engine.cfg.height, engine.cfg.enable_batching, engine.cfg.target_fps
        ));

        if engine.cfg.auto_start {
            engine.start()?;
        }
        Ok(engine)
    }

    /// Старт без отдельного preload.
    pub fn start(&mut self) -> EngineResult<()> {
        pollster::block_on(self.start_with(std::future::ready(Ok::<(), anyhow::Error>(()))))
    }

    /// Enter `Loading`, run system init hooks and `preload`, then enter `Menu`
    /// and schedule the first tick. A failed preload leaves the engine in `Error`.
    pub async fn start_with<F>(&mut self, preload: F) -> EngineResult<()>
    where
        F: Future<Output = anyhow::Result<()>>,
    {
        if self.destroyed {
            return Err(EngineError::NotRunning);
        }
        if self.running {
            self.log.debug("start ignored, already running");
            return Ok(());
        }

        self.transition(GameState::Loading);

        let report = self.systems.dispatch_init();
        let now = self.now();
        self.publish_failures(report, now);

        if let Err(e) = preload.await {
            self.log.error(format!("resource initialization failed: {e:#}"));
            self.transition(GameState::Error);
            return Err(EngineError::Setup(format!("resource initialization failed: {e:#}")));
        }

        self.transition(GameState::Menu);

        let now = self.now();
        self.guard.reset();
        self.clock.reset(now);
        self.running = true;
        self.paused = false;
        self.paused_by_visibility = false;
        self.scheduler.schedule_next();

        self.log.info("started");
        Ok(())
    }

    /// Cancel the pending tick and return to `Menu`. No tick fires after this.
    pub fn stop(&mut self) {
        self.scheduler.cancel();
        let was_running = self.running;
        self.running = false;
        self.paused = false;
        self.paused_by_visibility = false;

        if self.destroyed {
            return;
        }
        if self.state.current() != GameState::Menu {
            self.transition(GameState::Menu);
        }
        if was_running {
            self.log.info("stopped");
        }
    }

    /// Заморозить update и render. Цепочка тиков продолжается.
    pub fn pause(&mut self) {
        if !self.running || self.paused {
            return;
        }
        self.paused = true;
        let now = self.now();
        if let Some(ch) = self.state.pause(now) {
            self.publish_state(ch);
        }
    }

    /// Разморозить. Часы стартуют от now, чтобы не было скачка дельты.
    pub fn resume(&mut self) {
        if !self.paused {
            return;
        }
        self.paused = false;
        self.paused_by_visibility = false;

        let now = self.now();
        self.clock.reset(now);
        if let Some(ch) = self.state.resume(now) {
            self.publish_state(ch);
        }
    }

    /// Host visibility. Hiding pauses; showing resumes only a pause caused by hiding.
    pub fn set_visible(&mut self, visible: bool) {
        if !visible {
            if self.running && !self.paused {
                self.pause();
                self.paused_by_visibility = true;
            }
        } else if self.paused_by_visibility {
            self.resume();
        }
    }

    /// Stop, shut every system down and drop all subscribers. Terminal.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.stop();
        self.systems.dispatch_shutdown();
        self.systems.clear();
        self.events.clear();
        self.destroyed = true;
        self.log.info("destroyed");
    }

    /// Host callback for a scheduled tick. Returns whether a frame ran.
    pub fn tick(&mut self, handle: TickHandle) -> bool {
        if !self.scheduler.accept(handle) {
            self.log.debug(format!("stale tick {:?} ignored", handle));
            return false;
        }
        if !self.running {
            return false;
        }

        let now = self.now();
        let res = catch_panic(|| self.run_tick(now))
            .unwrap_or_else(|msg| Err(EngineError::Panic(msg)));
        if let Err(e) = res {
            self.on_tick_error(e, now);
        }

        if self.running {
            self.scheduler.schedule_next();
        }
        true
    }

    fn run_tick(&mut self, now: f64) -> EngineResult<()> {
        // Viewport меняется только между кадрами.
        if let Some(vp) = self.viewport.take_pending(now) {
            self.render.apply_viewport(vp)?;
            self.events.emit(EngineEvent::Resize { viewport: vp });
        }

        let delta = self.clock.advance(now);
        if let Some(w) = self.telemetry.record_frame(self.clock.raw_delta_ms, now) {
            self.events.emit(EngineEvent::PerformanceWarning {
                average_fps: w.average_fps,
                target_fps: w.target_fps,
                timestamp_ms: now,
            });
        }
        self.telemetry.set_memory_usage(self.scheduler.memory_usage());

        if self.paused {
            return Ok(());
        }

        if updates_in(self.state.current()) {
            let report = self.systems.dispatch_update(delta);
            self.publish_failures(report, now);
            if !self.running {
                return Ok(());
            }
        }

        let t0 = Instant::now();
        self.render.begin_frame()?;
        self.render.draw_background(delta);
        let report = self.systems.dispatch_render(&mut self.render);
        self.render.draw_debug_overlay(&self.telemetry.snapshot(), self.state.current());
        self.render.end_frame();
        self.telemetry.record_render(t0.elapsed());
        self.publish_failures(report, now);
        if !self.running {
            return Ok(());
        }

        self.clock.end_frame();
        self.events.emit(EngineEvent::FrameRendered {
            frame: self.clock.frame_count,
            delta_ms: delta,
            metrics: self.telemetry.snapshot(),
        });
        Ok(())
    }

    fn on_tick_error(&mut self, e: EngineError, now: f64) {
        self.log.error(format!("tick failed: {e}"));
        self.events.emit(EngineEvent::Error {
            source: "tick".to_string(),
            message: e.to_string(),
            timestamp_ms: now,
        });

        if self.guard.record(&e, now) {
            self.emergency_stop(now);
        }
    }

    fn emergency_stop(&mut self, now: f64) {
        self.scheduler.cancel();
        self.running = false;
        self.paused = false;
        self.paused_by_visibility = false;

        let errors = self.guard.count();
        let last_error = self.guard.last_error().map(str::to_string);
        self.log.error(format!(
            "{} within {} ms, last: {}",
            EngineError::EmergencyStop { errors },
            self.cfg.error_reset_interval_ms,
            last_error.as_deref().unwrap_or("-")
        ));

        self.transition(GameState::Error);
        self.events.emit(EngineEvent::EmergencyStop { errors, last_error, timestamp_ms: now });
    }

    pub fn register_system(&mut self, name: impl Into<String>, system: Box<dyn System>) {
        self.systems.register(name, system);
    }

    pub fn unregister_system(&mut self, name: &str) -> bool {
        self.systems.unregister(name)
    }

    /// Move to `next`. Entering `Paused` goes through [`Engine::pause`], and
    /// leaving a pause for any other state unfreezes the loop, so the pause
    /// flag always matches the state.
    pub fn change_state(&mut self, next: GameState) {
        if next == GameState::Paused && self.running {
            self.pause();
            return;
        }
        if self.paused && next != GameState::Paused {
            self.paused = false;
            self.paused_by_visibility = false;
            let now = self.now();
            self.clock.reset(now);
        }
        self.transition(next);
    }

    pub fn change_state_named(&mut self, next: &str) -> EngineResult<()> {
        let next: GameState = next.parse()?;
        self.change_state(next);
        Ok(())
    }

    /// Queue a container resize. Applied, debounced, at a later tick boundary.
    pub fn resize(&mut self, bounds: ContainerBounds) {
        let now = self.now();
        self.viewport.request_resize(bounds, now);
    }

    pub fn orientation_changed(&mut self, bounds: ContainerBounds) {
        let now = self.now();
        self.viewport.orientation_changed(bounds, now);
    }

    #[inline]
    pub fn state(&self) -> GameState {
        self.state.current()
    }

    #[inline]
    pub fn previous_state(&self) -> Option<GameState> {
        self.state.previous()
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Есть ли у хоста запланированный тик.
    #[inline]
    pub fn is_scheduled(&self) -> bool {
        self.scheduler.is_scheduled()
    }

    #[inline]
    pub fn frame_count(&self) -> u64 {
        self.clock.frame_count
    }

    #[inline]
    pub fn metrics(&self) -> Metrics {
        self.telemetry.snapshot()
    }

    #[inline]
    pub fn viewport(&self) -> Viewport {
        self.render.viewport()
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    #[inline]
    pub fn systems(&self) -> &SystemRegistry {
        &self.systems
    }

    #[inline]
    pub fn render(&self) -> &RenderPipeline {
        &self.render
    }

    /// Subscribe to notifications.
    #[inline]
    pub fn events(&mut self) -> &mut EventBus {
        &mut self.events
    }

    #[inline]
    fn now(&self) -> f64 {
        self.scheduler.now_ms()
    }

    fn transition(&mut self, next: GameState) {
        let ch = self.state.change_state(next, self.now());
        self.publish_state(ch);
    }

    fn publish_state(&mut self, ch: StateChange) {
        self.events.emit(EngineEvent::StateChanged {
            old: ch.old,
            new: ch.new,
            timestamp_ms: ch.timestamp_ms,
        });
    }

    /// Publish contained system failures. While running they also count
    /// against the error guard; tripping it stops the loop once every
    /// failure of the batch has been reported.
    fn publish_failures(&mut self, report: DispatchReport, now: f64) {
        let mut tripped = false;
        for f in report.failures {
            let source = format!("system:{}", f.name);
            let err = EngineError::System { name: f.name, source: f.error };
            self.events.emit(EngineEvent::Error {
                source,
                message: err.to_string(),
                timestamp_ms: now,
            });
            if self.running && self.guard.record(&err, now) {
                tripped = true;
            }
        }
        if tripped {
            self.emergency_stop(now);
        }
    }
}

/// Состояния, в которых системы получают `update`.
fn updates_in(state: GameState) -> bool {
    matches!(state, GameState::Menu | GameState::Playing | GameState::GameOver)
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.scheduler.cancel();
    }
}
