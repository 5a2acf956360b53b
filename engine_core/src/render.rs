//! Per-frame draw command pipeline.
//!
//! With batching on, primitives are queued during the frame and run sorted at
//! [`RenderPipeline::end_frame`]. With batching off they hit the surface
//! immediately. Either way a failing command is logged and skipped.

use crate::commands::{execute_command, DrawCommand, DrawKind, DrawOp, DrawQueue, SpriteDraw, TextDraw};
use crate::config::EngineConfig;
use crate::error::{catch_panic, EngineError, EngineResult, SurfaceError};
use crate::log::Logger;
use crate::starfield::StarField;
use crate::state::GameState;
use crate::surface::{Color, DrawSurface, Rect, TextStyle};
use crate::telemetry::Metrics;
use crate::viewport::Viewport;

/// Outcome of one frame's command execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub draw_calls: u32,
    pub failed: u32,
}

pub struct RenderPipeline {
    log: Logger,
    surface: Box<dyn DrawSurface>,

    queue: DrawQueue,
    batching: bool,
    smoothing: bool,
    debug: bool,

    viewport: Viewport,
    background: Color,
    stars: StarField,
    max_stars: usize,

    /// Effective clip per level; each push intersects with the level below.
    clips: Vec<Rect>,

    frame: FrameStats,
    last_frame: FrameStats,
}

impl RenderPipeline {
    pub fn new(surface: Box<dyn DrawSurface>, cfg: &EngineConfig) -> Self {
        Self::with_stars(surface, cfg, StarField::new(cfg.star_speed))
    }

    /// Same as [`RenderPipeline::new`] with a caller-provided star field.
    pub fn with_stars(surface: Box<dyn DrawSurface>, cfg: &EngineConfig, stars: StarField) -> Self {
        let mut me = Self {
            log: Logger::new("Render"),
            surface,
            queue: DrawQueue::with_capacity(cfg.max_stars as usize + 256),
            batching: cfg.enable_batching,
            smoothing: cfg.enable_anti_aliasing,
            debug: cfg.debug,
            viewport: Viewport::logical(cfg.width, cfg.height),
            background: Color::rgb(2, 2, 12),
            stars,
            max_stars: cfg.max_stars as usize,
            clips: Vec::new(),
            frame: FrameStats::default(),
            last_frame: FrameStats::default(),
        };
        let (w, h) = (me.viewport.width(), me.viewport.height());
        me.stars.reset(me.max_stars, w, h);
        me
    }

    /// Push a new viewport to the surface. Regenerates the star field when the
    /// logical size changed. Only called between frames.
    pub fn apply_viewport(&mut self, viewport: Viewport) -> EngineResult<()> {
        self.surface.configure(&viewport)?;
        // Resize backing store сбрасывает состояние контекста.
        self.surface.set_smoothing(self.smoothing);

        let resized = viewport.display_width != self.viewport.display_width
            || viewport.display_height != self.viewport.display_height;
        self.viewport = viewport;

        if resized {
            self.stars.reset(self.max_stars, viewport.width(), viewport.height());
            self.log.debug(format!(
                "viewport {}x{} @{} ({} stars)",
                viewport.display_width,
                viewport.display_height,
                viewport.pixel_ratio,
                self.stars.len()
            ));
        }
        Ok(())
    }

    #[inline]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    #[inline]
    pub fn is_batching(&self) -> bool {
        self.batching
    }

    /// Switching mid-frame flushes nothing; queued commands still run at frame end.
    pub fn set_batching(&mut self, enabled: bool) {
        self.batching = enabled;
    }

    pub fn set_debug(&mut self, enabled: bool) {
        self.debug = enabled;
    }

    pub fn set_background(&mut self, color: Color) {
        self.background = color;
    }

    #[inline]
    pub fn stars(&self) -> &StarField {
        &self.stars
    }

    #[inline]
    pub fn stars_mut(&mut self) -> &mut StarField {
        &mut self.stars
    }

    /// Commands queued and not yet executed.
    #[inline]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Stats of the frame in progress.
    #[inline]
    pub fn frame_stats(&self) -> FrameStats {
        self.frame
    }

    /// Stats of the last finished frame.
    #[inline]
    pub fn last_frame_stats(&self) -> FrameStats {
        self.last_frame
    }

    #[inline]
    pub fn clip_depth(&self) -> usize {
        self.clips.len()
    }

    pub fn begin_frame(&mut self) -> EngineResult<()> {
        self.queue.clear();
        self.clips.clear();
        self.frame = FrameStats::default();
        self.surface.clear()?;
        Ok(())
    }

    pub fn end_frame(&mut self) -> FrameStats {
        if self.batching {
            self.queue.sort_by_priority();
        }

        let mut queue = std::mem::take(&mut self.queue);
        for cmd in queue.drain() {
            self.run(&cmd);
        }
        // Аллокацию оставляем на следующий кадр.
        self.queue = queue;

        self.clips.clear();
        self.last_frame = self.frame;
        self.frame
    }

    /// Queue (or run, when batching is off) a command with an explicit priority.
    pub fn submit(&mut self, kind: DrawKind, priority: i32, op: DrawOp) {
        let cmd = DrawCommand { kind, priority, clip: self.clips.last().copied(), op };
        if self.batching {
            self.queue.push(cmd);
        } else {
            self.run(&cmd);
        }
    }

    #[inline]
    fn submit_default(&mut self, kind: DrawKind, op: DrawOp) {
        self.submit(kind, kind.default_priority(), op);
    }

    fn run(&mut self, cmd: &DrawCommand) {
        let surface = self.surface.as_mut();
        let res = catch_panic(|| execute_command(cmd, surface))
            .unwrap_or_else(|msg| Err(SurfaceError::Backend(format!("panicked: {msg}"))));

        match res {
            Ok(()) => self.frame.draw_calls += 1,
            Err(e) => {
                self.frame.failed += 1;
                let err = EngineError::Draw(e);
                self.log.warn(format!("skipped {:?} command (priority {}): {err}", cmd.kind, cmd.priority));
            }
        }
    }

    pub fn rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Color) {
        self.submit_default(DrawKind::Shape, DrawOp::Rect { rect: Rect::new(x, y, w, h), color });
    }

    pub fn rect_outline(&mut self, x: f32, y: f32, w: f32, h: f32, color: Color, line_width: f32) {
        self.submit_default(
            DrawKind::Shape,
            DrawOp::RectOutline { rect: Rect::new(x, y, w, h), color, line_width },
        );
    }

    pub fn circle(&mut self, cx: f32, cy: f32, radius: f32, color: Color) {
        self.submit_default(DrawKind::Shape, DrawOp::Circle { cx, cy, radius, color });
    }

    pub fn circle_outline(&mut self, cx: f32, cy: f32, radius: f32, color: Color, line_width: f32) {
        self.submit_default(
            DrawKind::Shape,
            DrawOp::CircleOutline { cx, cy, radius, color, line_width },
        );
    }

    pub fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, color: Color, width: f32) {
        self.submit_default(
            DrawKind::Shape,
            DrawOp::Line { from: (x1, y1), to: (x2, y2), color, width },
        );
    }

    pub fn text(&mut self, text: impl Into<String>, x: f32, y: f32, style: &TextStyle) {
        self.submit_default(
            DrawKind::Text,
            DrawOp::Text(TextDraw { text: text.into(), x, y, style: style.clone(), stroke: None }),
        );
    }

    /// Text with an outline drawn under the fill.
    pub fn text_outlined(
        &mut self,
        text: impl Into<String>,
        x: f32,
        y: f32,
        style: &TextStyle,
        stroke: Color,
        stroke_width: f32,
    ) {
        self.submit_default(
            DrawKind::Text,
            DrawOp::Text(TextDraw {
                text: text.into(),
                x,
                y,
                style: style.clone(),
                stroke: Some((stroke, stroke_width)),
            }),
        );
    }

    pub fn sprite(&mut self, sprite: SpriteDraw) {
        self.submit_default(DrawKind::Sprite, DrawOp::Sprite(sprite));
    }

    /// Draw a region of a sprite sheet.
    pub fn sprite_region(&mut self, sprite: impl Into<String>, src: Rect, dst: Rect) {
        self.sprite(SpriteDraw::new(sprite, dst).region(src));
    }

    /// Restrict subsequent commands to `rect` (intersected with the current clip).
    pub fn set_clip_region(&mut self, x: f32, y: f32, w: f32, h: f32) {
        let r = Rect::new(x, y, w, h);
        let effective = match self.clips.last() {
            Some(top) => top.intersect(&r),
            None => r,
        };
        self.clips.push(effective);
    }

    /// Pop one clip level. No-op on an empty stack.
    pub fn clear_clip_region(&mut self) {
        self.clips.pop();
    }

    /// Fill the background and advance + queue the star field.
    pub fn draw_background(&mut self, delta_ms: f64) {
        let vp = self.viewport;
        self.submit_default(
            DrawKind::Background,
            DrawOp::Rect { rect: Rect::new(0.0, 0.0, vp.width(), vp.height()), color: self.background },
        );

        self.stars.advance(delta_ms, vp.width(), vp.height());

        let prio = DrawKind::Background.default_priority();
        for i in 0..self.stars.len() {
            let s = self.stars.stars()[i];
            self.submit(
                DrawKind::Background,
                prio,
                DrawOp::Star { x: s.x, y: s.y, size: s.size(), alpha: s.alpha() },
            );
        }
    }

    /// FPS / timing / state readout in the top-left corner. Debug builds of the
    /// config only.
    pub fn draw_debug_overlay(&mut self, metrics: &Metrics, state: GameState) {
        if !self.debug {
            return;
        }

        let style = TextStyle { size: 12.0, color: Color::rgb(0, 255, 0), ..TextStyle::default() };
        let lines = [
            format!("FPS: {:.0} (avg {:.1})", metrics.fps, metrics.average_fps),
            format!("Frame: {:.2} ms", metrics.frame_time),
            format!("Render: {:.2} ms", metrics.render_time),
            format!("State: {}", state.as_str()),
            format!("Draw calls: {}", self.last_frame.draw_calls),
        ];

        self.submit_default(
            DrawKind::Ui,
            DrawOp::Rect { rect: Rect::new(4.0, 4.0, 180.0, 80.0), color: Color::rgba(0, 0, 0, 160) },
        );
        for (i, line) in lines.into_iter().enumerate() {
            self.submit_default(
                DrawKind::Ui,
                DrawOp::Text(TextDraw {
                    text: line,
                    x: 10.0,
                    y: 18.0 + i as f32 * 14.0,
                    style: style.clone(),
                    stroke: None,
                }),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{RecordingSurface, SurfaceCall};

    fn pipeline(batching: bool) -> (RenderPipeline, crate::surface::Journal) {
        let surface = RecordingSurface::new().with_sprite("ship");
        let journal = surface.journal();
        let cfg = EngineConfig { enable_batching: batching, max_stars: 0, ..EngineConfig::default() };
        let p = RenderPipeline::with_stars(Box::new(surface), &cfg, StarField::with_seed(1, 1.0));
        (p, journal)
    }

    fn fill_xs(journal: &crate::surface::Journal) -> Vec<f32> {
        journal
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                SurfaceCall::FillRect(r, _) => Some(r.x),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn batched_commands_run_by_priority() {
        let (mut p, journal) = pipeline(true);
        p.begin_frame().unwrap();
        p.submit(DrawKind::Shape, 30, DrawOp::Rect { rect: Rect::new(30.0, 0.0, 1.0, 1.0), color: Color::WHITE });
        p.submit(DrawKind::Shape, 10, DrawOp::Rect { rect: Rect::new(10.0, 0.0, 1.0, 1.0), color: Color::WHITE });
        p.submit(DrawKind::Shape, 20, DrawOp::Rect { rect: Rect::new(20.0, 0.0, 1.0, 1.0), color: Color::WHITE });
        assert_eq!(p.pending(), 3);
        assert_eq!(fill_xs(&journal), Vec::<f32>::new());

        let stats = p.end_frame();
        assert_eq!(stats, FrameStats { draw_calls: 3, failed: 0 });
        assert_eq!(fill_xs(&journal), vec![10.0, 20.0, 30.0]);
        assert_eq!(p.pending(), 0);
    }

    #[test]
    fn panicking_command_is_skipped() {
        let surface = RecordingSurface::new().with_corrupt_sprite("glitch");
        let journal = surface.journal();
        let cfg = EngineConfig { max_stars: 0, ..EngineConfig::default() };
        let mut p = RenderPipeline::with_stars(Box::new(surface), &cfg, StarField::with_seed(1, 1.0));

        p.begin_frame().unwrap();
        p.sprite(SpriteDraw::new("glitch", Rect::new(0.0, 0.0, 4.0, 4.0)));
        // Runs after the sprite.
        p.submit(DrawKind::Ui, 40, DrawOp::Rect { rect: Rect::new(7.0, 0.0, 1.0, 1.0), color: Color::WHITE });

        let stats = p.end_frame();
        assert_eq!(stats, FrameStats { draw_calls: 1, failed: 1 });
        assert_eq!(fill_xs(&journal), vec![7.0]);
    }

    #[test]
    fn unbatched_commands_run_in_submission_order() {
        let (mut p, journal) = pipeline(false);
        p.begin_frame().unwrap();
        p.submit(DrawKind::Shape, 30, DrawOp::Rect { rect: Rect::new(30.0, 0.0, 1.0, 1.0), color: Color::WHITE });
        p.submit(DrawKind::Shape, 10, DrawOp::Rect { rect: Rect::new(10.0, 0.0, 1.0, 1.0), color: Color::WHITE });
        // Уже на surface до end_frame.
        assert_eq!(fill_xs(&journal), vec![30.0, 10.0]);
        p.submit(DrawKind::Shape, 20, DrawOp::Rect { rect: Rect::new(20.0, 0.0, 1.0, 1.0), color: Color::WHITE });

        let stats = p.end_frame();
        assert_eq!(stats.draw_calls, 3);
        assert_eq!(fill_xs(&journal), vec![30.0, 10.0, 20.0]);
    }

    #[test]
    fn failing_command_is_skipped() {
        let (mut p, journal) = pipeline(true);
        p.begin_frame().unwrap();
        p.rect(1.0, 0.0, 1.0, 1.0, Color::WHITE);
        p.circle(0.0, 0.0, -4.0, Color::WHITE);
        p.sprite(SpriteDraw::new("unknown", Rect::new(0.0, 0.0, 4.0, 4.0)));
        p.rect(2.0, 0.0, 1.0, 1.0, Color::WHITE);

        let stats = p.end_frame();
        assert_eq!(stats, FrameStats { draw_calls: 2, failed: 2 });
        assert_eq!(fill_xs(&journal), vec![1.0, 2.0]);
    }

    #[test]
    fn begin_frame_resets_queue_and_counters() {
        let (mut p, journal) = pipeline(true);
        p.begin_frame().unwrap();
        p.rect(0.0, 0.0, 1.0, 1.0, Color::WHITE);
        p.end_frame();

        p.begin_frame().unwrap();
        p.rect(0.0, 0.0, 1.0, 1.0, Color::WHITE);
        p.begin_frame().unwrap();
        assert_eq!(p.pending(), 0);
        assert_eq!(p.frame_stats(), FrameStats::default());
        assert_eq!(p.last_frame_stats().draw_calls, 1);
        assert_eq!(journal.count(|c| *c == SurfaceCall::Clear), 3);
    }

    #[test]
    fn clip_stack_pops_one_level_and_tolerates_empty() {
        let (mut p, journal) = pipeline(true);
        p.begin_frame().unwrap();
        p.clear_clip_region();
        assert_eq!(p.clip_depth(), 0);

        p.set_clip_region(0.0, 0.0, 100.0, 100.0);
        p.set_clip_region(50.0, 50.0, 100.0, 100.0);
        assert_eq!(p.clip_depth(), 2);
        p.rect(60.0, 60.0, 1.0, 1.0, Color::WHITE);
        p.clear_clip_region();
        assert_eq!(p.clip_depth(), 1);
        p.rect(5.0, 5.0, 1.0, 1.0, Color::WHITE);
        p.clear_clip_region();
        p.rect(7.0, 7.0, 1.0, 1.0, Color::WHITE);
        p.end_frame();

        let clips: Vec<Rect> = journal
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                SurfaceCall::Clip(r) => Some(r),
                _ => None,
            })
            .collect();
        assert_eq!(
            clips,
            vec![Rect::new(50.0, 50.0, 50.0, 50.0), Rect::new(0.0, 0.0, 100.0, 100.0)]
        );
        assert_eq!(journal.count(|c| *c == SurfaceCall::Save), 2);
        assert_eq!(journal.count(|c| *c == SurfaceCall::Restore), 2);
    }

    #[test]
    fn background_draws_every_star_first() {
        let surface = RecordingSurface::new();
        let journal = surface.journal();
        let cfg = EngineConfig { max_stars: 25, ..EngineConfig::default() };
        let mut p = RenderPipeline::with_stars(Box::new(surface), &cfg, StarField::with_seed(9, 1.0));

        p.begin_frame().unwrap();
        p.line(0.0, 0.0, 5.0, 5.0, Color::WHITE, 1.0);
        p.draw_background(16.0);
        let stats = p.end_frame();

        // One backdrop, 25 stars, one line.
        assert_eq!(stats.draw_calls, 27);
        let calls = journal.calls();
        let line_at = calls.iter().position(|c| matches!(c, SurfaceCall::Line { .. })).unwrap();
        assert_eq!(line_at, calls.len() - 1);
    }

    #[test]
    fn viewport_change_regenerates_stars() {
        let surface = RecordingSurface::new();
        let journal = surface.journal();
        let cfg = EngineConfig { max_stars: 40, ..EngineConfig::default() };
        let mut p = RenderPipeline::with_stars(Box::new(surface), &cfg, StarField::with_seed(5, 1.0));

        let vp = Viewport {
            display_width: 100,
            display_height: 50,
            actual_width: 200,
            actual_height: 100,
            pixel_ratio: 2.0,
        };
        p.apply_viewport(vp).unwrap();
        assert_eq!(p.stars().len(), 40);
        assert!(p.stars().stars().iter().all(|s| s.x < 100.0 && s.y < 50.0));
        assert_eq!(
            journal.calls()[0],
            SurfaceCall::Configure { width: 200, height: 100, scale: 2.0 }
        );
        assert_eq!(journal.calls()[1], SurfaceCall::Smoothing(true));
    }

    #[test]
    fn overlay_only_in_debug() {
        let (mut p, journal) = pipeline(true);
        let metrics = Metrics::default();

        p.begin_frame().unwrap();
        p.draw_debug_overlay(&metrics, GameState::Playing);
        p.end_frame();
        assert_eq!(journal.count(|c| matches!(c, SurfaceCall::FillText { .. })), 0);

        p.set_debug(true);
        p.begin_frame().unwrap();
        p.draw_debug_overlay(&metrics, GameState::Playing);
        p.end_frame();
        assert_eq!(journal.count(|c| matches!(c, SurfaceCall::FillText { .. })), 5);
    }

    #[test]
    fn sprite_region_sets_source() {
        let (mut p, journal) = pipeline(false);
        p.begin_frame().unwrap();
        let src = Rect::new(16.0, 0.0, 16.0, 16.0);
        let dst = Rect::new(100.0, 100.0, 32.0, 32.0);
        p.sprite_region("ship", src, dst);

        assert!(journal.calls().contains(&SurfaceCall::Image {
            sprite: "ship".into(),
            src: Some(src),
            dst,
        }));
    }
}
