use starfall_core::{commands::SpriteDraw, render::RenderPipeline, Color, Rect, System, TextStyle};

pub const SHIP_SPRITE: &str = "ship";

/// Player ship sweeping across the bottom of the screen.
pub struct ShipSystem {
    x: f32,
    dir: f32,
    speed: f32,
}

impl ShipSystem {
    pub fn new() -> Self {
        Self { x: 40.0, dir: 1.0, speed: 0.2 }
    }
}

impl System for ShipSystem {
    fn update(&mut self, dt_ms: f64) -> anyhow::Result<()> {
        self.x += self.dir * self.speed * dt_ms as f32;
        if !(0.0..=760.0).contains(&self.x) {
            self.dir = -self.dir;
            self.x = self.x.clamp(0.0, 760.0);
        }
        Ok(())
    }

    fn render(&mut self, pipeline: &mut RenderPipeline) -> anyhow::Result<()> {
        let y = pipeline.viewport().height() - 60.0;
        pipeline.sprite(SpriteDraw::new(SHIP_SPRITE, Rect::new(self.x, y, 40.0, 40.0)));
        Ok(())
    }
}

/// Score line and a lives bar.
pub struct HudSystem {
    score: u64,
}

impl HudSystem {
    pub fn new() -> Self {
        Self { score: 0 }
    }
}

impl System for HudSystem {
    fn update(&mut self, _dt_ms: f64) -> anyhow::Result<()> {
        self.score += 10;
        Ok(())
    }

    fn render(&mut self, pipeline: &mut RenderPipeline) -> anyhow::Result<()> {
        let w = pipeline.viewport().width();
        let style = TextStyle { size: 18.0, ..TextStyle::default() };
        let score = format!("SCORE {:06}", self.score);
        pipeline.text_outlined(score, w - 180.0, 24.0, &style, Color::BLACK, 2.0);

        pipeline.set_clip_region(10.0, 10.0, 90.0, 16.0);
        pipeline.rect(10.0, 10.0, 90.0, 16.0, Color::rgb(220, 40, 40));
        pipeline.clear_clip_region();
        Ok(())
    }
}
