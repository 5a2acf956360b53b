//! The drawing surface boundary.
//!
//! The engine only talks to an immediate-mode 2D context through [`DrawSurface`].
//! All coordinates are logical units; the surface applies the viewport scale
//! it was configured with.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use crate::error::SurfaceError;
use crate::viewport::Viewport;

pub type SurfaceResult = Result<(), SurfaceError>;

/// RGBA color, 8 bits per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    #[inline]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    #[inline]
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Replace alpha with `alpha` in [0, 1].
    #[inline]
    pub fn with_alpha(self, alpha: f32) -> Self {
        let a = (alpha.clamp(0.0, 1.0) * 255.0).round() as u8;
        Self { a, ..self }
    }

    /// Parse `#rgb`, `#rrggbb` or `#rrggbbaa`.
    pub fn hex(s: &str) -> Option<Self> {
        let h = s.strip_prefix('#').unwrap_or(s);
        let nib = |i: usize| u8::from_str_radix(&h[i..i + 1], 16).ok().map(|v| v * 17);
        let byte = |i: usize| u8::from_str_radix(h.get(i..i + 2)?, 16).ok();
        if !h.is_ascii() {
            return None;
        }
        match h.len() {
            3 => Some(Self::rgb(nib(0)?, nib(1)?, nib(2)?)),
            6 => Some(Self::rgb(byte(0)?, byte(2)?, byte(4)?)),
            8 => Some(Self::rgba(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    #[inline]
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// Overlap of both rects; empty overlaps have zero size.
    pub fn intersect(&self, other: &Rect) -> Rect {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = (self.x + self.w).min(other.x + other.w);
        let y1 = (self.y + self.h).min(other.y + other.h);
        Rect::new(x0, y0, (x1 - x0).max(0.0), (y1 - y0).max(0.0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub font: String,
    pub size: f32,
    pub color: Color,
    pub align: TextAlign,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font: "monospace".to_string(),
            size: 16.0,
            color: Color::WHITE,
            align: TextAlign::Left,
        }
    }
}

/// 2D immediate-mode drawing context. Every primitive is synchronous.
pub trait DrawSurface {
    /// Resize the backing store to the viewport's device size and scale
    /// drawing by its pixel ratio.
    fn configure(&mut self, viewport: &Viewport) -> SurfaceResult;

    fn set_smoothing(&mut self, enabled: bool);

    fn clear(&mut self) -> SurfaceResult;

    fn save(&mut self);
    fn restore(&mut self);

    fn clip_rect(&mut self, rect: Rect) -> SurfaceResult;

    fn set_alpha(&mut self, alpha: f32);
    fn translate(&mut self, x: f32, y: f32);
    fn rotate(&mut self, radians: f32);

    fn fill_rect(&mut self, rect: Rect, color: Color) -> SurfaceResult;
    fn stroke_rect(&mut self, rect: Rect, color: Color, line_width: f32) -> SurfaceResult;

    fn fill_circle(&mut self, cx: f32, cy: f32, radius: f32, color: Color) -> SurfaceResult;
    fn stroke_circle(
        &mut self,
        cx: f32,
        cy: f32,
        radius: f32,
        color: Color,
        line_width: f32,
    ) -> SurfaceResult;

    fn line(&mut self, from: (f32, f32), to: (f32, f32), color: Color, width: f32) -> SurfaceResult;

    fn fill_text(&mut self, text: &str, x: f32, y: f32, style: &TextStyle) -> SurfaceResult;
    fn stroke_text(
        &mut self,
        text: &str,
        x: f32,
        y: f32,
        style: &TextStyle,
        stroke: Color,
        width: f32,
    ) -> SurfaceResult;

    /// Draw `sprite` (or its `src` region) into `dst`.
    fn draw_image(&mut self, sprite: &str, src: Option<Rect>, dst: Rect) -> SurfaceResult;
}

/// One recorded surface call.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCall {
    Configure { width: u32, height: u32, scale: f32 },
    Smoothing(bool),
    Clear,
    Save,
    Restore,
    Clip(Rect),
    Alpha(f32),
    Translate(f32, f32),
    Rotate(f32),
    FillRect(Rect, Color),
    StrokeRect(Rect, Color, f32),
    FillCircle { cx: f32, cy: f32, radius: f32, color: Color },
    StrokeCircle { cx: f32, cy: f32, radius: f32, color: Color },
    Line { from: (f32, f32), to: (f32, f32), color: Color },
    FillText { text: String, x: f32, y: f32, color: Color },
    StrokeText { text: String, x: f32, y: f32, color: Color },
    Image { sprite: String, src: Option<Rect>, dst: Rect },
}

/// Shared, cloneable view of what a [`RecordingSurface`] received.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    calls: Rc<RefCell<Vec<SurfaceCall>>>,
}

impl Journal {
    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.calls.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.calls.borrow_mut().clear();
    }

    /// Count calls matching `pred`.
    pub fn count(&self, pred: impl Fn(&SurfaceCall) -> bool) -> usize {
        self.calls.borrow().iter().filter(|c| pred(c)).count()
    }

    fn push(&self, call: SurfaceCall) {
        self.calls.borrow_mut().push(call);
    }
}

/// In-memory surface that journals every call. Drives the headless host.
pub struct RecordingSurface {
    journal: Journal,
    sprites: HashSet<String>,
    depth: usize,
    size: (u32, u32),
    lost: bool,
    corrupt: HashSet<String>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self {
            journal: Journal::default(),
            sprites: HashSet::new(),
            depth: 0,
            size: (0, 0),
            lost: false,
            corrupt: HashSet::new(),
        }
    }

    /// Drawing `id` panics, as a backend would on bad image data.
    pub fn with_corrupt_sprite(mut self, id: impl Into<String>) -> Self {
        self.corrupt.insert(id.into());
        self
    }

    /// Every `clear` fails from now on, as after a lost context.
    pub fn lost_context(mut self) -> Self {
        self.lost = true;
        self
    }

    /// Mark a sprite id as loaded. Drawing unknown sprites fails.
    pub fn with_sprite(mut self, id: impl Into<String>) -> Self {
        self.sprites.insert(id.into());
        self
    }

    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    /// Current save/restore nesting.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Backing-store size in device pixels.
    pub fn size(&self) -> (u32, u32) {
        self.size
    }
}

impl Default for RecordingSurface {
    fn default() -> Self {
        Self::new()
    }
}

fn check_radius(radius: f32) -> SurfaceResult {
    if radius.is_finite() && radius >= 0.0 {
        Ok(())
    } else {
        Err(SurfaceError::InvalidGeometry(format!("radius {radius}")))
    }
}

impl DrawSurface for RecordingSurface {
    fn configure(&mut self, viewport: &Viewport) -> SurfaceResult {
        self.size = (viewport.actual_width, viewport.actual_height);
        self.journal.push(SurfaceCall::Configure {
            width: viewport.actual_width,
            height: viewport.actual_height,
            scale: viewport.pixel_ratio,
        });
        Ok(())
    }

    fn set_smoothing(&mut self, enabled: bool) {
        self.journal.push(SurfaceCall::Smoothing(enabled));
    }

    fn clear(&mut self) -> SurfaceResult {
        if self.lost {
            return Err(SurfaceError::Backend("context lost".into()));
        }
        self.journal.push(SurfaceCall::Clear);
        Ok(())
    }

    fn save(&mut self) {
        self.depth += 1;
        self.journal.push(SurfaceCall::Save);
    }

    fn restore(&mut self) {
        // Unbalanced restore is ignored, like a canvas context.
        self.depth = self.depth.saturating_sub(1);
        self.journal.push(SurfaceCall::Restore);
    }

    fn clip_rect(&mut self, rect: Rect) -> SurfaceResult {
        self.journal.push(SurfaceCall::Clip(rect));
        Ok(())
    }

    fn set_alpha(&mut self, alpha: f32) {
        self.journal.push(SurfaceCall::Alpha(alpha));
    }

    fn translate(&mut self, x: f32, y: f32) {
        self.journal.push(SurfaceCall::Translate(x, y));
    }

    fn rotate(&mut self, radians: f32) {
        self.journal.push(SurfaceCall::Rotate(radians));
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) -> SurfaceResult {
        self.journal.push(SurfaceCall::FillRect(rect, color));
        Ok(())
    }

    fn stroke_rect(&mut self, rect: Rect, color: Color, line_width: f32) -> SurfaceResult {
        self.journal.push(SurfaceCall::StrokeRect(rect, color, line_width));
        Ok(())
    }

    fn fill_circle(&mut self, cx: f32, cy: f32, radius: f32, color: Color) -> SurfaceResult {
        check_radius(radius)?;
        self.journal.push(SurfaceCall::FillCircle { cx, cy, radius, color });
        Ok(())
    }

    fn stroke_circle(
        &mut self,
        cx: f32,
        cy: f32,
        radius: f32,
        color: Color,
        _line_width: f32,
    ) -> SurfaceResult {
        check_radius(radius)?;
        self.journal.push(SurfaceCall::StrokeCircle { cx, cy, radius, color });
        Ok(())
    }

    fn line(&mut self, from: (f32, f32), to: (f32, f32), color: Color, _width: f32) -> SurfaceResult {
        self.journal.push(SurfaceCall::Line { from, to, color });
        Ok(())
    }

    fn fill_text(&mut self, text: &str, x: f32, y: f32, style: &TextStyle) -> SurfaceResult {
        self.journal.push(SurfaceCall::FillText {
            text: text.to_string(),
            x,
            y,
            color: style.color,
        });
        Ok(())
    }

    fn stroke_text(
        &mut self,
        text: &str,
        x: f32,
        y: f32,
        _style: &TextStyle,
        stroke: Color,
        _width: f32,
    ) -> SurfaceResult {
        self.journal.push(SurfaceCall::StrokeText {
            text: text.to_string(),
            x,
            y,
            color: stroke,
        });
        Ok(())
    }

    fn draw_image(&mut self, sprite: &str, src: Option<Rect>, dst: Rect) -> SurfaceResult {
        if self.corrupt.contains(sprite) {
            panic!("corrupt image data: {sprite}");
        }
        if !self.sprites.contains(sprite) {
            return Err(SurfaceError::MissingSprite(sprite.to_string()));
        }
        self.journal.push(SurfaceCall::Image {
            sprite: sprite.to_string(),
            src,
            dst,
        });
        Ok(())
    }
}
