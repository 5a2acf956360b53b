use crate::surface::{Color, DrawSurface, Rect, SurfaceResult, TextStyle};

/// Категория команды отрисовки. У каждой категории свой приоритет по умолчанию.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DrawKind {
    Background,
    Shape,
    Sprite,
    Text,
    Ui,
}

impl DrawKind {
    /// Меньше → раньше.
    pub const fn default_priority(self) -> i32 {
        match self {
            DrawKind::Background => 0,
            DrawKind::Shape => 10,
            DrawKind::Sprite => 20,
            DrawKind::Text => 30,
            DrawKind::Ui => 40,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpriteDraw {
    pub sprite: String,
    pub dst: Rect,
    /// Регион внутри sprite sheet; `None` значит всё изображение.
    pub src: Option<Rect>,
    pub rotation: f32,
    /// Точка вращения в долях размера `dst`; (0.5, 0.5) это центр.
    pub origin: (f32, f32),
    pub alpha: f32,
}

impl SpriteDraw {
    pub fn new(sprite: impl Into<String>, dst: Rect) -> Self {
        Self {
            sprite: sprite.into(),
            dst,
            src: None,
            rotation: 0.0,
            origin: (0.5, 0.5),
            alpha: 1.0,
        }
    }

    pub fn region(mut self, src: Rect) -> Self {
        self.src = Some(src);
        self
    }

    pub fn rotated(mut self, radians: f32) -> Self {
        self.rotation = radians;
        self
    }

    pub fn origin(mut self, ox: f32, oy: f32) -> Self {
        self.origin = (ox, oy);
        self
    }

    pub fn alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha.clamp(0.0, 1.0);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextDraw {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub style: TextStyle,
    /// Обводка рисуется до заливки.
    pub stroke: Option<(Color, f32)>,
}

/// Неизменяемые данные команды, их интерпретирует [`execute`].
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Rect { rect: Rect, color: Color },
    RectOutline { rect: Rect, color: Color, line_width: f32 },
    Circle { cx: f32, cy: f32, radius: f32, color: Color },
    CircleOutline { cx: f32, cy: f32, radius: f32, color: Color, line_width: f32 },
    Line { from: (f32, f32), to: (f32, f32), color: Color, width: f32 },
    Text(TextDraw),
    Sprite(SpriteDraw),
    Star { x: f32, y: f32, size: f32, alpha: f32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawCommand {
    pub kind: DrawKind,
    pub priority: i32,
    /// Clip, активный в момент submit. Едет вместе с командой,
    /// поэтому сортировка не выносит её из своего clip.
    pub clip: Option<Rect>,
    pub op: DrawOp,
}

impl DrawCommand {
    pub fn new(kind: DrawKind, op: DrawOp) -> Self {
        Self { kind, priority: kind.default_priority(), clip: None, op }
    }
}

/// Очередь команд кадра. Очищается в начале кадра, drain в конце.
pub struct DrawQueue {
    buf: Vec<DrawCommand>,
}

impl DrawQueue {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self { buf: Vec::with_capacity(cap) }
    }

    #[inline]
    pub fn push(&mut self, cmd: DrawCommand) {
        self.buf.push(cmd);
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// По возрастанию приоритета. Сортировка стабильная: равные сохраняют порядок submit.
    pub fn sort_by_priority(&mut self) {
        self.buf.sort_by_key(|c| c.priority);
    }

    #[inline]
    pub fn drain(&mut self) -> std::vec::Drain<'_, DrawCommand> {
        self.buf.drain(..)
    }

    #[inline]
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &DrawCommand> {
        self.buf.iter()
    }
}

impl Default for DrawQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Выполнить команду; clip применяется внутри save/restore.
pub fn execute_command(cmd: &DrawCommand, surface: &mut dyn DrawSurface) -> SurfaceResult {
    let Some(clip) = cmd.clip else {
        return execute(&cmd.op, surface);
    };

    surface.save();
    let res = surface.clip_rect(clip).and_then(|_| execute(&cmd.op, surface));
    surface.restore();
    res
}

/// Единственная точка исполнения DrawOp.
pub fn execute(op: &DrawOp, surface: &mut dyn DrawSurface) -> SurfaceResult {
    match op {
        DrawOp::Rect { rect, color } => surface.fill_rect(*rect, *color),
        DrawOp::RectOutline { rect, color, line_width } => {
            surface.stroke_rect(*rect, *color, *line_width)
        }
        DrawOp::Circle { cx, cy, radius, color } => surface.fill_circle(*cx, *cy, *radius, *color),
        DrawOp::CircleOutline { cx, cy, radius, color, line_width } => {
            surface.stroke_circle(*cx, *cy, *radius, *color, *line_width)
        }
        DrawOp::Line { from, to, color, width } => surface.line(*from, *to, *color, *width),
        DrawOp::Text(t) => {
            if let Some((stroke, width)) = t.stroke {
                surface.stroke_text(&t.text, t.x, t.y, &t.style, stroke, width)?;
            }
            surface.fill_text(&t.text, t.x, t.y, &t.style)
        }
        DrawOp::Sprite(s) => draw_sprite(s, surface),
        DrawOp::Star { x, y, size, alpha } => {
            surface.fill_rect(Rect::new(*x, *y, *size, *size), Color::WHITE.with_alpha(*alpha))
        }
    }
}

fn draw_sprite(s: &SpriteDraw, surface: &mut dyn DrawSurface) -> SurfaceResult {
    surface.save();
    surface.set_alpha(s.alpha);

    if s.rotation != 0.0 {
        let ox = s.dst.x + s.dst.w * s.origin.0;
        let oy = s.dst.y + s.dst.h * s.origin.1;
        surface.translate(ox, oy);
        surface.rotate(s.rotation);
        surface.translate(-ox, -oy);
    }

    let res = surface.draw_image(&s.sprite, s.src, s.dst);
    // restore даже если draw_image упал.
    surface.restore();
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{RecordingSurface, SurfaceCall};

    fn rect_cmd(priority: i32, x: f32) -> DrawCommand {
        DrawCommand {
            priority,
            ..DrawCommand::new(
                DrawKind::Shape,
                DrawOp::Rect { rect: Rect::new(x, 0.0, 1.0, 1.0), color: Color::WHITE },
            )
        }
    }

    #[test]
    fn sort_is_stable() {
        let mut q = DrawQueue::new();
        q.push(rect_cmd(30, 0.0));
        q.push(rect_cmd(10, 1.0));
        q.push(rect_cmd(20, 2.0));
        q.push(rect_cmd(10, 3.0));
        q.sort_by_priority();

        let order: Vec<(i32, f32)> = q
            .drain()
            .map(|c| match c.op {
                DrawOp::Rect { rect, .. } => (c.priority, rect.x),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(order, vec![(10, 1.0), (10, 3.0), (20, 2.0), (30, 0.0)]);
        assert!(q.is_empty());
    }

    #[test]
    fn text_stroke_comes_before_fill() {
        let mut s = RecordingSurface::new();
        let journal = s.journal();
        let op = DrawOp::Text(TextDraw {
            text: "SCORE".into(),
            x: 4.0,
            y: 4.0,
            style: TextStyle::default(),
            stroke: Some((Color::BLACK, 2.0)),
        });
        execute(&op, &mut s).unwrap();

        let calls = journal.calls();
        assert!(matches!(calls[0], SurfaceCall::StrokeText { .. }));
        assert!(matches!(calls[1], SurfaceCall::FillText { .. }));
    }

    #[test]
    fn sprite_rotates_around_origin_and_restores_on_failure() {
        let mut s = RecordingSurface::new();
        let journal = s.journal();
        let op = DrawOp::Sprite(
            SpriteDraw::new("missing", Rect::new(10.0, 20.0, 40.0, 20.0))
                .rotated(1.0)
                .origin(0.0, 1.0)
                .alpha(0.5),
        );
        assert!(execute(&op, &mut s).is_err());
        assert_eq!(s.depth(), 0);

        let calls = journal.calls();
        assert_eq!(
            calls,
            vec![
                SurfaceCall::Save,
                SurfaceCall::Alpha(0.5),
                SurfaceCall::Translate(10.0, 40.0),
                SurfaceCall::Rotate(1.0),
                SurfaceCall::Translate(-10.0, -40.0),
                SurfaceCall::Restore,
            ]
        );
    }

    #[test]
    fn clipped_command_is_wrapped_in_save_restore() {
        let mut s = RecordingSurface::new();
        let journal = s.journal();
        let clip = Rect::new(0.0, 0.0, 10.0, 10.0);
        let cmd = DrawCommand { clip: Some(clip), ..rect_cmd(10, 1.0) };
        execute_command(&cmd, &mut s).unwrap();

        let calls = journal.calls();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[0], SurfaceCall::Save);
        assert_eq!(calls[1], SurfaceCall::Clip(clip));
        assert!(matches!(calls[2], SurfaceCall::FillRect(..)));
        assert_eq!(calls[3], SurfaceCall::Restore);
    }

    #[test]
    fn default_priorities_are_ordered() {
        assert!(DrawKind::Background.default_priority() < DrawKind::Shape.default_priority());
        assert!(DrawKind::Sprite.default_priority() < DrawKind::Text.default_priority());
        assert!(DrawKind::Text.default_priority() < DrawKind::Ui.default_priority());
    }
}
