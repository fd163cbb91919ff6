//! Drawing-command canvas with a deterministic software rasterizer
//!
//! The compositor records an ordered sequence of drawing commands; rendering
//! them to an RGB8 buffer is fully integer-deterministic, so identical inputs
//! produce byte-identical images. Encoding the buffer to PNG or another file
//! format is a downstream concern.

pub mod font;

/// RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const NEAR_WHITE: Color = Color::new(245, 245, 245);
    pub const NEAR_BLACK: Color = Color::new(20, 20, 20);
    pub const WHITE: Color = Color::new(255, 255, 255);
    pub const GRAY: Color = Color::new(128, 128, 128);
    pub const DARK_GRAY: Color = Color::new(64, 64, 64);
    pub const RED: Color = Color::new(255, 0, 0);
    pub const PINK: Color = Color::new(255, 175, 175);
    pub const ORANGE: Color = Color::new(255, 200, 0);
    pub const YELLOW: Color = Color::new(255, 255, 0);
    pub const MAGENTA: Color = Color::new(255, 0, 255);
    pub const CYAN: Color = Color::new(0, 255, 255);
    pub const BLUE: Color = Color::new(0, 0, 255);
}

/// One recorded drawing command.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    FillRect {
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        color: Color,
    },
    Line {
        x0: f64,
        y0: f64,
        x1: f64,
        y1: f64,
        color: Color,
    },
    FillPolygon {
        points: Vec<(f64, f64)>,
        color: Color,
    },
    Text {
        text: String,
        x: f64,
        y: f64,
        size: u32,
        color: Color,
        rotated: bool,
    },
}

/// A fixed-size canvas holding the recorded command sequence.
#[derive(Debug, Clone)]
pub struct Canvas {
    width: u32,
    height: u32,
    background: Color,
    ops: Vec<DrawOp>,
}

impl Canvas {
    pub fn new(width: u32, height: u32, background: Color) -> Self {
        Self {
            width,
            height,
            background,
            ops: Vec::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    pub fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: Color) {
        self.ops.push(DrawOp::FillRect { x, y, w, h, color });
    }

    pub fn line(&mut self, x0: f64, y0: f64, x1: f64, y1: f64, color: Color) {
        self.ops.push(DrawOp::Line {
            x0,
            y0,
            x1,
            y1,
            color,
        });
    }

    pub fn fill_polygon(&mut self, points: Vec<(f64, f64)>, color: Color) {
        self.ops.push(DrawOp::FillPolygon { points, color });
    }

    /// Horizontal label; `size` is the glyph height in pixels.
    pub fn text(&mut self, text: impl Into<String>, x: f64, y: f64, size: u32, color: Color) {
        self.ops.push(DrawOp::Text {
            text: text.into(),
            x,
            y,
            size,
            color,
            rotated: false,
        });
    }

    /// Label rotated 90 degrees clockwise, running downward from (x, y).
    pub fn text_rotated(
        &mut self,
        text: impl Into<String>,
        x: f64,
        y: f64,
        size: u32,
        color: Color,
    ) {
        self.ops.push(DrawOp::Text {
            text: text.into(),
            x,
            y,
            size,
            color,
            rotated: true,
        });
    }

    /// Render every command, in order, into a row-major RGB8 buffer of
    /// `width * height * 3` bytes.
    pub fn rasterize(&self) -> Vec<u8> {
        let mut buf = Raster::new(self.width, self.height, self.background);
        for op in &self.ops {
            match op {
                DrawOp::FillRect { x, y, w, h, color } => buf.fill_rect(*x, *y, *w, *h, *color),
                DrawOp::Line {
                    x0,
                    y0,
                    x1,
                    y1,
                    color,
                } => buf.line(*x0, *y0, *x1, *y1, *color),
                DrawOp::FillPolygon { points, color } => buf.fill_polygon(points, *color),
                DrawOp::Text {
                    text,
                    x,
                    y,
                    size,
                    color,
                    rotated,
                } => buf.text(text, *x, *y, *size, *color, *rotated),
            }
        }
        buf.pixels
    }
}

struct Raster {
    width: i64,
    height: i64,
    pixels: Vec<u8>,
}

impl Raster {
    fn new(width: u32, height: u32, background: Color) -> Self {
        let mut pixels = vec![0u8; width as usize * height as usize * 3];
        for px in pixels.chunks_exact_mut(3) {
            px[0] = background.r;
            px[1] = background.g;
            px[2] = background.b;
        }
        Self {
            width: width as i64,
            height: height as i64,
            pixels,
        }
    }

    fn set(&mut self, x: i64, y: i64, color: Color) {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return;
        }
        let idx = (y * self.width + x) as usize * 3;
        self.pixels[idx] = color.r;
        self.pixels[idx + 1] = color.g;
        self.pixels[idx + 2] = color.b;
    }

    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: Color) {
        if w <= 0.0 || h <= 0.0 {
            return;
        }
        let x0 = x.floor() as i64;
        let y0 = y.floor() as i64;
        let x1 = (x + w).ceil() as i64;
        let y1 = (y + h).ceil() as i64;
        for yy in y0..y1 {
            for xx in x0..x1 {
                self.set(xx, yy, color);
            }
        }
    }

    fn line(&mut self, x0: f64, y0: f64, x1: f64, y1: f64, color: Color) {
        // Bresenham over rounded endpoints
        let mut x = x0.round() as i64;
        let mut y = y0.round() as i64;
        let xe = x1.round() as i64;
        let ye = y1.round() as i64;
        let dx = (xe - x).abs();
        let dy = -(ye - y).abs();
        let sx = if x < xe { 1 } else { -1 };
        let sy = if y < ye { 1 } else { -1 };
        let mut err = dx + dy;
        loop {
            self.set(x, y, color);
            if x == xe && y == ye {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    fn fill_polygon(&mut self, points: &[(f64, f64)], color: Color) {
        if points.len() < 3 {
            return;
        }
        let y_min = points
            .iter()
            .map(|p| p.1)
            .fold(f64::INFINITY, f64::min)
            .floor() as i64;
        let y_max = points
            .iter()
            .map(|p| p.1)
            .fold(f64::NEG_INFINITY, f64::max)
            .ceil() as i64;

        for yy in y_min.max(0)..=y_max.min(self.height - 1) {
            let scan = yy as f64 + 0.5;
            let mut crossings: Vec<f64> = Vec::new();
            for i in 0..points.len() {
                let (ax, ay) = points[i];
                let (bx, by) = points[(i + 1) % points.len()];
                if (ay <= scan && by > scan) || (by <= scan && ay > scan) {
                    let t = (scan - ay) / (by - ay);
                    crossings.push(ax + t * (bx - ax));
                }
            }
            crossings.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            for span in crossings.chunks_exact(2) {
                let x0 = span[0].round() as i64;
                let x1 = span[1].round() as i64;
                for xx in x0..=x1 {
                    self.set(xx, yy, color);
                }
            }
        }
    }

    fn text(&mut self, text: &str, x: f64, y: f64, size: u32, color: Color, rotated: bool) {
        let scale = (size as i64 / (font::GLYPH_HEIGHT as i64 + 1)).max(1);
        let mut pen_x = x.round() as i64;
        let mut pen_y = y.round() as i64;
        for c in text.chars() {
            let columns = font::glyph(c);
            for (cx, col) in columns.iter().enumerate() {
                for cy in 0..font::GLYPH_HEIGHT {
                    if col & (1 << cy) == 0 {
                        continue;
                    }
                    // one font dot becomes a scale x scale block
                    let (dot_x, dot_y) = if rotated {
                        (
                            pen_x - cy as i64 * scale,
                            pen_y + cx as i64 * scale,
                        )
                    } else {
                        (
                            pen_x + cx as i64 * scale,
                            pen_y + cy as i64 * scale,
                        )
                    };
                    for sy in 0..scale {
                        for sx in 0..scale {
                            self.set(dot_x + sx, dot_y + sy, color);
                        }
                    }
                }
            }
            if rotated {
                pen_y += font::GLYPH_ADVANCE as i64 * scale;
            } else {
                pen_x += font::GLYPH_ADVANCE as i64 * scale;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_background_fill() {
        let canvas = Canvas::new(4, 2, Color::NEAR_WHITE);
        let buf = canvas.rasterize();
        assert_eq!(buf.len(), 4 * 2 * 3);
        assert!(buf.chunks_exact(3).all(|px| px == [245, 245, 245]));
    }

    #[test]
    fn test_fill_rect_clipped_to_canvas() {
        let mut canvas = Canvas::new(4, 4, Color::WHITE);
        canvas.fill_rect(2.0, 2.0, 10.0, 10.0, Color::RED);
        let buf = canvas.rasterize();
        let px = |x: usize, y: usize| &buf[(y * 4 + x) * 3..(y * 4 + x) * 3 + 3];
        assert_eq!(px(3, 3), [255, 0, 0]);
        assert_eq!(px(1, 1), [255, 255, 255]);
    }

    #[test]
    fn test_line_endpoints_set() {
        let mut canvas = Canvas::new(8, 8, Color::WHITE);
        canvas.line(0.0, 0.0, 7.0, 7.0, Color::BLUE);
        let buf = canvas.rasterize();
        let px = |x: usize, y: usize| &buf[(y * 8 + x) * 3..(y * 8 + x) * 3 + 3];
        assert_eq!(px(0, 0), [0, 0, 255]);
        assert_eq!(px(7, 7), [0, 0, 255]);
    }

    #[test]
    fn test_polygon_fill_covers_interior() {
        let mut canvas = Canvas::new(10, 10, Color::WHITE);
        canvas.fill_polygon(
            vec![(1.0, 1.0), (9.0, 1.0), (9.0, 9.0), (1.0, 9.0)],
            Color::GRAY,
        );
        let buf = canvas.rasterize();
        let px = |x: usize, y: usize| &buf[(y * 10 + x) * 3..(y * 10 + x) * 3 + 3];
        assert_eq!(px(5, 5), [128, 128, 128]);
        assert_eq!(px(0, 0), [255, 255, 255]);
    }

    #[test]
    fn test_rasterize_is_deterministic() {
        let mut canvas = Canvas::new(32, 16, Color::NEAR_WHITE);
        canvas.text("chr1:100-200", 1.0, 1.0, 8, Color::NEAR_BLACK);
        canvas.line(0.0, 15.0, 31.0, 0.0, Color::GRAY);
        canvas.fill_polygon(vec![(2.0, 2.0), (20.0, 2.0), (10.0, 12.0)], Color::ORANGE);
        assert_eq!(canvas.rasterize(), canvas.rasterize());
    }

    #[test]
    fn test_text_marks_pixels() {
        let mut canvas = Canvas::new(16, 10, Color::WHITE);
        canvas.text("A", 0.0, 0.0, 8, Color::NEAR_BLACK);
        let buf = canvas.rasterize();
        assert!(buf.chunks_exact(3).any(|px| px == [20, 20, 20]));
    }
}
