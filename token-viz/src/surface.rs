//! Drawing target abstraction
//!
//! The renderer talks to a small 2D-canvas-shaped [`Surface`]. The browser
//! backend forwards to `CanvasRenderingContext2d`; [`RecordingSurface`]
//! keeps the calls as data for headless runs and tests.

use crate::geometry::Point;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

impl TextAlign {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextAlign::Left => "left",
            TextAlign::Center => "center",
            TextAlign::Right => "right",
        }
    }
}

pub trait Surface {
    /// Paint the whole viewport with `color`, ignoring any transform
    fn clear(&mut self, color: &str, width: f64, height: f64);
    fn save(&mut self);
    fn restore(&mut self);
    /// Apply `screen = scene * scale + offset` to subsequent drawing
    fn transform(&mut self, scale: f64, offset_x: f64, offset_y: f64);
    fn set_alpha(&mut self, alpha: f64);
    fn set_fill(&mut self, color: &str);
    fn set_stroke(&mut self, color: &str);
    fn set_line_width(&mut self, width: f64);
    fn set_font(&mut self, font: &str);
    fn set_text_align(&mut self, align: TextAlign);
    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64);
    fn line(&mut self, from: Point, to: Point);
    fn circle(&mut self, center: Point, radius: f64, fill: bool);
    fn fill_text(&mut self, text: &str, x: f64, y: f64);
}

/// One recorded surface call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DrawCommand {
    Clear { color: String, width: f64, height: f64 },
    Save,
    Restore,
    Transform { scale: f64, offset_x: f64, offset_y: f64 },
    Alpha(f64),
    Fill(String),
    Stroke(String),
    LineWidth(f64),
    Font(String),
    TextAlign(TextAlign),
    Rect { x: f64, y: f64, width: f64, height: f64 },
    Line { from: Point, to: Point },
    Circle { center: Point, radius: f64, fill: bool },
    Text { text: String, x: f64, y: f64 },
}

/// Surface that records every call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordingSurface {
    pub commands: Vec<DrawCommand>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.commands.clear();
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// All text drawn, in order
    pub fn texts(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&DrawCommand) -> bool) -> usize {
        self.commands.iter().filter(|c| pred(c)).count()
    }

    /// Number of shapes and texts, state changes excluded
    pub fn primitive_count(&self) -> usize {
        self.count(|c| {
            matches!(
                c,
                DrawCommand::Rect { .. } | DrawCommand::Line { .. } | DrawCommand::Circle { .. } | DrawCommand::Text { .. }
            )
        })
    }
}

impl Surface for RecordingSurface {
    fn clear(&mut self, color: &str, width: f64, height: f64) {
        self.commands.push(DrawCommand::Clear {
            color: color.to_string(),
            width,
            height,
        });
    }

    fn save(&mut self) {
        self.commands.push(DrawCommand::Save);
    }

    fn restore(&mut self) {
        self.commands.push(DrawCommand::Restore);
    }

    fn transform(&mut self, scale: f64, offset_x: f64, offset_y: f64) {
        self.commands.push(DrawCommand::Transform {
            scale,
            offset_x,
            offset_y,
        });
    }

    fn set_alpha(&mut self, alpha: f64) {
        self.commands.push(DrawCommand::Alpha(alpha));
    }

    fn set_fill(&mut self, color: &str) {
        self.commands.push(DrawCommand::Fill(color.to_string()));
    }

    fn set_stroke(&mut self, color: &str) {
        self.commands.push(DrawCommand::Stroke(color.to_string()));
    }

    fn set_line_width(&mut self, width: f64) {
        self.commands.push(DrawCommand::LineWidth(width));
    }

    fn set_font(&mut self, font: &str) {
        self.commands.push(DrawCommand::Font(font.to_string()));
    }

    fn set_text_align(&mut self, align: TextAlign) {
        self.commands.push(DrawCommand::TextAlign(align));
    }

    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        self.commands.push(DrawCommand::Rect { x, y, width, height });
    }

    fn line(&mut self, from: Point, to: Point) {
        self.commands.push(DrawCommand::Line { from, to });
    }

    fn circle(&mut self, center: Point, radius: f64, fill: bool) {
        self.commands.push(DrawCommand::Circle { center, radius, fill });
    }

    fn fill_text(&mut self, text: &str, x: f64, y: f64) {
        self.commands.push(DrawCommand::Text {
            text: text.to_string(),
            x,
            y,
        });
    }
}

#[cfg(feature = "web")]
mod canvas {
    use super::{Surface, TextAlign};
    use crate::geometry::Point;
    use std::f64::consts::TAU;
    use web_sys::CanvasRenderingContext2d;

    impl Surface for CanvasRenderingContext2d {
        fn clear(&mut self, color: &str, width: f64, height: f64) {
            let _ = self.set_transform(1.0, 0.0, 0.0, 1.0, 0.0, 0.0);
            self.set_global_alpha(1.0);
            self.set_fill_style_str(color);
            CanvasRenderingContext2d::fill_rect(self, 0.0, 0.0, width, height);
        }

        fn save(&mut self) {
            CanvasRenderingContext2d::save(self);
        }

        fn restore(&mut self) {
            CanvasRenderingContext2d::restore(self);
        }

        fn transform(&mut self, scale: f64, offset_x: f64, offset_y: f64) {
            let _ = self.translate(offset_x, offset_y);
            let _ = self.scale(scale, scale);
        }

        fn set_alpha(&mut self, alpha: f64) {
            self.set_global_alpha(alpha);
        }

        fn set_fill(&mut self, color: &str) {
            self.set_fill_style_str(color);
        }

        fn set_stroke(&mut self, color: &str) {
            self.set_stroke_style_str(color);
        }

        fn set_line_width(&mut self, width: f64) {
            CanvasRenderingContext2d::set_line_width(self, width);
        }

        fn set_font(&mut self, font: &str) {
            CanvasRenderingContext2d::set_font(self, font);
        }

        fn set_text_align(&mut self, align: TextAlign) {
            CanvasRenderingContext2d::set_text_align(self, align.as_str());
        }

        fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
            CanvasRenderingContext2d::fill_rect(self, x, y, width, height);
        }

        fn line(&mut self, from: Point, to: Point) {
            self.begin_path();
            self.move_to(from.x, from.y);
            self.line_to(to.x, to.y);
            self.stroke();
        }

        fn circle(&mut self, center: Point, radius: f64, fill: bool) {
            self.begin_path();
            let _ = self.arc(center.x, center.y, radius, 0.0, TAU);
            if fill {
                self.fill();
            } else {
                self.stroke();
            }
        }

        fn fill_text(&mut self, text: &str, x: f64, y: f64) {
            let _ = CanvasRenderingContext2d::fill_text(self, text, x, y);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_keeps_order() {
        let mut surface = RecordingSurface::new();
        surface.set_fill("#fff");
        surface.fill_rect(0.0, 0.0, 10.0, 5.0);
        surface.fill_text("hi", 1.0, 2.0);
        surface.circle(Point::new(3.0, 3.0), 2.0, true);

        assert_eq!(surface.len(), 4);
        assert_eq!(surface.commands[0], DrawCommand::Fill("#fff".to_string()));
        assert_eq!(surface.texts(), vec!["hi"]);
        assert_eq!(surface.primitive_count(), 3);

        surface.reset();
        assert!(surface.is_empty());
    }

    #[test]
    fn test_commands_serialize() {
        let mut surface = RecordingSurface::new();
        surface.set_text_align(TextAlign::Center);
        surface.line(Point::new(0.0, 0.0), Point::new(1.0, 1.0));
        let json = serde_json::to_string(&surface.commands).unwrap();
        assert!(json.contains("\"Center\""));
        assert!(json.contains("Line"));
    }
}
