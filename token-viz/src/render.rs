//! Per-frame drawing
//!
//! Stateless: everything needed to paint a frame comes in through
//! [`Frame`]. Reveal visibility scales alpha and size, the ambient pulse
//! modulates edge and node brightness.

use crate::animation::{ambient_pulse, bar_visibility, column_visibility, AnimationState};
use crate::camera::Camera;
use crate::geometry::{Point, Viewport};
use crate::interaction::Hit;
use crate::scene::{
    ColumnKind, NodeKind, Scene, BAR_HEIGHT, BAR_LABEL_SPACE, BAR_MAX_WIDTH, LABEL_OFFSET_Y, NODE_RADIUS,
};
use crate::surface::{Surface, TextAlign};

pub const BG_COLOR: &str = "#0a0a0f";
pub const NODE_BASE: &str = "#1a2a4a";
pub const NODE_STROKE: &str = "#3d5a80";
pub const NODE_HOVER: &str = "#98c1d9";
pub const EDGE_COLOR: &str = "#3d5a80";
pub const ACCENT_COLOR: &str = "#4ecdc4";
pub const ACCENT_SECONDARY: &str = "#ff6b6b";
pub const TEXT_COLOR: &str = "#e0e6ed";
pub const TEXT_DIM: &str = "#6b7280";
pub const TRACK_COLOR: &str = "#21262d";
pub const NUCLEUS_COLOR: &str = "#f4a261";

const TOKEN_LABEL_CHARS: usize = 14;
const BAR_LABEL_CHARS: usize = 10;
pub const PARTICLE_RADIUS: f64 = 7.0;

/// Everything a frame depends on
pub struct Frame<'a> {
    pub scene: &'a Scene,
    pub camera: &'a Camera,
    pub animation: &'a AnimationState,
    pub viewport: Viewport,
    pub hover: Option<Hit>,
}

/// Bar colour by probability
pub fn probability_color(prob: f32) -> &'static str {
    if prob > 0.5 {
        ACCENT_COLOR
    } else if prob > 0.2 {
        NODE_HOVER
    } else if prob > 0.05 {
        TEXT_COLOR
    } else {
        TEXT_DIM
    }
}

/// Make whitespace and control characters visible, truncating to `max_chars`
pub fn escape_token_display(text: &str, max_chars: usize) -> String {
    let escaped: Vec<String> = text
        .chars()
        .map(|c| match c {
            '\n' => "\\n".to_string(),
            '\t' => "\\t".to_string(),
            '\r' => "\\r".to_string(),
            ' ' => '\u{2423}'.to_string(),
            c if c.is_control() => format!("\\x{:02x}", c as u32),
            c => c.to_string(),
        })
        .collect();
    let joined = escaped.concat();

    if joined.chars().count() > max_chars {
        let kept: String = joined.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        joined
    }
}

/// Placeholder shown before the first run
pub fn render_empty<S: Surface + ?Sized>(surface: &mut S, viewport: Viewport) {
    surface.clear(BG_COLOR, viewport.width, viewport.height);
    surface.set_alpha(1.0);
    surface.set_fill(TEXT_DIM);
    surface.set_font("14px 'Inter', sans-serif");
    surface.set_text_align(TextAlign::Center);
    let center = viewport.center();
    surface.fill_text("Enter a prompt and run the pipeline", center.x, center.y);
}

pub fn render_frame<S: Surface + ?Sized>(surface: &mut S, frame: &Frame<'_>) {
    surface.clear(BG_COLOR, frame.viewport.width, frame.viewport.height);

    surface.save();
    let (offset_x, offset_y) = frame.camera.offset();
    surface.transform(frame.camera.scale(), offset_x, offset_y);

    draw_edges(surface, frame);
    draw_columns(surface, frame);
    draw_bars(surface, frame);
    draw_nucleus_boundary(surface, frame);
    draw_particle(surface, frame);

    surface.restore();
    surface.set_alpha(1.0);
}

fn draw_edges<S: Surface + ?Sized>(surface: &mut S, frame: &Frame<'_>) {
    let columns = &frame.scene.columns;
    let count = columns.len();
    let zoom = frame.camera.scale();
    let progress = frame.animation.reveal_progress;

    surface.set_stroke(EDGE_COLOR);
    for (c, pair) in columns.windows(2).enumerate() {
        let (from, to) = (&pair[0], &pair[1]);
        let vis = column_visibility(progress, c + 1, count);
        if vis <= 0.0 {
            continue;
        }
        let pulse = ambient_pulse(frame.animation.ambient_phase, c, count);
        surface.set_alpha(vis * (0.12 + 0.25 * pulse));
        surface.set_line_width((0.6 + 0.9 * pulse) / zoom);

        match (from.kind, to.kind) {
            // One embedding per token
            (ColumnKind::Token, _) => {
                for (a, b) in from.nodes.iter().zip(&to.nodes) {
                    surface.line(a.position, b.position);
                }
            }
            // Only the final position feeds the logits
            (_, ColumnKind::Logit) => {
                if let Some(last) = from.nodes.last() {
                    for b in &to.nodes {
                        surface.line(last.position, b.position);
                    }
                }
            }
            // Stages mix every position
            _ => {
                for a in &from.nodes {
                    for b in &to.nodes {
                        surface.line(a.position, b.position);
                    }
                }
            }
        }
    }
}

fn node_colors(kind: &NodeKind) -> (&'static str, &'static str) {
    match kind {
        NodeKind::Token { .. } => (NODE_BASE, TEXT_COLOR),
        NodeKind::Embedding { .. } => (NODE_BASE, ACCENT_COLOR),
        NodeKind::Stage { .. } => (NODE_BASE, NODE_STROKE),
        NodeKind::Logit { probability, .. } => (probability_color(*probability), NODE_STROKE),
    }
}

fn draw_columns<S: Surface + ?Sized>(surface: &mut S, frame: &Frame<'_>) {
    let columns = &frame.scene.columns;
    let count = columns.len();
    let zoom = frame.camera.scale();
    let progress = frame.animation.reveal_progress;

    for (c, column) in columns.iter().enumerate() {
        let vis = column_visibility(progress, c, count);
        if vis <= 0.0 {
            continue;
        }
        let pulse = ambient_pulse(frame.animation.ambient_phase, c, count);

        if let Some(first) = column.nodes.first() {
            surface.set_alpha(vis);
            surface.set_fill(TEXT_DIM);
            surface.set_font("bold 13px 'Inter', sans-serif");
            surface.set_text_align(TextAlign::Center);
            surface.fill_text(&column.label, column.x, first.position.y - LABEL_OFFSET_Y);
        }

        for node in &column.nodes {
            let hovered = frame.hover == Some(Hit::Node { column: c, index: node.index });
            let (fill, stroke) = node_colors(&node.kind);
            let radius = NODE_RADIUS * (0.5 + 0.5 * vis);

            surface.set_alpha(vis * (0.75 + 0.25 * pulse));
            surface.set_fill(if hovered { NODE_HOVER } else { fill });
            surface.circle(node.position, radius, true);
            surface.set_stroke(if hovered { NODE_HOVER } else { stroke });
            surface.set_line_width((1.0 + pulse) / zoom);
            surface.circle(node.position, radius, false);

            match &node.kind {
                NodeKind::Token { text, .. } => {
                    surface.set_alpha(vis);
                    surface.set_fill(TEXT_COLOR);
                    surface.set_font("12px monospace");
                    surface.set_text_align(TextAlign::Right);
                    surface.fill_text(
                        &escape_token_display(text, TOKEN_LABEL_CHARS),
                        node.position.x - NODE_RADIUS - 8.0,
                        node.position.y + 4.0,
                    );
                }
                NodeKind::Logit { logit, .. } => {
                    surface.set_alpha(vis * 0.8);
                    surface.set_fill(TEXT_DIM);
                    surface.set_font("10px monospace");
                    surface.set_text_align(TextAlign::Left);
                    surface.fill_text(
                        &format!("{:.2}", logit),
                        node.position.x + NODE_RADIUS + 6.0,
                        node.position.y + 3.0,
                    );
                }
                NodeKind::Embedding { .. } | NodeKind::Stage { .. } => {}
            }
        }
    }
}

fn draw_bars<S: Surface + ?Sized>(surface: &mut S, frame: &Frame<'_>) {
    let bars = &frame.scene.bars;
    let columns = frame.scene.columns.len();
    let zoom = frame.camera.scale();

    for (i, bar) in bars.iter().enumerate() {
        let vis = bar_visibility(frame.animation.reveal_progress, i, bars.len(), columns);
        if vis <= 0.0 {
            continue;
        }
        let hovered = frame.hover == Some(Hit::Bar(i));
        let dim = if bar.in_nucleus { 1.0 } else { 0.4 };
        let anchor = bar.position;
        let track_x = anchor.x + BAR_LABEL_SPACE;
        let top = anchor.y - BAR_HEIGHT / 2.0;

        surface.set_alpha(vis * dim);
        surface.set_fill(if bar.is_sampled { ACCENT_SECONDARY } else { NODE_STROKE });
        surface.circle(anchor, 4.0, true);

        surface.set_fill(if hovered { NODE_HOVER } else { TEXT_COLOR });
        surface.set_font(if bar.is_sampled { "bold 12px monospace" } else { "12px monospace" });
        surface.set_text_align(TextAlign::Left);
        surface.fill_text(&escape_token_display(&bar.word, BAR_LABEL_CHARS), anchor.x + 10.0, anchor.y + 4.0);

        surface.set_fill(TRACK_COLOR);
        surface.fill_rect(track_x, top, BAR_MAX_WIDTH, BAR_HEIGHT);

        let color = if bar.is_sampled {
            ACCENT_SECONDARY
        } else if bar.in_nucleus {
            probability_color(bar.probability)
        } else {
            TEXT_DIM
        };
        surface.set_fill(color);
        surface.fill_rect(track_x, top, BAR_MAX_WIDTH * bar.probability as f64 * vis, BAR_HEIGHT);

        surface.set_fill(if bar.is_sampled { ACCENT_SECONDARY } else { TEXT_DIM });
        surface.fill_text(
            &format!("{:.1}%", bar.probability * 100.0),
            track_x + BAR_MAX_WIDTH + 8.0,
            anchor.y + 4.0,
        );

        if bar.is_sampled {
            surface.set_stroke(ACCENT_SECONDARY);
            surface.set_line_width(2.0 / zoom);
            surface.circle(anchor, 8.0, false);
        }
    }
}

fn draw_nucleus_boundary<S: Surface + ?Sized>(surface: &mut S, frame: &Frame<'_>) {
    let scene = frame.scene;
    let Some(y) = scene.nucleus_boundary() else {
        return;
    };
    let first_excluded = scene.nucleus_len();
    let vis = bar_visibility(
        frame.animation.reveal_progress,
        first_excluded,
        scene.bars.len(),
        scene.columns.len(),
    );
    if vis <= 0.0 {
        return;
    }
    let Some(bar) = scene.bars.get(first_excluded) else {
        return;
    };

    surface.set_alpha(vis * 0.9);
    surface.set_stroke(NUCLEUS_COLOR);
    surface.set_line_width(1.5 / frame.camera.scale());
    surface.line(Point::new(bar.position.x - 12.0, y), Point::new(bar.right_edge(), y));

    surface.set_fill(NUCLEUS_COLOR);
    surface.set_font("10px 'Inter', sans-serif");
    surface.set_text_align(TextAlign::Right);
    surface.fill_text("top-p", bar.position.x - 16.0, y + 3.0);
}

fn draw_particle<S: Surface + ?Sized>(surface: &mut S, frame: &Frame<'_>) {
    let Some(particle) = frame.animation.particle.as_ref() else {
        return;
    };
    surface.set_alpha(1.0);
    surface.set_fill(&particle.color);
    surface.circle(particle.current, PARTICLE_RADIUS, true);
    surface.set_fill(TEXT_COLOR);
    surface.set_font("bold 12px monospace");
    surface.set_text_align(TextAlign::Center);
    surface.fill_text(
        &escape_token_display(&particle.label, BAR_LABEL_CHARS),
        particle.current.x,
        particle.current.y - PARTICLE_RADIUS - 6.0,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::TravelParticle;
    use crate::scene::build_scene;
    use crate::surface::{DrawCommand, RecordingSurface};
    use inference::EncodedToken;
    use sampler::Prediction;

    fn scene() -> Scene {
        let tokens = vec![EncodedToken::new(2, "The"), EncodedToken::new(3, " cat")];
        let preds = vec![
            Prediction {
                id: 4,
                text: " sat".into(),
                raw_score: 2.0,
                probability: 0.7,
                in_nucleus: true,
                nucleus_probability: 1.0,
                is_sampled: true,
            },
            Prediction {
                id: 5,
                text: " ran".into(),
                raw_score: 1.0,
                probability: 0.3,
                in_nucleus: false,
                nucleus_probability: 0.0,
                is_sampled: false,
            },
        ];
        build_scene(&tokens, 2, &preds).unwrap()
    }

    fn draw(scene: &Scene, animation: &AnimationState) -> RecordingSurface {
        let camera = Camera::default();
        let mut surface = RecordingSurface::new();
        let frame = Frame {
            scene,
            camera: &camera,
            animation,
            viewport: Viewport::new(800.0, 600.0),
            hover: None,
        };
        render_frame(&mut surface, &frame);
        surface
    }

    #[test]
    fn test_probability_color_bands() {
        assert_eq!(probability_color(0.9), ACCENT_COLOR);
        assert_eq!(probability_color(0.3), NODE_HOVER);
        assert_eq!(probability_color(0.1), TEXT_COLOR);
        assert_eq!(probability_color(0.01), TEXT_DIM);
    }

    #[test]
    fn test_escape_token_display() {
        assert_eq!(escape_token_display(" cat", 10), "\u{2423}cat");
        assert_eq!(escape_token_display("a\nb", 10), "a\\nb");
        assert_eq!(escape_token_display("abcdefghijkl", 8), "abcde...");
        // Multi-byte glyphs count as one character
        assert_eq!(escape_token_display("    ", 4), "\u{2423}\u{2423}\u{2423}\u{2423}");
    }

    #[test]
    fn test_full_frame_draws_everything() {
        let scene = scene();
        let surface = draw(&scene, &AnimationState::default());
        let texts = surface.texts();

        for label in ["Tokens", "Embeddings", "Layer 1", "Layer 2", "Logits"] {
            assert!(texts.contains(&label), "missing label {}", label);
        }
        assert!(texts.contains(&"\u{2423}sat"));
        assert!(texts.contains(&"70.0%"));
        assert!(texts.contains(&"top-p"));
        assert!(matches!(surface.commands[0], DrawCommand::Clear { .. }));
        assert_eq!(surface.count(|c| *c == DrawCommand::Save), surface.count(|c| *c == DrawCommand::Restore));
    }

    #[test]
    fn test_unrevealed_frame_is_blank() {
        let scene = scene();
        let state = AnimationState {
            reveal_progress: 0.0,
            ..AnimationState::default()
        };
        let surface = draw(&scene, &state);
        assert_eq!(surface.primitive_count(), 0);
    }

    #[test]
    fn test_mid_reveal_hides_bars() {
        let scene = scene();
        let state = AnimationState {
            reveal_progress: 0.2,
            ..AnimationState::default()
        };
        let texts = draw(&scene, &state).texts().join("|");
        assert!(texts.contains("Tokens"));
        assert!(!texts.contains('%'));
        assert!(!texts.contains("top-p"));
    }

    #[test]
    fn test_particle_drawn_at_current_position() {
        let scene = scene();
        let at = Point::new(123.0, 45.0);
        let state = AnimationState {
            particle: Some(TravelParticle {
                start: Point::default(),
                target: Point::default(),
                current: at,
                progress: 0.5,
                label: " sat".into(),
                color: ACCENT_SECONDARY.into(),
            }),
            ..AnimationState::default()
        };
        let surface = draw(&scene, &state);
        assert!(surface.commands.contains(&DrawCommand::Circle {
            center: at,
            radius: PARTICLE_RADIUS,
            fill: true
        }));
    }

    #[test]
    fn test_render_empty_placeholder() {
        let mut surface = RecordingSurface::new();
        render_empty(&mut surface, Viewport::new(400.0, 300.0));
        assert_eq!(surface.texts().len(), 1);
    }
}
