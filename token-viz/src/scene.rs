//! Scene graph layout
//!
//! Columns run left to right: input tokens, their embeddings, one column per
//! transform stage, then the logits. Output bars sit to the right of the
//! logit column at the same heights. All positions are scene coordinates;
//! the camera maps them to the screen.

use crate::geometry::{Bounds, Point};
use inference::EncodedToken;
use sampler::Prediction;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const ORIGIN_X: f64 = 80.0;
pub const ORIGIN_Y: f64 = 90.0;
pub const COLUMN_GAP: f64 = 170.0;
pub const ROW_GAP: f64 = 56.0;
pub const MIN_LOGIT_SPACING: f64 = 28.0;
pub const NODE_RADIUS: f64 = 10.0;

// Output bar geometry, relative to the bar anchor
pub const BAR_OFFSET_X: f64 = 110.0;
pub const BAR_LABEL_SPACE: f64 = 70.0;
pub const BAR_MAX_WIDTH: f64 = 180.0;
pub const BAR_HEIGHT: f64 = 16.0;
pub const BAR_VALUE_SPACE: f64 = 56.0;

/// Vertical gap between a column label and its first node
pub const LABEL_OFFSET_Y: f64 = 34.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    Token,
    Embedding,
    /// Transform stage, zero-based
    Stage(usize),
    Logit,
}

/// What a node stands for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    Token { token_id: u32, text: String },
    Embedding { token_id: u32, text: String },
    Stage { layer: usize },
    Logit { word: String, probability: f32, logit: f32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub position: Point,
    /// Sequence position, or rank for logit nodes
    pub index: usize,
    pub kind: NodeKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub kind: ColumnKind,
    pub label: String,
    pub x: f64,
    pub nodes: Vec<Node>,
}

/// One probability bar per prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputBar {
    /// Anchor point; the bar itself extends to the right
    pub position: Point,
    pub word: String,
    pub probability: f32,
    pub raw_score: f32,
    pub in_nucleus: bool,
    pub is_sampled: bool,
    pub nucleus_probability: f32,
}

impl OutputBar {
    fn from_prediction(position: Point, p: &Prediction) -> Self {
        Self {
            position,
            word: p.text.clone(),
            probability: p.probability,
            raw_score: p.raw_score,
            in_nucleus: p.in_nucleus,
            is_sampled: p.is_sampled,
            nucleus_probability: p.nucleus_probability,
        }
    }

    fn patch(&mut self, p: &Prediction) {
        let position = self.position;
        *self = Self::from_prediction(position, p);
    }

    /// Rightmost x reached by the bar track and its value label
    pub fn right_edge(&self) -> f64 {
        self.position.x + BAR_LABEL_SPACE + BAR_MAX_WIDTH + BAR_VALUE_SPACE
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub columns: Vec<Column>,
    pub bars: Vec<OutputBar>,
}

fn column_x(index: usize) -> f64 {
    ORIGIN_X + index as f64 * COLUMN_GAP
}

fn row_y(index: usize) -> f64 {
    ORIGIN_Y + index as f64 * ROW_GAP
}

/// Vertical spacing between logit nodes: fits the token column's extent,
/// never tighter than `MIN_LOGIT_SPACING` and never wider than `ROW_GAP`.
pub fn logit_spacing(sequence_len: usize, logit_count: usize) -> f64 {
    if logit_count < 2 {
        return ROW_GAP;
    }
    let extent = sequence_len.saturating_sub(1) as f64 * ROW_GAP;
    (extent / (logit_count - 1) as f64).clamp(MIN_LOGIT_SPACING, ROW_GAP)
}

/// Lay out a scene. Returns `None` for an empty sequence or no predictions.
pub fn build_scene(tokens: &[EncodedToken], stage_count: usize, predictions: &[Prediction]) -> Option<Scene> {
    let n = tokens.len();
    let m = predictions.len();
    if n == 0 || m == 0 {
        return None;
    }

    let mut columns = Vec::with_capacity(stage_count + 3);

    let token_x = column_x(0);
    columns.push(Column {
        kind: ColumnKind::Token,
        label: "Tokens".to_string(),
        x: token_x,
        nodes: tokens
            .iter()
            .enumerate()
            .map(|(i, t)| Node {
                position: Point::new(token_x, row_y(i)),
                index: i,
                kind: NodeKind::Token {
                    token_id: t.id,
                    text: t.text.clone(),
                },
            })
            .collect(),
    });

    let embed_x = column_x(1);
    columns.push(Column {
        kind: ColumnKind::Embedding,
        label: "Embeddings".to_string(),
        x: embed_x,
        nodes: tokens
            .iter()
            .enumerate()
            .map(|(i, t)| Node {
                position: Point::new(embed_x, row_y(i)),
                index: i,
                kind: NodeKind::Embedding {
                    token_id: t.id,
                    text: t.text.clone(),
                },
            })
            .collect(),
    });

    for layer in 0..stage_count {
        let x = column_x(2 + layer);
        columns.push(Column {
            kind: ColumnKind::Stage(layer),
            label: format!("Layer {}", layer + 1),
            x,
            nodes: (0..n)
                .map(|i| Node {
                    position: Point::new(x, row_y(i)),
                    index: i,
                    kind: NodeKind::Stage { layer },
                })
                .collect(),
        });
    }

    let logit_x = column_x(2 + stage_count);
    let spacing = logit_spacing(n, m);
    let token_center = ORIGIN_Y + (n - 1) as f64 * ROW_GAP / 2.0;
    let logit_top = token_center - (m - 1) as f64 * spacing / 2.0;
    let logit_y = |i: usize| logit_top + i as f64 * spacing;

    columns.push(Column {
        kind: ColumnKind::Logit,
        label: "Logits".to_string(),
        x: logit_x,
        nodes: predictions
            .iter()
            .enumerate()
            .map(|(i, p)| Node {
                position: Point::new(logit_x, logit_y(i)),
                index: i,
                kind: NodeKind::Logit {
                    word: p.text.clone(),
                    probability: p.probability,
                    logit: p.raw_score,
                },
            })
            .collect(),
    });

    let bars = predictions
        .iter()
        .enumerate()
        .map(|(i, p)| OutputBar::from_prediction(Point::new(logit_x + BAR_OFFSET_X, logit_y(i)), p))
        .collect();

    debug!(tokens = n, stages = stage_count, logits = m, spacing, "built scene");
    Some(Scene { columns, bars })
}

impl Scene {
    pub fn sequence_len(&self) -> usize {
        self.columns.first().map_or(0, |c| c.nodes.len())
    }

    pub fn stage_count(&self) -> usize {
        self.columns
            .iter()
            .filter(|c| matches!(c.kind, ColumnKind::Stage(_)))
            .count()
    }

    pub fn logit_column(&self) -> Option<&Column> {
        self.columns.last().filter(|c| c.kind == ColumnKind::Logit)
    }

    /// Patch words and probabilities in place, by index.
    ///
    /// Extra predictions are ignored and missing trailing ones leave the
    /// old values; positions never move.
    pub fn update_predictions(&mut self, predictions: &[Prediction]) {
        if let Some(column) = self.columns.last_mut().filter(|c| c.kind == ColumnKind::Logit) {
            for (node, p) in column.nodes.iter_mut().zip(predictions) {
                node.kind = NodeKind::Logit {
                    word: p.text.clone(),
                    probability: p.probability,
                    logit: p.raw_score,
                };
            }
        }
        for (bar, p) in self.bars.iter_mut().zip(predictions) {
            bar.patch(p);
        }
    }

    /// Box around every node, column label and bar
    pub fn bounds(&self) -> Bounds {
        let mut bounds = Bounds::at(Point::new(ORIGIN_X, ORIGIN_Y));
        for column in &self.columns {
            for node in &column.nodes {
                bounds.include(Point::new(node.position.x - NODE_RADIUS, node.position.y - NODE_RADIUS));
                bounds.include(Point::new(node.position.x + NODE_RADIUS, node.position.y + NODE_RADIUS));
            }
            if let Some(first) = column.nodes.first() {
                bounds.include(Point::new(column.x, first.position.y - LABEL_OFFSET_Y));
            }
        }
        for bar in &self.bars {
            bounds.include(Point::new(bar.right_edge(), bar.position.y - BAR_HEIGHT / 2.0));
            bounds.include(Point::new(bar.position.x, bar.position.y + BAR_HEIGHT / 2.0));
        }
        bounds
    }

    /// Number of leading in-nucleus bars
    pub fn nucleus_len(&self) -> usize {
        self.bars.iter().take_while(|b| b.in_nucleus).count()
    }

    /// y of the separator between the last nucleus bar and the first excluded one
    pub fn nucleus_boundary(&self) -> Option<f64> {
        let k = self.nucleus_len();
        if k == 0 || k >= self.bars.len() {
            return None;
        }
        Some((self.bars[k - 1].position.y + self.bars[k].position.y) / 2.0)
    }

    pub fn sampled_bar(&self) -> Option<usize> {
        self.bars.iter().position(|b| b.is_sampled)
    }

    /// Where the next token would appear in the token column
    pub fn next_token_slot(&self) -> Point {
        let rows = self.sequence_len();
        Point::new(column_x(0), row_y(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(n: usize) -> Vec<EncodedToken> {
        (0..n).map(|i| EncodedToken::new(i as u32 + 10, format!(" t{}", i))).collect()
    }

    fn predictions(m: usize) -> Vec<Prediction> {
        (0..m)
            .map(|i| Prediction {
                id: i as u32,
                text: format!("w{}", i),
                raw_score: (m - i) as f32,
                probability: 1.0 / m as f32,
                in_nucleus: i < 2,
                nucleus_probability: if i < 2 { 0.5 } else { 0.0 },
                is_sampled: i == 1,
            })
            .collect()
    }

    #[test]
    fn test_column_and_node_counts() {
        let scene = build_scene(&tokens(5), 3, &predictions(4)).unwrap();
        assert_eq!(scene.columns.len(), 2 + 3 + 1);
        let counts: Vec<usize> = scene.columns.iter().map(|c| c.nodes.len()).collect();
        assert_eq!(counts, vec![5, 5, 5, 5, 5, 4]);
        assert_eq!(scene.bars.len(), 4);
        assert_eq!(scene.stage_count(), 3);
        assert_eq!(scene.columns[2].kind, ColumnKind::Stage(0));
        assert_eq!(scene.columns[4].label, "Layer 3");
    }

    #[test]
    fn test_empty_inputs_build_nothing() {
        assert!(build_scene(&[], 3, &predictions(4)).is_none());
        assert!(build_scene(&tokens(3), 3, &[]).is_none());
    }

    #[test]
    fn test_columns_evenly_spaced() {
        let scene = build_scene(&tokens(2), 2, &predictions(2)).unwrap();
        for pair in scene.columns.windows(2) {
            assert_eq!(pair[1].x - pair[0].x, COLUMN_GAP);
        }
    }

    #[test]
    fn test_logit_spacing_never_exceeds_row_gap() {
        assert_eq!(logit_spacing(10, 3), ROW_GAP);
        assert_eq!(logit_spacing(5, 5), ROW_GAP);
    }

    #[test]
    fn test_logit_spacing_compresses_to_floor() {
        // 5 tokens span 224; 9 logits fit at 28
        assert_eq!(logit_spacing(5, 9), 28.0);
        assert_eq!(logit_spacing(2, 10), MIN_LOGIT_SPACING);
        assert_eq!(logit_spacing(1, 4), MIN_LOGIT_SPACING);
        assert!((logit_spacing(4, 5) - 42.0).abs() < 1e-9);
    }

    #[test]
    fn test_logits_centred_on_tokens_and_bars_aligned() {
        let scene = build_scene(&tokens(5), 1, &predictions(3)).unwrap();
        let token_mid = (scene.columns[0].nodes[0].position.y + scene.columns[0].nodes[4].position.y) / 2.0;
        let logits = &scene.logit_column().unwrap().nodes;
        assert!((logits[1].position.y - token_mid).abs() < 1e-9);

        for (node, bar) in logits.iter().zip(&scene.bars) {
            assert_eq!(bar.position.y, node.position.y);
            assert_eq!(bar.position.x, node.position.x + BAR_OFFSET_X);
        }
    }

    #[test]
    fn test_update_patches_in_place() {
        let mut scene = build_scene(&tokens(3), 2, &predictions(3)).unwrap();
        let before = scene.bars.iter().map(|b| b.position).collect::<Vec<_>>();

        let mut fresh = predictions(5);
        fresh[0].text = "new".to_string();
        fresh[0].probability = 0.9;
        scene.update_predictions(&fresh);

        assert_eq!(scene.bars.len(), 3);
        assert_eq!(scene.bars[0].word, "new");
        assert_eq!(scene.bars[0].probability, 0.9);
        assert_eq!(scene.bars.iter().map(|b| b.position).collect::<Vec<_>>(), before);
        match &scene.logit_column().unwrap().nodes[0].kind {
            NodeKind::Logit { word, .. } => assert_eq!(word, "new"),
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn test_short_update_leaves_stale_tail() {
        let mut scene = build_scene(&tokens(3), 2, &predictions(3)).unwrap();
        let mut short = predictions(1);
        short[0].text = "only".to_string();
        scene.update_predictions(&short);
        assert_eq!(scene.bars[0].word, "only");
        assert_eq!(scene.bars[2].word, "w2");
    }

    #[test]
    fn test_nucleus_boundary_between_bars() {
        let scene = build_scene(&tokens(4), 1, &predictions(4)).unwrap();
        assert_eq!(scene.nucleus_len(), 2);
        let y = scene.nucleus_boundary().unwrap();
        assert!(y > scene.bars[1].position.y && y < scene.bars[2].position.y);
        assert_eq!(scene.sampled_bar(), Some(1));
    }

    #[test]
    fn test_no_boundary_when_all_in_nucleus() {
        let mut preds = predictions(3);
        preds.iter_mut().for_each(|p| p.in_nucleus = true);
        let scene = build_scene(&tokens(2), 1, &preds).unwrap();
        assert!(scene.nucleus_boundary().is_none());
    }

    #[test]
    fn test_bounds_cover_bars_and_labels() {
        let scene = build_scene(&tokens(3), 2, &predictions(3)).unwrap();
        let b = scene.bounds();
        assert!(b.max_x >= scene.bars[0].right_edge());
        assert!(b.min_y <= ORIGIN_Y - LABEL_OFFSET_Y);
        assert!(b.min_x <= ORIGIN_X - NODE_RADIUS);
    }

    #[test]
    fn test_next_token_slot_below_sequence() {
        let scene = build_scene(&tokens(3), 1, &predictions(2)).unwrap();
        let slot = scene.next_token_slot();
        assert_eq!(slot.x, ORIGIN_X);
        assert_eq!(slot.y, ORIGIN_Y + 3.0 * ROW_GAP);
    }
}
