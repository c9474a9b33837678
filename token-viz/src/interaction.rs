//! Pointer routing: hover hit-testing, zone tracking, drag-to-pan and clicks

use crate::camera::Camera;
use crate::geometry::Point;
use crate::scene::{ColumnKind, NodeKind, Scene, COLUMN_GAP, NODE_RADIUS};
use inference::ModelMetadata;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const BAR_HIT_RADIUS: f64 = 20.0;
pub const NODE_HIT_RADIUS: f64 = NODE_RADIUS + 4.0;
/// Screen pixels a pressed pointer must travel before it pans
pub const DRAG_THRESHOLD: f64 = 4.0;

/// A specific entity under the pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Hit {
    Bar(usize),
    Node { column: usize, index: usize },
}

/// Coarse horizontal region of the diagram
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Zone {
    Token,
    Embedding,
    Stage,
    Logit,
    Sampling,
}

impl Zone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Zone::Token => "token",
            Zone::Embedding => "embedding",
            Zone::Stage => "stage",
            Zone::Logit => "logit",
            Zone::Sampling => "sampling",
        }
    }
}

pub type ZoneListener = Box<dyn FnMut(Option<Zone>, &ModelMetadata)>;
pub type EmbeddingListener = Box<dyn FnMut(u32, &str)>;

/// Entity at scene point `p`: bars first, then nodes in column order
pub fn hit_test(scene: &Scene, p: Point) -> Option<Hit> {
    let bar_r2 = BAR_HIT_RADIUS * BAR_HIT_RADIUS;
    if let Some(i) = scene.bars.iter().position(|b| b.position.distance_sq(p) <= bar_r2) {
        return Some(Hit::Bar(i));
    }

    let node_r2 = NODE_HIT_RADIUS * NODE_HIT_RADIUS;
    scene.columns.iter().enumerate().find_map(|(c, column)| {
        column
            .nodes
            .iter()
            .find(|n| n.position.distance_sq(p) <= node_r2)
            .map(|n| Hit::Node {
                column: c,
                index: n.index,
            })
    })
}

/// Zone from the scene-space x alone; column ranges are padded by half the column gap
pub fn classify_zone(scene: &Scene, x: f64) -> Option<Zone> {
    let half = COLUMN_GAP / 2.0;
    for column in &scene.columns {
        if x >= column.x - half && x < column.x + half {
            return Some(match column.kind {
                ColumnKind::Token => Zone::Token,
                ColumnKind::Embedding => Zone::Embedding,
                ColumnKind::Stage(_) => Zone::Stage,
                ColumnKind::Logit => Zone::Logit,
            });
        }
    }

    let logit_x = scene.logit_column()?.x;
    let right = scene.bars.iter().map(|b| b.right_edge()).fold(f64::NEG_INFINITY, f64::max);
    if x >= logit_x + half && x <= right + half {
        return Some(Zone::Sampling);
    }
    None
}

#[derive(Debug, Clone, Copy)]
struct DragState {
    origin: Point,
    last: Point,
    panning: bool,
}

/// Pointer state machine shared by hover, pan and click
#[derive(Default)]
pub struct Router {
    hover: Option<Hit>,
    zone: Option<Zone>,
    drag: Option<DragState>,
    on_zone_change: Option<ZoneListener>,
    on_embedding_click: Option<EmbeddingListener>,
}

impl Router {
    /// Router with no listeners
    pub fn new() -> Self {
        Self::default()
    }

    /// Entity under the pointer after the last move
    pub fn hover(&self) -> Option<Hit> {
        self.hover
    }

    /// Zone under the pointer after the last move
    pub fn zone(&self) -> Option<Zone> {
        self.zone
    }

    /// True once a press has moved past `DRAG_THRESHOLD`
    pub fn is_dragging(&self) -> bool {
        self.drag.is_some_and(|d| d.panning)
    }

    /// Replace the zone-change listener
    pub fn set_zone_listener(&mut self, listener: ZoneListener) {
        self.on_zone_change = Some(listener);
    }

    /// Replace the embedding-click listener
    pub fn set_embedding_listener(&mut self, listener: EmbeddingListener) {
        self.on_embedding_click = Some(listener);
    }

    /// Forget hover, zone and drag state; a zone that was set is reported as left
    pub fn reset(&mut self, metadata: &ModelMetadata) {
        self.hover = None;
        self.drag = None;
        self.set_zone(None, metadata);
    }

    fn set_zone(&mut self, zone: Option<Zone>, metadata: &ModelMetadata) {
        if zone == self.zone {
            return;
        }
        debug!(zone = ?zone, "zone changed");
        self.zone = zone;
        if let Some(listener) = self.on_zone_change.as_mut() {
            listener(zone, metadata);
        }
    }

    /// Arm a drag at `pointer` (screen space)
    pub fn pointer_down(&mut self, pointer: Point) {
        self.drag = Some(DragState {
            origin: pointer,
            last: pointer,
            panning: false,
        });
    }

    /// Returns whether a redraw is needed
    pub fn pointer_move(
        &mut self,
        scene: Option<&Scene>,
        camera: &mut Camera,
        metadata: &ModelMetadata,
        pointer: Point,
    ) -> bool {
        if let Some(drag) = self.drag.as_mut() {
            if !drag.panning && drag.origin.distance_sq(pointer) > DRAG_THRESHOLD * DRAG_THRESHOLD {
                drag.panning = true;
                self.hover = None;
            }
            if drag.panning {
                camera.pan_by(pointer.x - drag.last.x, pointer.y - drag.last.y);
                drag.last = pointer;
                return true;
            }
            return false;
        }

        let at = camera.to_scene(pointer);
        let hover = scene.and_then(|s| hit_test(s, at));
        let zone = scene.and_then(|s| classify_zone(s, at.x));

        self.set_zone(zone, metadata);

        let changed = hover != self.hover;
        self.hover = hover;
        changed
    }

    /// Ends a drag; a release without panning is a click
    pub fn pointer_up(&mut self, scene: Option<&Scene>, camera: &Camera, pointer: Point) -> bool {
        match self.drag.take() {
            Some(drag) if drag.panning => true,
            Some(_) => {
                if let Some(scene) = scene {
                    self.click(scene, camera.to_scene(pointer));
                }
                false
            }
            None => false,
        }
    }

    /// Drop hover and drag; returns whether anything was cleared
    pub fn pointer_leave(&mut self) -> bool {
        let had_state = self.hover.is_some() || self.drag.is_some();
        self.hover = None;
        self.drag = None;
        had_state
    }

    fn click(&mut self, scene: &Scene, at: Point) {
        let Some(Hit::Node { column, index }) = hit_test(scene, at) else {
            return;
        };
        let node = scene.columns.get(column).and_then(|c| c.nodes.get(index));
        if let Some(NodeKind::Embedding { token_id, text }) = node.map(|n| &n.kind) {
            debug!(token_id, "embedding clicked");
            if let Some(listener) = self.on_embedding_click.as_mut() {
                listener(*token_id, text);
            }
        }
    }
}
