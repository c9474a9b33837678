//! Token Pipeline Visualization
//!
//! Lays out a next-token prediction as columns of nodes (tokens,
//! embeddings, transform stages, logits) with probability bars, then
//! animates, zooms, pans and hit-tests it. The browser front end lives
//! behind the `web` feature; everything else runs headless.

pub mod animation;
pub mod camera;
pub mod geometry;
pub mod interaction;
pub mod render;
pub mod scene;
pub mod session;
pub mod surface;

#[cfg(feature = "web")]
mod web;


pub use animation::{AnimationState, Animator, FrameOutcome, TravelParticle, TweenHandle, TweenOutcome};
pub use camera::{Camera, ZoomDirection};
pub use geometry::{Bounds, Point, Viewport};
pub use interaction::{Hit, Zone};
pub use scene::{build_scene, Column, ColumnKind, Node, NodeKind, OutputBar, Scene};
pub use session::{Session, SessionError};
pub use surface::{DrawCommand, RecordingSurface, Surface, TextAlign};

#[cfg(feature = "web")]
pub use web::PipelineVisualizer;
