//! Frame-driven animation
//!
//! Three independent tracks advance on every [`Animator::tick`]:
//!
//! - reveal progress for a freshly built scene (one-shot, 0 → 1)
//! - ambient phase (never stops, drives the idle pulse)
//! - an optional travelling particle with a completion handle
//!
//! Step sizes are defined per 1/60 s frame and scaled by the elapsed time,
//! so a host can call `tick` from `requestAnimationFrame`, a test clock or
//! a headless loop and get the same motion.

use crate::geometry::Point;
use serde::{Deserialize, Serialize};
use futures::channel::oneshot;
use futures::FutureExt;
use std::f64::consts::TAU;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::{debug, warn};

pub const FRAME_SECONDS: f64 = 1.0 / 60.0;
pub const REVEAL_STEP: f64 = 0.012;
pub const AMBIENT_STEP: f64 = 0.006;
pub const PARTICLE_STEP: f64 = 0.03;
/// Share of the reveal taken by the column sweep
pub const COLUMN_SPAN: f64 = 0.7;

/// Symmetric quadratic ease-in-out on `[0, 1]`
pub fn ease_in_out_quad(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        2.0 * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
    }
}

fn smoothstep(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Overlapping windows: `count` windows of equal length, each starting
/// halfway through the previous one, exactly covering `[start, end]`.
fn window(index: usize, count: usize, start: f64, end: f64) -> (f64, f64) {
    let len = (end - start) * 2.0 / (count as f64 + 1.0);
    (start + index as f64 * len / 2.0, len)
}

fn window_visibility(progress: f64, (start, len): (f64, f64)) -> f64 {
    if progress >= 1.0 {
        return 1.0;
    }
    if len <= 0.0 {
        return if progress >= start { 1.0 } else { 0.0 };
    }
    smoothstep((progress - start) / len)
}

/// Visibility of column `index` out of `count` at reveal `progress`, in `[0, 1]`
pub fn column_visibility(progress: f64, index: usize, count: usize) -> f64 {
    if count == 0 {
        return 1.0;
    }
    window_visibility(progress, window(index, count, 0.0, COLUMN_SPAN))
}

/// Visibility of output bar `index` out of `count`.
///
/// Bars start once the last column's window has started.
pub fn bar_visibility(progress: f64, index: usize, count: usize, columns: usize) -> f64 {
    if count == 0 {
        return 1.0;
    }
    let bars_start = window(columns.saturating_sub(1), columns.max(1), 0.0, COLUMN_SPAN).0;
    window_visibility(progress, window(index, count, bars_start, 1.0))
}

/// Travelling brightness wave in `[0, 1]`; peaks at column `c` when `fract(phase) = c / C`
pub fn ambient_pulse(phase: f64, column: usize, columns: usize) -> f64 {
    let offset = column as f64 / columns.max(1) as f64;
    0.5 + 0.5 * (TAU * (phase.rem_euclid(1.0) - offset)).cos()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TravelParticle {
    pub start: Point,
    pub target: Point,
    pub current: Point,
    pub progress: f64,
    pub label: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationState {
    pub reveal_progress: f64,
    pub ambient_phase: f64,
    pub particle: Option<TravelParticle>,
}

impl Default for AnimationState {
    fn default() -> Self {
        Self {
            reveal_progress: 1.0,
            ambient_phase: 0.0,
            particle: None,
        }
    }
}

/// How a particle tween ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TweenOutcome {
    /// Reached its target
    Completed,
    /// Replaced by a newer tween or dropped by a clear
    Cancelled,
    /// Requested with no scene to animate
    Skipped,
}

/// Completion handle for a particle tween.
///
/// `.await` it, or check [`outcome`](Self::outcome) from a frame loop. A
/// tween whose animator goes away before it ends reports `Cancelled`.
#[derive(Debug)]
pub struct TweenHandle {
    receiver: oneshot::Receiver<TweenOutcome>,
    outcome: Option<TweenOutcome>,
}

impl TweenHandle {
    fn channel() -> (oneshot::Sender<TweenOutcome>, Self) {
        let (sender, receiver) = oneshot::channel();
        let handle = Self {
            receiver,
            outcome: None,
        };
        (sender, handle)
    }

    pub(crate) fn resolved(outcome: TweenOutcome) -> Self {
        let (_, mut handle) = Self::channel();
        handle.outcome = Some(outcome);
        handle
    }

    fn settle(&mut self, received: Result<TweenOutcome, oneshot::Canceled>) -> TweenOutcome {
        let outcome = received.unwrap_or(TweenOutcome::Cancelled);
        self.outcome = Some(outcome);
        outcome
    }

    /// How the tween ended, or `None` while it is still running
    pub fn outcome(&mut self) -> Option<TweenOutcome> {
        if self.outcome.is_none() {
            match self.receiver.try_recv() {
                Ok(Some(outcome)) => {
                    self.settle(Ok(outcome));
                }
                Ok(None) => {}
                Err(canceled) => {
                    self.settle(Err(canceled));
                }
            }
        }
        self.outcome
    }

    pub fn is_finished(&mut self) -> bool {
        self.outcome().is_some()
    }
}

impl Future for TweenHandle {
    type Output = TweenOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(outcome) = self.outcome {
            return Poll::Ready(outcome);
        }
        match self.receiver.poll_unpin(cx) {
            Poll::Ready(received) => Poll::Ready(self.settle(received)),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// What happened during one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameOutcome {
    pub redraw: bool,
    pub reveal_finished: bool,
    pub particle_finished: bool,
}

#[derive(Debug, Default)]
pub struct Animator {
    state: AnimationState,
    revealing: bool,
    tween: Option<oneshot::Sender<TweenOutcome>>,
}

impl Animator {
    /// Idle animator with the reveal already complete
    pub fn new() -> Self {
        Self::default()
    }

    /// Current progress of every track
    pub fn state(&self) -> &AnimationState {
        &self.state
    }

    /// True while the reveal is running
    pub fn is_revealing(&self) -> bool {
        self.revealing
    }

    /// Restart the reveal from zero
    pub fn start_reveal(&mut self) {
        self.state.reveal_progress = 0.0;
        self.revealing = true;
    }

    /// Jump to the fully revealed state
    pub fn finish_reveal(&mut self) {
        self.state.reveal_progress = 1.0;
        self.revealing = false;
    }

    /// Start a particle tween, cancelling any tween still in flight
    pub fn start_particle(&mut self, start: Point, target: Point, label: String, color: String) -> TweenHandle {
        if self.cancel_particle() {
            warn!("particle tween replaced before completion");
        }
        self.state.particle = Some(TravelParticle {
            start,
            target,
            current: start,
            progress: 0.0,
            label,
            color,
        });
        let (sender, handle) = TweenHandle::channel();
        self.tween = Some(sender);
        handle
    }

    /// Drop the particle; returns whether one was in flight
    pub fn cancel_particle(&mut self) -> bool {
        self.state.particle = None;
        match self.tween.take() {
            Some(sender) => {
                let _ = sender.send(TweenOutcome::Cancelled);
                true
            }
            None => false,
        }
    }

    /// Forget the reveal and any particle; the ambient phase keeps running
    pub fn clear(&mut self) {
        self.cancel_particle();
        self.revealing = false;
        self.state.reveal_progress = 0.0;
    }

    /// Advance every track by `dt` seconds
    pub fn tick(&mut self, dt: f64, has_scene: bool) -> FrameOutcome {
        let frames = if dt.is_finite() && dt > 0.0 { dt / FRAME_SECONDS } else { 0.0 };
        let mut outcome = FrameOutcome::default();

        self.state.ambient_phase += AMBIENT_STEP * frames;

        if !has_scene {
            if self.state.particle.is_some() {
                self.cancel_particle();
            }
            return outcome;
        }
        outcome.redraw = true;

        if self.revealing {
            self.state.reveal_progress = (self.state.reveal_progress + REVEAL_STEP * frames).min(1.0);
            if self.state.reveal_progress >= 1.0 {
                self.revealing = false;
                outcome.reveal_finished = true;
                debug!("reveal finished");
            }
        }

        if let Some(particle) = self.state.particle.as_mut() {
            particle.progress = (particle.progress + PARTICLE_STEP * frames).min(1.0);
            particle.current = particle.start.lerp(particle.target, ease_in_out_quad(particle.progress));
            if particle.progress >= 1.0 {
                self.state.particle = None;
                if let Some(sender) = self.tween.take() {
                    let _ = sender.send(TweenOutcome::Completed);
                }
                outcome.particle_finished = true;
            }
        }

        outcome
    }
}
