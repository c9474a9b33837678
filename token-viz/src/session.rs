//! Visualization session
//!
//! Owns everything that lives across frames: the retained raw scores, the
//! sampling configuration, the current scene, camera, animator and pointer
//! router. Hosts create one session per mounted diagram and drive it with
//! `run`/`recompute`, pointer events and `tick`.

use crate::animation::{Animator, AnimationState, FrameOutcome, TweenHandle, TweenOutcome};
use crate::camera::{Camera, ZoomDirection};
use crate::geometry::{Point, Viewport};
use crate::interaction::{Hit, Router, Zone};
use crate::render::{self, Frame, ACCENT_SECONDARY};
use crate::scene::{build_scene, Scene};
use crate::surface::Surface;
use inference::{EncodedToken, InferenceError, InferenceProvider, ModelMetadata, TokenDecoder};
use rand::rngs::StdRng;
use rand::SeedableRng;
use sampler::{Prediction, SamplingConfig};
use thiserror::Error;
use tracing::{debug, info};

/// Error type for session operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    /// Provider failed or was not ready
    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),
}

/// Everything one mounted diagram keeps between frames
pub struct Session {
    config: SamplingConfig,
    viewport: Viewport,
    camera: Camera,
    /// Auto-fit of the current scene, restored by `reset_view`
    home: Option<Camera>,
    animator: Animator,
    router: Router,
    rng: StdRng,
    metadata: ModelMetadata,
    prompt: String,
    tokens: Vec<EncodedToken>,
    raw_scores: Option<Vec<f32>>,
    predictions: Vec<Prediction>,
    scene: Option<Scene>,
}

impl Session {
    /// Empty session; `seed` drives every sampling draw
    pub fn new(viewport: Viewport, config: SamplingConfig, seed: u64) -> Self {
        Self {
            config,
            viewport,
            camera: Camera::default(),
            home: None,
            animator: Animator::new(),
            router: Router::new(),
            rng: StdRng::seed_from_u64(seed),
            metadata: ModelMetadata::default(),
            prompt: String::new(),
            tokens: Vec::new(),
            raw_scores: None,
            predictions: Vec::new(),
            scene: None,
        }
    }

    /// Sampling parameters used by the next `run` or `recompute`
    pub fn config(&self) -> &SamplingConfig {
        &self.config
    }

    /// Size of the drawing area
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Current view transform
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Laid-out diagram, if a run has succeeded
    pub fn scene(&self) -> Option<&Scene> {
        self.scene.as_ref()
    }

    /// Reveal, ambient and particle progress
    pub fn animation(&self) -> &AnimationState {
        self.animator.state()
    }

    /// True while the one-shot reveal is running
    pub fn is_revealing(&self) -> bool {
        self.animator.is_revealing()
    }

    /// Ranked candidates of the last run or recompute
    pub fn predictions(&self) -> &[Prediction] {
        &self.predictions
    }

    /// Encoded prompt of the last successful run
    pub fn tokens(&self) -> &[EncodedToken] {
        &self.tokens
    }

    /// Prompt text of the last successful run
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Model facts reported by the last provider
    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    /// Whether raw scores are retained for `recompute`
    pub fn has_scores(&self) -> bool {
        self.raw_scores.is_some()
    }

    /// Entity under the pointer
    pub fn hover(&self) -> Option<Hit> {
        self.router.hover()
    }

    /// Diagram region under the pointer
    pub fn zone(&self) -> Option<Zone> {
        self.router.zone()
    }

    /// Called with the new zone (or `None`) whenever it changes
    pub fn set_zone_listener(&mut self, listener: impl FnMut(Option<Zone>, &ModelMetadata) + 'static) {
        self.router.set_zone_listener(Box::new(listener));
    }

    /// Called with `(token_id, text)` when an embedding node is clicked
    pub fn set_embedding_listener(&mut self, listener: impl FnMut(u32, &str) + 'static) {
        self.router.set_embedding_listener(Box::new(listener));
    }

    /// Encode, run one forward pass, sample and lay out a fresh scene.
    ///
    /// Returns `Ok(None)` and keeps the previous scene when the text encodes
    /// to nothing or the provider returns no scores.
    pub fn run<P>(&mut self, provider: &mut P, text: &str) -> Result<Option<&[Prediction]>, SessionError>
    where
        P: InferenceProvider + ?Sized,
    {
        if !provider.is_ready() {
            return Err(InferenceError::NotReady.into());
        }

        let encoded = provider.encode(text)?;
        if encoded.is_empty() {
            debug!("prompt encoded to nothing, keeping previous scene");
            return Ok(None);
        }

        let scores = provider.forward(&encoded)?;
        let predictions = sampler::sample(&scores, &self.config, |id| provider.decode(id), &mut self.rng)?;
        let metadata = provider.metadata().clone();

        let Some(scene) = build_scene(&encoded, metadata.n_layers, &predictions) else {
            debug!("no predictions, keeping previous scene");
            return Ok(None);
        };

        info!(
            model = %metadata.name,
            tokens = encoded.len(),
            vocab = scores.len(),
            predictions = predictions.len(),
            "pipeline run"
        );

        self.camera = Camera::fit(scene.bounds(), self.viewport);
        self.home = Some(self.camera);
        self.animator.cancel_particle();
        self.animator.start_reveal();
        self.router.reset(&self.metadata);

        self.metadata = metadata;
        self.prompt = text.to_string();
        self.tokens = encoded;
        self.raw_scores = Some(scores);
        self.predictions = predictions;
        self.scene = Some(scene);

        Ok(Some(self.predictions.as_slice()))
    }

    /// Re-rank the retained scores with the current config. Never calls `forward`.
    ///
    /// The scene is patched in place when the candidate count is unchanged
    /// and rebuilt (with a fresh reveal) when it differs.
    pub fn recompute<D>(&mut self, decoder: &D) -> Result<Option<&[Prediction]>, SessionError>
    where
        D: TokenDecoder + ?Sized,
    {
        let Some(scores) = self.raw_scores.as_ref() else {
            return Ok(None);
        };
        let predictions = sampler::sample(scores, &self.config, |id| decoder.decode(id), &mut self.rng)?;
        if predictions.is_empty() {
            return Ok(None);
        }

        let same_shape = self
            .scene
            .as_ref()
            .is_some_and(|s| s.bars.len() == predictions.len());
        if same_shape {
            if let Some(scene) = self.scene.as_mut() {
                scene.update_predictions(&predictions);
            }
            debug!(predictions = predictions.len(), "patched scene");
        } else {
            let Some(scene) = build_scene(&self.tokens, self.metadata.n_layers, &predictions) else {
                return Ok(None);
            };
            info!(predictions = predictions.len(), "candidate count changed, rebuilding scene");
            self.home = Some(Camera::fit(scene.bounds(), self.viewport));
            self.animator.cancel_particle();
            self.animator.start_reveal();
            self.router.reset(&self.metadata);
            self.scene = Some(scene);
        }

        self.predictions = predictions;
        Ok(Some(self.predictions.as_slice()))
    }

    /// Replace the sampling config and recompute without re-inference
    pub fn apply_config<D>(&mut self, config: SamplingConfig, decoder: &D) -> Result<Option<&[Prediction]>, SessionError>
    where
        D: TokenDecoder + ?Sized,
    {
        self.config = config;
        self.recompute(decoder)
    }

    /// Drop the scene and retained scores and reset the view
    pub fn clear(&mut self) {
        self.scene = None;
        self.raw_scores = None;
        self.predictions.clear();
        self.tokens.clear();
        self.prompt.clear();
        self.animator.clear();
        self.router.reset(&self.metadata);
        self.camera = Camera::default();
        self.home = None;
        debug!("session cleared");
    }

    /// Frame the current scene
    pub fn fit_to_content(&mut self) {
        if let Some(scene) = self.scene.as_ref() {
            self.camera = Camera::fit(scene.bounds(), self.viewport);
        }
    }

    /// Restore the scene's original auto-fit
    pub fn reset_view(&mut self) {
        self.camera = self.home.unwrap_or_default();
    }

    /// Change the viewport; the camera is left as is
    pub fn resize(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    /// Zoom in or out one step about the viewport centre
    pub fn zoom_step(&mut self, direction: ZoomDirection) {
        self.camera.zoom_step(direction, self.viewport);
    }

    /// Show the whole scene immediately
    pub fn skip_reveal(&mut self) {
        self.animator.finish_reveal();
    }

    /// Advance all animations by `dt` seconds
    pub fn tick(&mut self, dt: f64) -> FrameOutcome {
        self.animator.tick(dt, self.scene.is_some())
    }

    /// Draw the current frame, or the placeholder when there is no scene
    pub fn render<S: Surface + ?Sized>(&self, surface: &mut S) {
        match self.scene.as_ref() {
            Some(scene) => {
                let frame = Frame {
                    scene,
                    camera: &self.camera,
                    animation: self.animator.state(),
                    viewport: self.viewport,
                    hover: self.router.hover(),
                };
                render::render_frame(surface, &frame);
            }
            None => render::render_empty(surface, self.viewport),
        }
    }

    /// Send the sampled token from its bar to the next slot of the token column
    pub fn start_travel(&mut self) -> TweenHandle {
        let Some(scene) = self.scene.as_ref() else {
            return TweenHandle::resolved(TweenOutcome::Skipped);
        };
        let Some(bar) = scene.sampled_bar().and_then(|i| scene.bars.get(i)) else {
            return TweenHandle::resolved(TweenOutcome::Skipped);
        };
        let target = scene.next_token_slot();
        self.animator
            .start_particle(bar.position, target, bar.word.clone(), ACCENT_SECONDARY.to_string())
    }

    /// Prompt extended with the sampled token
    pub fn accept_sampled(&self) -> Option<String> {
        sampler::sampled(&self.predictions).map(|p| format!("{}{}", self.prompt, p.text))
    }

    /// Press at a screen point; arms a drag
    pub fn pointer_down(&mut self, pointer: Point) {
        self.router.pointer_down(pointer);
    }

    /// Hover, zone tracking or panning; returns whether a redraw is needed
    pub fn pointer_move(&mut self, pointer: Point) -> bool {
        self.router
            .pointer_move(self.scene.as_ref(), &mut self.camera, &self.metadata, pointer)
    }

    /// Release; a press without a drag is a click
    pub fn pointer_up(&mut self, pointer: Point) -> bool {
        self.router.pointer_up(self.scene.as_ref(), &self.camera, pointer)
    }

    /// Pointer left the canvas; clears hover and drag
    pub fn pointer_leave(&mut self) -> bool {
        self.router.pointer_leave()
    }

    /// Wheel zoom about the pointer; returns whether the camera moved
    pub fn wheel(&mut self, pointer: Point, delta: f64) -> bool {
        self.camera.zoom_wheel(pointer, delta)
    }
}
