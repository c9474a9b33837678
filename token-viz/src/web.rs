//! Browser front end
//!
//! Wires a [`Session`] to a `<canvas>`: mouse handlers for hover, drag and
//! wheel zoom, and a `requestAnimationFrame` pump that calls `tick` with the
//! real elapsed time. The bundled bigram model is trained from a corpus
//! passed in by the page.

use crate::animation::TweenOutcome;
use crate::camera::ZoomDirection;
use crate::geometry::{Point, Viewport};
use crate::session::Session;
use inference::{BigramConfig, BigramModel};
use sampler::SamplingConfig;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, MouseEvent, WheelEvent};

struct App {
    session: Session,
    model: BigramModel,
    ctx: CanvasRenderingContext2d,
    last_frame: Option<f64>,
    /// Placeholder already painted since the scene went away
    idle_drawn: bool,
}

/// Longest step fed to `tick`, so a backgrounded tab does not skip the reveal
const MAX_FRAME_SECONDS: f64 = 0.25;

fn log(msg: &str) {
    web_sys::console::log_1(&JsValue::from_str(msg));
}

fn to_js(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn outcome_name(outcome: TweenOutcome) -> &'static str {
    match outcome {
        TweenOutcome::Completed => "completed",
        TweenOutcome::Cancelled => "cancelled",
        TweenOutcome::Skipped => "skipped",
    }
}

/// Interactive pipeline diagram bound to a canvas element
#[wasm_bindgen]
pub struct PipelineVisualizer {
    app: Rc<RefCell<App>>,
}

#[wasm_bindgen]
impl PipelineVisualizer {
    /// Train the reference model on `corpus` (one text per line) and attach to `canvas_id`
    #[wasm_bindgen(constructor)]
    pub fn new(canvas_id: &str, corpus: &str) -> Result<PipelineVisualizer, JsValue> {
        console_error_panic_hook::set_once();

        let window = web_sys::window().ok_or("No window")?;
        let document = window.document().ok_or("No document")?;
        let canvas = document
            .get_element_by_id(canvas_id)
            .ok_or("no canvas")?
            .dyn_into::<HtmlCanvasElement>()?;
        let ctx = canvas
            .get_context("2d")?
            .ok_or("no 2d context")?
            .dyn_into::<CanvasRenderingContext2d>()?;

        let texts: Vec<&str> = corpus.lines().filter(|l| !l.trim().is_empty()).collect();
        let model = BigramModel::from_corpus(BigramConfig::tiny(), &texts).map_err(to_js)?;
        log(&format!(
            "Trained reference model on {} lines, vocab {}",
            texts.len(),
            model.tokenizer().vocab_size()
        ));

        let viewport = Viewport::new(canvas.width() as f64, canvas.height() as f64);
        let seed = (js_sys::Math::random() * u32::MAX as f64) as u64;
        let app = Rc::new(RefCell::new(App {
            session: Session::new(viewport, SamplingConfig::default(), seed),
            model,
            ctx,
            last_frame: None,
            idle_drawn: false,
        }));

        setup_handlers(&canvas, &app)?;
        start_animation_loop(app.clone());

        Ok(PipelineVisualizer { app })
    }

    /// Run the pipeline on `text`; returns the predictions as JSON, or null for empty input
    pub fn run(&self, text: &str) -> Result<JsValue, JsValue> {
        self.with_app(|app| {
            let App { session, model, .. } = app;
            match session.run(model, text).map_err(to_js)? {
                Some(preds) => serde_json::to_string(preds).map(|s| JsValue::from_str(&s)).map_err(to_js),
                None => Ok(JsValue::NULL),
            }
        })?
    }

    /// Change sampling parameters and re-rank without re-running the model
    pub fn set_config(&self, temperature: f32, top_k: usize, top_p: f32) -> Result<JsValue, JsValue> {
        self.apply(SamplingConfig::new(temperature, top_k, top_p))
    }

    /// Same as `set_config` from a JSON object
    pub fn load_config(&self, json: &str) -> Result<JsValue, JsValue> {
        self.apply(SamplingConfig::from_json(json).map_err(to_js)?)
    }

    pub fn clear(&self) -> Result<(), JsValue> {
        self.with_app(|app| app.session.clear())
    }

    pub fn fit_to_content(&self) -> Result<(), JsValue> {
        self.with_app(|app| app.session.fit_to_content())
    }

    pub fn reset_view(&self) -> Result<(), JsValue> {
        self.with_app(|app| app.session.reset_view())
    }

    pub fn zoom_in(&self) -> Result<(), JsValue> {
        self.with_app(|app| app.session.zoom_step(ZoomDirection::In))
    }

    pub fn zoom_out(&self) -> Result<(), JsValue> {
        self.with_app(|app| app.session.zoom_step(ZoomDirection::Out))
    }

    pub fn resize(&self, width: f64, height: f64) -> Result<(), JsValue> {
        self.with_app(|app| {
            app.session.resize(Viewport::new(width, height));
            app.idle_drawn = false;
        })
    }

    /// Animate the sampled token back into the prompt.
    ///
    /// Resolves to `"completed"`, `"cancelled"` or `"skipped"`.
    pub fn travel(&self) -> Result<js_sys::Promise, JsValue> {
        let handle = self.with_app(|app| app.session.start_travel())?;
        Ok(wasm_bindgen_futures::future_to_promise(async move {
            Ok(JsValue::from_str(outcome_name(handle.await)))
        }))
    }

    /// Prompt extended with the sampled token
    pub fn accept_sampled(&self) -> Result<Option<String>, JsValue> {
        self.with_app(|app| app.session.accept_sampled())
    }

    /// `callback(zone | null, metadataJson)` on zone change
    pub fn on_zone_change(&self, callback: js_sys::Function) -> Result<(), JsValue> {
        self.with_app(|app| {
            app.session.set_zone_listener(move |zone, metadata| {
                let zone = zone.map_or(JsValue::NULL, |z| JsValue::from_str(z.as_str()));
                let meta = serde_json::to_string(metadata).unwrap_or_default();
                let _ = callback.call2(&JsValue::NULL, &zone, &JsValue::from_str(&meta));
            })
        })
    }

    /// `callback(tokenId, tokenText)` when an embedding node is clicked
    pub fn on_embedding_click(&self, callback: js_sys::Function) -> Result<(), JsValue> {
        self.with_app(|app| {
            app.session.set_embedding_listener(move |token_id, text| {
                let _ = callback.call2(&JsValue::NULL, &JsValue::from(token_id), &JsValue::from_str(text));
            })
        })
    }
}

impl PipelineVisualizer {
    fn with_app<R>(&self, f: impl FnOnce(&mut App) -> R) -> Result<R, JsValue> {
        let mut app = self.app.try_borrow_mut().map_err(|_| JsValue::from_str("visualizer busy"))?;
        Ok(f(&mut app))
    }

    fn apply(&self, config: SamplingConfig) -> Result<JsValue, JsValue> {
        self.with_app(|app| {
            let App { session, model, .. } = app;
            match session.apply_config(config, &*model).map_err(to_js)? {
                Some(preds) => serde_json::to_string(preds).map(|s| JsValue::from_str(&s)).map_err(to_js),
                None => Ok(JsValue::NULL),
            }
        })?
    }
}

fn offset_point(event: &MouseEvent) -> Point {
    Point::new(event.offset_x() as f64, event.offset_y() as f64)
}

fn set_cursor(canvas: &HtmlCanvasElement, cursor: &str) {
    let _ = canvas.style().set_property("cursor", cursor);
}

fn setup_handlers(canvas: &HtmlCanvasElement, app: &Rc<RefCell<App>>) -> Result<(), JsValue> {
    // Mouse wheel for zoom
    let app_clone = app.clone();
    let wheel_closure = Closure::wrap(Box::new(move |event: WheelEvent| {
        event.prevent_default();
        let pointer = Point::new(event.offset_x() as f64, event.offset_y() as f64);
        if let Ok(mut app) = app_clone.try_borrow_mut() {
            app.session.wheel(pointer, event.delta_y());
        }
    }) as Box<dyn Fn(WheelEvent)>);
    canvas.add_event_listener_with_callback("wheel", wheel_closure.as_ref().unchecked_ref())?;
    wheel_closure.forget();

    // Mouse down
    let app_clone = app.clone();
    let mousedown_closure = Closure::wrap(Box::new(move |event: MouseEvent| {
        if let Ok(mut app) = app_clone.try_borrow_mut() {
            app.session.pointer_down(offset_point(&event));
        }
    }) as Box<dyn Fn(MouseEvent)>);
    canvas.add_event_listener_with_callback("mousedown", mousedown_closure.as_ref().unchecked_ref())?;
    mousedown_closure.forget();

    // Mouse move
    let app_clone = app.clone();
    let canvas_clone = canvas.clone();
    let mousemove_closure = Closure::wrap(Box::new(move |event: MouseEvent| {
        if let Ok(mut app) = app_clone.try_borrow_mut() {
            app.session.pointer_move(offset_point(&event));
            let cursor = if app.session.hover().is_some() { "pointer" } else { "grab" };
            set_cursor(&canvas_clone, cursor);
        }
    }) as Box<dyn Fn(MouseEvent)>);
    canvas.add_event_listener_with_callback("mousemove", mousemove_closure.as_ref().unchecked_ref())?;
    mousemove_closure.forget();

    // Mouse up
    let app_clone = app.clone();
    let canvas_clone = canvas.clone();
    let mouseup_closure = Closure::wrap(Box::new(move |event: MouseEvent| {
        if let Ok(mut app) = app_clone.try_borrow_mut() {
            app.session.pointer_up(offset_point(&event));
        }
        set_cursor(&canvas_clone, "grab");
    }) as Box<dyn Fn(MouseEvent)>);
    canvas.add_event_listener_with_callback("mouseup", mouseup_closure.as_ref().unchecked_ref())?;
    mouseup_closure.forget();

    // Mouse leave
    let app_clone = app.clone();
    let canvas_clone = canvas.clone();
    let mouseleave_closure = Closure::wrap(Box::new(move |_event: MouseEvent| {
        if let Ok(mut app) = app_clone.try_borrow_mut() {
            app.session.pointer_leave();
        }
        set_cursor(&canvas_clone, "grab");
    }) as Box<dyn Fn(MouseEvent)>);
    canvas.add_event_listener_with_callback("mouseleave", mouseleave_closure.as_ref().unchecked_ref())?;
    mouseleave_closure.forget();

    Ok(())
}

fn start_animation_loop(app: Rc<RefCell<App>>) {
    let f = Rc::new(RefCell::new(None::<Closure<dyn FnMut(f64)>>));
    let g = f.clone();

    *g.borrow_mut() = Some(Closure::wrap(Box::new(move |now: f64| {
        if let Ok(mut app) = app.try_borrow_mut() {
            let dt = app
                .last_frame
                .map_or(0.0, |last| ((now - last) / 1000.0).clamp(0.0, MAX_FRAME_SECONDS));
            app.last_frame = Some(now);

            let App {
                session,
                ctx,
                idle_drawn,
                ..
            } = &mut *app;
            if session.tick(dt).redraw {
                session.render(ctx);
                *idle_drawn = false;
            } else if !*idle_drawn {
                session.render(ctx);
                *idle_drawn = true;
            }
        }

        // Schedule next frame
        if let Some(callback) = f.borrow().as_ref() {
            request_animation_frame(callback);
        }
    }) as Box<dyn FnMut(f64)>));

    if let Some(callback) = g.borrow().as_ref() {
        request_animation_frame(callback);
    }
}

fn request_animation_frame(f: &Closure<dyn FnMut(f64)>) {
    if let Some(window) = web_sys::window() {
        let _ = window.request_animation_frame(f.as_ref().unchecked_ref());
    }
}
