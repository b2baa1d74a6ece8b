use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use crate::{geometry::Bounds, Bitmap, Color};

/// Per-shape mutation callback, invoked once per scene tick with the shape's
/// own state.
pub type StepFn<T> = Box<dyn FnMut(&mut T) + Send + 'static>;

/// Something a [`Scene`](crate::Scene) can paint and advance.
pub trait Drawable: Send {
    /// Paints the current state onto `surface`.
    fn draw(&self, surface: &mut Bitmap);

    /// Runs the step function, if one is installed. Shapes without one stay
    /// put.
    fn step(&mut self);

    fn has_step_function(&self) -> bool;
}

/// Mutable state of a [`Rect`] handed to its step function.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectState {
    pub bounds: Bounds,
    pub fill: Color,
}

/// Axis-aligned filled rectangle.
pub struct Rect {
    state: RectState,
    step_fn: Option<StepFn<RectState>>,
}

impl Rect {
    /// Creates an orange rectangle with no step function.
    pub fn new(bounds: Bounds) -> Self {
        Self {
            state: RectState {
                bounds,
                fill: Color::ORANGE,
            },
            step_fn: None,
        }
    }

    pub fn with_fill(mut self, fill: Color) -> Self {
        self.state.fill = fill;
        self
    }

    pub fn with_step_function<F>(mut self, step: F) -> Self
    where
        F: FnMut(&mut RectState) + Send + 'static,
    {
        self.set_step_function(step);
        self
    }

    pub fn set_step_function<F>(&mut self, step: F)
    where
        F: FnMut(&mut RectState) + Send + 'static,
    {
        self.step_fn = Some(Box::new(step));
    }

    pub fn clear_step_function(&mut self) {
        self.step_fn = None;
    }

    pub fn state(&self) -> &RectState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut RectState {
        &mut self.state
    }

    pub fn bounds(&self) -> Bounds {
        self.state.bounds
    }

    pub fn fill(&self) -> Color {
        self.state.fill
    }
}

impl Drawable for Rect {
    fn draw(&self, surface: &mut Bitmap) {
        surface.fill_bounds(&self.state.bounds, self.state.fill);
    }

    fn step(&mut self) {
        if let Some(step) = self.step_fn.as_mut() {
            step(&mut self.state);
        }
    }

    fn has_step_function(&self) -> bool {
        self.step_fn.is_some()
    }
}

impl fmt::Debug for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rect")
            .field("state", &self.state)
            .field("step_fn", &self.step_fn.is_some())
            .finish()
    }
}

/// Shared handle to a drawable. Appending the same handle to a scene twice
/// draws and steps the underlying shape twice per tick.
impl<D: Drawable> Drawable for Arc<Mutex<D>> {
    fn draw(&self, surface: &mut Bitmap) {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .draw(surface);
    }

    fn step(&mut self) {
        self.lock().unwrap_or_else(PoisonError::into_inner).step();
    }

    fn has_step_function(&self) -> bool {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .has_step_function()
    }
}
