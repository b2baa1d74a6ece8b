use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::{
    mapping::bpm_label, AppConfig, Bounce, Color, Dispatcher, FakeoutError, Frame,
    HeartRateMonitor, HeartRateSensor, Rect, RenderStepper, Result, Scene, SharedSpeed,
};

/// Label shown before the first heart-rate reading arrives.
pub const PLACEHOLDER_LABEL: &str = "~.~";

/// Visual outputs of the watch face: a background image and a text label.
pub trait Display: Send + 'static {
    fn set_background_image(&mut self, frame: Frame);
    fn set_label_text(&mut self, text: &str);
    fn set_label_color(&mut self, color: Color);
}

/// Builds the bouncing-square scene described by `config`, reading its speed
/// from `speed` on every step.
pub fn bouncing_scene(config: &AppConfig, speed: SharedSpeed) -> Scene {
    let mut bounce = Bounce::new(config.canvas.size, speed);
    let square = Rect::new(config.bounce.start)
        .with_fill(config.bounce.fill)
        .with_step_function(move |state| bounce.advance(&mut state.bounds));

    let mut scene = Scene::new(config.canvas.size, config.canvas.background);
    scene.append(square);
    scene
}

/// Wires the render loop and the heart-rate monitor to a [`Display`].
///
/// Frames land in the display's background image; each reading recolours
/// the label and changes how fast the square moves.
pub struct WatchFace<D: Display, S: HeartRateSensor> {
    config: AppConfig,
    display: Arc<Mutex<D>>,
    speed: SharedSpeed,
    stepper: Option<RenderStepper>,
    monitor: Option<HeartRateMonitor<S>>,
}

impl<D: Display, S: HeartRateSensor> WatchFace<D, S> {
    pub fn new(config: AppConfig, display: D) -> Self {
        let speed = SharedSpeed::new(config.bounce.speed);
        Self {
            config,
            display: Arc::new(Mutex::new(display)),
            speed,
            stepper: None,
            monitor: None,
        }
    }

    pub fn display(&self) -> &Arc<Mutex<D>> {
        &self.display
    }

    pub fn speed(&self) -> &SharedSpeed {
        &self.speed
    }

    pub fn is_active(&self) -> bool {
        self.stepper.is_some()
    }

    pub fn stepper(&self) -> Option<&RenderStepper> {
        self.stepper.as_ref()
    }

    /// Starts the animation and heart-rate monitoring. Does nothing when the
    /// face is already active.
    ///
    /// A device without a heart-rate sensor still gets the animation.
    pub fn activate<Q>(&mut self, dispatcher: Q, sensor: S) -> Result<()>
    where
        Q: Dispatcher + Clone,
    {
        if self.is_active() {
            tracing::debug!("watch face already set up");
            return Ok(());
        }

        let interval = self.config.stepper.interval()?;
        let poll_interval = self.config.heart_rate.poll_interval()?;

        // Nothing is stored on `self` until every step has succeeded.
        let scene = bouncing_scene(&self.config, self.speed.clone());
        let display = Arc::downgrade(&self.display);
        let mut stepper = RenderStepper::new(
            scene,
            interval,
            dispatcher.clone(),
            move |frame: Frame| {
                with_display(&display, |display| display.set_background_image(frame));
            },
        );
        stepper.start()?;

        self.lock_display()?.set_label_text(PLACEHOLDER_LABEL);

        let mut monitor = HeartRateMonitor::new(sensor, poll_interval);
        let display = Arc::downgrade(&self.display);
        let speed = self.speed.clone();
        let mapping = self.config.heart_rate.mapping.clone();
        let started = monitor.start_monitoring(dispatcher, move |reading| {
            let (trend, style) = mapping.evaluate(reading.bpm, reading.average);
            tracing::debug!(bpm = reading.bpm, average = reading.average, ?trend, "heart rate");
            speed.set(style.speed);
            with_display(&display, |display| {
                display.set_label_color(style.label_color);
                display.set_label_text(&bpm_label(reading.bpm));
            });
        });
        match started {
            Ok(()) => {}
            Err(FakeoutError::SensorUnavailable) => {
                tracing::warn!("heart-rate sensor unavailable, animating without it");
            }
            Err(err) => {
                stepper.invalidate();
                return Err(err);
            }
        }
        monitor.request_permission();

        self.stepper = Some(stepper);
        self.monitor = Some(monitor);

        tracing::info!(?interval, speed = self.speed.get(), "watch face active");
        Ok(())
    }

    /// Stops the render loop and heart-rate monitoring.
    pub fn deactivate(&mut self) {
        if let Some(stepper) = self.stepper.take() {
            stepper.invalidate();
        }
        if let Some(mut monitor) = self.monitor.take() {
            monitor.end_monitoring();
        }
    }

    fn lock_display(&self) -> Result<std::sync::MutexGuard<'_, D>> {
        self.display
            .lock()
            .map_err(|_| FakeoutError::Poisoned("display"))
    }
}

impl<D: Display, S: HeartRateSensor> Drop for WatchFace<D, S> {
    fn drop(&mut self) {
        self.deactivate();
    }
}

/// Runs `f` if the display is still alive.
fn with_display<D: Display>(display: &Weak<Mutex<D>>, f: impl FnOnce(&mut D)) {
    if let Some(display) = display.upgrade() {
        let mut display = display.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut display);
    }
}
