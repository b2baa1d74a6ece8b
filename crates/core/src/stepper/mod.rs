use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Condvar, Mutex, MutexGuard, PoisonError,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crate::{Bitmap, Dispatcher, FakeoutError, Result, Scene};

/// Rendered output of one tick.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Zero-based tick number. Frame `n` shows the scene after `n` steps.
    pub index: u64,
    /// `None` when the drawing surface could not be created for this tick.
    pub bitmap: Option<Bitmap>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepperState {
    Idle,
    Running,
    Stopped,
}

type FrameCallback = Box<dyn FnMut(Frame) + Send + 'static>;

/// Validity flag plus the condvar a loop thread sleeps on between rounds.
#[derive(Debug)]
pub(crate) struct Timer {
    valid: Mutex<bool>,
    wake: Condvar,
    rounds: AtomicU64,
}

impl Timer {
    /// Counts one round and returns its zero-based index.
    pub(crate) fn begin_round(&self) -> u64 {
        self.rounds.fetch_add(1, Ordering::AcqRel)
    }

    pub(crate) fn rounds(&self) -> u64 {
        self.rounds.load(Ordering::Acquire)
    }

    pub(crate) fn new() -> Self {
        Self {
            valid: Mutex::new(true),
            wake: Condvar::new(),
            rounds: AtomicU64::new(0),
        }
    }

    pub(crate) fn is_valid(&self) -> bool {
        *self.valid.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn invalidate(&self) {
        *self.valid.lock().unwrap_or_else(PoisonError::into_inner) = false;
        self.wake.notify_all();
    }

    /// Sleeps for `interval` from now. Returns `false` once invalidated, in
    /// which case the pending round is dropped.
    pub(crate) fn wait_next(&self, interval: Duration) -> bool {
        let guard = self.valid.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = self
            .wake
            .wait_timeout_while(guard, interval, |valid| *valid)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

/// Everything the tick thread needs.
struct TickLoop {
    scene: Arc<Mutex<Scene>>,
    interval: Duration,
    dispatcher: Arc<dyn Dispatcher>,
    on_frame: Arc<Mutex<FrameCallback>>,
    timer: Arc<Timer>,
}

impl TickLoop {
    fn run(self) {
        tracing::debug!(interval = ?self.interval, "render stepper running");
        loop {
            self.tick();
            if !self.timer.wait_next(self.interval) {
                break;
            }
        }
        tracing::debug!(
            ticks = self.timer.rounds(),
            "render stepper stopped"
        );
    }

    fn tick(&self) {
        let index = self.timer.begin_round();

        let bitmap = {
            let mut scene = self.scene.lock().unwrap_or_else(PoisonError::into_inner);
            let bitmap = scene.render();
            scene.step();
            bitmap
        };

        let on_frame = Arc::clone(&self.on_frame);
        self.dispatcher.dispatch(Box::new(move || {
            let mut on_frame = on_frame.lock().unwrap_or_else(PoisonError::into_inner);
            (*on_frame)(Frame { index, bitmap });
        }));
    }
}

/// Timer loop that renders a [`Scene`], steps it, and hands each frame to a
/// callback on a [`Dispatcher`].
///
/// Ticks are re-armed after each one finishes, so they never overlap, and the
/// next tick is scheduled without waiting for the callback. The first tick
/// runs as soon as [`start`](Self::start) is called.
///
/// Invalidation is terminal: a tick already in progress finishes, nothing
/// after it runs. Dropping the stepper invalidates it and joins the tick
/// thread.
pub struct RenderStepper {
    scene: Arc<Mutex<Scene>>,
    interval: Duration,
    dispatcher: Arc<dyn Dispatcher>,
    on_frame: Arc<Mutex<FrameCallback>>,
    timer: Arc<Timer>,
    worker: Option<JoinHandle<()>>,
}

impl RenderStepper {
    pub fn new<D, F>(scene: Scene, interval: Duration, dispatcher: D, on_frame: F) -> Self
    where
        D: Dispatcher,
        F: FnMut(Frame) + Send + 'static,
    {
        let on_frame: FrameCallback = Box::new(on_frame);
        Self {
            scene: Arc::new(Mutex::new(scene)),
            interval,
            dispatcher: Arc::new(dispatcher),
            on_frame: Arc::new(Mutex::new(on_frame)),
            timer: Arc::new(Timer::new()),
            worker: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn state(&self) -> StepperState {
        match (self.timer.is_valid(), self.worker.is_some()) {
            (false, _) => StepperState::Stopped,
            (true, false) => StepperState::Idle,
            (true, true) => StepperState::Running,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.timer.is_valid()
    }

    /// Number of ticks started so far.
    pub fn ticks(&self) -> u64 {
        self.timer.rounds()
    }

    /// Starts ticking. The first frame is rendered immediately.
    pub fn start(&mut self) -> Result<()> {
        match self.state() {
            StepperState::Idle => {}
            StepperState::Running => return Err(FakeoutError::Stepper("already running")),
            StepperState::Stopped => {
                return Err(FakeoutError::Stepper("invalidated steppers cannot restart"))
            }
        }

        let tick_loop = TickLoop {
            scene: Arc::clone(&self.scene),
            interval: self.interval,
            dispatcher: Arc::clone(&self.dispatcher),
            on_frame: Arc::clone(&self.on_frame),
            timer: Arc::clone(&self.timer),
        };
        let worker = thread::Builder::new()
            .name("render-stepper".to_string())
            .spawn(move || tick_loop.run())?;
        self.worker = Some(worker);
        Ok(())
    }

    /// Stops scheduling further ticks.
    pub fn invalidate(&self) {
        self.timer.invalidate();
    }

    /// Runs `f` against the scene between ticks.
    pub fn with_scene<R>(&self, f: impl FnOnce(&mut Scene) -> R) -> Result<R> {
        let mut scene = self.lock_scene()?;
        Ok(f(&mut scene))
    }

    fn lock_scene(&self) -> Result<MutexGuard<'_, Scene>> {
        self.scene
            .lock()
            .map_err(|_| FakeoutError::Poisoned("stepper scene"))
    }
}

impl Drop for RenderStepper {
    fn drop(&mut self) {
        self.invalidate();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::warn!("render stepper thread panicked");
            }
        }
    }
}

impl fmt::Debug for RenderStepper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderStepper")
            .field("interval", &self.interval)
            .field("state", &self.state())
            .field("ticks", &self.ticks())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::atomic::AtomicUsize, time::Instant};

    use super::*;
    use crate::{geometry::Bounds, main_queue, scene::CanvasSize, Color, Rect};

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn wait_until(mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + TIMEOUT;
        while Instant::now() < deadline {
            if done() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        done()
    }

    /// One-pixel-wide strip that moves right by one pixel per step.
    fn sliding_scene(steps: Arc<AtomicUsize>) -> Scene {
        let mut scene = Scene::new(CanvasSize::new(64, 1), Color::CLEAR);
        scene.append(
            Rect::new(Bounds::new(0.0, 0.0, 1.0, 1.0)).with_step_function(move |state| {
                state.bounds.offset(1.0, 0.0);
                steps.fetch_add(1, Ordering::SeqCst);
            }),
        );
        scene
    }

    fn lit_column(bitmap: &Bitmap) -> Option<u32> {
        (0..bitmap.width()).find(|&x| bitmap.pixel(x, 0) == Some(Color::ORANGE))
    }

    #[test]
    fn frame_n_shows_state_after_n_steps() {
        let steps = Arc::new(AtomicUsize::new(0));
        let (queue, main_loop) = main_queue();
        let frames = Arc::new(Mutex::new(Vec::new()));
        let sink = frames.clone();

        let mut stepper = RenderStepper::new(
            sliding_scene(steps),
            Duration::from_millis(1),
            queue,
            move |frame: Frame| sink.lock().unwrap().push(frame),
        );
        stepper.start().unwrap();

        let deadline = Instant::now() + TIMEOUT;
        while frames.lock().unwrap().len() < 6 && Instant::now() < deadline {
            main_loop.run_one(Duration::from_millis(50));
        }
        stepper.invalidate();

        let frames = frames.lock().unwrap();
        assert!(frames.len() >= 6);
        for (position, frame) in frames.iter().take(6).enumerate() {
            assert_eq!(frame.index, position as u64);
            let bitmap = frame.bitmap.as_ref().expect("frame should render");
            assert_eq!(lit_column(bitmap), Some(position as u32));
        }
    }

    #[test]
    fn missing_surface_delivers_empty_frames_and_keeps_ticking() {
        let steps = Arc::new(AtomicUsize::new(0));
        let counter = steps.clone();
        let mut scene = Scene::new(CanvasSize::new(0, 93), Color::CLEAR);
        scene.append(
            Rect::new(Bounds::new(0.0, 0.0, 5.0, 5.0)).with_step_function(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let (queue, main_loop) = main_queue();
        let frames = Arc::new(Mutex::new(Vec::new()));
        let sink = frames.clone();
        let mut stepper = RenderStepper::new(scene, Duration::from_millis(1), queue, move |frame: Frame| {
            sink.lock().unwrap().push(frame)
        });
        stepper.start().unwrap();

        let deadline = Instant::now() + TIMEOUT;
        while frames.lock().unwrap().len() < 4 && Instant::now() < deadline {
            main_loop.run_one(Duration::from_millis(50));
        }
        let ticks_seen = stepper.ticks();
        assert!(wait_until(|| stepper.ticks() > ticks_seen));
        assert_eq!(stepper.state(), StepperState::Running);
        stepper.invalidate();

        let frames = frames.lock().unwrap();
        assert!(frames.len() >= 4);
        for (position, frame) in frames.iter().enumerate() {
            assert_eq!(frame.index, position as u64);
            assert!(frame.bitmap.is_none());
        }
        assert!(steps.load(Ordering::SeqCst) >= 4);
    }

    #[test]
    fn rejects_illegal_transitions() {
        let (queue, _main_loop) = main_queue();
        let mut stepper = RenderStepper::new(Scene::default(), Duration::from_millis(5), queue, |_| {});
        assert_eq!(stepper.state(), StepperState::Idle);

        stepper.start().unwrap();
        assert_eq!(stepper.state(), StepperState::Running);
        assert!(matches!(stepper.start(), Err(FakeoutError::Stepper(_))));

        stepper.invalidate();
        assert_eq!(stepper.state(), StepperState::Stopped);
        assert!(matches!(stepper.start(), Err(FakeoutError::Stepper(_))));
    }

    #[test]
    fn invalidated_before_start_never_ticks() {
        let (queue, _main_loop) = main_queue();
        let mut stepper = RenderStepper::new(Scene::default(), Duration::from_millis(1), queue, |_| {});
        stepper.invalidate();

        assert!(stepper.start().is_err());
        assert_eq!(stepper.ticks(), 0);
    }

    #[test]
    fn at_most_one_tick_after_invalidate() {
        let steps = Arc::new(AtomicUsize::new(0));
        let (queue, _main_loop) = main_queue();
        let mut stepper =
            RenderStepper::new(sliding_scene(steps.clone()), Duration::from_millis(1), queue, |_| {});
        stepper.start().unwrap();
        assert!(wait_until(|| steps.load(Ordering::SeqCst) >= 3));

        stepper.invalidate();
        let at_call = steps.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(30));

        assert!(steps.load(Ordering::SeqCst) <= at_call + 1);
    }

    #[test]
    fn ticks_keep_going_while_frames_are_undelivered() {
        let (queue, main_loop) = main_queue();
        let delivered = Arc::new(AtomicUsize::new(0));
        let counter = delivered.clone();
        let mut stepper = RenderStepper::new(Scene::default(), Duration::from_millis(1), queue, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        stepper.start().unwrap();

        assert!(wait_until(|| stepper.ticks() >= 5));
        assert_eq!(delivered.load(Ordering::SeqCst), 0);

        drop(stepper);
        main_loop.run_pending();
        assert!(delivered.load(Ordering::SeqCst) >= 5);
    }

    #[test]
    fn dropping_stops_the_tick_thread() {
        let steps = Arc::new(AtomicUsize::new(0));
        let (queue, _main_loop) = main_queue();
        let mut stepper =
            RenderStepper::new(sliding_scene(steps.clone()), Duration::from_millis(1), queue, |_| {});
        stepper.start().unwrap();
        assert!(wait_until(|| steps.load(Ordering::SeqCst) >= 2));

        drop(stepper);
        let after_drop = steps.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));

        assert_eq!(steps.load(Ordering::SeqCst), after_drop);
    }

    #[test]
    fn scene_can_be_edited_between_ticks() {
        let (queue, _main_loop) = main_queue();
        let stepper = RenderStepper::new(Scene::default(), Duration::from_millis(5), queue, |_| {});

        let id = stepper
            .with_scene(|scene| scene.append(Rect::new(Bounds::new(0.0, 0.0, 1.0, 1.0))))
            .unwrap();
        let removed = stepper.with_scene(|scene| scene.remove(id).is_some()).unwrap();

        assert!(removed);
        assert!(stepper.with_scene(|scene| scene.is_empty()).unwrap());
    }
}
