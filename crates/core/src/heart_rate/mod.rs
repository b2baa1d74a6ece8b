use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    thread::{self, JoinHandle},
    time::Duration,
};

use crate::{stepper::Timer, Dispatcher, FakeoutError, Result};

/// Source of heart-rate samples, e.g. a health-data store on the device.
pub trait HeartRateSensor: Send + 'static {
    /// Whether the device has a heart-rate sensor at all.
    fn is_available(&self) -> bool;

    /// Asks the user for read access. `Ok(false)` means the request was
    /// declined.
    fn request_authorization(&mut self) -> Result<bool>;

    /// Most recent sample in beats per minute, or `None` when nothing has been
    /// recorded (or access was never granted).
    fn latest_reading(&mut self) -> Result<Option<f64>>;
}

/// Sensor that replays a fixed list of readings, cycling forever.
#[derive(Debug, Clone)]
pub struct ScriptedSensor {
    readings: Vec<f64>,
    cursor: usize,
    available: bool,
    grants_access: bool,
    authorized: bool,
}

impl ScriptedSensor {
    pub fn new(readings: Vec<f64>) -> Self {
        Self {
            readings,
            cursor: 0,
            available: true,
            grants_access: true,
            authorized: false,
        }
    }

    /// A sensor whose authorization request is always declined.
    pub fn denying(mut self) -> Self {
        self.grants_access = false;
        self
    }

    /// A device without a heart-rate sensor.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new(Vec::new())
        }
    }
}

impl HeartRateSensor for ScriptedSensor {
    fn is_available(&self) -> bool {
        self.available
    }

    fn request_authorization(&mut self) -> Result<bool> {
        if !self.available {
            return Err(FakeoutError::SensorUnavailable);
        }
        self.authorized = self.grants_access;
        Ok(self.authorized)
    }

    fn latest_reading(&mut self) -> Result<Option<f64>> {
        if !self.authorized || self.readings.is_empty() {
            return Ok(None);
        }
        let reading = self.readings[self.cursor % self.readings.len()];
        self.cursor = self.cursor.wrapping_add(1);
        Ok(Some(reading))
    }
}

/// A reading delivered to the monitoring handler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub bpm: f64,
    /// Mean of every reading so far, this one included.
    pub average: f64,
}

#[derive(Debug, Default)]
struct ReadingLog {
    readings: Vec<f64>,
}

impl ReadingLog {
    fn push(&mut self, bpm: f64) -> f64 {
        self.readings.push(bpm);
        self.average()
    }

    fn average(&self) -> f64 {
        self.readings.iter().sum::<f64>() / (self.readings.len().max(1) as f64)
    }
}

type ReadingHandler = Box<dyn FnMut(Reading) + Send + 'static>;

/// Polls a [`HeartRateSensor`] on a background thread and delivers readings
/// on a [`Dispatcher`].
///
/// The running average and the handler are only touched from dispatched jobs,
/// so they observe readings in the order they were polled.
pub struct HeartRateMonitor<S: HeartRateSensor> {
    sensor: Arc<Mutex<S>>,
    poll_interval: Duration,
    log: Arc<Mutex<ReadingLog>>,
    handler: Arc<Mutex<Option<ReadingHandler>>>,
    timer: Arc<Timer>,
    worker: Option<JoinHandle<()>>,
}

impl<S: HeartRateSensor> HeartRateMonitor<S> {
    pub fn new(sensor: S, poll_interval: Duration) -> Self {
        Self {
            sensor: Arc::new(Mutex::new(sensor)),
            poll_interval,
            log: Arc::new(Mutex::new(ReadingLog::default())),
            handler: Arc::new(Mutex::new(None)),
            timer: Arc::new(Timer::new()),
            worker: None,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn is_monitoring(&self) -> bool {
        self.worker.is_some()
    }

    /// Requests read access. The outcome is only logged; a denied request
    /// simply means no readings will arrive.
    pub fn request_permission(&self) {
        let mut sensor = self.sensor.lock().unwrap_or_else(PoisonError::into_inner);
        if !sensor.is_available() {
            tracing::warn!("no heart-rate sensor on this device");
            return;
        }

        match sensor.request_authorization() {
            Ok(true) => tracing::info!("heart-rate permission granted"),
            Ok(false) => tracing::warn!("heart-rate permission denied"),
            Err(err) => tracing::warn!(%err, "heart-rate permission request failed"),
        }
    }

    /// Starts polling and routes every reading to `handler` on `dispatcher`.
    ///
    /// Calling this while already monitoring replaces the handler.
    pub fn start_monitoring<D, F>(&mut self, dispatcher: D, handler: F) -> Result<()>
    where
        D: Dispatcher,
        F: FnMut(Reading) + Send + 'static,
    {
        if !self.lock_sensor()?.is_available() {
            return Err(FakeoutError::SensorUnavailable);
        }

        let handler: ReadingHandler = Box::new(handler);
        *self.lock_handler()? = Some(handler);
        if self.worker.is_some() {
            return Ok(());
        }

        self.timer = Arc::new(Timer::new());
        let poller = Poller {
            sensor: Arc::clone(&self.sensor),
            log: Arc::clone(&self.log),
            handler: Arc::clone(&self.handler),
            timer: Arc::clone(&self.timer),
            dispatcher: Box::new(dispatcher),
            interval: self.poll_interval,
        };
        let worker = thread::Builder::new()
            .name("heart-rate-poll".to_string())
            .spawn(move || poller.run())?;
        self.worker = Some(worker);
        Ok(())
    }

    /// Stops polling and detaches the handler. Readings already dispatched
    /// still update the average but reach no handler.
    pub fn end_monitoring(&mut self) {
        *self.handler.lock().unwrap_or_else(PoisonError::into_inner) = None;
        self.timer.invalidate();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::warn!("heart-rate poll thread panicked");
            }
        }
    }

    /// Mean of all readings delivered so far, `0.0` before the first one.
    pub fn average(&self) -> f64 {
        self.log
            .lock()
            .map(|log| log.average())
            .unwrap_or_default()
    }

    pub fn reading_count(&self) -> usize {
        self.log
            .lock()
            .map(|log| log.readings.len())
            .unwrap_or_default()
    }

    fn lock_sensor(&self) -> Result<MutexGuard<'_, S>> {
        self.sensor
            .lock()
            .map_err(|_| FakeoutError::Poisoned("heart-rate sensor"))
    }

    fn lock_handler(&self) -> Result<MutexGuard<'_, Option<ReadingHandler>>> {
        self.handler
            .lock()
            .map_err(|_| FakeoutError::Poisoned("heart-rate handler"))
    }
}

impl<S: HeartRateSensor> Drop for HeartRateMonitor<S> {
    fn drop(&mut self) {
        self.end_monitoring();
    }
}

impl<S: HeartRateSensor> fmt::Debug for HeartRateMonitor<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeartRateMonitor")
            .field("poll_interval", &self.poll_interval)
            .field("monitoring", &self.is_monitoring())
            .field("readings", &self.reading_count())
            .finish()
    }
}

struct Poller<S> {
    sensor: Arc<Mutex<S>>,
    log: Arc<Mutex<ReadingLog>>,
    handler: Arc<Mutex<Option<ReadingHandler>>>,
    timer: Arc<Timer>,
    dispatcher: Box<dyn Dispatcher>,
    interval: Duration,
}

impl<S: HeartRateSensor> Poller<S> {
    fn run(self) {
        while self.timer.wait_next(self.interval) {
            self.timer.begin_round();
            self.poll();
        }
        tracing::debug!(polls = self.timer.rounds(), "heart-rate polling stopped");
    }

    fn poll(&self) {
        let reading = self
            .sensor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .latest_reading();

        let bpm = match reading {
            Ok(Some(bpm)) => bpm,
            Ok(None) => {
                tracing::debug!("no heart rate found");
                return;
            }
            Err(err) => {
                tracing::warn!(%err, "heart-rate query failed");
                return;
            }
        };

        let log = Arc::clone(&self.log);
        let handler = Arc::clone(&self.handler);
        self.dispatcher.dispatch(Box::new(move || {
            let average = log.lock().unwrap_or_else(PoisonError::into_inner).push(bpm);
            let mut handler = handler.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(handler) = handler.as_mut() {
                handler(Reading { bpm, average });
            }
        }));
    }
}
