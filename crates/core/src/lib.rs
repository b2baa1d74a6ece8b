//! Core library for the Fakeout bouncing watch face.
//!
//! The heart of the crate is a small shape-stepping render loop: a [`Scene`]
//! of [`Drawable`] shapes is rasterised into a [`Bitmap`] and advanced one
//! step per tick by a [`RenderStepper`], which hands every frame to a
//! callback on a [`Dispatcher`]. The remaining modules are the callers of that
//! loop: the heart-rate monitor that drives the animation speed, the picker
//! precompute, frame recording, and the [`WatchFace`] controller tying them
//! together.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod face;
pub mod geometry;
pub mod heart_rate;
pub mod mapping;
pub mod motion;
pub mod paint;
pub mod picker;
pub mod record;
pub mod scene;
pub mod shape;
pub mod stepper;
pub mod surface;

pub use config::{positive_duration, AppConfig, BounceConfig, CanvasConfig, HeartRateConfig, PickerConfig, StepperConfig};
pub use dispatch::{main_queue, Dispatcher, Job, MainLoop, MainQueue};
pub use error::{FakeoutError, Result};
pub use face::{bouncing_scene, Display, WatchFace};
pub use geometry::{Bounds, Point, Size};
pub use heart_rate::{HeartRateMonitor, HeartRateSensor, Reading, ScriptedSensor};
pub use mapping::{Trend, TrendMapping, TrendStyle};
pub use motion::{Bounce, Direction, Heading, SharedSpeed};
pub use paint::Color;
pub use picker::{paddle_frames, paddle_scene, precompute_frames};
pub use record::{Recorder, RecordingSettings};
pub use scene::{CanvasSize, Scene, ShapeId};
pub use shape::{Drawable, Rect, RectState, StepFn};
pub use stepper::{Frame, RenderStepper, StepperState};
pub use surface::Bitmap;
