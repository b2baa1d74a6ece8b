/// Result alias that carries the custom [`FakeoutError`] type.
pub type Result<T> = std::result::Result<T, FakeoutError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum FakeoutError {
    /// Free-form message for failures that do not warrant their own variant.
    #[error("{0}")]
    Message(String),
    /// A caller supplied a value outside the accepted range.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// The raster surface for a frame could not be created.
    #[error("unable to allocate a {width}x{height} drawing surface")]
    SurfaceAllocation { width: u32, height: u32 },
    /// A render stepper was driven through an illegal lifecycle transition.
    #[error("render stepper: {0}")]
    Stepper(&'static str),
    /// The heart-rate sensor is missing on this device.
    #[error("heart-rate sensor is unavailable")]
    SensorUnavailable,
    /// A shared lock was poisoned by a panicking holder.
    #[error("{0} has been poisoned")]
    Poisoned(&'static str),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Configuration or trace (de)serialisation failure.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    /// PNG encoding failure while writing frames.
    #[error("{0}")]
    Image(#[from] image::ImageError),
}

impl FakeoutError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for FakeoutError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for FakeoutError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
