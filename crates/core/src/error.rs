/// Result alias that carries the custom [`PerformanceError`] type.
pub type Result<T> = std::result::Result<T, PerformanceError>;

/// Common error type for the performance engine.
#[derive(Debug, thiserror::Error)]
pub enum PerformanceError {
    /// The sequencer device could not be opened. Playback cannot start.
    #[error("MIDI device `{device}` is unavailable")]
    DeviceUnavailable { device: String },
    /// A transport request was made against a sequencer that is not open.
    #[error("sequencer is not open")]
    SequencerClosed,
    /// The sequence handed over by the parsing collaborator breaks an invariant.
    #[error("malformed sequence: {0}")]
    MalformedSequence(String),
    /// Free-form error message.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Wrapper around JSON (de)serialization errors.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl PerformanceError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub(crate) fn device_unavailable(device: impl Into<String>) -> Self {
        Self::DeviceUnavailable {
            device: device.into(),
        }
    }
}

impl From<&str> for PerformanceError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for PerformanceError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
