use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

/// Failure reported by a drawing surface primitive.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SurfaceError {
    #[error("sprite not loaded: {0}")]
    MissingSprite(String),

    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("surface backend: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid drawing surface or unsupported context. Fatal during construction.
    #[error("setup error: {0}")]
    Setup(String),

    #[error("invalid game state: {0}")]
    InvalidState(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("system error [{name}]: {source}")]
    System {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("draw command failed: {0}")]
    Draw(#[source] SurfaceError),

    #[error("surface error: {0}")]
    Surface(#[from] SurfaceError),

    #[error("emergency stop after {errors} errors")]
    EmergencyStop { errors: u32 },

    /// Panic that escaped a tick body.
    #[error("tick panicked: {0}")]
    Panic(String),

    #[error("engine is not running")]
    NotRunning,
}

/// Run `f`, turning a panic into its message.
pub(crate) fn catch_panic<T>(f: impl FnOnce() -> T) -> Result<T, String> {
    std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)).map_err(|payload| {
        payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string())
    })
}
