use thiserror::Error;

/// Fatal errors raised while assembling the engine from input objects.
/// No partial engine is ever handed to the transport driver: the first
/// build error aborts the whole setup with the offending user id.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("cannot create surface {id}: {reason}")]
    Surface { id: u32, reason: String },

    #[error("cannot create cell {id}: {reason}")]
    Cell { id: u32, reason: String },

    #[error("cannot create geometry: {0}")]
    Geometry(String),

    #[error("cannot create material {id}: {reason}")]
    Material { id: String, reason: String },

    #[error("cannot create cross sections for {id}: {reason}")]
    CrossSection { id: String, reason: String },

    #[error("cannot create source: {0}")]
    Source(String),

    #[error("cannot build sampler: {0}")]
    Sampler(String),

    #[error("bad setting `{key}`: {reason}")]
    Setting { key: String, reason: String },
}

impl BuildError {
    pub fn surface(id: u32, reason: impl Into<String>) -> Self {
        BuildError::Surface { id, reason: reason.into() }
    }

    pub fn cell(id: u32, reason: impl Into<String>) -> Self {
        BuildError::Cell { id, reason: reason.into() }
    }

    pub fn material(id: impl Into<String>, reason: impl Into<String>) -> Self {
        BuildError::Material { id: id.into(), reason: reason.into() }
    }

    pub fn cross_section(id: impl Into<String>, reason: impl Into<String>) -> Self {
        BuildError::CrossSection { id: id.into(), reason: reason.into() }
    }

    pub fn setting(key: impl Into<String>, reason: impl Into<String>) -> Self {
        BuildError::Setting { key: key.into(), reason: reason.into() }
    }
}

/// Per-history failures. These are counted and the history discarded; the
/// driver promotes them to a fatal [`RunError`] once a cycle exceeds its
/// configured budget of discarded histories.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SamplingError {
    #[error("source rejection budget exhausted after {0} samples")]
    SourceExhausted(usize),

    #[error("random stream budget of {0} draws exceeded")]
    RngBudgetExceeded(usize),

    #[error("lost particle at ({0:.6e}, {1:.6e}, {2:.6e})")]
    LostParticle(f64, f64, f64),
}

/// Fatal errors raised while running the power iteration.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("{count} histories discarded in cycle {cycle}, above the limit of {limit}")]
    TooManyLostHistories { cycle: usize, count: usize, limit: usize },

    #[error(transparent)]
    Sampling(#[from] SamplingError),
}
