use thiserror::Error;

/// Errors local to a single skill invocation or skill lifecycle step.
///
/// These never escape the manager as errors: they are converted into a
/// failed `SkillResult` carrying the display string.
#[derive(Debug, Error)]
pub enum SkillError {
    #[error("invalid configuration for skill '{skill}': {reason}")]
    Configuration { skill: String, reason: String },

    #[error("skill '{0}' not found")]
    NotFound(String),

    #[error("skill '{skill}' is not active (state: {state})")]
    NotActive { skill: String, state: String },

    #[error("{0}")]
    Execution(String),

    #[error("skill '{skill}' does not support operation '{operation}'")]
    UnsupportedOperation { skill: String, operation: String },

    #[error("execution queue is full ({0} pending)")]
    QueueFull(usize),

    #[error("skill manager is shutting down")]
    ShuttingDown,
}

impl SkillError {
    /// Shorthand for the error a skill raises from its own logic.
    pub fn execution(message: impl Into<String>) -> Self {
        SkillError::Execution(message.into())
    }
}

/// Errors raised while registering or ordering skills.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("skill '{0}' is already registered")]
    DuplicateSkill(String),

    #[error("circular dependency detected involving skill '{0}'")]
    CircularDependency(String),

    #[error("skill '{0}' is not registered")]
    UnknownSkill(String),
}

/// Errors from the memory store's durable layer.
///
/// Persistence failures during normal operation are logged, not returned;
/// in-memory state stays authoritative until the next successful flush.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Structural errors that abort manager startup.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors loading the runtime configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },
}
