use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum FleetError {
    StorageError(String),
    StateTransitionError(String),
    ExecutionError(String),
    EventError(String),
    ConfigurationError(String),
}

impl fmt::Display for FleetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FleetError::StorageError(msg) => write!(f, "Storage error: {msg}"),
            FleetError::StateTransitionError(msg) => write!(f, "State transition error: {msg}"),
            FleetError::ExecutionError(msg) => write!(f, "Execution error: {msg}"),
            FleetError::EventError(msg) => write!(f, "Event error: {msg}"),
            FleetError::ConfigurationError(msg) => write!(f, "Configuration error: {msg}"),
        }
    }
}

impl std::error::Error for FleetError {}

pub type Result<T> = std::result::Result<T, FleetError>;
