//! Error types and handling for Helios
//!
//! Every failure the decision engine can encounter maps to one variant here,
//! and each variant has a fixed fallback in the control loop: sensor failures
//! hold or decay the setpoint, actuator failures hold it, configuration
//! failures are fatal at startup only.

use thiserror::Error;

/// Result type alias for Helios operations
pub type Result<T> = std::result::Result<T, HeliosError>;

/// Main error type for Helios
#[derive(Debug, Error)]
pub enum HeliosError {
    /// Configuration loading errors (file missing, unreadable)
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A configuration value violates its bounds
    #[error("Invalid configuration: {field} - {message}")]
    ConfigurationInvalid { field: String, message: String },

    /// The snapshot source could not deliver a usable reading
    #[error("Sensor unavailable: {message}")]
    SensorUnavailable { message: String },

    /// The charger rejected or did not acknowledge a setpoint
    #[error("Actuator failure: {message}")]
    ActuatorFailure { message: String },

    /// Unrecognized charge mode string
    #[error("Invalid mode '{value}': expected one of {expected}")]
    InvalidMode { value: String, expected: String },

    /// An I/O operation exceeded its deadline
    #[error("Timeout error: {message}")]
    Timeout { message: String },

    /// HTTP/Web server errors
    #[error("Web server error: {message}")]
    Web { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Generic errors with context
    #[error("Error: {message}")]
    Generic { message: String },
}

impl HeliosError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new invalid-configuration error for a specific field
    pub fn invalid_config<F: Into<String>, S: Into<String>>(field: F, message: S) -> Self {
        Self::ConfigurationInvalid {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new sensor-unavailable error
    pub fn sensor_unavailable<S: Into<String>>(message: S) -> Self {
        Self::SensorUnavailable {
            message: message.into(),
        }
    }

    /// Create a new actuator failure
    pub fn actuator<S: Into<String>>(message: S) -> Self {
        Self::ActuatorFailure {
            message: message.into(),
        }
    }

    /// Create a new invalid-mode error
    pub fn invalid_mode<V: Into<String>, S: Into<String>>(value: V, expected: S) -> Self {
        Self::InvalidMode {
            value: value.into(),
            expected: expected.into(),
        }
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Create a new web error
    pub fn web<S: Into<String>>(message: S) -> Self {
        Self::Web {
            message: message.into(),
        }
    }

    /// Create a new serialization error
    pub fn serialization<S: Into<String>>(message: S) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Short machine-readable kind, used in status payloads and reasoning
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::ConfigurationInvalid { .. } => "configuration_invalid",
            Self::SensorUnavailable { .. } => "sensor_unavailable",
            Self::ActuatorFailure { .. } => "actuator_failure",
            Self::InvalidMode { .. } => "invalid_mode",
            Self::Timeout { .. } => "timeout",
            Self::Web { .. } => "web",
            Self::Serialization { .. } => "serialization",
            Self::Io { .. } => "io",
            Self::Generic { .. } => "generic",
        }
    }
}

impl From<std::io::Error> for HeliosError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for HeliosError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<serde_json::Error> for HeliosError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<chrono::ParseError> for HeliosError {
    fn from(err: chrono::ParseError) -> Self {
        Self::invalid_config("datetime", err.to_string())
    }
}
