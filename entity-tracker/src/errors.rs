use std::borrow::Cow;

use thiserror::Error;

/// Top-level error type returned by the tracker and its reference host.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// No class metadata is known for the requested class.
    #[error("unknown entity class '{class}'")]
    UnknownClass { class: String },

    /// A field or association was addressed that the class does not declare.
    #[error("class '{class}' declares no field '{field}'")]
    UnknownField { class: String, field: String },

    /// The host could not initialize a lazy reference.
    #[error("failed to load proxy of '{class}' with identifier {identifier:?}")]
    ProxyLoad { class: String, identifier: Vec<String> },

    /// An operation was attempted on an entity in the wrong lifecycle state.
    #[error("invalid entity state: {message}")]
    InvalidState { message: Cow<'static, str> },

    /// A subscriber failed while handling a dispatched event.
    #[error("listener for '{event}' failed: {message}")]
    Listener { event: String, message: String },

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// Configuration file could not be read.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl TrackerError {
    pub fn unknown_class(class: impl Into<String>) -> Self {
        Self::UnknownClass { class: class.into() }
    }

    pub fn unknown_field(class: impl Into<String>, field: impl Into<String>) -> Self {
        Self::UnknownField {
            class: class.into(),
            field: field.into(),
        }
    }

    pub fn invalid_state(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidState { message: message.into() }
    }

    /// Wraps a subscriber failure so it surfaces from the dispatching flush.
    pub fn listener(event: impl Into<String>, message: impl ToString) -> Self {
        Self::Listener {
            event: event.into(),
            message: message.to_string(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type TrackerResult<T> = Result<T, TrackerError>;
