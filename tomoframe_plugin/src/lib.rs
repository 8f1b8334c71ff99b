//! The stage plugin API for the `tomoframe` pipeline framework.
//!
//! A [`Plugin`] is a factory for one kind of processing stage: a stage
//! identifier matcher paired with a function that builds the stage from its
//! configuration. Plugins live in a [`Registry`], an explicit registration
//! table populated once at process start. Stage discovery never depends on
//! import or link-time side effects; the set of available stages is exactly
//! the set the process registered.

use thiserror::Error;

mod plugin;
pub use plugin::Plugin;

mod registry;
pub use registry::{Registry, RegistryHandle};

/// An unsupported stage identifier error.
#[derive(Clone, Debug, Error)]
#[error("{plugin_type} {name} is not registered")]
pub struct PluginUnsupportedError {
    name: String,
    plugin_type: String,
}

impl PluginUnsupportedError {
    /// Create a new [`PluginUnsupportedError`].
    #[must_use]
    pub fn new(name: String, plugin_type: String) -> Self {
        Self { name, plugin_type }
    }

    /// Return the unmatched stage identifier.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A stage creation error.
#[derive(Clone, Debug, Error)]
pub enum PluginCreateError {
    /// No registered plugin matches the identifier.
    #[error(transparent)]
    Unsupported(#[from] PluginUnsupportedError),
    /// The stage configuration is invalid.
    #[error("configuration is unsupported: {reason}")]
    ConfigurationInvalid { reason: String },
    /// Other.
    #[error("{_0}")]
    Other(String),
}

impl From<&str> for PluginCreateError {
    fn from(err_string: &str) -> Self {
        Self::Other(err_string.to_string())
    }
}

impl From<String> for PluginCreateError {
    fn from(err_string: String) -> Self {
        Self::Other(err_string)
    }
}
