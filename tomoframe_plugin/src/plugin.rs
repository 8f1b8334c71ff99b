use crate::PluginCreateError;

/// A stage factory: an identifier matcher paired with a creation function.
pub struct Plugin<TStage, TConfig> {
    /// Tests if a stage identifier is a match for this plugin.
    match_id_fn: fn(id: &str) -> bool,
    /// Create the stage from its configuration.
    create_fn: fn(config: &TConfig) -> Result<TStage, PluginCreateError>,
}

impl<TStage, TConfig> Plugin<TStage, TConfig> {
    /// Create a new plugin for registration.
    pub const fn new(
        match_id_fn: fn(id: &str) -> bool,
        create_fn: fn(config: &TConfig) -> Result<TStage, PluginCreateError>,
    ) -> Self {
        Self {
            match_id_fn,
            create_fn,
        }
    }

    /// Create a stage from `config`.
    ///
    /// # Errors
    /// Returns a [`PluginCreateError`] if the configuration is invalid or the
    /// stage rejects it for a reason of its own.
    pub fn create(&self, config: &TConfig) -> Result<TStage, PluginCreateError> {
        (self.create_fn)(config)
    }

    /// Returns true if this plugin is associated with the stage identifier
    /// `id`.
    #[must_use]
    pub fn match_id(&self, id: &str) -> bool {
        (self.match_id_fn)(id)
    }
}
