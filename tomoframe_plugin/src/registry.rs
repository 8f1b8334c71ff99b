//! The stage registration table.

use std::sync::{Arc, RwLock};

/// A handle to a registered plugin. See [`Registry::register`].
pub type RegistryHandle<P> = Arc<P>;

/// An explicit registration table of stage plugins.
///
/// The table is built at process start by registering a factory per known
/// stage; it is thread-safe and may be read concurrently while the pipeline
/// runs. Plugins are stored as [`RegistryHandle`]s and can be unregistered
/// through the handle returned at registration.
#[derive(Debug)]
pub struct Registry<P> {
    plugins: RwLock<Vec<RegistryHandle<P>>>,
}

impl<P> Registry<P> {
    /// Create a new empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            plugins: RwLock::new(Vec::new()),
        }
    }

    /// Register a plugin, returning a handle for later unregistration.
    ///
    /// # Panics
    /// Panics if the internal lock is poisoned.
    pub fn register(&self, plugin: P) -> RegistryHandle<P> {
        let plugin = Arc::new(plugin);
        let handle = Arc::clone(&plugin);
        self.plugins.write().unwrap().push(plugin);
        handle
    }

    /// Unregister a plugin by its handle.
    ///
    /// Returns `true` if the plugin was found and removed.
    ///
    /// # Panics
    /// Panics if the internal lock is poisoned.
    pub fn unregister(&self, handle: &RegistryHandle<P>) -> bool {
        let mut plugins = self.plugins.write().unwrap();
        if let Some(position) = plugins.iter().position(|p| Arc::ptr_eq(p, handle)) {
            plugins.remove(position);
            true
        } else {
            false
        }
    }

    /// Execute a closure with read access to all registered plugins.
    ///
    /// # Panics
    /// Panics if the internal lock is poisoned.
    pub fn with_plugins<R>(&self, f: impl FnOnce(&[RegistryHandle<P>]) -> R) -> R {
        f(&self.plugins.read().unwrap())
    }

    /// Return the number of registered plugins.
    ///
    /// # Panics
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.read().unwrap().len()
    }

    /// Returns true if no plugins are registered.
    ///
    /// # Panics
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.read().unwrap().is_empty()
    }

    /// Remove all registered plugins.
    ///
    /// # Panics
    /// Panics if the internal lock is poisoned.
    pub fn clear(&self) {
        self.plugins.write().unwrap().clear();
    }
}

impl<P> Default for Registry<P> {
    fn default() -> Self {
        Self::new()
    }
}
