//! The processing stage API.
//!
//! A stage is one step of the pipeline: during setup it views its input
//! datasets through [`StageData`], declares its outputs with a
//! [`TransformSpec`], and optionally requests padding; during execution it
//! receives one data block per input for each work unit and returns one
//! block per output. Capabilities beyond frame processing are separate
//! traits a stage opts into rather than an inheritance chain.
//!
//! Stages reach the runner through a global [`Registry`], an explicit
//! registration table populated at process start.

use std::sync::LazyLock;

use ndarray::ArrayD;
use thiserror::Error;

use tomoframe_pattern::{
    Padding, Pattern, SliceList, SliceListError, UnknownPatternError,
};
use tomoframe_plugin::{
    Plugin, PluginCreateError, PluginUnsupportedError, Registry, RegistryHandle,
};

use crate::dataset::{Configuration, Dataset, DatasetError, DatasetRegistry};
use crate::parameters::{AmbiguousExpansionError, Expansion};
use crate::shape_inference::{self, ShapeInferenceError, TransformSpec};
use crate::storage::StorageError;

/// A stage setup error.
#[derive(Clone, Debug, Error)]
pub enum StageSetupError {
    /// A stage chose a pattern its dataset does not declare.
    #[error(transparent)]
    UnknownPattern(#[from] UnknownPatternError),
    /// The decomposition plan could not be built.
    #[error(transparent)]
    SliceList(#[from] SliceListError),
    /// An output geometry could not be inferred.
    #[error(transparent)]
    ShapeInference(#[from] ShapeInferenceError),
    /// A dataset registry conflict.
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    /// A malformed parameter sweep.
    #[error(transparent)]
    Expansion(#[from] AmbiguousExpansionError),
    /// A context input index past the declared inputs.
    #[error("stage references input {0} but only {1} inputs are bound")]
    MissingInput(usize, usize),
}

/// A stage execution error.
#[derive(Debug, Error)]
pub enum StageError {
    /// A block read or write failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// Anything else the stage body reports.
    #[error("{_0}")]
    Other(String),
}

impl From<&str> for StageError {
    fn from(err_string: &str) -> Self {
        Self::Other(err_string.to_string())
    }
}

/// A stage's view of one dataset: the chosen pattern, the frame budget and
/// any padding, everything [`SliceList`] needs.
#[derive(Clone, Debug)]
pub struct StageData {
    dataset_name: String,
    pattern: Pattern,
    shape: Vec<u64>,
    max_frames: u64,
    fixed: bool,
    padding: Option<Padding>,
}

impl StageData {
    /// Bind a dataset to a stage through one of its declared patterns.
    ///
    /// # Errors
    /// Returns an [`UnknownPatternError`] if the dataset does not declare
    /// `pattern_name`.
    pub fn new(
        dataset: &Dataset,
        pattern_name: &str,
        max_frames: u64,
        fixed: bool,
    ) -> Result<Self, UnknownPatternError> {
        let pattern = dataset.patterns().get(pattern_name)?.clone();
        Ok(Self {
            dataset_name: dataset.name().to_string(),
            pattern,
            shape: dataset.shape().to_vec(),
            max_frames,
            fixed,
            padding: None,
        })
    }

    /// Return the bound dataset's name.
    #[must_use]
    pub fn dataset_name(&self) -> &str {
        &self.dataset_name
    }

    /// Return the chosen pattern.
    #[must_use]
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// Return the bound dataset's shape.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// Return the frame budget per work unit.
    #[must_use]
    pub fn max_frames(&self) -> u64 {
        self.max_frames
    }

    /// Returns true if every work unit must hold exactly the frame budget.
    #[must_use]
    pub fn fixed(&self) -> bool {
        self.fixed
    }

    /// Return the padding requests, if any.
    #[must_use]
    pub fn padding(&self) -> Option<&Padding> {
        self.padding.as_ref()
    }

    /// Attach padding requests. Replaces any earlier requests.
    pub fn set_padding(&mut self, padding: Padding) {
        self.padding = Some(padding);
    }

    /// Return the pattern's core dimensions.
    #[must_use]
    pub fn core_dims(&self) -> &[usize] {
        self.pattern.core_dims()
    }

    /// Return the pattern's slice dimensions.
    #[must_use]
    pub fn slice_dims(&self) -> &[usize] {
        self.pattern.slice_dims()
    }

    /// Build the decomposition plan for this view.
    ///
    /// # Errors
    /// Returns a [`SliceListError`] if the plan is inconsistent, e.g. a zero
    /// frame budget or a `fixed` budget that does not divide the primary
    /// extent.
    pub fn slice_list(&self) -> Result<SliceList, SliceListError> {
        let padding = self
            .padding
            .as_ref()
            .map(Padding::resolve)
            .unwrap_or_default();
        SliceList::new(
            self.pattern.clone(),
            self.shape.clone(),
            self.max_frames,
            padding,
            self.fixed,
        )
    }
}

/// A typed per-stage option struct, deserialised from the raw
/// [`Configuration`] once at creation and immutable afterwards.
pub trait StageConfig: serde::de::DeserializeOwned {
    /// Build the options from raw configuration.
    ///
    /// # Errors
    /// Returns [`PluginCreateError::ConfigurationInvalid`] if the
    /// configuration does not deserialise.
    fn from_configuration(configuration: &Configuration) -> Result<Self, PluginCreateError> {
        serde_json::from_value(serde_json::Value::Object(configuration.clone())).map_err(|error| {
            PluginCreateError::ConfigurationInvalid {
                reason: error.to_string(),
            }
        })
    }
}

impl<T: serde::de::DeserializeOwned> StageConfig for T {}

/// Per-work-unit block processing.
pub trait FrameProcessor {
    /// Transform one block per input into one block per output.
    ///
    /// `unit_index` is the work unit's position in the stage's slice list.
    ///
    /// # Errors
    /// Returns a [`StageError`] if the transform fails.
    fn process(
        &self,
        blocks: &[ArrayD<f32>],
        unit_index: usize,
    ) -> Result<Vec<ArrayD<f32>>, StageError>;
}

/// Padding requests, declared at setup by stages that read past their own
/// frames.
pub trait PaddingAware {
    /// Attach padding to the input and output views.
    ///
    /// # Errors
    /// Returns a [`StageSetupError`] if a request is inconsistent with a
    /// view's pattern.
    fn configure_padding(
        &self,
        in_data: &mut [StageData],
        out_data: &mut [StageData],
    ) -> Result<(), StageSetupError>;
}

/// Marker for stages that accept swept parameter values.
///
/// The runner only forwards a non-trivial [`Expansion`] to stages carrying
/// this capability.
pub trait ParameterExpandable {}

/// A processing stage.
pub trait Stage: FrameProcessor {
    /// The stage identifier.
    fn id(&self) -> &str;

    /// Bind inputs, declare outputs and size the decomposition.
    ///
    /// # Errors
    /// Returns a [`StageSetupError`] if the declared geometry is
    /// inconsistent.
    fn setup(&mut self, context: &mut StageContext<'_>) -> Result<(), StageSetupError>;
}

/// The setup-time context handed to a stage: its bound input datasets, the
/// dataset registry and the stage's parameter expansion.
pub struct StageContext<'a> {
    registry: &'a mut DatasetRegistry,
    inputs: Vec<String>,
    expansion: &'a Expansion,
}

impl<'a> StageContext<'a> {
    /// Create a context over the given input dataset names.
    pub fn new(
        registry: &'a mut DatasetRegistry,
        inputs: Vec<String>,
        expansion: &'a Expansion,
    ) -> Self {
        Self {
            registry,
            inputs,
            expansion,
        }
    }

    /// Return the `index`th input dataset.
    ///
    /// # Errors
    /// Returns a [`StageSetupError`] if fewer inputs are bound or the name
    /// no longer resolves.
    pub fn input(&self, index: usize) -> Result<&Dataset, StageSetupError> {
        let name = self
            .inputs
            .get(index)
            .ok_or(StageSetupError::MissingInput(index, self.inputs.len()))?;
        Ok(self.registry.get(name)?)
    }

    /// Return the stage's parameter expansion.
    #[must_use]
    pub fn expansion(&self) -> &Expansion {
        self.expansion
    }

    /// Return the dataset registry.
    #[must_use]
    pub fn registry(&self) -> &DatasetRegistry {
        self.registry
    }

    /// Declare an output dataset derived from the first input.
    ///
    /// The output geometry is inferred from `spec`; the stage's swept
    /// parameter dimensions are appended. The dataset is created in the
    /// registry exactly once, during setup.
    ///
    /// # Errors
    /// Returns a [`StageSetupError`] if inference fails or the name is
    /// already taken.
    pub fn create_output_dataset(
        &mut self,
        name: &str,
        spec: &TransformSpec,
    ) -> Result<&Dataset, StageSetupError> {
        let input = self.input(0)?;
        let inferred = shape_inference::infer(input, spec, &[])?;
        let mut dataset =
            Dataset::new_with(name, inferred.shape, inferred.axis_labels, inferred.patterns);
        dataset.set_extra_dims(self.expansion.extra_dims().to_vec())?;
        log::debug!("created output dataset {name} with shape {:?}", dataset.shape());
        self.registry.create(dataset)?;
        Ok(self.registry.get(name)?)
    }
}

/// A stage plugin: an identifier matcher paired with a stage factory.
pub type StagePlugin = Plugin<Box<dyn Stage>, Configuration>;

/// A handle to a registered stage plugin.
pub type StageRegistryHandle = RegistryHandle<StagePlugin>;

/// Global runtime registry for stage plugins.
pub static STAGE_REGISTRY: LazyLock<Registry<StagePlugin>> = LazyLock::new(Registry::new);

/// Register a stage plugin at runtime.
///
/// # Returns
/// A handle that can be used to unregister the plugin later.
pub fn register_stage(plugin: StagePlugin) -> StageRegistryHandle {
    STAGE_REGISTRY.register(plugin)
}

/// Unregister a runtime stage plugin.
///
/// # Returns
/// `true` if the plugin was found and removed, `false` otherwise.
pub fn unregister_stage(handle: &StageRegistryHandle) -> bool {
    STAGE_REGISTRY.unregister(handle)
}

/// Create a stage from its identifier and configuration.
///
/// # Errors
/// Returns a [`PluginCreateError`] if no registered plugin matches the
/// identifier or the configuration is invalid.
pub fn create_stage(id: &str, configuration: &Configuration) -> Result<Box<dyn Stage>, PluginCreateError> {
    let result = STAGE_REGISTRY.with_plugins(|plugins| {
        for plugin in plugins {
            if plugin.match_id(id) {
                return Some(plugin.create(configuration));
            }
        }
        None
    });
    result.unwrap_or_else(|| {
        Err(PluginUnsupportedError::new(id.to_string(), "stage".to_string()).into())
    })
}
