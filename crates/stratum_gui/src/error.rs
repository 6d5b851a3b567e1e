//! Errors raised by the layer manager, its collaborators and the task queue.

use std::path::PathBuf;
use std::sync::Arc;

use snafu::Snafu;

use crate::config::{LayerKind, UiId};
use crate::scene::NodeHandle;

/// Error raised while opening, removing or querying views.
///
/// Errors are handed to every waiting [`UiCallbacks`](crate::layer::UiCallbacks), so they are cheap
/// to clone.
#[derive(Snafu, Debug, Clone)]
#[snafu(context(suffix(Ctx)), visibility(pub(crate)))]
pub enum GuiError {
    /// No view config has been registered for the identifier.
    #[snafu(display("No view config is registered for identifier {id}"))]
    ConfigNotFound {
        /// The identifier that was requested.
        id: UiId,
    },
    /// The config assigns the view to a layer that does not hold views (Game or Guide).
    #[snafu(display("View {id} is assigned to {layer}, which does not hold views"))]
    UnsupportedLayer {
        /// The identifier that was requested.
        id: UiId,
        /// The layer named by the config.
        layer: LayerKind,
    },
    /// The layer tree has not been built yet.
    #[snafu(display("Layers are not initialized! Call init_layer first."))]
    LayersNotInitialized,
    /// The layer tree can only be built once.
    #[snafu(display("Layers have already been initialized"))]
    AlreadyInitialized,
    /// The resource behind a view could not be loaded.
    #[snafu(display("Failed to load view at {path}: {source}"))]
    LoadFailure {
        /// Resource path of the view.
        path: String,
        /// The error reported by the loader.
        source: LoadError,
    },
    /// The view was removed while it was still loading or waiting in a dialog queue.
    #[snafu(display("Opening view at {path} was cancelled by a removal"))]
    Cancelled {
        /// Resource path of the view.
        path: String,
    },
    /// The callbacks of an open request were dropped before either of them fired.
    #[snafu(display("The request for view {id} was dropped before it resolved"))]
    Abandoned {
        /// The identifier that was requested.
        id: UiId,
    },
    /// Two identifiers would open the same resource in the same layer and share its cache entry.
    #[snafu(display("View {id} would share {path} in {layer} with view {other}"))]
    SharedResource {
        /// The identifier being registered.
        id: UiId,
        /// The identifier already registered for the resource.
        other: UiId,
        /// The layer both configs name.
        layer: LayerKind,
        /// The shared resource path.
        path: String,
    },
    /// A node passed to [`remove_by_node`](crate::layer::LayerManager::remove_by_node) was not
    /// opened through the layer manager.
    #[snafu(display("Node {node} was not added through the layer manager"))]
    InvalidRemoval {
        /// The node that was passed in.
        node: NodeHandle,
    },
}

/// Error raised by a [`ResourceLoader`](crate::loader::ResourceLoader).
#[derive(Snafu, Debug, Clone)]
#[snafu(context(suffix(Ctx)), visibility(pub))]
pub enum LoadError {
    /// Nothing exists at the requested path.
    #[snafu(display("Resource {path} does not exist"))]
    NotFound {
        /// The requested resource path.
        path: String,
    },
    /// IO error while reading the resource.
    #[snafu(display("Encountered IO error while loading {path}: {source}"))]
    Io {
        /// The requested resource path.
        path: String,
        /// The [`std::io::Error`].
        #[snafu(source(from(std::io::Error, Arc::new)))]
        source: Arc<std::io::Error>,
    },
    /// The loader refused to hand out the resource.
    #[snafu(display("Resource {path} was rejected: {reason}"))]
    Rejected {
        /// The requested resource path.
        path: String,
        /// Why the resource was rejected.
        reason: String,
    },
}

/// Error raised while reading [`GuiSettings`](crate::settings::GuiSettings).
#[derive(Snafu, Debug)]
#[snafu(context(suffix(Ctx)), visibility(pub(crate)))]
pub enum SettingsError {
    /// The settings file could not be read.
    #[snafu(display("Failed to read settings at {}: {source}", path.display()))]
    ReadSettings {
        /// Path of the settings file.
        path: PathBuf,
        /// The [`std::io::Error`].
        source: std::io::Error,
    },
    /// The settings file is not valid TOML or does not match the expected layout.
    #[snafu(display("Failed to parse settings! {source}"))]
    ParseSettings {
        /// The toml deserialize error.
        source: toml::de::Error,
    },
    /// Two views share the same identifier.
    #[snafu(display("View identifier {id} is configured more than once"))]
    DuplicateView {
        /// The duplicated identifier.
        id: UiId,
    },
    /// Two views open the same prefab in the same layer.
    #[snafu(display("Views {other} and {id} both open {path} in {layer}"))]
    SharedPrefab {
        /// The identifier configured last.
        id: UiId,
        /// The identifier configured first.
        other: UiId,
        /// The layer both views name.
        layer: LayerKind,
        /// The shared prefab path.
        path: String,
    },
}

/// Failure reported by an [`AsyncTaskQueue`](crate::queue::AsyncTaskQueue) step.
#[derive(Snafu, Debug, Clone, PartialEq, Eq)]
#[snafu(display("Step failed: {message}"))]
pub struct StepError {
    /// Description of the failure.
    message: String,
}

impl StepError {
    /// Creates a step error from any message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the message of the failure.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<LoadError> for StepError {
    fn from(error: LoadError) -> Self {
        Self::new(error.to_string())
    }
}

/// Shorthand type for [`Result<T, GuiError>`]
pub type GuiResult<T> = Result<T, GuiError>;

/// Shorthand type for [`Result<T, LoadError>`]
pub type LoadResult<T> = Result<T, LoadError>;

/// Shorthand type for [`Result<T, SettingsError>`]
pub type SettingsResult<T> = Result<T, SettingsError>;
