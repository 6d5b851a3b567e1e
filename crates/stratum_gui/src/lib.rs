#![deny(missing_docs)]

//! Fixed-order UI layers for games.
//!
//! The crate is split into two independent halves:
//!
//! * [`LayerManager`](layer::LayerManager) owns a fixed stack of layer nodes (Game, UI, PopUp,
//!   Dialog, System, Notify and Guide) and opens views into them. Every view is described by a
//!   [`ViewConfig`](config::ViewConfig) and loaded through a [`ResourceLoader`](loader::ResourceLoader).
//!   Loaded views are cached per layer so that reopening a hidden view never loads it twice.
//! * [`AsyncTaskQueue`](queue::AsyncTaskQueue) runs a list of asynchronous steps one after the
//!   other and reports completion once, which is what staged startup (fonts, then language
//!   packs, then common resources) is built on.
//!
//! Everything runs on one thread. Asynchronous work is spawned on a [`LocalRuntime`](runtime::LocalRuntime)
//! which the host ticks from its main loop.

pub mod config;
pub mod error;
pub mod layer;
pub mod loader;
pub mod queue;
pub mod runtime;
pub mod scene;
pub mod screen;
pub mod settings;

pub use config::{LayerKind, UiId, ViewConfig, ViewConfigRegistry};
pub use error::{GuiError, GuiResult, LoadError, LoadResult, SettingsError, StepError};
pub use layer::{
    LayerContainer, LayerManager, Localizer, RemoveContinuation, UiCallbacks, ViewArgs,
    ViewInstance, WeakLayerManager,
};
pub use loader::{FsResourceLoader, Prefab, ResourceLoader};
pub use queue::{AsyncTaskQueue, Next};
pub use runtime::LocalRuntime;
pub use scene::{MemoryScene, NodeHandle, SceneGraph};
pub use screen::{FitPolicy, FixedScreen, ResolutionFit, Screen, Size};
pub use settings::GuiSettings;
