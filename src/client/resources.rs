//! Bevy resources for the GUI plugin.

use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use snafu::{ResultExt, Snafu};
use stratum_gui::scene::SceneGraph;
use stratum_gui::settings::GuiSettings;
use stratum_gui::{
    FixedScreen, FsResourceLoader, GuiError, LayerManager, LocalRuntime, MemoryScene,
    SettingsError,
};
use tracing::info;

/// Name of the settings file inside the asset directory.
pub const SETTINGS_FILE: &str = "gui.toml";

/// Errors raised while setting up the GUI.
#[derive(Snafu, Debug)]
#[snafu(context(suffix(Ctx)))]
pub enum GuiSetupError {
    /// The settings file could not be read.
    #[snafu(display("Failed to read GUI settings: {source}"))]
    Settings {
        /// Settings error
        source: SettingsError,
    },
    /// The layer tree could not be built.
    #[snafu(display("Failed to build the UI layers: {source}"))]
    Layers {
        /// Layer error
        source: GuiError,
    },
}

/// How far start-up has come.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Start-up steps are still running.
    Booting,
    /// The loading view is on screen.
    Ready,
    /// A start-up step failed.
    Failed,
}

/// Everything the GUI runs on.
///
/// The layer manager is single threaded, so this is inserted as a non-send resource.
pub struct Gui {
    /// Executor of resource loads and start-up steps.
    pub runtime: LocalRuntime,
    /// The layer manager.
    pub manager: LayerManager,
    /// Loader reading prefabs from the asset directory.
    pub loader: Rc<FsResourceLoader>,
    /// Shared with the start-up queue callbacks.
    pub stage: Rc<Cell<Stage>>,
    /// Asset root directory.
    pub assets: PathBuf,
    /// Bundle used by views without their own.
    pub bundle: String,
    /// Language of fonts and texts.
    pub language: String,
}

impl Gui {
    /// Reads the settings from `assets` and builds the layer tree.
    pub fn new(assets: &Path, language: String) -> Result<Self, GuiSetupError> {
        let settings = GuiSettings::from_path(assets.join(SETTINGS_FILE)).context(SettingsCtx)?;
        info!(
            "Loaded {} view configs from {}",
            settings.views.len(),
            assets.display()
        );

        let runtime = LocalRuntime::new();
        let scene = MemoryScene::new().shared();
        let root = {
            let mut scene = scene.borrow_mut();
            let root = scene.create_node("Canvas");
            scene.add_camera(root);
            root
        };

        let loader = Rc::new(FsResourceLoader::new(assets));
        let manager = LayerManager::new(runtime.clone(), scene, loader.clone());
        let mut screen = FixedScreen::new(
            settings.screen.window_size(),
            settings.screen.design_resolution(),
        );
        manager
            .init_layer(root, &mut screen, &settings)
            .context(LayersCtx)?;
        manager
            .init(settings.views.iter().cloned())
            .context(LayersCtx)?;

        Ok(Self {
            runtime,
            manager,
            loader,
            stage: Rc::new(Cell::new(Stage::Booting)),
            assets: assets.to_path_buf(),
            bundle: settings.default_bundle,
            language,
        })
    }
}
