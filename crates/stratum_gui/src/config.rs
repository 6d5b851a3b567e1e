//! View configuration and the registry that maps identifiers to it.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::error::{GuiResult, SharedResourceCtx};

/// Opaque numeric key naming a logical window.
///
/// Games usually keep their identifiers in one place:
/// ```
/// use stratum_gui::UiId;
///
/// pub const LOADING: UiId = UiId(1);
/// pub const ALERT: UiId = UiId(2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UiId(pub u32);

impl Display for UiId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for UiId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// The fixed set of layers under the GUI root.
///
/// Layer nodes are children of the root in exactly the order of [`LayerKind::ORDER`], which is
/// also the paint and interaction order (later layers are drawn on top).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerKind {
    /// 2D game effects.
    Game,
    /// Full screen interfaces.
    #[serde(rename = "UI")]
    Ui,
    /// Pop up windows.
    PopUp,
    /// Modal windows, only one of which is shown at a time.
    Dialog,
    /// Modal windows raised by the system, only one of which is shown at a time.
    System,
    /// Toasts and the wait indicator.
    Notify,
    /// Tutorial overlays.
    Guide,
}

impl LayerKind {
    /// Every layer in paint order, bottom first.
    pub const ORDER: [LayerKind; 7] = [
        LayerKind::Game,
        LayerKind::Ui,
        LayerKind::PopUp,
        LayerKind::Dialog,
        LayerKind::System,
        LayerKind::Notify,
        LayerKind::Guide,
    ];

    /// Position of the layer in [`LayerKind::ORDER`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// Name given to the layer node.
    pub fn node_name(self) -> &'static str {
        match self {
            LayerKind::Game => "LayerGame",
            LayerKind::Ui => "LayerUI",
            LayerKind::PopUp => "LayerPopUp",
            LayerKind::Dialog => "LayerDialog",
            LayerKind::System => "LayerSystem",
            LayerKind::Notify => "LayerNotify",
            LayerKind::Guide => "LayerGuide",
        }
    }

    /// Whether views can be opened into this layer.
    ///
    /// Game and Guide are plain nodes that the game fills on its own.
    pub fn holds_views(self) -> bool {
        !matches!(self, LayerKind::Game | LayerKind::Guide)
    }
}

impl Display for LayerKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.node_name())
    }
}

/// Describes how a view is loaded and displayed.
///
/// Configs are immutable once registered, except through
/// [`ViewConfigRegistry::set_config`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewConfig {
    /// Identifier of the view.
    pub id: UiId,
    /// Layer the view is opened into.
    pub layer: LayerKind,
    /// Path of the prefab resource. This is also the cache key inside the layer.
    #[serde(alias = "prefab")]
    pub resource_path: String,
    /// Resource bundle to load from. The default bundle is used when this is `None`.
    #[serde(default)]
    pub bundle: Option<String>,
    /// Show a mask behind the view (PopUp, Dialog and System layers).
    #[serde(default)]
    pub mask: bool,
    /// Close the view when the mask around it is touched.
    #[serde(default)]
    pub vacancy: bool,
    /// Adapt the view to the device safe area.
    #[serde(default)]
    pub safe_area: bool,
    /// Whether removing the view also frees it when the caller does not say.
    #[serde(default, alias = "destroy")]
    pub destroy_on_close: Option<bool>,
    /// Sibling index applied to the view node after it is attached.
    #[serde(default)]
    pub sibling_index: Option<usize>,
}

impl ViewConfig {
    /// Creates a config with every display flag turned off.
    pub fn new(id: impl Into<UiId>, layer: LayerKind, resource_path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            layer,
            resource_path: resource_path.into(),
            bundle: None,
            mask: false,
            vacancy: false,
            safe_area: false,
            destroy_on_close: None,
            sibling_index: None,
        }
    }

    /// Sets the bundle the view is loaded from.
    pub fn with_bundle(mut self, bundle: impl Into<String>) -> Self {
        self.bundle = Some(bundle.into());
        self
    }

    /// Sets whether a mask is shown behind the view.
    pub fn with_mask(mut self, mask: bool) -> Self {
        self.mask = mask;
        self
    }

    /// Sets whether touching outside the view closes it.
    pub fn with_vacancy(mut self, vacancy: bool) -> Self {
        self.vacancy = vacancy;
        self
    }

    /// Sets whether the view is adapted to the device safe area.
    pub fn with_safe_area(mut self, safe_area: bool) -> Self {
        self.safe_area = safe_area;
        self
    }

    /// Sets whether removing the view frees it by default.
    pub fn with_destroy_on_close(mut self, destroy: bool) -> Self {
        self.destroy_on_close = Some(destroy);
        self
    }

    /// Sets the sibling index applied after the view is attached.
    pub fn with_sibling_index(mut self, index: usize) -> Self {
        self.sibling_index = Some(index);
        self
    }
}

/// Table of [`ViewConfig`]s keyed by [`UiId`].
///
/// The table is read on every open and only written through [`init`](Self::init) and
/// [`set_config`](Self::set_config). Containers cache views by resource path, so two identifiers
/// may not open the same resource in the same layer; writes that would make them share a cache
/// entry are rejected. The same resource in different layers is fine.
#[derive(Debug, Clone, Default)]
pub struct ViewConfigRegistry {
    /// Configs by identifier.
    configs: HashMap<UiId, ViewConfig>,
}

impl ViewConfigRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole table.
    ///
    /// # Errors
    /// Fails with [`GuiError::SharedResource`](crate::error::GuiError::SharedResource) when two configs open the same resource in the
    /// same layer. The table is left unchanged then.
    pub fn init(&mut self, configs: impl IntoIterator<Item = ViewConfig>) -> GuiResult<()> {
        let mut table: HashMap<UiId, ViewConfig> = HashMap::new();
        for config in configs {
            ensure_unshared(table.values(), &config)?;
            table.insert(config.id, config);
        }

        self.configs = table;
        Ok(())
    }

    /// Installs or overrides the config of one identifier, returning the previous one.
    ///
    /// The config's `id` is rewritten to `id`.
    ///
    /// # Errors
    /// Fails with [`GuiError::SharedResource`](crate::error::GuiError::SharedResource) when another identifier already opens the same
    /// resource in the same layer. The table is left unchanged then.
    pub fn set_config(
        &mut self,
        id: UiId,
        mut config: ViewConfig,
    ) -> GuiResult<Option<ViewConfig>> {
        config.id = id;
        ensure_unshared(self.configs.values(), &config)?;
        Ok(self.configs.insert(id, config))
    }

    /// Returns the config of an identifier.
    pub fn get(&self, id: UiId) -> Option<&ViewConfig> {
        self.configs.get(&id)
    }

    /// Whether a config is registered for the identifier.
    pub fn contains(&self, id: UiId) -> bool {
        self.configs.contains_key(&id)
    }

    /// Number of registered configs.
    pub fn len(&self) -> usize {
        self.configs.len()
    }

    /// Whether no config is registered.
    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// Iterates over all registered configs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &ViewConfig> {
        self.configs.values()
    }
}

/// Fails if a config of another identifier opens the same resource in the same layer.
fn ensure_unshared<'a>(
    mut configs: impl Iterator<Item = &'a ViewConfig>,
    config: &ViewConfig,
) -> GuiResult<()> {
    let shared = configs.find(|other| {
        other.id != config.id
            && other.layer == config.layer
            && other.resource_path == config.resource_path
    });

    match shared {
        Some(other) => SharedResourceCtx {
            id: config.id,
            other: other.id,
            layer: config.layer,
            path: config.resource_path.as_str(),
        }
        .fail(),
        None => Ok(()),
    }
}
