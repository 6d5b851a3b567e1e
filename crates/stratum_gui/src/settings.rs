//! GUI settings read from a TOML file.
//!
//! ```toml
//! default_bundle = "resources"
//!
//! [screen]
//! design_width = 720
//! design_height = 1280
//!
//! [[views]]
//! id = 1
//! layer = "UI"
//! prefab = "gui/loading/Loading"
//! ```

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use snafu::{ensure, ResultExt};

use crate::config::ViewConfig;
use crate::error::{
    DuplicateViewCtx, ParseSettingsCtx, ReadSettingsCtx, SettingsResult, SharedPrefabCtx,
};
use crate::screen::Size;

/// Everything the layer manager is configured with.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GuiSettings {
    /// Bundle used by views that do not name one.
    pub default_bundle: String,
    /// Screen adaptation settings.
    pub screen: ScreenSettings,
    /// Toast and wait indicator settings.
    pub notify: NotifySettings,
    /// Every view the game can open.
    pub views: Vec<ViewConfig>,
}

/// Screen adaptation settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScreenSettings {
    /// Width the UI was designed for.
    pub design_width: f32,
    /// Height the UI was designed for.
    pub design_height: f32,
    /// Window width for hosts without a real window.
    pub window_width: f32,
    /// Window height for hosts without a real window.
    pub window_height: f32,
    /// Adapt the UI layer to the device safe area.
    pub mobile_safe_area: bool,
}

/// Toast and wait indicator settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotifySettings {
    /// Prefab instantiated for every toast.
    pub toast_prefab: String,
    /// Prefab of the wait indicator.
    pub wait_prefab: String,
    /// How long a toast stays on screen.
    pub toast_seconds: f32,
}

impl Default for GuiSettings {
    fn default() -> Self {
        Self {
            default_bundle: "resources".to_string(),
            screen: ScreenSettings::default(),
            notify: NotifySettings::default(),
            views: Vec::new(),
        }
    }
}

impl Default for ScreenSettings {
    fn default() -> Self {
        Self {
            design_width: 720.0,
            design_height: 1280.0,
            window_width: 720.0,
            window_height: 1280.0,
            mobile_safe_area: false,
        }
    }
}

impl Default for NotifySettings {
    fn default() -> Self {
        Self {
            toast_prefab: "common/prefab/notify".to_string(),
            wait_prefab: "common/prefab/wait".to_string(),
            toast_seconds: 2.0,
        }
    }
}

impl ScreenSettings {
    /// The design resolution.
    pub fn design_resolution(&self) -> Size {
        Size::new(self.design_width, self.design_height)
    }

    /// The configured window size.
    pub fn window_size(&self) -> Size {
        Size::new(self.window_width, self.window_height)
    }
}

impl GuiSettings {
    /// Parses settings from TOML text.
    ///
    /// # Errors
    /// Fails on malformed TOML, on view identifiers that appear more than once and on two views
    /// opening the same prefab in the same layer.
    pub fn from_toml_str(text: &str) -> SettingsResult<Self> {
        let settings: GuiSettings = toml::from_str(text).context(ParseSettingsCtx)?;

        let mut seen = HashSet::new();
        let mut prefabs = HashMap::new();
        for view in &settings.views {
            ensure!(seen.insert(view.id), DuplicateViewCtx { id: view.id });
            let prefab = (view.layer, view.resource_path.as_str());
            if let Some(other) = prefabs.insert(prefab, view.id) {
                return SharedPrefabCtx {
                    id: view.id,
                    other,
                    layer: view.layer,
                    path: view.resource_path.as_str(),
                }
                .fail();
            }
        }

        Ok(settings)
    }

    /// Reads and parses a settings file.
    ///
    /// # Errors
    /// See [`from_toml_str`](Self::from_toml_str). Also fails if the file cannot be read.
    pub fn from_path(path: impl AsRef<Path>) -> SettingsResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).context(ReadSettingsCtx { path })?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use assert2::{assert, let_assert};

    use super::GuiSettings;
    use crate::config::{LayerKind, UiId};
    use crate::error::SettingsError;

    const SETTINGS: &str = r#"
default_bundle = "main"

[screen]
design_width = 1280
design_height = 720
mobile_safe_area = true

[notify]
toast_seconds = 3.5

[[views]]
id = 1
layer = "UI"
prefab = "gui/loading/Loading"
bundle = "resources"

[[views]]
id = 2
layer = "Dialog"
prefab = "common/prefab/alert"
mask = true
destroy = true
sibling_index = 2
"#;

    #[test]
    fn parses_views_and_sections() {
        let settings = GuiSettings::from_toml_str(SETTINGS).unwrap();

        assert!(settings.default_bundle == "main");
        assert!(settings.screen.mobile_safe_area);
        assert!(settings.screen.design_width == 1280.0);
        assert!(settings.notify.toast_seconds == 3.5);
        assert!(settings.notify.wait_prefab == "common/prefab/wait");
        assert!(settings.views.len() == 2);

        let loading = &settings.views[0];
        assert!(loading.layer == LayerKind::Ui);
        assert!(loading.resource_path == "gui/loading/Loading");
        assert!(loading.bundle.as_deref() == Some("resources"));
        assert!(!loading.mask);

        let alert = &settings.views[1];
        assert!(alert.id == UiId(2));
        assert!(alert.mask);
        assert!(alert.destroy_on_close == Some(true));
        assert!(alert.sibling_index == Some(2));
    }

    #[test]
    fn empty_text_gives_defaults() {
        let settings = GuiSettings::from_toml_str("").unwrap();

        assert!(settings.default_bundle == "resources");
        assert!(settings.views.is_empty());
        assert!(settings.notify.toast_prefab == "common/prefab/notify");
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let text = r#"
[[views]]
id = 4
layer = "UI"
prefab = "a"

[[views]]
id = 4
layer = "PopUp"
prefab = "b"
"#;
        let_assert!(Err(SettingsError::DuplicateView { id }) = GuiSettings::from_toml_str(text));
        assert!(id == UiId(4));
    }

    #[test]
    fn shared_prefabs_in_one_layer_are_rejected() {
        let text = r#"
[[views]]
id = 1
layer = "UI"
prefab = "gui/home/Home"

[[views]]
id = 2
layer = "PopUp"
prefab = "gui/home/Home"

[[views]]
id = 3
layer = "UI"
prefab = "gui/home/Home"
"#;
        let_assert!(
            Err(SettingsError::SharedPrefab {
                id,
                other,
                layer,
                ..
            }) = GuiSettings::from_toml_str(text)
        );
        assert!(id == UiId(3));
        assert!(other == UiId(1));
        assert!(layer == LayerKind::Ui);
    }

    #[test]
    fn unknown_layer_is_a_parse_error() {
        let text = r#"
[[views]]
id = 1
layer = "Overlay"
prefab = "a"
"#;
        let_assert!(Err(SettingsError::ParseSettings { .. }) = GuiSettings::from_toml_str(text));
    }
}
