//! This is the plugin that contains all code related to the client.
//! It owns the layer manager and runs the staged start-up.

use bevy_app::{App, AppExit, Plugin, Startup, Update};
use bevy_ecs::event::EventWriter;
use std::path::PathBuf;
use tracing::error;

use crate::client::resources::Gui;
use crate::client::systems::{s_boot_gui, u_drive_gui};

mod boot;
mod language;
pub mod resources;
mod systems;

/// Environment variable naming the asset directory.
pub const ASSETS_ENV: &str = "STRATUM_ASSETS";
/// Environment variable naming the language of fonts and texts.
pub const LANGUAGE_ENV: &str = "STRATUM_LANG";

/// Plugin that sets up the GUI from the asset directory.
///
/// The assets are read from `STRATUM_ASSETS` (`assets` by default) and the language from
/// `STRATUM_LANG` (`en` by default).
pub struct GuiPlugin;

impl Plugin for GuiPlugin {
    fn build(&self, app: &mut App) {
        let assets = std::env::var_os(ASSETS_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("assets"));
        let language = std::env::var(LANGUAGE_ENV).unwrap_or_else(|_| "en".to_string());

        match Gui::new(&assets, language) {
            Ok(gui) => {
                app.insert_non_send_resource(gui)
                    .add_systems(Startup, s_boot_gui)
                    .add_systems(Update, u_drive_gui);
            }
            Err(e) => {
                error!("Failed to set up the GUI: {e}");
                app.add_systems(Startup, |mut exit: EventWriter<AppExit>| {
                    exit.send(AppExit::error());
                });
            }
        }
    }
}
