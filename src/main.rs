#![deny(missing_docs)]

//! The stratum demo client.
//!
//! Loads the GUI settings from the asset directory (`STRATUM_ASSETS`, `assets` by default),
//! runs the staged start-up and opens the loading view.

mod client;
mod common;
mod plugins;

use crate::plugins::client::ClientPlugins;
use bevy_app::prelude::*;

/// The main entry point for the application.
///
/// Initializes the logger and runs the [bevy application](https://docs.rs/bevy_app/latest/bevy_app/).
pub fn main() -> AppExit {
    App::new().add_plugins(ClientPlugins).run()
}
