//! Systems driving the GUI.

use std::time::Instant;

use bevy_app::AppExit;
use bevy_ecs::prelude::*;
use tracing::{error, info};

use crate::client::boot;
use crate::client::resources::{Gui, Stage};

/// Plays the start-up queue.
pub fn s_boot_gui(gui: NonSend<Gui>) {
    info!("Starting the GUI in {}", gui.language);
    boot::start(&gui);
}

/// Runs pending GUI work, advances toasts and exits once start-up is over.
///
/// The app exits after the loading view is on screen and every toast has expired, or right away
/// when start-up fails.
pub fn u_drive_gui(
    gui: NonSend<Gui>,
    mut last_frame: Local<Option<Instant>>,
    mut exit: EventWriter<AppExit>,
) {
    let now = Instant::now();
    let dt = last_frame
        .replace(now)
        .map_or(0.0, |then| now.duration_since(then).as_secs_f32());

    gui.runtime.run_until_stalled();
    gui.manager.update(dt);

    match gui.stage.get() {
        Stage::Booting => {}
        Stage::Ready => {
            if gui.manager.toast_count() == 0 {
                info!("Start-up finished");
                exit.send(AppExit::Success);
            }
        }
        Stage::Failed => {
            error!("Exiting after a failed start-up");
            exit.send(AppExit::error());
        }
    }
}
