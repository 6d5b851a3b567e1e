//! Module containing the client plugin group

use std::time::Duration;

use crate::client::GuiPlugin;
use crate::common::trace::TracePlugin;
use bevy_app::{PluginGroup, PluginGroupBuilder, ScheduleRunnerPlugin};

/// Frame interval of the client loop.
const FRAME: Duration = Duration::from_micros(16_667);

/// Default plugins for the stratum client
pub struct ClientPlugins;

impl PluginGroup for ClientPlugins {
    fn build(self) -> PluginGroupBuilder {
        let mut group = PluginGroupBuilder::start::<Self>();

        group = group
            .add(TracePlugin)
            .add(ScheduleRunnerPlugin::run_loop(FRAME))
            .add_after::<ScheduleRunnerPlugin, _>(GuiPlugin);

        group
    }
}
