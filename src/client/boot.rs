//! Staged start-up: font, then language pack, then common resources, then the loading view.

use std::path::PathBuf;
use std::rc::Rc;

use stratum_gui::{
    AsyncTaskQueue, FsResourceLoader, LayerManager, LocalRuntime, Next, ResourceLoader,
    StepError, UiId, ViewArgs,
};
use tracing::{error, info, warn};

use crate::client::language::LanguagePack;
use crate::client::resources::{Gui, Stage};

/// View opened once start-up is done.
pub const LOADING: UiId = UiId(1);

/// Resources every view may rely on, loaded in parallel.
const COMMON_RESOURCES: [&str; 3] = [
    "common/manifest",
    "common/prefab/notify",
    "common/prefab/wait",
];

/// Shared by every start-up step.
pub struct BootParams {
    /// Loader for fonts and common resources.
    loader: Rc<FsResourceLoader>,
    /// Receives the language pack.
    manager: LayerManager,
    /// Directory of the default bundle.
    bundle_dir: PathBuf,
    /// Name of the default bundle.
    bundle: String,
    /// Language of fonts and texts.
    language: String,
}

/// Builds the start-up queue without playing it.
pub fn boot_queue(gui: &Gui) -> AsyncTaskQueue<(), BootParams> {
    let queue = AsyncTaskQueue::new(BootParams {
        loader: gui.loader.clone(),
        manager: gui.manager.clone(),
        bundle_dir: gui.assets.join(&gui.bundle),
        bundle: gui.bundle.clone(),
        language: gui.language.clone(),
    });

    queue.push_async(&gui.runtime, |boot, ()| async move {
        let path = format!("language/font/{}", boot.language);
        let font = boot.loader.load(&boot.bundle, &path).await?;
        info!("Loaded font {} ({} bytes)", font.name(), font.data().len());
        Ok::<(), StepError>(())
    });

    queue.push_async(&gui.runtime, |boot, ()| async move {
        let pack = LanguagePack::load(&boot.bundle_dir, &boot.language)
            .await
            .map_err(|e| StepError::new(e.to_string()))?;
        info!(
            "Loaded {} translations for {}",
            pack.key_count(),
            boot.language
        );
        boot.manager.set_localizer(pack);
        Ok::<(), StepError>(())
    });

    let steps = COMMON_RESOURCES.map(|path| load_common(gui.runtime.clone(), path));
    queue.push_multi(steps);

    queue
}

/// A sub-step loading one common resource on `runtime`.
fn load_common(
    runtime: LocalRuntime,
    path: &'static str,
) -> impl FnOnce(Next<()>, Rc<BootParams>, ()) {
    move |next, boot, ()| {
        let load = boot.loader.load(&boot.bundle, path);
        runtime.spawn(async move {
            match load.await {
                Ok(_) => next.advance(()),
                Err(e) => next.fail(e),
            }
        });
    }
}

/// Plays the start-up queue and opens the loading view once it completes.
pub fn start(gui: &Gui) {
    let queue = boot_queue(gui);

    let manager = gui.manager.clone();
    let runtime = gui.runtime.clone();
    let stage = gui.stage.clone();
    queue.on_complete(move |()| {
        let opened = manager.open_async(LOADING, ViewArgs::none());
        runtime.spawn(async move {
            match opened.await {
                Ok(node) => {
                    info!("Loading view is on screen as node {node}");
                    if let Err(e) = manager.toast("loading.ready", true) {
                        warn!("Failed to show the ready toast: {e}");
                    }
                    stage.set(Stage::Ready);
                }
                Err(e) => {
                    error!("Failed to open the loading view: {e}");
                    stage.set(Stage::Failed);
                }
            }
        });
    });

    let stage = gui.stage.clone();
    queue.on_failure(move |e| {
        error!("Start-up failed: {e}");
        stage.set(Stage::Failed);
    });

    queue.play(());
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use assert2::assert;
    use futures_lite::future::yield_now;

    use super::{start, LOADING};
    use crate::client::resources::{Gui, Stage};

    const SETTINGS: &str = r#"
default_bundle = "resources"

[[views]]
id = 1
layer = "UI"
prefab = "gui/loading/Loading"
"#;

    fn write_assets(root: &Path, with_pack: bool) {
        let mut files = vec![
            ("gui.toml", SETTINGS),
            ("resources/gui/loading/Loading.prefab", "loading"),
            ("resources/language/font/en.prefab", "font"),
            ("resources/common/manifest.prefab", "manifest"),
            ("resources/common/prefab/notify.prefab", "notify"),
            ("resources/common/prefab/wait.prefab", "wait"),
        ];
        if with_pack {
            files.push(("resources/language/pack/en.toml", "[loading]\nready = \"Ready\"\n"));
        }

        for (path, contents) in files {
            let path = root.join(path);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, contents).unwrap();
        }
    }

    fn run_start_up(gui: &Gui) {
        start(gui);
        gui.runtime.block_on(async {
            while gui.stage.get() == Stage::Booting {
                yield_now().await;
            }
        });
    }

    #[test]
    fn start_up_opens_the_loading_view() {
        let dir = tempfile::tempdir().unwrap();
        write_assets(dir.path(), true);
        let gui = Gui::new(dir.path(), "en".to_string()).unwrap();

        run_start_up(&gui);

        assert!(gui.stage.get() == Stage::Ready);
        assert!(gui.manager.is_displayed(LOADING));
        assert!(gui.manager.toast_count() == 1);
    }

    #[test]
    fn missing_language_pack_fails_start_up() {
        let dir = tempfile::tempdir().unwrap();
        write_assets(dir.path(), false);
        let gui = Gui::new(dir.path(), "en".to_string()).unwrap();

        run_start_up(&gui);

        assert!(gui.stage.get() == Stage::Failed);
        assert!(!gui.manager.has(LOADING));
    }

    #[test]
    fn missing_settings_fail_setup() {
        let dir = tempfile::tempdir().unwrap();

        assert!(Gui::new(dir.path(), "en".to_string()).is_err());
    }
}
