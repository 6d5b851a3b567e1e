#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use async_channel::{Receiver, Sender};
use futures_lite::future::{BoxedLocal, FutureExt};
use stratum_gui::error::{LoadResult, RejectedCtx};
use stratum_gui::scene::SceneGraph;
use stratum_gui::settings::GuiSettings;
use stratum_gui::{
    FixedScreen, GuiError, LayerKind, LayerManager, LocalRuntime, Localizer, MemoryScene,
    NodeHandle, Prefab, ResourceLoader, Size, UiCallbacks, UiId, ViewConfig,
};

pub const LOADING: UiId = UiId(1);
pub const HOME: UiId = UiId(2);
pub const SHOP: UiId = UiId(3);
pub const ALERT: UiId = UiId(4);
pub const CONFIRM: UiId = UiId(5);
pub const TIPS: UiId = UiId(6);
pub const TUTORIAL: UiId = UiId(7);
pub const BROKEN: UiId = UiId(8);
pub const RULES: UiId = UiId(9);
pub const NOTICE: UiId = UiId(10);

pub const BROKEN_PATH: &str = "gui/broken/Broken";

pub fn views() -> Vec<ViewConfig> {
    vec![
        ViewConfig::new(LOADING, LayerKind::Ui, "gui/loading/Loading"),
        ViewConfig::new(HOME, LayerKind::Ui, "gui/home/Home").with_bundle("home"),
        ViewConfig::new(SHOP, LayerKind::PopUp, "gui/shop/Shop")
            .with_mask(true)
            .with_vacancy(true),
        ViewConfig::new(ALERT, LayerKind::Dialog, "common/prefab/alert").with_mask(true),
        ViewConfig::new(CONFIRM, LayerKind::Dialog, "common/prefab/confirm"),
        ViewConfig::new(TIPS, LayerKind::Notify, "common/prefab/tips"),
        ViewConfig::new(TUTORIAL, LayerKind::Guide, "gui/guide/Tutorial"),
        ViewConfig::new(BROKEN, LayerKind::Ui, BROKEN_PATH),
        ViewConfig::new(RULES, LayerKind::PopUp, "gui/rules/Rules"),
        ViewConfig::new(NOTICE, LayerKind::System, "common/prefab/notice"),
    ]
}

/// A loader that hands out empty prefabs and counts every request.
///
/// Loads can be held in flight with [`hold`](Self::hold) until [`resume`](Self::resume) is
/// called, and paths can be made to fail.
#[derive(Default)]
pub struct CountingLoader {
    loads: RefCell<Vec<(String, String)>>,
    releases: RefCell<Vec<String>>,
    failing: RefCell<HashSet<String>>,
    gate: RefCell<Option<(Sender<()>, Receiver<()>)>>,
}

impl CountingLoader {
    pub fn fail(&self, path: &str) {
        self.failing.borrow_mut().insert(path.to_string());
    }

    pub fn hold(&self) {
        *self.gate.borrow_mut() = Some(async_channel::bounded(1));
    }

    pub fn resume(&self) {
        if let Some((sender, _)) = self.gate.borrow_mut().take() {
            sender.close();
        }
    }

    pub fn load_count(&self, path: &str) -> usize {
        self.loads.borrow().iter().filter(|(_, p)| p == path).count()
    }

    pub fn requested(&self) -> Vec<String> {
        self.loads.borrow().iter().map(|(_, p)| p.clone()).collect()
    }

    pub fn total_loads(&self) -> usize {
        self.loads.borrow().len()
    }

    pub fn bundle_of(&self, path: &str) -> Option<String> {
        self.loads
            .borrow()
            .iter()
            .find(|(_, p)| p == path)
            .map(|(bundle, _)| bundle.clone())
    }

    pub fn released(&self, path: &str) -> bool {
        self.releases.borrow().iter().any(|p| p == path)
    }
}

impl ResourceLoader for CountingLoader {
    fn load(&self, bundle: &str, path: &str) -> BoxedLocal<LoadResult<Prefab>> {
        self.loads
            .borrow_mut()
            .push((bundle.to_string(), path.to_string()));

        let gate = self
            .gate
            .borrow()
            .as_ref()
            .map(|(_, receiver)| receiver.clone());
        let failing = self.failing.borrow().contains(path);
        let path = path.to_string();

        async move {
            if let Some(gate) = gate {
                let _ = gate.recv().await;
            }
            if failing {
                return RejectedCtx {
                    path,
                    reason: "test failure",
                }
                .fail();
            }
            Ok(Prefab::new(path, b"prefab".to_vec()))
        }
        .boxed_local()
    }

    fn release(&self, _bundle: &str, path: &str) {
        self.releases.borrow_mut().push(path.to_string());
    }
}

pub struct MapLocalizer(pub HashMap<String, String>);

impl Localizer for MapLocalizer {
    fn translate(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }
}

pub struct Harness {
    pub runtime: LocalRuntime,
    pub scene: Rc<RefCell<MemoryScene>>,
    pub loader: Rc<CountingLoader>,
    pub manager: LayerManager,
    pub root: NodeHandle,
    pub camera: NodeHandle,
}

impl Harness {
    pub fn settle(&self) {
        self.runtime.run_until_stalled();
    }

    pub fn layer(&self, layer: LayerKind) -> NodeHandle {
        self.manager.layer_node(layer).unwrap()
    }

    pub fn children(&self, node: NodeHandle) -> Vec<NodeHandle> {
        self.scene.borrow().children(node)
    }

    pub fn parent(&self, node: NodeHandle) -> Option<NodeHandle> {
        self.scene.borrow().parent(node)
    }

    /// Opens a view and settles the runtime, returning the node it was added with.
    pub fn open(&self, id: UiId) -> Option<NodeHandle> {
        let added = Rc::new(Cell::new(None));
        let slot = added.clone();
        self.manager.open(
            id,
            Default::default(),
            UiCallbacks::new().on_added(move |node, _| slot.set(Some(node))),
        );
        self.settle();
        added.get()
    }
}

pub fn setup() -> Harness {
    setup_with(GuiSettings::default())
}

pub fn setup_with(settings: GuiSettings) -> Harness {
    let harness = setup_uninitialized();
    let mut screen = FixedScreen::new(Size::new(1080.0, 1920.0), Size::new(720.0, 1280.0));
    harness
        .manager
        .init_layer(harness.root, &mut screen, &settings)
        .unwrap();
    harness
}

pub fn setup_uninitialized() -> Harness {
    let runtime = LocalRuntime::new();
    let scene = MemoryScene::new().shared();
    let loader = Rc::new(CountingLoader::default());

    let (root, camera) = {
        let mut scene = scene.borrow_mut();
        let root = scene.create_node("Canvas");
        let camera = scene.add_camera(root);
        (root, camera)
    };

    let manager = LayerManager::new(runtime.clone(), scene.clone(), loader.clone());
    manager.init(views()).unwrap();

    Harness {
        runtime,
        scene,
        loader,
        manager,
        root,
        camera,
    }
}

/// Records events in order.
#[derive(Clone, Default)]
pub struct Events(Rc<RefCell<Vec<String>>>);

impl Events {
    pub fn push(&self, event: impl Into<String>) {
        self.0.borrow_mut().push(event.into());
    }

    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.borrow_mut())
    }
}

/// Callbacks that record what happened to one open request.
#[derive(Clone, Default)]
pub struct Recorder {
    pub added: Rc<RefCell<Vec<NodeHandle>>>,
    pub removed: Rc<RefCell<Vec<NodeHandle>>>,
    pub failures: Rc<RefCell<Vec<GuiError>>>,
}

impl Recorder {
    pub fn callbacks(&self) -> UiCallbacks {
        let added = self.added.clone();
        let removed = self.removed.clone();
        let failures = self.failures.clone();
        UiCallbacks::new()
            .on_added(move |node, _| added.borrow_mut().push(node))
            .on_removed(move |node, _| removed.borrow_mut().push(node))
            .on_load_failure(move |error| failures.borrow_mut().push(error.clone()))
    }

    pub fn added(&self) -> Vec<NodeHandle> {
        self.added.borrow().clone()
    }

    pub fn removed(&self) -> Vec<NodeHandle> {
        self.removed.borrow().clone()
    }

    pub fn failures(&self) -> Vec<GuiError> {
        self.failures.borrow().clone()
    }
}
