//! The layer manager and the containers it routes views to.
//!
//! [`LayerManager::init_layer`] builds one node per [`LayerKind`] under a root node. Every layer
//! except Game and Guide gets a [`LayerContainer`] that caches the views opened into it. Opening a
//! view resolves its identifier through the [`ViewConfigRegistry`] to a config, and the config's
//! layer to a container:
//!
//! ```text
//! open(id) -> registry -> container -> cache hit:  reattach
//!                                   -> cache miss: load -> instantiate -> attach
//! ```
//!
//! Callbacks fire once the view is on screen or once opening it failed, never both.

mod container;
mod notify;
mod view;

use std::cell::RefCell;
use std::fmt::Debug;
use std::future::Future;
use std::rc::{Rc, Weak};

use snafu::{ensure, OptionExt};
use tracing::{info, warn};

use crate::config::{LayerKind, UiId, ViewConfig, ViewConfigRegistry};
use crate::error::{
    AbandonedCtx, AlreadyInitializedCtx, ConfigNotFoundCtx, GuiError, GuiResult,
    InvalidRemovalCtx, LayersNotInitializedCtx, UnsupportedLayerCtx,
};
use crate::loader::SharedLoader;
use crate::runtime::LocalRuntime;
use crate::scene::{NodeHandle, SharedScene};
use crate::screen::{adapt_screen, ResolutionFit, Screen};
use crate::settings::GuiSettings;

pub use container::LayerContainer;
pub use view::{RemoveContinuation, UiCallbacks, ViewArgs, ViewInstance};

use container::{ContainerContext, FailureHook};
use notify::NotifyCenter;
use view::PendingOpen;

/// Looks up display strings for toasts.
pub trait Localizer {
    /// Returns the text for `key`, or `None` when there is no translation.
    fn translate(&self, key: &str) -> Option<String>;
}

/// The node tree built by [`LayerManager::init_layer`].
struct LayerTree {
    /// Node the layers were built under.
    root: NodeHandle,
    /// Camera found below the root.
    camera: Option<NodeHandle>,
    /// Layer nodes in [`LayerKind::ORDER`].
    nodes: Vec<NodeHandle>,
    /// Containers of the layers that hold views.
    containers: Vec<LayerContainer>,
    /// Toasts and the wait indicator.
    notify: NotifyCenter,
    /// Screen adaptation done on init.
    fit: ResolutionFit,
}

impl LayerTree {
    /// Node of a layer.
    fn node(&self, kind: LayerKind) -> Option<NodeHandle> {
        self.nodes.get(kind.index()).copied()
    }

    /// Container of a layer, if it holds views.
    fn container(&self, kind: LayerKind) -> Option<LayerContainer> {
        self.containers.iter().find(|c| c.kind() == kind).cloned()
    }
}

/// Shared by every handle of a manager.
struct ManagerInner {
    /// Runs loads and queued work.
    runtime: LocalRuntime,
    /// Scene the layers live in.
    scene: SharedScene,
    /// Loads view prefabs.
    loader: SharedLoader,
    /// View configs by identifier.
    registry: RefCell<ViewConfigRegistry>,
    /// Set by [`LayerManager::init_layer`].
    layers: RefCell<Option<LayerTree>>,
    /// See [`LayerManager::set_open_failure`].
    open_failure: FailureHook,
    /// See [`LayerManager::set_localizer`].
    localizer: RefCell<Option<Rc<dyn Localizer>>>,
}

/// Opens, replaces and removes views on a fixed stack of layers.
///
/// The manager is a cheap handle; clones share the same layers, caches and registry. It is
/// constructed explicitly and handed to whatever needs it.
///
/// # Examples
/// ```
/// use stratum_gui::{
///     FixedScreen, FsResourceLoader, GuiSettings, LayerKind, LayerManager, LocalRuntime,
///     MemoryScene, SceneGraph, Size, UiCallbacks, UiId, ViewArgs, ViewConfig,
/// };
/// use std::rc::Rc;
///
/// let runtime = LocalRuntime::new();
/// let scene = MemoryScene::new().shared();
/// let root = scene.borrow_mut().create_node("Canvas");
/// let loader = Rc::new(FsResourceLoader::new("assets"));
///
/// let manager = LayerManager::new(runtime.clone(), scene.clone(), loader);
/// let mut screen = FixedScreen::new(Size::new(1080.0, 1920.0), Size::new(720.0, 1280.0));
/// manager.init_layer(root, &mut screen, &GuiSettings::default()).unwrap();
/// manager
///     .init([ViewConfig::new(1, LayerKind::Ui, "gui/loading/Loading")])
///     .unwrap();
///
/// manager.open(UiId(1), ViewArgs::none(), UiCallbacks::new());
/// runtime.run_until_stalled();
/// ```
#[derive(Clone)]
pub struct LayerManager {
    /// Shared state.
    inner: Rc<ManagerInner>,
}

/// A [`LayerManager`] handle that does not keep the manager alive.
#[derive(Clone)]
pub struct WeakLayerManager(Weak<ManagerInner>);

impl WeakLayerManager {
    /// Returns the manager if it still exists.
    pub fn upgrade(&self) -> Option<LayerManager> {
        self.0.upgrade().map(|inner| LayerManager { inner })
    }
}

impl LayerManager {
    /// Creates a manager without layers. Call [`init_layer`](Self::init_layer) before opening
    /// anything.
    pub fn new(runtime: LocalRuntime, scene: SharedScene, loader: SharedLoader) -> Self {
        Self {
            inner: Rc::new(ManagerInner {
                runtime,
                scene,
                loader,
                registry: RefCell::new(ViewConfigRegistry::new()),
                layers: RefCell::new(None),
                open_failure: Rc::new(RefCell::new(None)),
                localizer: RefCell::new(None),
            }),
        }
    }

    /// Returns a handle that does not keep the manager alive.
    pub fn downgrade(&self) -> WeakLayerManager {
        WeakLayerManager(Rc::downgrade(&self.inner))
    }

    /// Builds the layer nodes under `root`, binds the camera and adapts the screen.
    ///
    /// # Errors
    /// Fails with [`GuiError::AlreadyInitialized`] when called a second time, in which case
    /// nothing changes.
    pub fn init_layer(
        &self,
        root: NodeHandle,
        screen: &mut dyn Screen,
        settings: &GuiSettings,
    ) -> GuiResult<ResolutionFit> {
        ensure!(self.inner.layers.borrow().is_none(), AlreadyInitializedCtx);

        let fit = adapt_screen(screen);

        let (camera, nodes) = {
            let mut scene = self.inner.scene.borrow_mut();
            let camera = scene.find_camera(root);
            let nodes: Vec<NodeHandle> = LayerKind::ORDER
                .iter()
                .map(|kind| {
                    let node = scene.create_node(kind.node_name());
                    scene.add_child(root, node);
                    node
                })
                .collect();
            (camera, nodes)
        };

        let context = ContainerContext {
            scene: self.inner.scene.clone(),
            loader: self.inner.loader.clone(),
            runtime: self.inner.runtime.clone(),
            default_bundle: settings.default_bundle.clone(),
            open_failure: self.inner.open_failure.clone(),
        };

        let containers: Vec<LayerContainer> = LayerKind::ORDER
            .iter()
            .zip(&nodes)
            .filter(|(kind, _)| kind.holds_views())
            .map(|(kind, node)| LayerContainer::new(*kind, *node, context.clone()))
            .collect();

        let tree = LayerTree {
            root,
            camera,
            notify: NotifyCenter::new(
                nodes[LayerKind::Notify.index()],
                settings.notify.clone(),
                context,
            ),
            nodes,
            containers,
            fit,
        };

        if settings.screen.mobile_safe_area {
            if let Some(ui) = tree.node(LayerKind::Ui) {
                self.inner.scene.borrow_mut().apply_safe_area(ui);
            }
        }
        if tree.camera.is_none() {
            warn!("No camera found below {root}");
        }

        *self.inner.layers.borrow_mut() = Some(tree);
        info!("Layers initialized below {root}");
        Ok(fit)
    }

    /// Replaces the whole config table.
    ///
    /// # Errors
    /// Fails with [`GuiError::SharedResource`] when two configs open the same resource in the
    /// same layer, in which case the previous table stays.
    pub fn init(&self, configs: impl IntoIterator<Item = ViewConfig>) -> GuiResult<()> {
        self.inner.registry.borrow_mut().init(configs)
    }

    /// Installs or overrides the config of one identifier.
    ///
    /// Views that are already cached keep the config they were opened with until they are
    /// opened again.
    ///
    /// # Errors
    /// Fails with [`GuiError::SharedResource`] when another identifier already opens the same
    /// resource in the same layer.
    pub fn set_config(&self, id: UiId, config: ViewConfig) -> GuiResult<()> {
        self.inner
            .registry
            .borrow_mut()
            .set_config(id, config)
            .map(|_| ())
    }

    /// Returns the config registered for an identifier.
    pub fn config(&self, id: UiId) -> Option<ViewConfig> {
        self.inner.registry.borrow().get(id).cloned()
    }

    /// Installs a callback fired whenever a container fails to load a view, in addition to the
    /// request's own [`UiCallbacks::on_load_failure`].
    pub fn set_open_failure(&self, callback: impl Fn(&GuiError) + 'static) {
        *self.inner.open_failure.borrow_mut() = Some(Rc::new(callback));
    }

    /// Installs the localizer used by [`toast`](Self::toast).
    pub fn set_localizer(&self, localizer: impl Localizer + 'static) {
        *self.inner.localizer.borrow_mut() = Some(Rc::new(localizer));
    }

    /// Resolves an identifier to its config and container.
    fn route(&self, id: UiId) -> GuiResult<(ViewConfig, LayerContainer)> {
        let config = self
            .inner
            .registry
            .borrow()
            .get(id)
            .cloned()
            .context(ConfigNotFoundCtx { id })?;

        let layers = self.inner.layers.borrow();
        let layers = layers.as_ref().context(LayersNotInitializedCtx)?;
        let container = layers.container(config.layer).context(UnsupportedLayerCtx {
            id,
            layer: config.layer,
        })?;

        Ok((config, container))
    }

    /// Opens a view.
    ///
    /// A cached view is reattached and `on_added` fires right away. Otherwise the view's prefab
    /// is loaded and `on_added` fires once it is attached. Requests for a view that is already
    /// loading wait for that load instead of starting another one.
    ///
    /// When the identifier cannot be routed (no config, no layers, or a layer without views),
    /// nothing is attached and `on_load_failure` fires.
    pub fn open(&self, id: UiId, args: ViewArgs, callbacks: UiCallbacks) {
        self.dispatch_open(id, args, callbacks, None);
    }

    /// Routes an open request to its container.
    ///
    /// `replacing` names a view the request takes the place of. When both share a Dialog or
    /// System layer, the request is shown next to that view instead of queueing behind it.
    fn dispatch_open(
        &self,
        id: UiId,
        args: ViewArgs,
        callbacks: UiCallbacks,
        replacing: Option<UiId>,
    ) {
        match self.route(id) {
            Ok((config, container)) => {
                let replacing = replacing
                    .and_then(|old| self.route(old).ok())
                    .filter(|(_, old_container)| old_container.is_same(&container))
                    .map(|(old_config, _)| old_config.resource_path);
                container.add(
                    PendingOpen::new(config, args, callbacks),
                    replacing.as_deref(),
                );
            }
            Err(error) => {
                warn!("Cannot open view {id}: {error}");
                callbacks.load_failed(&error);
            }
        }
    }

    /// Opens a view and resolves to its node once it is on screen.
    ///
    /// The request is dispatched right away; the returned future only waits for the outcome.
    pub fn open_async(
        &self,
        id: UiId,
        args: ViewArgs,
    ) -> impl Future<Output = GuiResult<NodeHandle>> + 'static {
        let (callbacks, outcome) = resolving_callbacks(id);
        self.open(id, args, callbacks);
        outcome
    }

    /// Opens `open_id` and removes `remove_id` once the new view is on screen.
    ///
    /// Both views may be visible together for a moment. If opening fails, `remove_id` stays.
    /// In a Dialog or System layer the new view skips the queue when `remove_id` is the view on
    /// screen.
    pub fn replace(&self, remove_id: UiId, open_id: UiId, args: ViewArgs, callbacks: UiCallbacks) {
        let manager = self.downgrade();
        let callbacks = Rc::new(callbacks);

        let added = callbacks.clone();
        let removed = callbacks.clone();
        let failed = callbacks.clone();
        let mut wrapped = UiCallbacks::new()
            .on_added(move |node, args| {
                added.added(node, args);
                if let Some(manager) = manager.upgrade() {
                    manager.remove(remove_id, None);
                }
            })
            .on_removed(move |node, args| removed.removed(node, args))
            .on_load_failure(move |error| failed.load_failed(error));

        if callbacks.holds_removal() {
            wrapped = wrapped.on_before_remove(move |node, continuation| {
                callbacks.before_remove(node, continuation)
            });
        }

        self.dispatch_open(open_id, args, wrapped, Some(remove_id));
    }

    /// [`replace`](Self::replace) that resolves to the new view's node.
    pub fn replace_async(
        &self,
        remove_id: UiId,
        open_id: UiId,
        args: ViewArgs,
    ) -> impl Future<Output = GuiResult<NodeHandle>> + 'static {
        let (callbacks, outcome) = resolving_callbacks(open_id);
        self.replace(remove_id, open_id, args, callbacks);
        outcome
    }

    /// Whether a loaded view is cached for the identifier, displayed or not.
    pub fn has(&self, id: UiId) -> bool {
        self.route(id)
            .is_ok_and(|(config, container)| container.has(&config.resource_path))
    }

    /// Returns the node of the cached view of an identifier, displayed or not.
    pub fn get(&self, id: UiId) -> Option<NodeHandle> {
        let (config, container) = self.route(id).ok()?;
        container.get(&config.resource_path)
    }

    /// Runs `f` on the cached view of an identifier, displayed or not.
    pub fn inspect<R>(&self, id: UiId, f: impl FnOnce(&ViewInstance) -> R) -> Option<R> {
        let (config, container) = self.route(id).ok()?;
        container.inspect(&config.resource_path, f)
    }

    /// Whether the view of an identifier is on screen.
    pub fn is_displayed(&self, id: UiId) -> bool {
        self.route(id)
            .is_ok_and(|(config, container)| container.is_displayed(&config.resource_path))
    }

    /// Removes the view of an identifier.
    ///
    /// `destroy` decides whether the view is also evicted from the cache and freed. When it is
    /// `None`, the config's `destroy_on_close` decides, and hidden views are kept by default.
    pub fn remove(&self, id: UiId, destroy: Option<bool>) {
        match self.route(id) {
            Ok((config, container)) => container.remove(&config.resource_path, destroy),
            Err(error) => warn!("Cannot remove view {id}: {error}"),
        }
    }

    /// Removes the view whose root is `node`.
    ///
    /// Displayed views are detached. Hidden views are evicted when `destroy` asks for it.
    ///
    /// # Errors
    /// A node that was not opened through the manager is destroyed anyway, and
    /// [`GuiError::InvalidRemoval`] is returned.
    pub fn remove_by_node(&self, node: NodeHandle, destroy: Option<bool>) -> GuiResult<()> {
        let marker = self.inner.scene.borrow().marker(node);
        let owner = marker.and_then(|marker| {
            let container = self.container(marker.layer)?;
            (container.get(&marker.resource_path) == Some(node))
                .then_some((container, marker.resource_path))
        });

        match owner {
            Some((container, path)) => {
                container.remove(&path, destroy);
                Ok(())
            }
            None => {
                warn!("Node {node} was not added through the layer manager, destroying it");
                self.inner.scene.borrow_mut().destroy(node);
                InvalidRemovalCtx { node }.fail()
            }
        }
    }

    /// Removes every view of every layer.
    pub fn clear(&self, destroy: bool) {
        for container in self.containers() {
            container.clear(destroy);
        }
    }

    /// Closes the topmost view of a layer if its config asks to be closed on touches around it.
    ///
    /// Returns whether a view was closed.
    pub fn touch_vacancy(&self, layer: LayerKind) -> bool {
        self.container(layer)
            .is_some_and(|container| container.touch_vacancy())
    }

    /// Shows a short lived message on the Notify layer.
    ///
    /// With `use_i18n`, `content` is a key translated through the installed [`Localizer`].
    /// Untranslated keys are shown as they are.
    ///
    /// # Errors
    /// Fails when the layers are not initialized.
    pub fn toast(&self, content: &str, use_i18n: bool) -> GuiResult<()> {
        let notify = self.notify().context(LayersNotInitializedCtx)?;
        let text = use_i18n
            .then(|| {
                let localizer = self.inner.localizer.borrow().clone();
                localizer.and_then(|localizer| localizer.translate(content))
            })
            .flatten()
            .unwrap_or_else(|| content.to_string());

        notify.toast(text);
        Ok(())
    }

    /// Number of toasts on screen or waiting for their prefab.
    pub fn toast_count(&self) -> usize {
        self.notify().map_or(0, |notify| notify.toast_count())
    }

    /// Shows the wait indicator.
    pub fn wait_open(&self) {
        match self.notify() {
            Some(notify) => notify.wait_open(),
            None => warn!("Cannot show the wait indicator: {}", GuiError::LayersNotInitialized),
        }
    }

    /// Hides the wait indicator.
    pub fn wait_close(&self) {
        if let Some(notify) = self.notify() {
            notify.wait_close();
        }
    }

    /// Whether the wait indicator is on screen.
    pub fn is_waiting(&self) -> bool {
        self.notify().is_some_and(|notify| notify.is_waiting())
    }

    /// Advances toast timers by `dt` seconds.
    pub fn update(&self, dt: f32) {
        if let Some(notify) = self.notify() {
            notify.update(dt);
        }
    }

    /// The Notify layer's toasts, once the layers exist.
    fn notify(&self) -> Option<NotifyCenter> {
        self.inner
            .layers
            .borrow()
            .as_ref()
            .map(|layers| layers.notify.clone())
    }

    /// Every container, empty before init.
    fn containers(&self) -> Vec<LayerContainer> {
        self.inner
            .layers
            .borrow()
            .as_ref()
            .map(|layers| layers.containers.clone())
            .unwrap_or_default()
    }

    /// Returns the container of a layer. Game and Guide have none.
    pub fn container(&self, layer: LayerKind) -> Option<LayerContainer> {
        self.inner.layers.borrow().as_ref()?.container(layer)
    }

    /// The root the layers were built under.
    pub fn root(&self) -> Option<NodeHandle> {
        self.inner.layers.borrow().as_ref().map(|layers| layers.root)
    }

    /// The camera found below the root.
    pub fn camera(&self) -> Option<NodeHandle> {
        self.inner.layers.borrow().as_ref()?.camera
    }

    /// The node of a layer.
    pub fn layer_node(&self, layer: LayerKind) -> Option<NodeHandle> {
        self.inner.layers.borrow().as_ref()?.node(layer)
    }

    /// The Game layer node, which the game fills on its own.
    pub fn game_node(&self) -> Option<NodeHandle> {
        self.layer_node(LayerKind::Game)
    }

    /// The Guide layer node, which the game fills on its own.
    pub fn guide_node(&self) -> Option<NodeHandle> {
        self.layer_node(LayerKind::Guide)
    }

    /// Window aspect ratio recorded by [`init_layer`](Self::init_layer).
    pub fn window_aspect_ratio(&self) -> Option<f32> {
        self.fit().map(|fit| fit.window_aspect_ratio)
    }

    /// Design aspect ratio recorded by [`init_layer`](Self::init_layer).
    pub fn design_aspect_ratio(&self) -> Option<f32> {
        self.fit().map(|fit| fit.design_aspect_ratio)
    }

    /// The screen adaptation done by [`init_layer`](Self::init_layer).
    pub fn fit(&self) -> Option<ResolutionFit> {
        self.inner.layers.borrow().as_ref().map(|layers| layers.fit)
    }

    /// The runtime loads are spawned on.
    pub fn runtime(&self) -> &LocalRuntime {
        &self.inner.runtime
    }

    /// The scene views are attached to.
    pub fn scene(&self) -> &SharedScene {
        &self.inner.scene
    }
}

impl Debug for LayerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerManager")
            .field("views", &self.inner.registry.borrow().len())
            .field("containers", &self.containers())
            .finish_non_exhaustive()
    }
}

/// Callbacks that resolve a future with whichever of `on_added` or `on_load_failure` fires first.
fn resolving_callbacks(
    id: UiId,
) -> (UiCallbacks, impl Future<Output = GuiResult<NodeHandle>> + 'static) {
    let (sender, receiver) = async_channel::bounded(1);
    let failure = sender.clone();

    let callbacks = UiCallbacks::new()
        .on_added(move |node, _| {
            let _ = sender.try_send(Ok(node));
        })
        .on_load_failure(move |error| {
            let _ = failure.try_send(Err(error.clone()));
        });

    let outcome = async move {
        match receiver.recv().await {
            Ok(outcome) => outcome,
            Err(_) => AbandonedCtx { id }.fail(),
        }
    };

    (callbacks, outcome)
}
