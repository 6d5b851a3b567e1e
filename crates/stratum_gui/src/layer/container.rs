//! One container per view-holding layer.
//!
//! A container owns the cache of its layer. Every cache entry is keyed by resource path and is
//! either a load in flight, with all requests that arrived meanwhile waiting on it, or a loaded
//! view that is on screen or hidden.
//!
//! Each resource path belongs to at most one identifier per layer; the
//! [`ViewConfigRegistry`](crate::config::ViewConfigRegistry) refuses configs that would share an
//! entry.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt::Debug;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use snafu::IntoError;
use tracing::{debug, info, warn};

use crate::config::{LayerKind, ViewConfig};
use crate::error::{CancelledCtx, GuiError, LoadFailureCtx, LoadResult};
use crate::layer::view::{CacheSlot, PendingOpen, RemoveContinuation, ViewInstance};
use crate::loader::{Prefab, SharedLoader};
use crate::runtime::LocalRuntime;
use crate::scene::{NodeHandle, SharedScene, ViewMarker};

/// Layer wide callback fired whenever a container fails to open a view.
pub(crate) type FailureHook = Rc<RefCell<Option<Rc<dyn Fn(&GuiError)>>>>;

/// How a layer treats the views opened into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Behavior {
    /// Any number of views, no mask.
    Standard,
    /// Any number of views, with a mask behind the topmost masked one.
    PopUp,
    /// One view at a time, with further requests queued.
    Dialog,
}

impl Behavior {
    /// Dialog and System queue, PopUp masks, the rest is standard.
    fn for_layer(kind: LayerKind) -> Self {
        match kind {
            LayerKind::PopUp => Behavior::PopUp,
            LayerKind::Dialog | LayerKind::System => Behavior::Dialog,
            _ => Behavior::Standard,
        }
    }
}

/// What every container shares with the layer manager.
#[derive(Clone)]
pub(crate) struct ContainerContext {
    /// Scene views are instantiated into.
    pub(crate) scene: SharedScene,
    /// Loads prefabs.
    pub(crate) loader: SharedLoader,
    /// Runs loads and deferred work.
    pub(crate) runtime: LocalRuntime,
    /// Bundle of views whose config names none.
    pub(crate) default_bundle: String,
    /// Manager wide load failure callback.
    pub(crate) open_failure: FailureHook,
}

#[derive(Default)]
/// Mutable part of a container.
struct ContainerState {
    /// Loads in flight and loaded views, by resource path.
    cache: IndexMap<String, CacheSlot>,
    /// Last ticket handed to a load.
    next_ticket: u64,
    /// Requests waiting for the displayed dialog to go away.
    queue: VecDeque<PendingOpen>,
    /// Created on first use and reused.
    mask: Option<NodeHandle>,
    /// Displayed views, most recently attached last.
    display_order: Vec<String>,
}

/// Shared by every handle of a container.
struct ContainerInner {
    /// Layer served.
    kind: LayerKind,
    /// Queueing and masking rules of the layer.
    behavior: Behavior,
    /// Layer node views are attached to.
    node: NodeHandle,
    /// Collaborators shared with the manager.
    context: ContainerContext,
    /// Cache, queue and mask.
    state: RefCell<ContainerState>,
}

/// The cache and node of a single layer.
///
/// This is a cheap handle; clones refer to the same container.
#[derive(Clone)]
pub struct LayerContainer(Rc<ContainerInner>);

#[derive(Clone)]
/// Handle held by spawned loads and removal continuations.
struct WeakContainer(Weak<ContainerInner>);

impl WeakContainer {
    /// Returns the container if it still exists.
    fn upgrade(&self) -> Option<LayerContainer> {
        self.0.upgrade().map(LayerContainer)
    }
}

impl LayerContainer {
    /// Creates an empty container for the layer node `node`.
    pub(crate) fn new(kind: LayerKind, node: NodeHandle, context: ContainerContext) -> Self {
        Self(Rc::new(ContainerInner {
            kind,
            behavior: Behavior::for_layer(kind),
            node,
            context,
            state: RefCell::new(ContainerState::default()),
        }))
    }

    /// Returns a handle that does not keep the container alive.
    fn downgrade(&self) -> WeakContainer {
        WeakContainer(Rc::downgrade(&self.0))
    }

    /// The layer this container belongs to.
    pub fn kind(&self) -> LayerKind {
        self.0.kind
    }

    /// The layer node views are attached to.
    pub fn node(&self) -> NodeHandle {
        self.0.node
    }

    /// Whether a loaded view is cached under `path`, displayed or not.
    pub fn has(&self, path: &str) -> bool {
        matches!(self.0.state.borrow().cache.get(path), Some(CacheSlot::Ready(_)))
    }

    /// Returns the node of the loaded view cached under `path`, displayed or not.
    pub fn get(&self, path: &str) -> Option<NodeHandle> {
        match self.0.state.borrow().cache.get(path) {
            Some(CacheSlot::Ready(view)) => Some(view.node),
            _ => None,
        }
    }

    /// Runs `f` on the loaded view cached under `path`.
    ///
    /// The container must not be used from inside `f`.
    pub fn inspect<R>(&self, path: &str, f: impl FnOnce(&ViewInstance) -> R) -> Option<R> {
        match self.0.state.borrow().cache.get(path) {
            Some(CacheSlot::Ready(view)) => Some(f(view)),
            _ => None,
        }
    }

    /// Whether the view cached under `path` is on screen.
    pub fn is_displayed(&self, path: &str) -> bool {
        match self.0.state.borrow().cache.get(path) {
            Some(CacheSlot::Ready(view)) => view.valid,
            _ => false,
        }
    }

    /// Whether a load for `path` is in flight.
    pub fn is_loading(&self, path: &str) -> bool {
        matches!(self.0.state.borrow().cache.get(path), Some(CacheSlot::Loading { .. }))
    }

    /// Number of cache entries, loads in flight included.
    pub fn len(&self) -> usize {
        self.0.state.borrow().cache.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.0.state.borrow().cache.is_empty()
    }

    /// Number of requests waiting for the displayed dialog to go away.
    pub fn queued(&self) -> usize {
        self.0.state.borrow().queue.len()
    }

    /// The mask node, once one has been needed.
    pub fn mask(&self) -> Option<NodeHandle> {
        self.0.state.borrow().mask
    }

    /// Whether both handles refer to the same container.
    pub(crate) fn is_same(&self, other: &LayerContainer) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Opens a view.
    ///
    /// Dialog layers show one view at a time; a request for another view waits in a queue until
    /// the displayed one is removed. A request `replacing` the active view is shown right away,
    /// ahead of the queue.
    pub(crate) fn add(&self, pending: PendingOpen, replacing: Option<&str>) {
        if self.0.behavior == Behavior::Dialog {
            let mut state = self.0.state.borrow_mut();
            let path = &pending.config.resource_path;
            let busy = state.cache.iter().any(|(key, slot)| {
                key != path && Some(key.as_str()) != replacing && slot.is_active()
            });
            let own_active = state.cache.get(path).is_some_and(CacheSlot::is_active);
            let in_place = replacing
                .and_then(|old| state.cache.get(old))
                .is_some_and(CacheSlot::is_active);

            if busy || (!own_active && !in_place && !state.queue.is_empty()) {
                debug!("Queued {path} in {}", self.0.kind);
                state.queue.push_back(pending);
                return;
            }
        }

        self.show(pending);
    }

    /// Reattaches a cached view, joins a load in flight or starts a new load.
    fn show(&self, pending: PendingOpen) {
        let PendingOpen {
            config,
            args,
            callbacks,
        } = pending;
        let path = config.resource_path.clone();
        let mut state = self.0.state.borrow_mut();

        match state.cache.get_mut(&path) {
            Some(CacheSlot::Ready(view)) => {
                let was_valid = view.valid;
                view.config = config;
                view.args = args.clone();
                view.callbacks = callbacks.clone();
                view.valid = true;
                let node = view.node;
                let sibling_index = view.config.sibling_index;
                drop(state);

                if was_valid {
                    warn!("View {path} is already displayed in {}", self.0.kind);
                } else {
                    debug!("Reusing cached view {path} in {}", self.0.kind);
                    self.attach(&path, node, sibling_index);
                }
                callbacks.added(node, &args);
            }
            Some(CacheSlot::Loading { waiters, .. }) => {
                debug!("Joining the load of {path} in {}", self.0.kind);
                waiters.push(PendingOpen {
                    config,
                    args,
                    callbacks,
                });
            }
            None => {
                state.next_ticket += 1;
                let ticket = state.next_ticket;
                let bundle = self.bundle_of(&config);
                state.cache.insert(
                    path.clone(),
                    CacheSlot::Loading {
                        ticket,
                        waiters: vec![PendingOpen {
                            config,
                            args,
                            callbacks,
                        }],
                    },
                );
                drop(state);

                debug!("Loading {path} from {bundle} for {}", self.0.kind);
                let load = self.0.context.loader.load(&bundle, &path);
                let container = self.downgrade();
                self.0.context.runtime.spawn(async move {
                    let result = load.await;
                    if let Some(container) = container.upgrade() {
                        container.finish_load(&path, &bundle, ticket, result);
                    }
                });
            }
        }
    }

    /// Installs or fails a finished load unless it was cancelled meanwhile.
    fn finish_load(&self, path: &str, bundle: &str, ticket: u64, result: LoadResult<Prefab>) {
        let waiters = {
            let mut state = self.0.state.borrow_mut();
            match state.cache.get(path) {
                Some(CacheSlot::Loading { ticket: current, .. }) if *current == ticket => {}
                _ => {
                    drop(state);
                    debug!("Dropping late load of {path} in {}", self.0.kind);
                    if result.is_ok() {
                        self.0.context.loader.release(bundle, path);
                    }
                    return;
                }
            }
            match state.cache.shift_remove(path) {
                Some(CacheSlot::Loading { waiters, .. }) => waiters,
                _ => return,
            }
        };

        match result {
            Ok(prefab) => self.install(path, &prefab, waiters),
            Err(source) => {
                warn!("Failed to load view at {path}: {source}");
                let error = LoadFailureCtx { path }.into_error(source);
                for waiter in &waiters {
                    waiter.callbacks.load_failed(&error);
                }
                self.report_open_failure(&error);
                self.schedule_next();
            }
        }
    }

    /// Builds the view of a finished load and hands it to every waiter.
    ///
    /// The instance keeps the arguments and callbacks of the most recent request.
    fn install(&self, path: &str, prefab: &Prefab, waiters: Vec<PendingOpen>) {
        let Some(latest) = waiters.last() else {
            return;
        };

        let node = {
            let mut scene = self.0.context.scene.borrow_mut();
            let node = scene.instantiate(prefab);
            scene.set_marker(
                node,
                Some(ViewMarker {
                    layer: self.0.kind,
                    resource_path: path.to_string(),
                }),
            );
            if latest.config.safe_area {
                scene.apply_safe_area(node);
            }
            node
        };

        let sibling_index = latest.config.sibling_index;
        let view = ViewInstance {
            config: latest.config.clone(),
            args: latest.args.clone(),
            callbacks: latest.callbacks.clone(),
            valid: true,
            node,
        };
        self.0
            .state
            .borrow_mut()
            .cache
            .insert(path.to_string(), CacheSlot::Ready(view));
        self.attach(path, node, sibling_index);
        info!("Opened {path} in {}", self.0.kind);

        for waiter in &waiters {
            waiter.callbacks.added(node, &waiter.args);
        }
    }

    /// Puts a view node on top of the layer and moves the mask.
    fn attach(&self, path: &str, node: NodeHandle, sibling_index: Option<usize>) {
        {
            let mut scene = self.0.context.scene.borrow_mut();
            scene.add_child(self.0.node, node);
            if let Some(index) = sibling_index {
                scene.set_sibling_index(node, index);
            }
        }
        {
            let mut state = self.0.state.borrow_mut();
            state.display_order.retain(|displayed| displayed != path);
            state.display_order.push(path.to_string());
        }
        self.refresh_mask();
    }

    /// Puts the mask right below the topmost displayed view that asks for one.
    fn refresh_mask(&self) {
        if self.0.behavior == Behavior::Standard {
            return;
        }

        let mut state = self.0.state.borrow_mut();
        let masked = state.display_order.iter().rev().find_map(|path| {
            match state.cache.get(path) {
                Some(CacheSlot::Ready(view)) if view.valid && view.config.mask => Some(view.node),
                _ => None,
            }
        });

        let mut scene = self.0.context.scene.borrow_mut();
        match masked {
            Some(view_node) => {
                let mask = *state.mask.get_or_insert_with(|| scene.create_node("Mask"));
                scene.add_child(self.0.node, mask);
                let index = scene
                    .children(self.0.node)
                    .iter()
                    .position(|child| *child == view_node)
                    .unwrap_or(0);
                scene.set_sibling_index(mask, index);
            }
            None => {
                if let Some(mask) = state.mask {
                    scene.remove_from_parent(mask);
                }
            }
        }
    }

    /// Removes the view cached under `path`.
    ///
    /// A displayed view is detached. It is also evicted and freed when `destroy` says so, or,
    /// when `destroy` is `None`, when its config says so. A hidden view is only evicted. A load
    /// in flight is cancelled and every request waiting on it fails with
    /// [`GuiError::Cancelled`].
    pub fn remove(&self, path: &str, destroy: Option<bool>) {
        self.cancel_queued(|queued| queued == path);
        self.remove_entry(path, destroy, true);
    }

    /// Removes one cache entry. `hold_for_callbacks` lets `on_before_remove` delay the removal.
    fn remove_entry(&self, path: &str, destroy: Option<bool>, hold_for_callbacks: bool) {
        let state = self.0.state.borrow();
        match state.cache.get(path) {
            None => {
                drop(state);
                debug!("Nothing to remove at {path} in {}", self.0.kind);
            }
            Some(CacheSlot::Loading { .. }) => {
                drop(state);
                let waiters = match self.0.state.borrow_mut().cache.shift_remove(path) {
                    Some(CacheSlot::Loading { waiters, .. }) => waiters,
                    _ => return,
                };
                info!("Cancelled loading {path} in {}", self.0.kind);
                let error = CancelledCtx { path }.build();
                for waiter in &waiters {
                    waiter.callbacks.load_failed(&error);
                }
                self.schedule_next();
            }
            Some(CacheSlot::Ready(view)) => {
                let release = destroy.or(view.config.destroy_on_close).unwrap_or(false);
                let valid = view.valid;
                let node = view.node;
                let callbacks = view.callbacks.clone();
                drop(state);

                if !valid {
                    if release {
                        self.remove_cache(path);
                    }
                } else if hold_for_callbacks && callbacks.holds_removal() {
                    let container = self.downgrade();
                    let path = path.to_string();
                    callbacks.before_remove(
                        node,
                        RemoveContinuation::new(move || {
                            if let Some(container) = container.upgrade() {
                                container.complete_removal(&path, node, release);
                            }
                        }),
                    );
                } else {
                    self.complete_removal(path, node, release);
                }
            }
        }
    }

    /// Detaches a displayed view, evicting it when `release` is set.
    fn complete_removal(&self, path: &str, node: NodeHandle, release: bool) {
        let (callbacks, args) = {
            let mut state = self.0.state.borrow_mut();
            let Some(CacheSlot::Ready(view)) = state.cache.get_mut(path) else {
                return;
            };
            if view.node != node || !view.valid {
                return;
            }
            view.valid = false;
            let removed = (view.callbacks.clone(), view.args.clone());
            state.display_order.retain(|displayed| displayed != path);
            removed
        };

        self.0.context.scene.borrow_mut().remove_from_parent(node);
        self.refresh_mask();
        info!("Removed {path} from {}", self.0.kind);

        callbacks.removed(node, &args);
        if release {
            self.remove_cache(path);
        }
        self.schedule_next();
    }

    /// Evicts and frees a hidden view. Displayed views and loads in flight are left alone.
    pub(crate) fn remove_cache(&self, path: &str) -> bool {
        let view = {
            let mut state = self.0.state.borrow_mut();
            match state.cache.get(path) {
                Some(CacheSlot::Ready(view)) if !view.valid => {}
                _ => return false,
            }
            match state.cache.shift_remove(path) {
                Some(CacheSlot::Ready(view)) => view,
                _ => return false,
            }
        };

        {
            let mut scene = self.0.context.scene.borrow_mut();
            scene.set_marker(view.node, None);
            scene.destroy(view.node);
        }
        let bundle = self.bundle_of(&view.config);
        self.0.context.loader.release(&bundle, path);
        debug!("Evicted {path} from {}", self.0.kind);
        true
    }

    /// Removes every view of the layer and cancels every queued request.
    ///
    /// Removal callbacks that hold removals back are skipped.
    pub fn clear(&self, destroy: bool) {
        self.cancel_queued(|_| true);
        let paths: Vec<String> = self.0.state.borrow().cache.keys().cloned().collect();
        for path in paths {
            self.remove_entry(&path, Some(destroy), false);
        }
    }

    /// Closes the topmost displayed view if it closes on touches around it.
    pub(crate) fn touch_vacancy(&self) -> bool {
        let top = {
            let state = self.0.state.borrow();
            state
                .display_order
                .last()
                .and_then(|path| match state.cache.get(path) {
                    Some(CacheSlot::Ready(view)) if view.valid && view.config.vacancy => {
                        Some(path.clone())
                    }
                    _ => None,
                })
        };

        match top {
            Some(path) => {
                debug!("Vacancy touched, closing {path}");
                self.remove(&path, None);
                true
            }
            None => false,
        }
    }

    /// Fails every queued request whose path `matches`.
    fn cancel_queued(&self, matches: impl Fn(&str) -> bool) {
        let cancelled: VecDeque<PendingOpen> = {
            let mut state = self.0.state.borrow_mut();
            let (cancelled, kept): (VecDeque<_>, VecDeque<_>) = state
                .queue
                .drain(..)
                .partition(|queued| matches(queued.config.resource_path.as_str()));
            state.queue = kept;
            cancelled
        };

        for queued in cancelled {
            let error = CancelledCtx {
                path: queued.config.resource_path.as_str(),
            }
            .build();
            queued.callbacks.load_failed(&error);
        }
    }

    /// Opens the next queued dialog once the current one is gone.
    ///
    /// The request is deferred onto the runtime so that the removal that freed the layer
    /// finishes first.
    fn schedule_next(&self) {
        if self.0.behavior != Behavior::Dialog || self.0.state.borrow().queue.is_empty() {
            return;
        }

        let container = self.downgrade();
        self.0.context.runtime.spawn(async move {
            if let Some(container) = container.upgrade() {
                container.open_next_queued();
            }
        });
    }

    /// Shows the oldest queued request if nothing is active.
    fn open_next_queued(&self) {
        let next = {
            let mut state = self.0.state.borrow_mut();
            if state.cache.values().any(CacheSlot::is_active) {
                return;
            }
            state.queue.pop_front()
        };

        if let Some(pending) = next {
            self.show(pending);
        }
    }

    /// Fires the manager wide failure callback.
    fn report_open_failure(&self, error: &GuiError) {
        let hook = self.0.context.open_failure.borrow().clone();
        if let Some(hook) = hook {
            hook(error);
        }
    }

    /// Bundle the view loads from.
    fn bundle_of(&self, config: &ViewConfig) -> String {
        config
            .bundle
            .clone()
            .unwrap_or_else(|| self.0.context.default_bundle.clone())
    }
}

impl Debug for LayerContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.0.state.borrow();
        f.debug_struct("LayerContainer")
            .field("kind", &self.0.kind)
            .field("node", &self.0.node)
            .field("cached", &state.cache.keys().collect::<Vec<_>>())
            .field("queued", &state.queue.len())
            .finish()
    }
}
