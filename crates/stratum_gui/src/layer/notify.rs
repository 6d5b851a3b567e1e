//! Toasts and the wait indicator of the Notify layer.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::{debug, warn};

use crate::layer::container::ContainerContext;
use crate::loader::Prefab;
use crate::scene::NodeHandle;
use crate::settings::NotifySettings;

/// State of the toast prefab.
enum PrefabSlot {
    /// Not requested yet.
    Missing,
    /// Toast texts waiting for the prefab.
    Loading(Vec<String>),
    /// Loaded and instantiated for every toast.
    Ready(Prefab),
}

/// A toast on screen.
struct Toast {
    /// Instantiated toast prefab.
    node: NodeHandle,
    /// Seconds left on screen.
    remaining: f32,
}

/// Mutable part of the notify center.
struct NotifyState {
    /// Loaded once, on the first toast.
    toast_prefab: PrefabSlot,
    /// Toasts on screen, oldest first.
    toasts: Vec<Toast>,
    /// The wait indicator once loaded.
    wait_node: Option<NodeHandle>,
    /// Whether the wait prefab is being loaded.
    wait_loading: bool,
    /// Whether the indicator should be on screen.
    wait_wanted: bool,
}

/// Shared by every handle of the notify center.
struct NotifyInner {
    /// The Notify layer node.
    layer: NodeHandle,
    /// Prefabs and toast duration.
    settings: NotifySettings,
    /// Loader, scene and runtime.
    context: ContainerContext,
    /// Toasts and wait indicator.
    state: RefCell<NotifyState>,
}

/// Shows short lived messages and a wait indicator on top of the Notify layer.
#[derive(Clone)]
pub(crate) struct NotifyCenter(Rc<NotifyInner>);

impl NotifyCenter {
    /// Creates a notify center on the Notify layer node `layer`.
    pub(crate) fn new(layer: NodeHandle, settings: NotifySettings, context: ContainerContext) -> Self {
        Self(Rc::new(NotifyInner {
            layer,
            settings,
            context,
            state: RefCell::new(NotifyState {
                toast_prefab: PrefabSlot::Missing,
                toasts: Vec::new(),
                wait_node: None,
                wait_loading: false,
                wait_wanted: false,
            }),
        }))
    }

    /// Handle for spawned loads.
    fn downgrade(&self) -> Weak<NotifyInner> {
        Rc::downgrade(&self.0)
    }

    /// Shows `text`, loading the toast prefab first if needed.
    pub(crate) fn toast(&self, text: String) {
        let mut state = self.0.state.borrow_mut();
        let prefab = match &mut state.toast_prefab {
            PrefabSlot::Ready(prefab) => Some(prefab.clone()),
            PrefabSlot::Loading(pending) => {
                pending.push(text);
                return;
            }
            PrefabSlot::Missing => None,
        };

        match prefab {
            Some(prefab) => {
                drop(state);
                self.show_toast(&prefab, &text);
            }
            None => {
                state.toast_prefab = PrefabSlot::Loading(vec![text]);
                drop(state);
                self.load_toast_prefab();
            }
        }
    }

    /// Loads the toast prefab, then shows every toast that waited for it.
    fn load_toast_prefab(&self) {
        let path = self.0.settings.toast_prefab.clone();
        let load = self.0.context.loader.load(&self.0.context.default_bundle, &path);
        let notify = self.downgrade();

        self.0.context.runtime.spawn(async move {
            let result = load.await;
            let Some(notify) = notify.upgrade().map(NotifyCenter) else {
                return;
            };

            let pending = {
                let mut state = notify.0.state.borrow_mut();
                let pending = match std::mem::replace(&mut state.toast_prefab, PrefabSlot::Missing) {
                    PrefabSlot::Loading(pending) => pending,
                    other => {
                        state.toast_prefab = other;
                        return;
                    }
                };
                match &result {
                    Ok(prefab) => state.toast_prefab = PrefabSlot::Ready(prefab.clone()),
                    Err(e) => {
                        warn!("Failed to load toast prefab {path}: {e}");
                        return;
                    }
                }
                pending
            };

            if let Ok(prefab) = result {
                for text in pending {
                    notify.show_toast(&prefab, &text);
                }
            }
        });
    }

    /// Instantiates a toast on top of the layer.
    fn show_toast(&self, prefab: &Prefab, text: &str) {
        let node = {
            let mut scene = self.0.context.scene.borrow_mut();
            let node = scene.instantiate(prefab);
            scene.set_label(node, text);
            scene.add_child(self.0.layer, node);
            node
        };
        debug!("Toast {node}: {text}");

        self.0.state.borrow_mut().toasts.push(Toast {
            node,
            remaining: self.0.settings.toast_seconds,
        });
    }

    /// Ages every toast by `dt` seconds and destroys the ones that ran out.
    pub(crate) fn update(&self, dt: f32) {
        let expired: Vec<NodeHandle> = {
            let mut state = self.0.state.borrow_mut();
            for toast in &mut state.toasts {
                toast.remaining -= dt;
            }
            let (expired, alive) = state
                .toasts
                .drain(..)
                .partition::<Vec<_>, _>(|toast| toast.remaining <= 0.0);
            state.toasts = alive;
            expired.into_iter().map(|toast| toast.node).collect()
        };

        if expired.is_empty() {
            return;
        }
        let mut scene = self.0.context.scene.borrow_mut();
        for node in expired {
            scene.destroy(node);
        }
    }

    /// Toasts on screen plus toasts waiting for the prefab.
    pub(crate) fn toast_count(&self) -> usize {
        let state = self.0.state.borrow();
        let pending = match &state.toast_prefab {
            PrefabSlot::Loading(pending) => pending.len(),
            _ => 0,
        };
        state.toasts.len() + pending
    }

    /// Shows the wait indicator, loading it on first use.
    pub(crate) fn wait_open(&self) {
        let mut state = self.0.state.borrow_mut();
        state.wait_wanted = true;

        if let Some(node) = state.wait_node {
            drop(state);
            self.0.context.scene.borrow_mut().add_child(self.0.layer, node);
            return;
        }
        if state.wait_loading {
            return;
        }
        state.wait_loading = true;
        drop(state);

        let path = self.0.settings.wait_prefab.clone();
        let load = self.0.context.loader.load(&self.0.context.default_bundle, &path);
        let notify = self.downgrade();

        self.0.context.runtime.spawn(async move {
            let result = load.await;
            let Some(notify) = notify.upgrade().map(NotifyCenter) else {
                return;
            };
            notify.0.state.borrow_mut().wait_loading = false;

            match result {
                Ok(prefab) => notify.install_wait(&prefab),
                Err(e) => warn!("Failed to load wait indicator {path}: {e}"),
            }
        });
    }

    /// Instantiates the wait indicator, attached only if still wanted.
    fn install_wait(&self, prefab: &Prefab) {
        let wanted = self.0.state.borrow().wait_wanted;
        let node = {
            let mut scene = self.0.context.scene.borrow_mut();
            let node = scene.instantiate(prefab);
            if wanted {
                scene.add_child(self.0.layer, node);
            }
            node
        };
        self.0.state.borrow_mut().wait_node = Some(node);
    }

    /// Hides the wait indicator.
    pub(crate) fn wait_close(&self) {
        let node = {
            let mut state = self.0.state.borrow_mut();
            state.wait_wanted = false;
            state.wait_node
        };

        if let Some(node) = node {
            self.0.context.scene.borrow_mut().remove_from_parent(node);
        }
    }

    /// Whether the wait indicator is on screen.
    pub(crate) fn is_waiting(&self) -> bool {
        let Some(node) = self.0.state.borrow().wait_node else {
            return false;
        };
        self.0.context.scene.borrow().parent(node) == Some(self.0.layer)
    }
}
