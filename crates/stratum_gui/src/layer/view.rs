//! Runtime records of opened views and the callbacks attached to them.

use std::any::Any;
use std::fmt::Debug;
use std::rc::Rc;

use crate::config::ViewConfig;
use crate::error::GuiError;
use crate::scene::NodeHandle;

/// Arguments handed to a view when it is opened.
///
/// Cloning is cheap; the value itself is shared.
#[derive(Clone, Default)]
pub struct ViewArgs(Option<Rc<dyn Any>>);

impl ViewArgs {
    /// No arguments.
    pub fn none() -> Self {
        Self(None)
    }

    /// Wraps a value.
    pub fn new<T: Any>(value: T) -> Self {
        Self(Some(Rc::new(value)))
    }

    /// Whether there are no arguments.
    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }

    /// Returns the value if it is a `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.as_deref().and_then(|value| value.downcast_ref())
    }
}

impl Debug for ViewArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(_) => f.write_str("ViewArgs(..)"),
            None => f.write_str("ViewArgs(None)"),
        }
    }
}

/// Finishes a removal that was held back by [`UiCallbacks::on_before_remove`].
pub struct RemoveContinuation(Box<dyn FnOnce()>);

impl RemoveContinuation {
    /// Wraps the rest of a removal.
    pub(crate) fn new(proceed: impl FnOnce() + 'static) -> Self {
        Self(Box::new(proceed))
    }

    /// Detaches the view (and frees it if the removal asked for that).
    pub fn proceed(self) {
        (self.0)()
    }
}

impl Debug for RemoveContinuation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RemoveContinuation")
    }
}

/// Callbacks attached to a single open request.
///
/// # Examples
/// ```
/// use stratum_gui::UiCallbacks;
///
/// let callbacks = UiCallbacks::new()
///     .on_added(|node, _args| println!("view {node} is on screen"))
///     .on_load_failure(|error| eprintln!("{error}"));
/// ```
#[derive(Default)]
pub struct UiCallbacks {
    /// See [`on_added`](Self::on_added).
    added: Option<Box<dyn Fn(NodeHandle, &ViewArgs)>>,
    /// See [`on_removed`](Self::on_removed).
    removed: Option<Box<dyn Fn(NodeHandle, &ViewArgs)>>,
    /// See [`on_before_remove`](Self::on_before_remove).
    before_remove: Option<Box<dyn Fn(NodeHandle, RemoveContinuation)>>,
    /// See [`on_load_failure`](Self::on_load_failure).
    load_failure: Option<Box<dyn Fn(&GuiError)>>,
}

impl UiCallbacks {
    /// Callbacks that do nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Called once the view node has been attached to its layer.
    pub fn on_added(mut self, callback: impl Fn(NodeHandle, &ViewArgs) + 'static) -> Self {
        self.added = Some(Box::new(callback));
        self
    }

    /// Called after the view node has been detached from its layer.
    pub fn on_removed(mut self, callback: impl Fn(NodeHandle, &ViewArgs) + 'static) -> Self {
        self.removed = Some(Box::new(callback));
        self
    }

    /// Called before the view is detached. The view stays on screen until the continuation is
    /// invoked, which leaves room for exit animations.
    pub fn on_before_remove(
        mut self,
        callback: impl Fn(NodeHandle, RemoveContinuation) + 'static,
    ) -> Self {
        self.before_remove = Some(Box::new(callback));
        self
    }

    /// Called when the view could not be opened.
    pub fn on_load_failure(mut self, callback: impl Fn(&GuiError) + 'static) -> Self {
        self.load_failure = Some(Box::new(callback));
        self
    }

    /// Fires `on_added`.
    pub(crate) fn added(&self, node: NodeHandle, args: &ViewArgs) {
        if let Some(callback) = &self.added {
            callback(node, args);
        }
    }

    /// Fires `on_removed`.
    pub(crate) fn removed(&self, node: NodeHandle, args: &ViewArgs) {
        if let Some(callback) = &self.removed {
            callback(node, args);
        }
    }

    /// Whether removals wait for `on_before_remove` to continue them.
    pub(crate) fn holds_removal(&self) -> bool {
        self.before_remove.is_some()
    }

    /// Fires `on_before_remove`, or continues right away without one.
    pub(crate) fn before_remove(&self, node: NodeHandle, continuation: RemoveContinuation) {
        match &self.before_remove {
            Some(callback) => callback(node, continuation),
            None => continuation.proceed(),
        }
    }

    /// Fires `on_load_failure`.
    pub(crate) fn load_failed(&self, error: &GuiError) {
        if let Some(callback) = &self.load_failure {
            callback(error);
        }
    }
}

impl Debug for UiCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UiCallbacks")
            .field("added", &self.added.is_some())
            .field("removed", &self.removed.is_some())
            .field("before_remove", &self.before_remove.is_some())
            .field("load_failure", &self.load_failure.is_some())
            .finish()
    }
}

/// An open request that has not produced a view yet.
#[derive(Debug, Clone)]
pub(crate) struct PendingOpen {
    /// Config the request was routed with.
    pub(crate) config: ViewConfig,
    /// Arguments handed to the view.
    pub(crate) args: ViewArgs,
    /// Callbacks of the request.
    pub(crate) callbacks: Rc<UiCallbacks>,
}

impl PendingOpen {
    /// Creates a request.
    pub(crate) fn new(config: ViewConfig, args: ViewArgs, callbacks: UiCallbacks) -> Self {
        Self {
            config,
            args,
            callbacks: Rc::new(callbacks),
        }
    }
}

/// A loaded view owned by its layer container.
///
/// `valid` is true while the view is on screen. An invalid instance has been removed but is kept
/// around so that opening it again needs no load.
#[derive(Debug)]
pub struct ViewInstance {
    /// Config of the latest open.
    pub(crate) config: ViewConfig,
    /// Arguments of the latest open.
    pub(crate) args: ViewArgs,
    /// Callbacks of the latest open.
    pub(crate) callbacks: Rc<UiCallbacks>,
    /// Whether the view is on screen.
    pub(crate) valid: bool,
    /// Root node of the view.
    pub(crate) node: NodeHandle,
}

impl ViewInstance {
    /// The config the view was last opened with.
    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    /// The arguments the view was last opened with.
    pub fn args(&self) -> &ViewArgs {
        &self.args
    }

    /// Whether the view is on screen.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// The view's root node.
    pub fn node(&self) -> NodeHandle {
        self.node
    }
}

/// A cache entry of a layer container.
#[derive(Debug)]
pub(crate) enum CacheSlot {
    /// The prefab is being loaded. Every request that arrives meanwhile waits here.
    Loading {
        /// Distinguishes this load from earlier loads of the same path that were cancelled.
        ticket: u64,
        /// Requests served once the load finishes.
        waiters: Vec<PendingOpen>,
    },
    /// The view is loaded.
    Ready(ViewInstance),
}

impl CacheSlot {
    /// Whether the entry is loading or on screen.
    pub(crate) fn is_active(&self) -> bool {
        match self {
            CacheSlot::Loading { .. } => true,
            CacheSlot::Ready(view) => view.valid,
        }
    }
}
