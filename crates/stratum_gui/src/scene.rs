//! The display node boundary and an in-memory node tree.
//!
//! The layer manager never renders anything. It creates, attaches, detaches and destroys nodes
//! through [`SceneGraph`], which the host implements on top of its scene. [`MemoryScene`] is a
//! plain node arena that is enough for headless hosts and tests.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

use crate::config::LayerKind;
use crate::loader::Prefab;

/// Handle to a display node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(u64);

impl NodeHandle {
    /// Wraps a raw node id handed out by the host scene.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw node id.
    pub fn to_raw(self) -> u64 {
        self.0
    }
}

impl Display for NodeHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Marker attached to every node opened through the layer manager.
///
/// It maps a node back to the layer and cache entry that own it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewMarker {
    /// Layer whose container owns the view.
    pub layer: LayerKind,
    /// Cache key of the view inside that container.
    pub resource_path: String,
}

/// Node operations the layer manager needs from the host scene.
pub trait SceneGraph {
    /// Creates a detached, empty node.
    fn create_node(&mut self, name: &str) -> NodeHandle;

    /// Creates a detached node tree from a loaded prefab.
    fn instantiate(&mut self, prefab: &Prefab) -> NodeHandle;

    /// Appends `child` to `parent`, detaching it from its current parent first.
    fn add_child(&mut self, parent: NodeHandle, child: NodeHandle);

    /// Detaches a node from its parent. Does nothing for detached nodes.
    fn remove_from_parent(&mut self, node: NodeHandle);

    /// Detaches and frees a node and all of its children.
    fn destroy(&mut self, node: NodeHandle);

    /// Returns the parent of a node.
    fn parent(&self, node: NodeHandle) -> Option<NodeHandle>;

    /// Returns the children of a node in sibling order.
    fn children(&self, node: NodeHandle) -> Vec<NodeHandle>;

    /// Whether the node exists (has not been destroyed).
    fn is_alive(&self, node: NodeHandle) -> bool;

    /// Moves a node to `index` among its siblings. The index is clamped.
    fn set_sibling_index(&mut self, node: NodeHandle, index: usize);

    /// Attaches or clears the [`ViewMarker`] of a node.
    fn set_marker(&mut self, node: NodeHandle, marker: Option<ViewMarker>);

    /// Returns the [`ViewMarker`] of a node.
    fn marker(&self, node: NodeHandle) -> Option<ViewMarker>;

    /// Returns the first camera found below `root`.
    fn find_camera(&self, root: NodeHandle) -> Option<NodeHandle>;

    /// Adapts the node to the device safe area.
    fn apply_safe_area(&mut self, _node: NodeHandle) {}

    /// Sets the text of the label on a node.
    fn set_label(&mut self, _node: NodeHandle, _text: &str) {}
}

/// A scene graph shared between the layer manager and its containers.
pub type SharedScene = Rc<RefCell<dyn SceneGraph>>;

/// A node inside a [`MemoryScene`].
#[derive(Debug, Default)]
struct MemoryNode {
    /// Name given on creation.
    name: String,
    /// Parent, if attached.
    parent: Option<NodeHandle>,
    /// Children in sibling order.
    children: Vec<NodeHandle>,
    /// Set on view roots.
    marker: Option<ViewMarker>,
    /// Whether this node is a camera.
    camera: bool,
    /// Whether the safe area was applied.
    safe_area: bool,
    /// Text shown by the node.
    label: Option<String>,
}

/// A [`SceneGraph`] that keeps its nodes in a hash map.
#[derive(Debug, Default)]
pub struct MemoryScene {
    /// Live nodes.
    nodes: HashMap<NodeHandle, MemoryNode>,
    /// Last handed out id.
    next_id: u64,
}

impl MemoryScene {
    /// Creates an empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps the scene for sharing with a [`LayerManager`](crate::layer::LayerManager).
    pub fn shared(self) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(self))
    }

    /// Creates a camera node below `parent`.
    pub fn add_camera(&mut self, parent: NodeHandle) -> NodeHandle {
        let camera = self.create_node("Camera");
        if let Some(node) = self.nodes.get_mut(&camera) {
            node.camera = true;
        }
        self.add_child(parent, camera);
        camera
    }

    /// Returns the name of a node.
    pub fn name(&self, node: NodeHandle) -> Option<&str> {
        self.nodes.get(&node).map(|n| n.name.as_str())
    }

    /// Returns the label text set on a node.
    pub fn label(&self, node: NodeHandle) -> Option<&str> {
        self.nodes.get(&node).and_then(|n| n.label.as_deref())
    }

    /// Whether the safe area adaptation was applied to a node.
    pub fn has_safe_area(&self, node: NodeHandle) -> bool {
        self.nodes.get(&node).is_some_and(|n| n.safe_area)
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Unlinks `node` from its parent.
    fn detach(&mut self, node: NodeHandle) {
        let Some(parent) = self.nodes.get_mut(&node).and_then(|n| n.parent.take()) else {
            return;
        };
        if let Some(parent) = self.nodes.get_mut(&parent) {
            parent.children.retain(|child| *child != node);
        }
    }
}

impl SceneGraph for MemoryScene {
    fn create_node(&mut self, name: &str) -> NodeHandle {
        self.next_id += 1;
        let handle = NodeHandle(self.next_id);
        self.nodes.insert(
            handle,
            MemoryNode {
                name: name.to_string(),
                ..Default::default()
            },
        );
        handle
    }

    fn instantiate(&mut self, prefab: &Prefab) -> NodeHandle {
        self.create_node(prefab.name())
    }

    fn add_child(&mut self, parent: NodeHandle, child: NodeHandle) {
        if !self.nodes.contains_key(&parent) || !self.nodes.contains_key(&child) {
            return;
        }
        self.detach(child);
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = Some(parent);
        }
        if let Some(parent) = self.nodes.get_mut(&parent) {
            parent.children.push(child);
        }
    }

    fn remove_from_parent(&mut self, node: NodeHandle) {
        self.detach(node);
    }

    fn destroy(&mut self, node: NodeHandle) {
        self.detach(node);
        let mut pending = vec![node];
        while let Some(handle) = pending.pop() {
            if let Some(removed) = self.nodes.remove(&handle) {
                pending.extend(removed.children);
            }
        }
    }

    fn parent(&self, node: NodeHandle) -> Option<NodeHandle> {
        self.nodes.get(&node).and_then(|n| n.parent)
    }

    fn children(&self, node: NodeHandle) -> Vec<NodeHandle> {
        self.nodes
            .get(&node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    fn is_alive(&self, node: NodeHandle) -> bool {
        self.nodes.contains_key(&node)
    }

    fn set_sibling_index(&mut self, node: NodeHandle, index: usize) {
        let Some(parent) = self.parent(node) else {
            return;
        };
        if let Some(parent) = self.nodes.get_mut(&parent) {
            parent.children.retain(|child| *child != node);
            let index = index.min(parent.children.len());
            parent.children.insert(index, node);
        }
    }

    fn set_marker(&mut self, node: NodeHandle, marker: Option<ViewMarker>) {
        if let Some(node) = self.nodes.get_mut(&node) {
            node.marker = marker;
        }
    }

    fn marker(&self, node: NodeHandle) -> Option<ViewMarker> {
        self.nodes.get(&node).and_then(|n| n.marker.clone())
    }

    fn find_camera(&self, root: NodeHandle) -> Option<NodeHandle> {
        // Breadth first, like looking the camera up among the root's descendants
        let mut queue = std::collections::VecDeque::from(self.children(root));
        while let Some(handle) = queue.pop_front() {
            let node = self.nodes.get(&handle)?;
            if node.camera {
                return Some(handle);
            }
            queue.extend(node.children.iter().copied());
        }
        None
    }

    fn apply_safe_area(&mut self, node: NodeHandle) {
        if let Some(node) = self.nodes.get_mut(&node) {
            node.safe_area = true;
        }
    }

    fn set_label(&mut self, node: NodeHandle, text: &str) {
        if let Some(node) = self.nodes.get_mut(&node) {
            node.label = Some(text.to_string());
        }
    }
}
