//! Document Host Abstraction
//!
//! Trait definition for the host design tool's document model. The engine
//! never touches document, selection, or viewport state directly; it all
//! flows through [`DocumentHost`], so the core stays testable without a
//! live design tool and a new host integration only implements this trait.
//!
//! # Coordinate conventions
//!
//! Child node rects are relative to their parent; top-level node rects
//! (parent `None`) are absolute document coordinates. Export regions are
//! always created top-level at absolute coordinates.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque identifier of a node in the host document.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    /// Wrap a host-provided identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The closed set of node kinds the host document exposes.
///
/// Roles like "carousel" or "guidance" are expressed through tags and
/// structural predicates, never through new kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    /// A frame/artboard container.
    Frame,
    /// A rectangle shape.
    Rectangle,
    /// A line shape.
    Line,
    /// A text node.
    Text,
    /// A plain group.
    Group,
    /// Anything else the host knows about.
    Other,
}

/// Axis-aligned node bounds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width, non-negative.
    pub width: f64,
    /// Height, non-negative.
    pub height: f64,
}

impl Rect {
    /// Construct a rect from position and size.
    #[must_use]
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Solid fill description for created shapes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Paint {
    /// RGB color components.
    pub rgb: (u8, u8, u8),
    /// Opacity in `0.0..=1.0`.
    pub opacity: f64,
}

/// Errors surfaced by host document calls.
#[derive(Debug, Error)]
pub enum HostError {
    /// The node does not exist (deleted, or the reference went stale).
    #[error("node {0} not found")]
    NodeNotFound(NodeId),

    /// The node exists but the requested property could not be read/written.
    #[error("property '{property}' unavailable on node {node}")]
    PropertyUnavailable {
        /// Node the access targeted.
        node: NodeId,
        /// Property name.
        property: &'static str,
    },

    /// Raster export failed in the host.
    #[error("raster export failed: {0}")]
    ExportFailed(String),

    /// The document is gone entirely.
    #[error("document closed")]
    DocumentClosed,
}

/// The host design tool's document, selection, viewport, and raster APIs.
///
/// Implement this trait to run the engine inside a real design tool. The
/// crate ships [`super::MemoryHost`] for headless operation and tests.
#[async_trait]
pub trait DocumentHost: Send + Sync {
    /// Currently selected nodes, in selection order.
    async fn selection(&self) -> Vec<NodeId>;

    /// Replace the current selection.
    async fn set_selection(&self, nodes: &[NodeId]) -> Result<(), HostError>;

    /// Scroll and zoom the viewport so the nodes are in view.
    async fn scroll_into_view(&self, nodes: &[NodeId]) -> Result<(), HostError>;

    /// Whether a node with this identity currently exists.
    async fn node_exists(&self, id: &NodeId) -> bool;

    /// Kind of the node.
    async fn node_kind(&self, id: &NodeId) -> Result<NodeKind, HostError>;

    /// User-editable node name.
    async fn node_name(&self, id: &NodeId) -> Result<String, HostError>;

    /// Node bounds. Relative to the parent for child nodes.
    async fn rect(&self, id: &NodeId) -> Result<Rect, HostError>;

    /// Resize a node in place.
    async fn resize(&self, id: &NodeId, width: f64, height: f64) -> Result<(), HostError>;

    /// Direct children, in document order.
    async fn children(&self, id: &NodeId) -> Result<Vec<NodeId>, HostError>;

    /// Remove a node and its subtree.
    async fn remove(&self, id: &NodeId) -> Result<(), HostError>;

    /// Read a persistent key-value tag. `None` when the key was never set.
    async fn tag(&self, id: &NodeId, key: &str) -> Result<Option<String>, HostError>;

    /// Write a persistent key-value tag.
    async fn set_tag(&self, id: &NodeId, key: &str, value: &str) -> Result<(), HostError>;

    /// Node visibility flag (the node's own flag, not inherited).
    async fn is_visible(&self, id: &NodeId) -> Result<bool, HostError>;

    /// Set node visibility.
    async fn set_visible(&self, id: &NodeId, visible: bool) -> Result<(), HostError>;

    /// Node opacity in `0.0..=1.0`.
    async fn opacity(&self, id: &NodeId) -> Result<f64, HostError>;

    /// Lock or unlock a node against edits.
    async fn set_locked(&self, id: &NodeId, locked: bool) -> Result<(), HostError>;

    /// Expand or collapse the node in the layer outline.
    async fn set_expanded(&self, id: &NodeId, expanded: bool) -> Result<(), HostError>;

    /// Create a frame. `parent: None` creates a top-level frame at absolute
    /// coordinates.
    async fn create_frame(
        &self,
        parent: Option<&NodeId>,
        name: &str,
        rect: Rect,
    ) -> Result<NodeId, HostError>;

    /// Create a filled rectangle inside a parent.
    async fn create_rect(
        &self,
        parent: &NodeId,
        name: &str,
        rect: Rect,
        paint: Paint,
    ) -> Result<NodeId, HostError>;

    /// Create a text node centered at `center` inside a parent.
    async fn create_text(
        &self,
        parent: &NodeId,
        name: &str,
        content: &str,
        center: (f64, f64),
        font_size: f64,
    ) -> Result<NodeId, HostError>;

    /// Remove all fills from a node (transparent background).
    async fn clear_fills(&self, id: &NodeId) -> Result<(), HostError>;

    /// Export the node as a PNG raster at the given scale.
    async fn export_raster(&self, id: &NodeId, scale: f64) -> Result<Vec<u8>, HostError>;
}
