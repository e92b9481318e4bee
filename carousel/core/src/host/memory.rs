//! In-Memory Document Host
//!
//! A self-contained [`DocumentHost`] backed by an in-process node arena.
//! Used by the daemon for headless operation and by every test in the
//! crate; a real deployment substitutes the design tool's own adapter.
//!
//! Raster export synthesizes a solid-color PNG of the scaled node size, so
//! preview payloads round-trip through real image encoding.

use std::collections::HashMap;

use async_trait::async_trait;
use dashmap::DashMap;
use image::{DynamicImage, Rgba, RgbaImage};
use parking_lot::Mutex;
use uuid::Uuid;

use super::traits::{DocumentHost, HostError, NodeId, NodeKind, Paint, Rect};

/// Default fill color for exported rasters of fill-less nodes.
const DEFAULT_RASTER_RGB: (u8, u8, u8) = (220, 220, 220);

#[derive(Clone, Debug)]
struct NodeRecord {
    kind: NodeKind,
    name: String,
    rect: Rect,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    tags: HashMap<String, String>,
    visible: bool,
    locked: bool,
    expanded: bool,
    opacity: f64,
    fill: Option<Paint>,
}

impl NodeRecord {
    fn new(kind: NodeKind, name: &str, rect: Rect, parent: Option<NodeId>) -> Self {
        Self {
            kind,
            name: name.to_string(),
            rect,
            parent,
            children: Vec::new(),
            tags: HashMap::new(),
            visible: true,
            locked: false,
            expanded: false,
            opacity: 1.0,
            fill: None,
        }
    }
}

/// In-memory document: a node arena plus selection and viewport state.
#[derive(Default)]
pub struct MemoryHost {
    nodes: DashMap<NodeId, NodeRecord>,
    roots: Mutex<Vec<NodeId>>,
    selection: Mutex<Vec<NodeId>>,
    viewport: Mutex<Vec<NodeId>>,
}

impl MemoryHost {
    /// Create an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id() -> NodeId {
        NodeId::new(format!("node-{}", Uuid::new_v4()))
    }

    fn with_node<T>(&self, id: &NodeId, f: impl FnOnce(&NodeRecord) -> T) -> Result<T, HostError> {
        self.nodes
            .get(id)
            .map(|record| f(&record))
            .ok_or_else(|| HostError::NodeNotFound(id.clone()))
    }

    fn with_node_mut<T>(
        &self,
        id: &NodeId,
        f: impl FnOnce(&mut NodeRecord) -> T,
    ) -> Result<T, HostError> {
        self.nodes
            .get_mut(id)
            .map(|mut record| f(&mut record))
            .ok_or_else(|| HostError::NodeNotFound(id.clone()))
    }

    fn insert_node(&self, parent: Option<&NodeId>, record: NodeRecord) -> Result<NodeId, HostError> {
        if let Some(parent_id) = parent {
            if !self.nodes.contains_key(parent_id) {
                return Err(HostError::NodeNotFound(parent_id.clone()));
            }
        }

        let id = Self::next_id();
        self.nodes.insert(id.clone(), record);

        match parent {
            Some(parent_id) => {
                self.with_node_mut(parent_id, |p| p.children.push(id.clone()))?;
            }
            None => self.roots.lock().push(id.clone()),
        }
        Ok(id)
    }

    /// All node ids the given node transitively contains, the node included.
    fn subtree(&self, id: &NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut queue = vec![id.clone()];
        while let Some(current) = queue.pop() {
            if let Some(record) = self.nodes.get(&current) {
                queue.extend(record.children.iter().cloned());
            }
            out.push(current);
        }
        out
    }

    /// Nodes the viewport was last scrolled to (test observability).
    #[must_use]
    pub fn viewport_targets(&self) -> Vec<NodeId> {
        self.viewport.lock().clone()
    }

    /// Number of nodes in the document (test observability).
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

#[async_trait]
impl DocumentHost for MemoryHost {
    async fn selection(&self) -> Vec<NodeId> {
        self.selection.lock().clone()
    }

    async fn set_selection(&self, nodes: &[NodeId]) -> Result<(), HostError> {
        for id in nodes {
            if !self.nodes.contains_key(id) {
                return Err(HostError::NodeNotFound(id.clone()));
            }
        }
        *self.selection.lock() = nodes.to_vec();
        Ok(())
    }

    async fn scroll_into_view(&self, nodes: &[NodeId]) -> Result<(), HostError> {
        *self.viewport.lock() = nodes.to_vec();
        Ok(())
    }

    async fn node_exists(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    async fn node_kind(&self, id: &NodeId) -> Result<NodeKind, HostError> {
        self.with_node(id, |n| n.kind)
    }

    async fn node_name(&self, id: &NodeId) -> Result<String, HostError> {
        self.with_node(id, |n| n.name.clone())
    }

    async fn rect(&self, id: &NodeId) -> Result<Rect, HostError> {
        self.with_node(id, |n| n.rect)
    }

    async fn resize(&self, id: &NodeId, width: f64, height: f64) -> Result<(), HostError> {
        self.with_node_mut(id, |n| {
            n.rect.width = width.max(0.0);
            n.rect.height = height.max(0.0);
        })
    }

    async fn children(&self, id: &NodeId) -> Result<Vec<NodeId>, HostError> {
        self.with_node(id, |n| n.children.clone())
    }

    async fn remove(&self, id: &NodeId) -> Result<(), HostError> {
        if !self.nodes.contains_key(id) {
            return Err(HostError::NodeNotFound(id.clone()));
        }

        let parent = self.with_node(id, |n| n.parent.clone())?;
        for member in self.subtree(id) {
            self.nodes.remove(&member);
            self.selection.lock().retain(|n| n != &member);
        }

        match parent {
            Some(parent_id) => {
                // Parent may be mid-removal itself; a missing parent is fine here.
                let _ = self.with_node_mut(&parent_id, |p| p.children.retain(|c| c != id));
            }
            None => self.roots.lock().retain(|r| r != id),
        }
        Ok(())
    }

    async fn tag(&self, id: &NodeId, key: &str) -> Result<Option<String>, HostError> {
        self.with_node(id, |n| n.tags.get(key).cloned())
    }

    async fn set_tag(&self, id: &NodeId, key: &str, value: &str) -> Result<(), HostError> {
        self.with_node_mut(id, |n| {
            n.tags.insert(key.to_string(), value.to_string());
        })
    }

    async fn is_visible(&self, id: &NodeId) -> Result<bool, HostError> {
        self.with_node(id, |n| n.visible)
    }

    async fn set_visible(&self, id: &NodeId, visible: bool) -> Result<(), HostError> {
        self.with_node_mut(id, |n| n.visible = visible)
    }

    async fn opacity(&self, id: &NodeId) -> Result<f64, HostError> {
        self.with_node(id, |n| n.opacity)
    }

    async fn set_locked(&self, id: &NodeId, locked: bool) -> Result<(), HostError> {
        self.with_node_mut(id, |n| n.locked = locked)
    }

    async fn set_expanded(&self, id: &NodeId, expanded: bool) -> Result<(), HostError> {
        self.with_node_mut(id, |n| n.expanded = expanded)
    }

    async fn create_frame(
        &self,
        parent: Option<&NodeId>,
        name: &str,
        rect: Rect,
    ) -> Result<NodeId, HostError> {
        self.insert_node(
            parent,
            NodeRecord::new(NodeKind::Frame, name, rect, parent.cloned()),
        )
    }

    async fn create_rect(
        &self,
        parent: &NodeId,
        name: &str,
        rect: Rect,
        paint: Paint,
    ) -> Result<NodeId, HostError> {
        let mut record = NodeRecord::new(NodeKind::Rectangle, name, rect, Some(parent.clone()));
        record.opacity = paint.opacity.clamp(0.0, 1.0);
        record.fill = Some(paint);
        self.insert_node(Some(parent), record)
    }

    async fn create_text(
        &self,
        parent: &NodeId,
        name: &str,
        content: &str,
        center: (f64, f64),
        font_size: f64,
    ) -> Result<NodeId, HostError> {
        // Rough glyph box; the memory host does not shape text.
        let width = (content.chars().count() as f64) * font_size * 0.6;
        let height = font_size * 1.2;
        let rect = Rect::new(center.0 - width / 2.0, center.1 - height / 2.0, width, height);
        let mut record = NodeRecord::new(NodeKind::Text, name, rect, Some(parent.clone()));
        record.tags.insert("text".to_string(), content.to_string());
        self.insert_node(Some(parent), record)
    }

    async fn clear_fills(&self, id: &NodeId) -> Result<(), HostError> {
        self.with_node_mut(id, |n| n.fill = None)
    }

    async fn export_raster(&self, id: &NodeId, scale: f64) -> Result<Vec<u8>, HostError> {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(HostError::ExportFailed(format!("invalid scale {scale}")));
        }

        let (rect, fill) = self.with_node(id, |n| (n.rect, n.fill))?;
        let width = (rect.width * scale).round().max(1.0) as u32;
        let height = (rect.height * scale).round().max(1.0) as u32;
        let rgb = fill.map_or(DEFAULT_RASTER_RGB, |p| p.rgb);

        let pixel = Rgba([rgb.0, rgb.1, rgb.2, 255]);
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, pixel));
        let mut bytes = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .map_err(|e| HostError::ExportFailed(e.to_string()))?;
        Ok(bytes)
    }
}
