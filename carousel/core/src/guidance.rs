//! Guidance Layer Manager
//!
//! Owns the non-exported overlay inside a carousel frame: boundary markers
//! at every slide seam, centered slide-number labels, and a warning label
//! over a partial-slide remainder. The overlay is rebuilt as a unit
//! whenever geometry changes and is identified by tag, never by name,
//! since names are user-editable.
//!
//! Also owns the suppress/restore discipline used by the preview and
//! export pipelines: guidance (and guide-lookalike) nodes are hidden for
//! the duration of a render and then restored, with guidance-tagged nodes
//! forced visible regardless of their prior state. Guidance must never
//! remain hidden once suppression ends.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::catalog::ResolutionPreset;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::geometry::SlideGeometry;
use crate::host::{DocumentHost, NodeId, NodeKind, Paint, Rect};
use crate::metadata::{CarouselMetadataStore, TAG_GUIDANCE_LAYER};

/// Thickness of a boundary marker in pixels.
const MARKER_THICKNESS: f64 = 2.0;
/// Marker translucency; also what makes markers match the guide heuristic.
const MARKER_OPACITY: f64 = 0.6;
/// Marker color.
const MARKER_RGB: (u8, u8, u8) = (255, 64, 129);
/// Font size for slide-number labels.
const LABEL_FONT_SIZE: f64 = 48.0;
/// Font size for the partial-slide warning.
const WARNING_FONT_SIZE: f64 = 24.0;
/// Name fragments that mark a node as guide-like even without the tag.
const GUIDE_NAME_HINTS: [&str; 4] = ["guide", "grid", "line", "slide-boundary"];
/// A shape this thin (in either dimension) with reduced opacity is treated
/// as a guide lookalike.
const GUIDE_MAX_THICKNESS: f64 = 4.0;

/// Recorded visibility of one node hidden by a suppression pass.
#[derive(Clone, Debug)]
struct SuppressedNode {
    node: NodeId,
    was_visible: bool,
    is_guidance: bool,
}

/// Visibility state captured by [`GuidanceLayerManager::suppress`].
///
/// Consumed by [`GuidanceLayerManager::restore`]; a record cannot be
/// restored twice. Not reentrant: taking a second suppression of the same
/// frame before restoring the first would record already-hidden nodes as
/// "originally hidden". The engine's per-frame operation guard prevents
/// that.
#[must_use = "suppressed guidance stays hidden until restored"]
#[derive(Debug)]
pub struct GuidanceSuppression {
    records: Vec<SuppressedNode>,
}

impl GuidanceSuppression {
    /// Number of nodes this suppression hid.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the suppression hid nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Creates, locates, and rebuilds guidance overlays.
pub struct GuidanceLayerManager<H> {
    host: Arc<H>,
    metadata: CarouselMetadataStore<H>,
    config: EngineConfig,
}

impl<H: DocumentHost + 'static> GuidanceLayerManager<H> {
    /// Create a manager over the given host.
    pub fn new(host: Arc<H>, config: EngineConfig) -> Self {
        let metadata = CarouselMetadataStore::new(Arc::clone(&host));
        Self {
            host,
            metadata,
            config,
        }
    }

    /// Remove every existing guidance overlay in the frame and build a
    /// fresh one for the given geometry. Returns the new overlay container.
    pub async fn rebuild(
        &self,
        frame: &NodeId,
        preset: &ResolutionPreset,
        geometry: &SlideGeometry,
    ) -> Result<NodeId, EngineError> {
        self.remove_existing(frame).await?;

        let frame_rect = self.host.rect(frame).await?;
        let slide_width = f64::from(preset.width);

        let overlay = self
            .host
            .create_frame(
                Some(frame),
                "Slide Guides",
                Rect::new(0.0, 0.0, frame_rect.width, frame_rect.height),
            )
            .await?;
        self.host.clear_fills(&overlay).await?;
        self.metadata.mark_guidance(&overlay).await?;
        self.host.set_locked(&overlay, true).await?;
        self.host.set_expanded(&overlay, true).await?;

        // Internal seams, plus the final full-slide seam when a remainder
        // exists.
        let seam_count =
            geometry.slide_count.saturating_sub(1) + u32::from(geometry.has_partial_slide);
        for seam in 1..=seam_count {
            let marker_rect = Rect::new(
                slide_width * f64::from(seam) - MARKER_THICKNESS / 2.0,
                0.0,
                MARKER_THICKNESS,
                frame_rect.height,
            );
            let marker = self
                .host
                .create_rect(
                    &overlay,
                    &format!("Slide boundary {seam}"),
                    marker_rect,
                    Paint {
                        rgb: MARKER_RGB,
                        opacity: MARKER_OPACITY,
                    },
                )
                .await?;
            self.metadata.mark_guidance(&marker).await?;
        }

        for slide in 0..geometry.slide_count {
            let number = slide + 1;
            let center = (
                slide_width * f64::from(slide) + slide_width / 2.0,
                frame_rect.height / 2.0,
            );
            let label = self
                .host
                .create_text(
                    &overlay,
                    &format!("Slide label {number}"),
                    &number.to_string(),
                    center,
                    LABEL_FONT_SIZE,
                )
                .await?;
            self.metadata.mark_guidance(&label).await?;
        }

        if geometry.has_partial_slide {
            let center = (
                slide_width * f64::from(geometry.slide_count)
                    + f64::from(geometry.remainder_width) / 2.0,
                frame_rect.height / 2.0,
            );
            let warning = self
                .host
                .create_text(
                    &overlay,
                    "Partial slide warning",
                    &format!("Partial slide: {}px", geometry.remainder_width),
                    center,
                    WARNING_FONT_SIZE,
                )
                .await?;
            self.metadata.mark_guidance(&warning).await?;
        }

        // First visibility pass right after attach; the host has been seen
        // resetting inherited visibility asynchronously, so two more passes
        // run on the configured delay schedule.
        Self::heal_visibility(&self.host, frame).await;
        self.schedule_visibility_heal(frame.clone());

        Ok(overlay)
    }

    /// Re-assert `visible = true` on every guidance-tagged node in the
    /// frame's subtree after each configured delay. No-op when the
    /// schedule is empty.
    fn schedule_visibility_heal(&self, frame: NodeId) {
        if self.config.visibility_heal_delays_ms.is_empty() {
            return;
        }
        let host = Arc::clone(&self.host);
        let delays = self.config.visibility_heal_delays_ms.clone();
        tokio::spawn(async move {
            for delay_ms in delays {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Self::heal_visibility(&host, &frame).await;
            }
        });
    }

    /// One idempotent visibility pass: force every guidance-tagged node in
    /// the subtree visible. Per-node failures are swallowed.
    async fn heal_visibility(host: &H, frame: &NodeId) {
        for node in Self::descendants(host, frame).await {
            let tagged = matches!(
                host.tag(&node, TAG_GUIDANCE_LAYER).await,
                Ok(Some(v)) if v == "true"
            );
            if !tagged {
                continue;
            }
            if let Err(e) = host.set_visible(&node, true).await {
                debug!(node = %node, error = %e, "visibility heal skipped node");
            }
        }
    }

    /// Hide every guidance-tagged node and every heuristically guide-like
    /// node in the frame for the duration of a render.
    pub async fn suppress(&self, frame: &NodeId) -> Result<GuidanceSuppression, EngineError> {
        self.suppress_inner(frame, true).await
    }

    /// Export variant: hide guidance-tagged nodes only, no heuristics.
    pub async fn suppress_tagged_only(
        &self,
        frame: &NodeId,
    ) -> Result<GuidanceSuppression, EngineError> {
        self.suppress_inner(frame, false).await
    }

    async fn suppress_inner(
        &self,
        frame: &NodeId,
        heuristics: bool,
    ) -> Result<GuidanceSuppression, EngineError> {
        // The frame itself must exist; everything below degrades per node.
        self.host.rect(frame).await?;

        let mut records = Vec::new();
        for node in Self::descendants(&self.host, frame).await {
            let is_guidance = self.metadata.is_guidance(&node).await;
            let guide_like = !is_guidance && heuristics && self.looks_like_guide(&node).await;
            if !is_guidance && !guide_like {
                continue;
            }

            let was_visible = match self.host.is_visible(&node).await {
                Ok(v) => v,
                Err(e) => {
                    debug!(node = %node, error = %e, "unreadable visibility; skipping node");
                    continue;
                }
            };
            if let Err(e) = self.host.set_visible(&node, false).await {
                debug!(node = %node, error = %e, "could not hide node; skipping");
                continue;
            }
            records.push(SuppressedNode {
                node,
                was_visible,
                is_guidance,
            });
        }
        Ok(GuidanceSuppression { records })
    }

    /// Restore visibility after a render. Non-guidance nodes return to
    /// their recorded state; guidance-tagged nodes are forced visible
    /// regardless of what was recorded.
    pub async fn restore(&self, suppression: GuidanceSuppression) {
        for record in suppression.records {
            let target = record.is_guidance || record.was_visible;
            if let Err(e) = self.host.set_visible(&record.node, target).await {
                debug!(node = %record.node, error = %e, "restore skipped node");
            }
        }
    }

    async fn remove_existing(&self, frame: &NodeId) -> Result<(), EngineError> {
        let children = self.host.children(frame).await?;
        for child in children {
            // There may be stale duplicates from interrupted prior runs;
            // an unreadable child is skipped, never fatal to the scan.
            if !self.metadata.is_guidance(&child).await {
                continue;
            }
            if let Err(e) = self.host.remove(&child).await {
                warn!(node = %child, error = %e, "failed to remove stale guidance layer");
            }
        }
        Ok(())
    }

    async fn looks_like_guide(&self, node: &NodeId) -> bool {
        if let Ok(name) = self.host.node_name(node).await {
            let lower = name.to_lowercase();
            if GUIDE_NAME_HINTS.iter().any(|hint| lower.contains(hint)) {
                return true;
            }
        }

        let Ok(kind) = self.host.node_kind(node).await else {
            return false;
        };
        if !matches!(kind, NodeKind::Rectangle | NodeKind::Line) {
            return false;
        }
        let Ok(rect) = self.host.rect(node).await else {
            return false;
        };
        let thin = rect.width <= GUIDE_MAX_THICKNESS || rect.height <= GUIDE_MAX_THICKNESS;
        if !thin {
            return false;
        }
        match self.host.opacity(node).await {
            Ok(opacity) => opacity < 1.0,
            Err(_) => false,
        }
    }

    /// All descendants of a node, breadth-first. Unreadable nodes are
    /// skipped with a debug log.
    async fn descendants(host: &H, root: &NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut queue = vec![root.clone()];
        while let Some(current) = queue.pop() {
            match host.children(&current).await {
                Ok(children) => {
                    for child in children {
                        queue.push(child.clone());
                        out.push(child);
                    }
                }
                Err(e) => {
                    debug!(node = %current, error = %e, "unreadable children; skipping subtree");
                }
            }
        }
        out
    }
}
