//! Conversion Workflow
//!
//! The state machine that turns an arbitrary selected frame into a tagged
//! carousel:
//!
//! ```text
//! Idle -> SelectionValidated -> GeometryResolved
//!      -> {AwaitingPartialSlideDecision} -> {AwaitingHeightDecision}
//!      -> GuidanceRebuilt -> Done
//! ```
//!
//! The two awaiting states are interactive suspend points: the workflow
//! sends a decision request to the UI collaborator and parks on the
//! matching [`DecisionRouter`] exchange until the human answers. Fresh
//! carousel creation also lives here; it shares everything except the
//! decision exchanges.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::catalog::{self, ResolutionPreset};
use crate::config::EngineConfig;
use crate::decisions::DecisionRouter;
use crate::error::EngineError;
use crate::events::PartialSlideAction;
use crate::geometry::{self, SlideGeometry};
use crate::guidance::GuidanceLayerManager;
use crate::host::{DocumentHost, HostError, NodeId, NodeKind, Rect};
use crate::messages::{EngineMessage, NotifyLevel};
use crate::metadata::{CarouselMetadataStore, CarouselTags};

/// Upper bound on slides in a freshly created carousel.
const MAX_CREATED_SLIDES: u32 = 100;

/// States of the conversion state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkflowState {
    /// Nothing running.
    Idle,
    /// Exactly one frame is selected.
    SelectionValidated,
    /// Slide geometry has been computed.
    GeometryResolved,
    /// Suspended on the partial-slide decision.
    AwaitingPartialSlideDecision,
    /// Suspended on the height-resize confirmation.
    AwaitingHeightDecision,
    /// Tags written and guidance overlay rebuilt.
    GuidanceRebuilt,
    /// Conversion finished.
    Done,
}

/// Result of a completed conversion or creation.
#[derive(Clone, Debug)]
pub struct ConversionOutcome {
    /// The carousel frame.
    pub frame: NodeId,
    /// Tags written to the frame.
    pub tags: CarouselTags,
    /// Final slide geometry.
    pub geometry: SlideGeometry,
}

impl ConversionOutcome {
    /// Success notice for the UI.
    #[must_use]
    pub fn notice(&self) -> String {
        let slides = self.tags.slide_count;
        let plural = if slides == 1 { "slide" } else { "slides" };
        format!(
            "Carousel ready: {slides} {plural} of {}px.",
            self.tags.slide_width
        )
    }
}

/// Validate the current selection: exactly one node, of frame kind.
pub async fn validate_selection<H: DocumentHost>(host: &H) -> Result<NodeId, EngineError> {
    let mut selection = host.selection().await;
    let node = match selection.len() {
        1 => selection.remove(0),
        n => {
            return Err(EngineError::InvalidSelection(format!(
                "{n} nodes selected"
            )))
        }
    };

    match host.node_kind(&node).await {
        Ok(NodeKind::Frame) => Ok(node),
        Ok(other) => Err(EngineError::InvalidSelection(format!(
            "selected node is {other:?}, not a frame"
        ))),
        Err(HostError::NodeNotFound(id)) => Err(EngineError::LostReference(id)),
        Err(e) => Err(e.into()),
    }
}

/// Orchestrates converting a frame into a carousel.
pub struct ConversionWorkflow<H> {
    host: Arc<H>,
    tx: mpsc::Sender<EngineMessage>,
    decisions: Arc<DecisionRouter>,
    config: EngineConfig,
    metadata: CarouselMetadataStore<H>,
    guidance: GuidanceLayerManager<H>,
    state: WorkflowState,
}

impl<H: DocumentHost + 'static> ConversionWorkflow<H> {
    /// Create a workflow over the given host and UI channel.
    pub fn new(
        host: Arc<H>,
        tx: mpsc::Sender<EngineMessage>,
        decisions: Arc<DecisionRouter>,
        config: EngineConfig,
    ) -> Self {
        let metadata = CarouselMetadataStore::new(Arc::clone(&host));
        let guidance = GuidanceLayerManager::new(Arc::clone(&host), config.clone());
        Self {
            host,
            tx,
            decisions,
            config,
            metadata,
            guidance,
            state: WorkflowState::Idle,
        }
    }

    /// Current state of the machine.
    #[must_use]
    pub fn state(&self) -> WorkflowState {
        self.state
    }

    /// Convert the given (already-selected) frame into a carousel at the
    /// chosen resolution.
    pub async fn run(
        &mut self,
        frame: &NodeId,
        resolution_key: &str,
    ) -> Result<ConversionOutcome, EngineError> {
        let preset = catalog::find(resolution_key)
            .ok_or_else(|| EngineError::InvalidPreset(resolution_key.to_string()))?;

        match self.host.node_kind(frame).await {
            Ok(NodeKind::Frame) => {}
            Ok(other) => {
                return Err(EngineError::InvalidSelection(format!(
                    "selected node is {other:?}, not a frame"
                )))
            }
            Err(HostError::NodeNotFound(_)) => return Err(self.recover(frame).await),
            Err(e) => return Err(e.into()),
        }
        self.transition(WorkflowState::SelectionValidated);

        let mut rect = self.read_rect(frame).await?;

        // A frame narrower than one slide IS one undersized slide; bring it
        // up to exactly one slide width before anything else.
        if (rect.width.round().max(0.0) as u32) < preset.width {
            self.resize_frame(frame, f64::from(preset.width), rect.height)
                .await?;
            rect = self.read_rect(frame).await?;
        }

        let mut geometry = geometry::resolve(rect.width, preset);
        self.transition(WorkflowState::GeometryResolved);

        if geometry.has_partial_slide {
            self.transition(WorkflowState::AwaitingPartialSlideDecision);
            let action = self.await_partial_decision(&geometry, preset).await?;
            match action {
                PartialSlideAction::Expand => {
                    let target = f64::from((geometry.slide_count + 1) * preset.width);
                    self.resize_frame(frame, target, rect.height).await?;
                }
                PartialSlideAction::Trim => {
                    let target = f64::from(geometry.slide_count * preset.width);
                    self.resize_frame(frame, target, rect.height).await?;
                }
                PartialSlideAction::Keep => {
                    self.notify(
                        NotifyLevel::Warning,
                        &format!(
                            "Keeping the frame as-is; the {}px leftover will be cropped at export.",
                            geometry.remainder_width
                        ),
                    )
                    .await;
                }
            }
            rect = self.read_rect(frame).await?;
            geometry = geometry::resolve(rect.width, preset);
        }

        if rect.height.round().max(0.0) as u32 != preset.height {
            self.transition(WorkflowState::AwaitingHeightDecision);
            let rx = self.decisions.expect_resize();
            self.send(EngineMessage::ConfirmResize {
                current_height: rect.height.round().max(0.0) as u32,
                target_height: preset.height,
            })
            .await;
            let should_resize = self.await_decision(rx).await?;
            if should_resize {
                self.resize_frame(frame, rect.width, f64::from(preset.height))
                    .await?;
            }
            // Declined: the custom height stays; slide width and count are
            // unaffected by height.
        }

        let tags = CarouselTags {
            resolution_key: preset.key.to_string(),
            slide_count: geometry.slide_count,
            slide_width: preset.width,
        };
        if let Err(e) = self.metadata.write(frame, &tags).await {
            warn!(frame = %frame, error = %e, "metadata write degraded");
            self.notify(NotifyLevel::Warning, &e.user_notice()).await;
        }

        self.rebuild_guidance(frame, preset, &geometry).await?;
        self.transition(WorkflowState::GuidanceRebuilt);

        let _ = self.host.set_selection(std::slice::from_ref(frame)).await;
        let _ = self.host.scroll_into_view(std::slice::from_ref(frame)).await;
        self.transition(WorkflowState::Done);

        Ok(ConversionOutcome {
            frame: frame.clone(),
            tags,
            geometry,
        })
    }

    /// Create a fresh tagged carousel frame with guidance. No decision
    /// exchanges apply; the state machine is untouched.
    pub async fn create_carousel(
        &self,
        resolution_key: &str,
        frame_count: u32,
    ) -> Result<ConversionOutcome, EngineError> {
        let preset = catalog::find(resolution_key)
            .ok_or_else(|| EngineError::InvalidPreset(resolution_key.to_string()))?;
        let slide_count = frame_count.clamp(1, MAX_CREATED_SLIDES);

        let frame = self
            .host
            .create_frame(
                None,
                "Carousel",
                Rect::new(
                    0.0,
                    0.0,
                    f64::from(slide_count * preset.width),
                    f64::from(preset.height),
                ),
            )
            .await?;

        let geometry = SlideGeometry::exact(slide_count);
        let tags = CarouselTags {
            resolution_key: preset.key.to_string(),
            slide_count,
            slide_width: preset.width,
        };
        if let Err(e) = self.metadata.write(&frame, &tags).await {
            warn!(frame = %frame, error = %e, "metadata write degraded");
            self.notify(NotifyLevel::Warning, &e.user_notice()).await;
        }

        self.guidance.rebuild(&frame, preset, &geometry).await?;
        let _ = self.host.set_selection(std::slice::from_ref(&frame)).await;
        let _ = self
            .host
            .scroll_into_view(std::slice::from_ref(&frame))
            .await;

        Ok(ConversionOutcome {
            frame,
            tags,
            geometry,
        })
    }

    async fn await_partial_decision(
        &self,
        geometry: &SlideGeometry,
        preset: &ResolutionPreset,
    ) -> Result<PartialSlideAction, EngineError> {
        let rx = self.decisions.expect_partial_slide();
        self.send(EngineMessage::HandlePartialSlide {
            remaining_width: geometry.remainder_width,
            preset_width: preset.width,
            slide_count: geometry.slide_count,
        })
        .await;
        self.await_decision(rx).await
    }

    /// Park on a decision exchange. Unbounded unless a decision timeout is
    /// configured; a closed exchange ends the run cleanly.
    async fn await_decision<T>(&self, rx: oneshot::Receiver<T>) -> Result<T, EngineError> {
        if self.config.decision_timeout_ms == 0 {
            return rx.await.map_err(|_| EngineError::DecisionAbandoned);
        }
        match tokio::time::timeout(Duration::from_millis(self.config.decision_timeout_ms), rx).await
        {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(EngineError::DecisionAbandoned),
            Err(_) => Err(EngineError::DecisionTimeout),
        }
    }

    async fn rebuild_guidance(
        &self,
        frame: &NodeId,
        preset: &ResolutionPreset,
        geometry: &SlideGeometry,
    ) -> Result<NodeId, EngineError> {
        match self.guidance.rebuild(frame, preset, geometry).await {
            Ok(overlay) => Ok(overlay),
            Err(EngineError::Host(HostError::NodeNotFound(_))) => Err(self.recover(frame).await),
            Err(e) => Err(e),
        }
    }

    async fn read_rect(&self, frame: &NodeId) -> Result<Rect, EngineError> {
        match self.host.rect(frame).await {
            Ok(rect) => Ok(rect),
            Err(HostError::NodeNotFound(_)) => Err(self.recover(frame).await),
            Err(e) => Err(e.into()),
        }
    }

    async fn resize_frame(
        &self,
        frame: &NodeId,
        width: f64,
        height: f64,
    ) -> Result<(), EngineError> {
        match self.host.resize(frame, width, height).await {
            Ok(()) => Ok(()),
            Err(HostError::NodeNotFound(_)) => Err(self.recover(frame).await),
            Err(e) => Err(e.into()),
        }
    }

    /// Identity-lookup fallback after a read failed mid-run: a node that
    /// still exists was a transient failure, one retry away; a node that is
    /// gone is a lost reference, terminal for this run.
    async fn recover(&self, frame: &NodeId) -> EngineError {
        if self.host.node_exists(frame).await {
            EngineError::EntityVanished(frame.clone())
        } else {
            EngineError::LostReference(frame.clone())
        }
    }

    fn transition(&mut self, next: WorkflowState) {
        debug!(from = ?self.state, to = ?next, "conversion state");
        self.state = next;
    }

    async fn notify(&self, level: NotifyLevel, message: &str) {
        self.send(EngineMessage::Notify {
            level,
            message: message.to_string(),
        })
        .await;
    }

    async fn send(&self, msg: EngineMessage) {
        if self.tx.send(msg).await.is_err() {
            warn!("UI channel closed; dropping message");
        }
    }
}
