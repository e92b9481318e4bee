//! Engine - The Dispatch Core
//!
//! The engine is the top-level dispatcher of the plugin. It is UI-agnostic:
//! inbound [`UiEvent`]s arrive over a channel or transport, get routed to
//! the conversion workflow or the preview/export pipelines, and results
//! stream back as [`EngineMessage`]s. Decision responses are routed to the
//! suspended run awaiting them through the [`DecisionRouter`].
//!
//! Workflows and pipelines run as spawned tasks so the dispatcher keeps
//! routing responses while a run is suspended on a human decision. The
//! suppress/restore discipline over guidance visibility is not reentrant,
//! so operations are serialized per frame: a new run on a busy frame is
//! rejected with a notice rather than queued.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::decisions::DecisionRouter;
use crate::error::EngineError;
use crate::events::UiEvent;
use crate::export::ExportPipeline;
use crate::geometry;
use crate::host::{DocumentHost, NodeId};
use crate::messages::{EngineMessage, NotifyLevel};
use crate::metadata::CarouselMetadataStore;
use crate::preview::PreviewPipeline;
use crate::workflow::{self, ConversionWorkflow};

/// What kind of run holds a frame's operation token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationKind {
    /// Conversion or creation.
    Convert,
    /// Preview rendering.
    Preview,
    /// Export region creation.
    Export,
}

impl OperationKind {
    fn label(self) -> &'static str {
        match self {
            Self::Convert => "conversion",
            Self::Preview => "preview",
            Self::Export => "export",
        }
    }
}

/// Per-frame operation registry. A frame holds at most one in-flight
/// operation; the token releases the frame on drop.
#[derive(Default)]
pub struct ActiveOperations {
    inner: DashMap<NodeId, OperationKind>,
}

impl ActiveOperations {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a frame for an operation. `None` when the frame is busy.
    pub fn try_begin(
        registry: &Arc<Self>,
        frame: &NodeId,
        kind: OperationKind,
    ) -> Option<OperationToken> {
        match registry.inner.entry(frame.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => None,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(kind);
                Some(OperationToken {
                    frame: frame.clone(),
                    registry: Arc::clone(registry),
                })
            }
        }
    }

    /// The operation currently holding a frame, if any.
    #[must_use]
    pub fn current(&self, frame: &NodeId) -> Option<OperationKind> {
        self.inner.get(frame).map(|entry| *entry.value())
    }
}

/// Releases the claimed frame when dropped.
pub struct OperationToken {
    frame: NodeId,
    registry: Arc<ActiveOperations>,
}

impl Drop for OperationToken {
    fn drop(&mut self) {
        self.registry.inner.remove(&self.frame);
    }
}

/// The headless dispatch core of the plugin.
pub struct Engine<H: DocumentHost + 'static> {
    config: EngineConfig,
    host: Arc<H>,
    tx: mpsc::Sender<EngineMessage>,
    decisions: Arc<DecisionRouter>,
    operations: Arc<ActiveOperations>,
    shutting_down: bool,
}

impl<H: DocumentHost + 'static> Engine<H> {
    /// Create an engine over the given host, sending messages to `tx`.
    pub fn new(host: H, config: EngineConfig, tx: mpsc::Sender<EngineMessage>) -> Self {
        Self {
            config,
            host: Arc::new(host),
            tx,
            decisions: Arc::new(DecisionRouter::new()),
            operations: Arc::new(ActiveOperations::new()),
            shutting_down: false,
        }
    }

    /// Shared handle to the host document.
    #[must_use]
    pub fn host(&self) -> Arc<H> {
        Arc::clone(&self.host)
    }

    /// Whether a cancel command was processed.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down
    }

    /// Route one inbound event.
    pub async fn handle_event(&mut self, event: UiEvent) -> anyhow::Result<()> {
        match event {
            UiEvent::CreateCarousel {
                resolution,
                frame_count,
            } => {
                self.handle_create(&resolution, frame_count).await;
            }

            UiEvent::ConvertToCarousel { resolution } => {
                self.handle_convert(resolution).await;
            }

            UiEvent::CheckCompatibility => {
                self.handle_compatibility().await;
            }

            UiEvent::PreviewCarousel => {
                self.handle_preview().await;
            }

            UiEvent::ExportCarousel => {
                self.handle_export().await;
            }

            UiEvent::Cancel => {
                info!("cancel received; shutting down");
                self.shutting_down = true;
                self.send(EngineMessage::Shutdown).await;
            }

            UiEvent::PartialSlideResponse { action } => {
                if !self.decisions.resolve_partial_slide(action) {
                    warn!(?action, "partial-slide response with no pending decision");
                }
            }

            UiEvent::ResizeResponse { should_resize } => {
                if !self.decisions.resolve_resize(should_resize) {
                    warn!(should_resize, "resize response with no pending decision");
                }
            }

            UiEvent::CurrentSlideResponse { current_slide } => {
                if !self.decisions.resolve_current_slide(current_slide) {
                    debug!(current_slide, "current-slide response with no pending query");
                }
            }
        }

        Ok(())
    }

    /// Creation has no decision exchanges, so it runs inline.
    async fn handle_create(&self, resolution: &str, frame_count: u32) {
        let workflow = ConversionWorkflow::new(
            Arc::clone(&self.host),
            self.tx.clone(),
            Arc::clone(&self.decisions),
            self.config.clone(),
        );
        match workflow.create_carousel(resolution, frame_count).await {
            Ok(outcome) => {
                self.notify(NotifyLevel::Success, &outcome.notice()).await;
            }
            Err(e) => report(&self.tx, &e).await,
        }
    }

    async fn handle_convert(&self, resolution: String) {
        let frame = match workflow::validate_selection(self.host.as_ref()).await {
            Ok(frame) => frame,
            Err(e) => {
                report(&self.tx, &e).await;
                return;
            }
        };
        let Some(token) = self.begin(&frame, OperationKind::Convert).await else {
            return;
        };

        let host = Arc::clone(&self.host);
        let tx = self.tx.clone();
        let decisions = Arc::clone(&self.decisions);
        let config = self.config.clone();
        tokio::spawn(async move {
            let _token = token;
            let mut workflow = ConversionWorkflow::new(host, tx.clone(), decisions, config);
            match workflow.run(&frame, &resolution).await {
                Ok(outcome) => {
                    send_notify(&tx, NotifyLevel::Success, &outcome.notice()).await;
                }
                Err(e) => report(&tx, &e).await,
            }
        });
    }

    async fn handle_compatibility(&self) {
        let frame = match workflow::validate_selection(self.host.as_ref()).await {
            Ok(frame) => frame,
            Err(e) => {
                report(&self.tx, &e).await;
                return;
            }
        };
        let rect = match self.host.rect(&frame).await {
            Ok(rect) => rect,
            Err(e) => {
                report(&self.tx, &EngineError::from(e)).await;
                return;
            }
        };

        let msg = match geometry::best_matching_preset(rect.width, rect.height) {
            Some(report) => {
                let plural = if report.slide_count == 1 { "slide" } else { "slides" };
                EngineMessage::CompatibilityResult {
                    message: format!(
                        "Frame matches {}: {} compatible {plural}.",
                        report.display_name, report.slide_count
                    ),
                    resolution: Some(report.resolution_key),
                    slide_count: Some(report.slide_count),
                }
            }
            None => EngineMessage::CompatibilityResult {
                message: format!(
                    "No preset matches this frame's height ({}px).",
                    rect.height.round().max(0.0) as u32
                ),
                resolution: None,
                slide_count: None,
            },
        };
        self.send(msg).await;
    }

    async fn handle_preview(&self) {
        let frame = match workflow::validate_selection(self.host.as_ref()).await {
            Ok(frame) => frame,
            Err(e) => {
                self.send(EngineMessage::NoCarouselSelected).await;
                report(&self.tx, &e).await;
                return;
            }
        };
        let Some(token) = self.begin(&frame, OperationKind::Preview).await else {
            return;
        };

        let metadata = CarouselMetadataStore::new(Arc::clone(&self.host));
        let is_carousel = metadata.is_carousel(&frame).await;
        if !is_carousel {
            self.send(EngineMessage::NoCarouselSelected).await;
        }

        let pipeline = PreviewPipeline::new(
            Arc::clone(&self.host),
            self.tx.clone(),
            Arc::clone(&self.decisions),
            self.config.clone(),
        );
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let _token = token;
            let result = if is_carousel {
                pipeline.run(&frame).await
            } else {
                // Degraded single-frame preview for non-carousel selections.
                pipeline.run_single_frame(&frame).await
            };
            if let Err(e) = result {
                report(&tx, &e).await;
            }
        });
    }

    async fn handle_export(&self) {
        let frame = match workflow::validate_selection(self.host.as_ref()).await {
            Ok(frame) => frame,
            Err(e) => {
                self.send(EngineMessage::NoCarouselSelected).await;
                report(&self.tx, &e).await;
                return;
            }
        };
        let Some(token) = self.begin(&frame, OperationKind::Export).await else {
            return;
        };

        let pipeline = ExportPipeline::new(
            Arc::clone(&self.host),
            self.tx.clone(),
            self.config.clone(),
        );
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let _token = token;
            if let Err(e) = pipeline.run(&frame).await {
                report(&tx, &e).await;
            }
        });
    }

    /// Claim the frame or reject the command with a busy notice.
    async fn begin(&self, frame: &NodeId, kind: OperationKind) -> Option<OperationToken> {
        match ActiveOperations::try_begin(&self.operations, frame, kind) {
            Some(token) => Some(token),
            None => {
                let holder = self
                    .operations
                    .current(frame)
                    .map_or("operation", OperationKind::label);
                self.notify(
                    NotifyLevel::Warning,
                    &format!("A {holder} is already running on this frame. Try again when it finishes."),
                )
                .await;
                None
            }
        }
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

/// Surface a run failure to the UI: `NotACarousel` also emits the dedicated
/// no-carousel message so surfaces can adapt their layout.
async fn report(tx: &mpsc::Sender<EngineMessage>, error: &EngineError) {
    warn!(error = %error, "operation failed");
    if matches!(error, EngineError::NotACarousel) {
        let _ = tx.send(EngineMessage::NoCarouselSelected).await;
    }
    send_notify(tx, error.notify_level(), &error.user_notice()).await;
}

async fn send_notify(tx: &mpsc::Sender<EngineMessage>, level: NotifyLevel, message: &str) {
    let msg = EngineMessage::Notify {
        level,
        message: message.to_string(),
    };
    if tx.send(msg).await.is_err() {
        warn!("UI channel closed; dropping notice");
    }
}
