//! Preview Pipeline
//!
//! Batched, priority-ordered rendering of per-slide thumbnails. The slide
//! the user is looking at renders first, neighbors follow, and batches
//! stream to the UI as soon as they complete rather than waiting for the
//! whole set. Guidance is suppressed for the duration of the run and
//! force-restored afterwards.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::decisions::DecisionRouter;
use crate::error::EngineError;
use crate::guidance::GuidanceLayerManager;
use crate::host::{DocumentHost, NodeId, Rect};
use crate::messages::{EngineMessage, SlidePayload};
use crate::metadata::{CarouselMetadataStore, CarouselTags};

/// Adaptive render scale: more slides means a smaller per-slide render, so
/// total pixel work stays bounded. `max_scale` applies up to 10 slides.
#[must_use]
pub fn adaptive_scale(slide_count: u32, max_scale: f64) -> f64 {
    let n = f64::from(slide_count.max(10));
    (max_scale * 10.0 / n).min(max_scale)
}

/// Processing order optimized for perceived latency: the focused slide
/// first, then alternating next/previous neighbors out to a radius of
/// `min(2, slide_count / 2)`, then all remaining slides in original order.
#[must_use]
pub fn processing_order(slide_count: usize, focused: usize) -> Vec<usize> {
    if slide_count == 0 {
        return Vec::new();
    }
    let focused = focused.min(slide_count - 1);

    let mut order = Vec::with_capacity(slide_count);
    let mut seen = vec![false; slide_count];
    let push = |index: usize, order: &mut Vec<usize>, seen: &mut Vec<bool>| {
        if index < slide_count && !seen[index] {
            seen[index] = true;
            order.push(index);
        }
    };

    push(focused, &mut order, &mut seen);
    let radius = 2.min(slide_count / 2);
    for distance in 1..=radius {
        push(focused + distance, &mut order, &mut seen);
        if let Some(previous) = focused.checked_sub(distance) {
            push(previous, &mut order, &mut seen);
        }
    }
    for index in 0..slide_count {
        push(index, &mut order, &mut seen);
    }
    order
}

/// Renders per-slide preview thumbnails for a carousel frame.
pub struct PreviewPipeline<H> {
    host: Arc<H>,
    tx: mpsc::Sender<EngineMessage>,
    decisions: Arc<DecisionRouter>,
    config: EngineConfig,
    metadata: CarouselMetadataStore<H>,
    guidance: GuidanceLayerManager<H>,
}

impl<H: DocumentHost + 'static> PreviewPipeline<H> {
    /// Create a pipeline over the given host and UI channel.
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
        }
    }

    /// Render previews for every slide of a carousel frame.
    pub async fn run(&self, frame: &NodeId) -> Result<(), EngineError> {
        let tags = self
            .metadata
            .read(frame)
            .await?
            .ok_or(EngineError::NotACarousel)?;
        let rect = self.host.rect(frame).await?;

        self.send(EngineMessage::PreviewLoading).await;
        self.send(EngineMessage::PreviewMetadata {
            slide_count: tags.slide_count,
            slide_width: tags.slide_width,
            frame_height: rect.height.round().max(0.0) as u32,
            resolution: Some(tags.resolution_key.clone()),
        })
        .await;

        let suppression = self.guidance.suppress(frame).await?;
        let result = self.render_slides(frame, &tags, rect).await;
        // Guidance comes back whatever happened to the renders.
        self.guidance.restore(suppression).await;
        result?;

        self.send(EngineMessage::PreviewComplete).await;
        Ok(())
    }

    /// Degraded preview for a selection that is not a carousel: the whole
    /// frame rendered once as a single payload.
    pub async fn run_single_frame(&self, frame: &NodeId) -> Result<(), EngineError> {
        let rect = self.host.rect(frame).await?;

        self.send(EngineMessage::PreviewLoading).await;
        self.send(EngineMessage::PreviewMetadata {
            slide_count: 1,
            slide_width: rect.width.round().max(0.0) as u32,
            frame_height: rect.height.round().max(0.0) as u32,
            resolution: None,
        })
        .await;

        let suppression = self.guidance.suppress(frame).await?;
        let payload = self
            .export_region(rect, 0, self.config.max_preview_scale, "Preview frame".to_string())
            .await;
        self.guidance.restore(suppression).await;

        self.send(EngineMessage::PreviewBatch {
            slides: vec![payload],
        })
        .await;
        self.send(EngineMessage::PreviewComplete).await;
        Ok(())
    }

    async fn render_slides(
        &self,
        frame: &NodeId,
        tags: &CarouselTags,
        frame_rect: Rect,
    ) -> Result<(), EngineError> {
        let scale = adaptive_scale(tags.slide_count, self.config.max_preview_scale);
        let focused = self.query_focused_slide(tags.slide_count as usize).await;
        let order = processing_order(tags.slide_count as usize, focused);

        let batch_size = self.config.preview_batch_size.max(1);
        for batch in order.chunks(batch_size) {
            let renders = batch.iter().map(|&index| {
                let region = Rect::new(
                    frame_rect.x + f64::from(tags.slide_width) * index as f64,
                    frame_rect.y,
                    f64::from(tags.slide_width),
                    frame_rect.height,
                );
                self.export_region(region, index, scale, format!("Preview slide {}", index + 1))
            });
            let slides = futures::future::join_all(renders).await;
            self.send(EngineMessage::PreviewBatch { slides }).await;

            if self.config.preview_batch_yield_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.preview_batch_yield_ms))
                    .await;
            }
        }
        Ok(())
    }

    /// Ask the UI which slide is focused, bounded so a slow or absent UI
    /// never stalls the pipeline. Defaults to slide 0.
    async fn query_focused_slide(&self, slide_count: usize) -> usize {
        let rx = self.decisions.expect_current_slide();
        self.send(EngineMessage::RequestCurrentSlide).await;

        let timeout = Duration::from_millis(self.config.current_slide_timeout_ms);
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(index)) => index.min(slide_count.saturating_sub(1)),
            Ok(Err(_)) => {
                debug!("current-slide exchange closed; defaulting to slide 0");
                0
            }
            Err(_) => {
                debug!("current-slide query timed out; defaulting to slide 0");
                0
            }
        }
    }

    /// Render one region: temporary export frame, raster at scale, base64
    /// data URI, region discarded. A failure yields an empty payload.
    async fn export_region(
        &self,
        region: Rect,
        index: usize,
        scale: f64,
        name: String,
    ) -> SlidePayload {
        match self.export_region_inner(region, index, scale, &name).await {
            Ok(image) => SlidePayload {
                index,
                image: Some(image),
            },
            Err(e) => {
                warn!(slide = index, error = %e, "slide preview failed; sending empty payload");
                SlidePayload { index, image: None }
            }
        }
    }

    async fn export_region_inner(
        &self,
        region: Rect,
        index: usize,
        scale: f64,
        name: &str,
    ) -> Result<String, EngineError> {
        let temp = self.host.create_frame(None, name, region).await?;
        let rastered = self.host.export_raster(&temp, scale).await;
        if let Err(e) = self.host.remove(&temp).await {
            debug!(node = %temp, error = %e, "temporary export region not removed");
        }

        let bytes = rastered.map_err(|e| EngineError::ExportFailure {
            index,
            reason: e.to_string(),
        })?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        Ok(format!("data:image/png;base64,{encoded}"))
    }

    async fn send(&self, msg: EngineMessage) {
        if self.tx.send(msg).await.is_err() {
            warn!("UI channel closed; dropping message");
        }
    }
}
