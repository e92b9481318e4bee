//! Export Pipeline
//!
//! One-shot creation of full-resolution export regions, one per slide,
//! selected as a set for the user's native export action. The pipeline
//! itself writes no files; raster extraction belongs to the host's export
//! mechanism. Only the dedicated guidance layer is hidden here; heuristic
//! guide-lookalikes are the user's content to export as they wish.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::warn;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::guidance::GuidanceLayerManager;
use crate::host::{DocumentHost, NodeId, Rect};
use crate::messages::{EngineMessage, NotifyLevel};
use crate::metadata::CarouselMetadataStore;

/// Creates full-resolution export regions for a carousel frame.
pub struct ExportPipeline<H> {
    host: Arc<H>,
    tx: mpsc::Sender<EngineMessage>,
    config: EngineConfig,
    metadata: CarouselMetadataStore<H>,
    guidance: GuidanceLayerManager<H>,
}

impl<H: DocumentHost + 'static> ExportPipeline<H> {
    /// Create a pipeline over the given host and UI channel.
    pub fn new(host: Arc<H>, tx: mpsc::Sender<EngineMessage>, config: EngineConfig) -> Self {
        let metadata = CarouselMetadataStore::new(Arc::clone(&host));
        let guidance = GuidanceLayerManager::new(Arc::clone(&host), config.clone());
        Self {
            host,
            tx,
            config,
            metadata,
            guidance,
        }
    }

    /// Create one export region per slide and select them all.
    pub async fn run(&self, frame: &NodeId) -> Result<(), EngineError> {
        let tags = self
            .metadata
            .read(frame)
            .await?
            .ok_or(EngineError::NotACarousel)?;
        let rect = self.host.rect(frame).await?;

        let suppression = self.guidance.suppress_tagged_only(frame).await?;

        let mut regions = Vec::with_capacity(tags.slide_count as usize);
        for index in 0..tags.slide_count {
            let region_rect = Rect::new(
                rect.x + f64::from(tags.slide_width) * f64::from(index),
                rect.y,
                f64::from(tags.slide_width),
                rect.height,
            );
            match self
                .host
                .create_frame(None, &format!("Slide {}", index + 1), region_rect)
                .await
            {
                Ok(region) => regions.push(region),
                Err(e) => {
                    warn!(slide = index, error = %e, "export region creation failed; skipping slide");
                }
            }
        }

        if let Err(e) = self.host.set_selection(&regions).await {
            warn!(error = %e, "could not select export regions");
        }

        self.send(EngineMessage::Notify {
            level: NotifyLevel::Success,
            message: format!(
                "{} export region(s) ready. Run the host export action on the selection.",
                regions.len()
            ),
        })
        .await;

        // Let the host settle before guidance comes back, so the user's
        // export captures clean regions.
        if self.config.export_settle_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.export_settle_ms)).await;
        }
        self.guidance.restore(suppression).await;

        Ok(())
    }

    async fn send(&self, msg: EngineMessage) {
        if self.tx.send(msg).await.is_err() {
            warn!("UI channel closed; dropping message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use crate::geometry;
    use pretty_assertions::assert_eq;

    use crate::host::{MemoryHost, NodeKind, Paint};

    struct Fixture {
        host: Arc<MemoryHost>,
        rx: mpsc::Receiver<EngineMessage>,
        pipeline: ExportPipeline<MemoryHost>,
    }

    fn fixture() -> Fixture {
        let host = Arc::new(MemoryHost::new());
        let (tx, rx) = mpsc::channel(100);
        let pipeline = ExportPipeline::new(Arc::clone(&host), tx, EngineConfig::headless());
        Fixture { host, rx, pipeline }
    }

    async fn carousel(host: &MemoryHost, slide_count: u32) -> NodeId {
        let frame = host
            .create_frame(
                None,
                "Carousel",
                Rect::new(200.0, 40.0, f64::from(slide_count * 1080), 1080.0),
            )
            .await
            .unwrap();
        for (key, value) in [
            ("isCarousel", "true".to_string()),
            ("resolutionKey", "square".to_string()),
            ("slideCount", slide_count.to_string()),
            ("slideWidth", "1080".to_string()),
        ] {
            host.set_tag(&frame, key, &value).await.unwrap();
        }
        frame
    }

    #[tokio::test]
    async fn test_export_requires_carousel() {
        let f = fixture();
        let frame = f
            .host
            .create_frame(None, "Plain", Rect::new(0.0, 0.0, 500.0, 500.0))
            .await
            .unwrap();
        assert!(matches!(
            f.pipeline.run(&frame).await,
            Err(EngineError::NotACarousel)
        ));
    }

    #[tokio::test]
    async fn test_export_creates_and_selects_regions() {
        let mut f = fixture();
        let frame = carousel(&f.host, 3).await;

        f.pipeline.run(&frame).await.unwrap();

        let selection = f.host.selection().await;
        assert_eq!(selection.len(), 3);

        // Regions sit at absolute slide offsets, full resolution.
        for (i, region) in selection.iter().enumerate() {
            assert_eq!(f.host.node_kind(region).await.unwrap(), NodeKind::Frame);
            let rect = f.host.rect(region).await.unwrap();
            assert_eq!(rect.x, 200.0 + 1080.0 * i as f64);
            assert_eq!(rect.y, 40.0);
            assert_eq!(rect.width, 1080.0);
            assert_eq!(rect.height, 1080.0);
            assert_eq!(
                f.host.node_name(region).await.unwrap(),
                format!("Slide {}", i + 1)
            );
        }

        let mut saw_success = false;
        while let Ok(msg) = f.rx.try_recv() {
            if let EngineMessage::Notify { level, message } = msg {
                if level == NotifyLevel::Success && message.contains("3 export region(s)") {
                    saw_success = true;
                }
            }
        }
        assert!(saw_success);
    }

    #[tokio::test]
    async fn test_export_hides_only_tagged_guidance() {
        let f = fixture();
        let frame = carousel(&f.host, 2).await;

        let manager = GuidanceLayerManager::new(Arc::clone(&f.host), EngineConfig::headless());
        let preset = catalog::find("square").unwrap();
        let overlay = manager
            .rebuild(&frame, preset, &geometry::resolve(2160.0, preset))
            .await
            .unwrap();

        // A guide-lookalike stays visible during export suppression.
        let lookalike = f
            .host
            .create_rect(
                &frame,
                "baseline grid",
                Rect::new(0.0, 0.0, 2.0, 1080.0),
                Paint {
                    rgb: (0, 0, 255),
                    opacity: 0.4,
                },
            )
            .await
            .unwrap();

        f.pipeline.run(&frame).await.unwrap();

        // After the run guidance is visible again and the lookalike was
        // never touched.
        assert!(f.host.is_visible(&overlay).await.unwrap());
        assert!(f.host.is_visible(&lookalike).await.unwrap());
    }
}
