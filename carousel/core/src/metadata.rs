//! Carousel Metadata Store
//!
//! Reads and writes the persistent key-value tags that mark a frame as a
//! carousel. Tags live on the host entity itself, so they survive plugin
//! restarts and travel with the document; nothing else is persisted.
//!
//! Access is deliberately forgiving: a frame with unreadable or corrupt
//! tags is treated as "not a carousel" with a warning, and a failed tag
//! write degrades that tag only. A single bad node never aborts a run.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::EngineError;
use crate::host::{DocumentHost, HostError, NodeId};

/// Tag marking a frame as a carousel.
pub const TAG_IS_CAROUSEL: &str = "isCarousel";
/// Tag holding the resolution preset key.
pub const TAG_RESOLUTION_KEY: &str = "resolutionKey";
/// Tag holding the slide count.
pub const TAG_SLIDE_COUNT: &str = "slideCount";
/// Tag holding the slide width in pixels.
pub const TAG_SLIDE_WIDTH: &str = "slideWidth";
/// Tag marking a node as part of the guidance overlay.
pub const TAG_GUIDANCE_LAYER: &str = "isGuidanceLayer";

/// The carousel tags of one frame, parsed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CarouselTags {
    /// Resolution preset key (foreign key into the catalog).
    pub resolution_key: String,
    /// Number of slides, at least 1.
    pub slide_count: u32,
    /// Slide width in pixels, greater than 0.
    pub slide_width: u32,
}

/// Tag access for carousel frames and guidance nodes.
pub struct CarouselMetadataStore<H> {
    host: Arc<H>,
}

impl<H: DocumentHost> CarouselMetadataStore<H> {
    /// Create a store over the given host.
    pub fn new(host: Arc<H>) -> Self {
        Self { host }
    }

    /// Read and parse the carousel tags of a frame. `Ok(None)` when the
    /// frame is not a carousel or its tags are corrupt (logged).
    pub async fn read(&self, frame: &NodeId) -> Result<Option<CarouselTags>, EngineError> {
        let flag = self.read_tag(frame, TAG_IS_CAROUSEL).await?;
        if flag.as_deref() != Some("true") {
            return Ok(None);
        }

        let resolution_key = self.read_tag(frame, TAG_RESOLUTION_KEY).await?;
        let slide_count = self.read_tag(frame, TAG_SLIDE_COUNT).await?;
        let slide_width = self.read_tag(frame, TAG_SLIDE_WIDTH).await?;

        let parsed = (|| {
            let tags = CarouselTags {
                resolution_key: resolution_key?,
                slide_count: slide_count?.parse().ok().filter(|c| *c >= 1)?,
                slide_width: slide_width?.parse().ok().filter(|w| *w > 0)?,
            };
            Some(tags)
        })();

        if parsed.is_none() {
            warn!(frame = %frame, "carousel tags present but corrupt; treating frame as untagged");
        }
        Ok(parsed)
    }

    /// Whether the frame carries a valid carousel flag.
    pub async fn is_carousel(&self, frame: &NodeId) -> bool {
        matches!(self.read(frame).await, Ok(Some(_)))
    }

    /// Write the four carousel tags. Individual tag failures degrade to a
    /// warning; the error is returned only when every write failed.
    pub async fn write(&self, frame: &NodeId, tags: &CarouselTags) -> Result<(), EngineError> {
        let slide_count = tags.slide_count.to_string();
        let slide_width = tags.slide_width.to_string();
        let writes: [(&str, &str); 4] = [
            (TAG_IS_CAROUSEL, "true"),
            (TAG_RESOLUTION_KEY, &tags.resolution_key),
            (TAG_SLIDE_COUNT, &slide_count),
            (TAG_SLIDE_WIDTH, &slide_width),
        ];

        let mut failures = 0;
        let mut last_reason = String::new();
        for (key, value) in writes {
            if let Err(e) = self.host.set_tag(frame, key, value).await {
                warn!(frame = %frame, key, error = %e, "tag write failed; continuing");
                failures += 1;
                last_reason = e.to_string();
            }
        }

        if failures == writes.len() {
            return Err(EngineError::MetadataAccess {
                node: frame.clone(),
                reason: last_reason,
            });
        }
        Ok(())
    }

    /// Mark a node as part of the guidance overlay.
    pub async fn mark_guidance(&self, node: &NodeId) -> Result<(), EngineError> {
        self.host
            .set_tag(node, TAG_GUIDANCE_LAYER, "true")
            .await
            .map_err(EngineError::from)
    }

    /// Whether a node is tagged as guidance. Read failures are swallowed
    /// per node (logged at debug) so a stale node never aborts a scan.
    pub async fn is_guidance(&self, node: &NodeId) -> bool {
        match self.host.tag(node, TAG_GUIDANCE_LAYER).await {
            Ok(value) => value.as_deref() == Some("true"),
            Err(e) => {
                debug!(node = %node, error = %e, "unreadable guidance tag; skipping node");
                false
            }
        }
    }

    async fn read_tag(&self, frame: &NodeId, key: &str) -> Result<Option<String>, EngineError> {
        match self.host.tag(frame, key).await {
            Ok(value) => Ok(value),
            Err(HostError::NodeNotFound(id)) => Err(EngineError::LostReference(id)),
            Err(e) => Err(EngineError::MetadataAccess {
                node: frame.clone(),
                reason: e.to_string(),
            }),
        }
    }
}
