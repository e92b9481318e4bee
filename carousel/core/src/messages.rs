//! Engine Messages
//!
//! Messages sent from the engine to the UI collaborator. The UI is a pure
//! renderer: it displays slide payloads, notices, and decision prompts and
//! sends back [`crate::events::UiEvent`]s. The wire form is
//! `{"type": "<kebab-case>", ...camelCase fields}`, matching what a plugin
//! UI written against the host's message bus expects.

use serde::{Deserialize, Serialize};

/// Messages from the engine to the UI surface.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum EngineMessage {
    /// Result of a compatibility check on the current selection.
    CompatibilityResult {
        /// Human-readable report.
        message: String,
        /// Key of the best-matching preset, when one exists.
        resolution: Option<String>,
        /// Complete slides the frame would yield at that preset.
        slide_count: Option<u32>,
    },

    /// The current selection is not a carousel frame.
    NoCarouselSelected,

    /// A preview run started; payloads follow.
    PreviewLoading,

    /// Geometry of the preview that is about to stream.
    PreviewMetadata {
        /// Number of slides being rendered.
        slide_count: u32,
        /// Width of one slide in pixels.
        slide_width: u32,
        /// Frame height in pixels.
        frame_height: u32,
        /// Resolution preset key, absent for degraded single-frame previews.
        resolution: Option<String>,
    },

    /// One batch of rendered slides, streamed as soon as it completes.
    PreviewBatch {
        /// Rendered slides; each payload carries its own index.
        slides: Vec<SlidePayload>,
    },

    /// All preview batches have been delivered.
    PreviewComplete,

    /// Decision request: the frame does not divide evenly at the chosen
    /// preset. The UI answers with a partial-slide response.
    HandlePartialSlide {
        /// Leftover width in pixels.
        remaining_width: u32,
        /// Slide width of the chosen preset.
        preset_width: u32,
        /// Complete slides at the current width.
        slide_count: u32,
    },

    /// Decision request: the frame height differs from the preset height.
    /// The UI answers with a resize response.
    ConfirmResize {
        /// Frame height as it is now.
        current_height: u32,
        /// Preset height the frame would be resized to.
        target_height: u32,
    },

    /// Bounded query for the slide the user is currently viewing.
    RequestCurrentSlide,

    /// User notice.
    Notify {
        /// Severity.
        level: NotifyLevel,
        /// Notice text.
        message: String,
    },

    /// The engine is terminating; the UI should close.
    Shutdown,
}

/// One rendered slide thumbnail.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlidePayload {
    /// Zero-based slide index. Results within a batch may complete in any
    /// order, so the index travels with the payload.
    pub index: usize,
    /// `data:image/png;base64,` URI, or `None` when this slide's export
    /// failed.
    pub image: Option<String>,
}

/// Notice severity levels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyLevel {
    /// Informational.
    Info,
    /// Warning.
    Warning,
    /// Error.
    Error,
    /// Success.
    Success,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_wire_format_kebab_type_camel_fields() {
        let msg = EngineMessage::HandlePartialSlide {
            remaining_width: 640,
            preset_width: 1080,
            slide_count: 2,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "handle-partial-slide");
        assert_eq!(json["remainingWidth"], 640);
        assert_eq!(json["presetWidth"], 1080);
    }

    #[test]
    fn test_unit_variants_serialize_with_type_only() {
        let json = serde_json::to_value(EngineMessage::PreviewComplete).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "preview-complete" }));
    }

    #[test]
    fn test_slide_payload_roundtrip() {
        let msg = EngineMessage::PreviewBatch {
            slides: vec![
                SlidePayload {
                    index: 4,
                    image: Some("data:image/png;base64,AAAA".to_string()),
                },
                SlidePayload {
                    index: 5,
                    image: None,
                },
            ],
        };
        let json = serde_json::to_string(&msg).unwrap();
        let back: EngineMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_notify_level_lowercase() {
        let msg = EngineMessage::Notify {
            level: NotifyLevel::Warning,
            message: "careful".to_string(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["level"], "warning");
    }
}
