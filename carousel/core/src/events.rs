//! UI Events
//!
//! Events sent from the UI collaborator to the engine: the command surface
//! plus the responses to in-flight decision requests. The UI does not
//! interpret commands; it forwards what the user asked for and the engine
//! decides how to respond.

use serde::{Deserialize, Serialize};

/// Events from the UI surface to the engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum UiEvent {
    /// Create a fresh tagged carousel frame with guidance.
    CreateCarousel {
        /// Resolution preset key.
        resolution: String,
        /// Number of slides the new frame holds.
        frame_count: u32,
    },

    /// Convert the currently selected frame into a carousel.
    ConvertToCarousel {
        /// Resolution preset key.
        resolution: String,
    },

    /// Report the best-matching preset for the current selection.
    CheckCompatibility,

    /// Render slide previews for the current selection.
    PreviewCarousel,

    /// Create full-resolution export regions for the current selection.
    ExportCarousel,

    /// Terminate the engine.
    Cancel,

    /// Response to a partial-slide decision request.
    PartialSlideResponse {
        /// The chosen remediation.
        action: PartialSlideAction,
    },

    /// Response to a height-resize confirmation request.
    ResizeResponse {
        /// Whether the frame height should be resized to the preset.
        should_resize: bool,
    },

    /// Response to the current-slide query.
    CurrentSlideResponse {
        /// Zero-based index of the slide the user is viewing.
        current_slide: usize,
    },
}

/// Remediation choices for a frame that does not divide evenly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartialSlideAction {
    /// Grow the frame so the remainder becomes one more full slide.
    Expand,
    /// Shrink the frame to drop the remainder. Destructive: content beyond
    /// the cut is discarded.
    Trim,
    /// Leave the frame as-is; the remainder is cropped at export time.
    Keep,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_command_wire_format() {
        let event: UiEvent = serde_json::from_str(
            r#"{"type": "convert-to-carousel", "resolution": "square"}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            UiEvent::ConvertToCarousel {
                resolution: "square".to_string()
            }
        );
    }

    #[test]
    fn test_create_carousel_fields_camel_case() {
        let event: UiEvent = serde_json::from_str(
            r#"{"type": "create-carousel", "resolution": "story", "frameCount": 5}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            UiEvent::CreateCarousel {
                resolution: "story".to_string(),
                frame_count: 5
            }
        );
    }

    #[test]
    fn test_decision_responses() {
        let event: UiEvent =
            serde_json::from_str(r#"{"type": "partial-slide-response", "action": "expand"}"#)
                .unwrap();
        assert_eq!(
            event,
            UiEvent::PartialSlideResponse {
                action: PartialSlideAction::Expand
            }
        );

        let event: UiEvent =
            serde_json::from_str(r#"{"type": "resize-response", "shouldResize": false}"#).unwrap();
        assert_eq!(
            event,
            UiEvent::ResizeResponse {
                should_resize: false
            }
        );

        let event: UiEvent =
            serde_json::from_str(r#"{"type": "current-slide-response", "currentSlide": 4}"#)
                .unwrap();
        assert_eq!(event, UiEvent::CurrentSlideResponse { current_slide: 4 });
    }

    #[test]
    fn test_unknown_command_rejected() {
        let result = serde_json::from_str::<UiEvent>(r#"{"type": "self-destruct"}"#);
        assert!(result.is_err());
    }
}
