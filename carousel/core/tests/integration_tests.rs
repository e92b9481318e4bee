//! Integration tests for the carousel engine
//!
//! These tests drive the public API end-to-end the way a UI surface would:
//! commands in, message stream out, decision exchanges answered mid-run.
//! Scenarios cover:
//! - the full conversion exchange (partial-slide and height decisions)
//! - guidance layout and rebuild idempotence across re-conversion
//! - preview streaming, priority order, and payload scale
//! - export region creation with guidance restoration
//! - mid-run frame deletion surfacing a terminal notice

use base64::Engine as _;
use tokio::sync::mpsc;

use carousel_core::host::{DocumentHost, MemoryHost, NodeKind, Rect};
use carousel_core::metadata::{TAG_GUIDANCE_LAYER, TAG_IS_CAROUSEL, TAG_SLIDE_COUNT};
use carousel_core::{Engine, EngineConfig, EngineMessage, NotifyLevel, PartialSlideAction, UiEvent};

async fn engine_with_frame(
    width: f64,
    height: f64,
) -> (
    Engine<MemoryHost>,
    mpsc::Receiver<EngineMessage>,
    carousel_core::NodeId,
) {
    let host = MemoryHost::new();
    let frame = host
        .create_frame(None, "Artboard", Rect::new(0.0, 0.0, width, height))
        .await
        .unwrap();
    host.set_selection(std::slice::from_ref(&frame))
        .await
        .unwrap();

    let (tx, rx) = mpsc::channel(200);
    let engine = Engine::new(host, EngineConfig::headless(), tx);
    (engine, rx, frame)
}

async fn next_matching(
    rx: &mut mpsc::Receiver<EngineMessage>,
    mut predicate: impl FnMut(&EngineMessage) -> bool,
) -> EngineMessage {
    loop {
        let msg = rx.recv().await.expect("message stream open");
        if predicate(&msg) {
            return msg;
        }
    }
}

async fn guidance_layers(host: &MemoryHost, frame: &carousel_core::NodeId) -> Vec<carousel_core::NodeId> {
    let mut layers = Vec::new();
    for child in host.children(frame).await.unwrap() {
        if host
            .tag(&child, TAG_GUIDANCE_LAYER)
            .await
            .unwrap()
            .as_deref()
            == Some("true")
        {
            layers.push(child);
        }
    }
    layers
}

// =============================================================================
// Test 1: Full conversion exchange
// =============================================================================

/// A 2800x1080 frame at the square preset needs the partial-slide decision;
/// "expand" grows it to 3 full slides and the guidance layer reflects the
/// final geometry.
#[tokio::test]
async fn test_conversion_with_expand_decision() {
    let (mut engine, mut rx, frame) = engine_with_frame(2800.0, 1080.0).await;
    let host = engine.host();

    engine
        .handle_event(UiEvent::ConvertToCarousel {
            resolution: "square".to_string(),
        })
        .await
        .unwrap();

    let request = next_matching(&mut rx, |m| {
        matches!(m, EngineMessage::HandlePartialSlide { .. })
    })
    .await;
    assert_eq!(
        request,
        EngineMessage::HandlePartialSlide {
            remaining_width: 640,
            preset_width: 1080,
            slide_count: 2,
        }
    );

    engine
        .handle_event(UiEvent::PartialSlideResponse {
            action: PartialSlideAction::Expand,
        })
        .await
        .unwrap();
    next_matching(&mut rx, |m| {
        matches!(
            m,
            EngineMessage::Notify {
                level: NotifyLevel::Success,
                ..
            }
        )
    })
    .await;

    // Frame grew to 3 exact slides and carries the tags.
    assert_eq!(host.rect(&frame).await.unwrap().width, 3240.0);
    assert_eq!(
        host.tag(&frame, TAG_IS_CAROUSEL).await.unwrap().as_deref(),
        Some("true")
    );
    assert_eq!(
        host.tag(&frame, TAG_SLIDE_COUNT).await.unwrap().as_deref(),
        Some("3")
    );

    // Guidance: one layer, 2 boundary markers + 3 labels.
    let layers = guidance_layers(&host, &frame).await;
    assert_eq!(layers.len(), 1);
    let children = host.children(&layers[0]).await.unwrap();
    assert_eq!(children.len(), 5);

    let mut markers = 0;
    for child in &children {
        if host.node_kind(child).await.unwrap() == NodeKind::Rectangle {
            markers += 1;
        }
    }
    assert_eq!(markers, 2);

    // The viewport was framed on the converted carousel.
    assert_eq!(host.viewport_targets(), vec![frame]);
}

/// Declining the height resize keeps the custom height; the slide count
/// comes from width alone.
#[tokio::test]
async fn test_conversion_keeps_declined_height() {
    let (mut engine, mut rx, frame) = engine_with_frame(3240.0, 900.0).await;
    let host = engine.host();

    engine
        .handle_event(UiEvent::ConvertToCarousel {
            resolution: "square".to_string(),
        })
        .await
        .unwrap();

    let request = next_matching(&mut rx, |m| {
        matches!(m, EngineMessage::ConfirmResize { .. })
    })
    .await;
    assert_eq!(
        request,
        EngineMessage::ConfirmResize {
            current_height: 900,
            target_height: 1080,
        }
    );

    engine
        .handle_event(UiEvent::ResizeResponse {
            should_resize: false,
        })
        .await
        .unwrap();
    next_matching(&mut rx, |m| {
        matches!(
            m,
            EngineMessage::Notify {
                level: NotifyLevel::Success,
                ..
            }
        )
    })
    .await;

    let rect = host.rect(&frame).await.unwrap();
    assert_eq!(rect.height, 900.0);
    assert_eq!(
        host.tag(&frame, TAG_SLIDE_COUNT).await.unwrap().as_deref(),
        Some("3")
    );
}

// =============================================================================
// Test 2: Re-conversion is idempotent
// =============================================================================

/// Converting the same frame twice leaves exactly one guidance layer with a
/// stable child count.
#[tokio::test]
async fn test_reconversion_leaves_single_guidance_layer() {
    let (mut engine, mut rx, frame) = engine_with_frame(3240.0, 1080.0).await;
    let host = engine.host();

    for _ in 0..2 {
        engine
            .handle_event(UiEvent::ConvertToCarousel {
                resolution: "square".to_string(),
            })
            .await
            .unwrap();
        next_matching(&mut rx, |m| {
            matches!(
                m,
                EngineMessage::Notify {
                    level: NotifyLevel::Success,
                    ..
                }
            )
        })
        .await;
    }

    let layers = guidance_layers(&host, &frame).await;
    assert_eq!(layers.len(), 1);
    assert_eq!(host.children(&layers[0]).await.unwrap().len(), 5);
}

// =============================================================================
// Test 3: Preview streaming
// =============================================================================

/// Preview over a converted carousel: focused slide first, radius-2
/// neighbors next, batches of two, payloads decodable at the adaptive
/// scale, guidance restored afterwards.
#[tokio::test]
async fn test_preview_stream_order_and_payloads() {
    let (mut engine, mut rx, frame) = engine_with_frame(10_800.0, 1080.0).await;
    let host = engine.host();

    // Convert (exact fit: no decisions).
    engine
        .handle_event(UiEvent::ConvertToCarousel {
            resolution: "square".to_string(),
        })
        .await
        .unwrap();
    next_matching(&mut rx, |m| {
        matches!(
            m,
            EngineMessage::Notify {
                level: NotifyLevel::Success,
                ..
            }
        )
    })
    .await;

    engine.handle_event(UiEvent::PreviewCarousel).await.unwrap();

    next_matching(&mut rx, |m| matches!(m, EngineMessage::PreviewLoading)).await;
    let metadata = next_matching(&mut rx, |m| {
        matches!(m, EngineMessage::PreviewMetadata { .. })
    })
    .await;
    assert_eq!(
        metadata,
        EngineMessage::PreviewMetadata {
            slide_count: 10,
            slide_width: 1080,
            frame_height: 1080,
            resolution: Some("square".to_string()),
        }
    );

    // Answer the bounded focus query.
    next_matching(&mut rx, |m| matches!(m, EngineMessage::RequestCurrentSlide)).await;
    engine
        .handle_event(UiEvent::CurrentSlideResponse { current_slide: 4 })
        .await
        .unwrap();

    let mut indices = Vec::new();
    let mut batch_sizes = Vec::new();
    let mut first_image = None;
    loop {
        match rx.recv().await.expect("stream open") {
            EngineMessage::PreviewBatch { slides } => {
                batch_sizes.push(slides.len());
                for slide in slides {
                    if first_image.is_none() {
                        first_image.clone_from(&slide.image);
                    }
                    indices.push(slide.index);
                }
            }
            EngineMessage::PreviewComplete => break,
            _ => {}
        }
    }

    // Priority order: focused slide, then alternating neighbors.
    assert_eq!(indices[..5], [4, 5, 3, 6, 2]);
    assert_eq!(indices.len(), 10);
    assert!(batch_sizes.iter().all(|&n| n <= 2));

    // Payload decodes to the adaptive-scale size (10 slides: full 0.25).
    let data_uri = first_image.expect("first slide rendered");
    let encoded = data_uri.strip_prefix("data:image/png;base64,").unwrap();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .unwrap();
    let img = image::load_from_memory(&bytes).unwrap();
    assert_eq!((img.width(), img.height()), (270, 270));

    // Guidance survived the preview run visible.
    for layer in guidance_layers(&host, &frame).await {
        assert!(host.is_visible(&layer).await.unwrap());
    }
}

// =============================================================================
// Test 4: Export regions
// =============================================================================

/// Export creates one full-resolution region per slide, selects them all,
/// and guidance is visible again once the run finishes.
#[tokio::test]
async fn test_export_regions_and_guidance_restore() {
    let (mut engine, mut rx, frame) = engine_with_frame(2160.0, 1080.0).await;
    let host = engine.host();

    engine
        .handle_event(UiEvent::ConvertToCarousel {
            resolution: "square".to_string(),
        })
        .await
        .unwrap();
    next_matching(&mut rx, |m| {
        matches!(
            m,
            EngineMessage::Notify {
                level: NotifyLevel::Success,
                ..
            }
        )
    })
    .await;

    engine.handle_event(UiEvent::ExportCarousel).await.unwrap();
    let notice = next_matching(&mut rx, |m| {
        matches!(
            m,
            EngineMessage::Notify {
                level: NotifyLevel::Success,
                ..
            }
        )
    })
    .await;
    if let EngineMessage::Notify { message, .. } = notice {
        assert!(message.contains("2 export region(s)"));
    }

    let selection = host.selection().await;
    assert_eq!(selection.len(), 2);
    for (i, region) in selection.iter().enumerate() {
        let rect = host.rect(region).await.unwrap();
        assert_eq!(rect.x, 1080.0 * i as f64);
        assert_eq!(rect.width, 1080.0);
        assert_eq!(rect.height, 1080.0);
    }

    for layer in guidance_layers(&host, &frame).await {
        assert!(host.is_visible(&layer).await.unwrap());
    }
}

// =============================================================================
// Test 5: Frame deleted mid-run
// =============================================================================

/// Deleting the frame while the conversion is suspended on a decision ends
/// the run with a terminal notice instead of hanging or panicking.
#[tokio::test]
async fn test_frame_deleted_mid_decision() {
    let (mut engine, mut rx, frame) = engine_with_frame(2800.0, 1080.0).await;
    let host = engine.host();

    engine
        .handle_event(UiEvent::ConvertToCarousel {
            resolution: "square".to_string(),
        })
        .await
        .unwrap();
    next_matching(&mut rx, |m| {
        matches!(m, EngineMessage::HandlePartialSlide { .. })
    })
    .await;

    // User deletes the frame while the prompt is open.
    host.remove(&frame).await.unwrap();

    engine
        .handle_event(UiEvent::PartialSlideResponse {
            action: PartialSlideAction::Expand,
        })
        .await
        .unwrap();

    let notice = next_matching(&mut rx, |m| {
        matches!(
            m,
            EngineMessage::Notify {
                level: NotifyLevel::Error,
                ..
            }
        )
    })
    .await;
    if let EngineMessage::Notify { message, .. } = notice {
        assert!(message.contains("deleted"));
    }
}

// =============================================================================
// Test 6: Wire protocol round-trip
// =============================================================================

/// The stdio protocol the daemon speaks: commands deserialize from the
/// documented JSON and message output stays stable.
#[test]
fn test_protocol_wire_compatibility() {
    let event: UiEvent = serde_json::from_str(
        r#"{"type": "create-carousel", "resolution": "portrait", "frameCount": 4}"#,
    )
    .unwrap();
    assert_eq!(
        event,
        UiEvent::CreateCarousel {
            resolution: "portrait".to_string(),
            frame_count: 4,
        }
    );

    let msg = EngineMessage::PreviewMetadata {
        slide_count: 3,
        slide_width: 1080,
        frame_height: 1350,
        resolution: Some("portrait".to_string()),
    };
    let json = serde_json::to_value(&msg).unwrap();
    assert_eq!(json["type"], "preview-metadata");
    assert_eq!(json["slideCount"], 3);
    assert_eq!(json["frameHeight"], 1350);
}
