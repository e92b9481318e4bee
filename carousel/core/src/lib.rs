//! Carousel Core - Headless Slide Engine
//!
//! This crate is the engine of a carousel design plugin, completely
//! independent of any UI framework and of any particular design tool. It
//! subdivides a wide frame into evenly sized slide regions for a target
//! social-media aspect ratio, keeps a non-exported guidance overlay in
//! sync with frame geometry, and drives preview and export pipelines.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       UI Surface                             │
//! │            (plugin panel, daemon stdio, tests)               │
//! │                          │                                   │
//! │                    UiEvent (up)                              │
//! │                 EngineMessage (down)                         │
//! │                          │                                   │
//! └──────────────────────────┼───────────────────────────────────┘
//!                            │
//! ┌──────────────────────────┼───────────────────────────────────┐
//! │                       ENGINE CORE                            │
//! │  ┌───────────────────────┴────────────────────────────────┐  │
//! │  │                      Engine                            │  │
//! │  │  ┌────────────┐ ┌──────────┐ ┌─────────┐ ┌──────────┐  │  │
//! │  │  │ Conversion │ │ Preview  │ │ Export  │ │ Decision │  │  │
//! │  │  │ Workflow   │ │ Pipeline │ │ Pipeline│ │ Router   │  │  │
//! │  │  └────────────┘ └──────────┘ └─────────┘ └──────────┘  │  │
//! │  │  ┌────────────┐ ┌──────────────────┐ ┌──────────────┐  │  │
//! │  │  │ Metadata   │ │ Guidance Layer   │ │ Geometry     │  │  │
//! │  │  │ Store      │ │ Manager          │ │ Resolver     │  │  │
//! │  │  └────────────┘ └──────────────────┘ └──────────────┘  │  │
//! │  └───────────────────────┬────────────────────────────────┘  │
//! │                          │ DocumentHost trait                │
//! └──────────────────────────┼───────────────────────────────────┘
//!                            │
//!              host design tool (or MemoryHost)
//! ```
//!
//! # Key Types
//!
//! - [`Engine`]: top-level dispatcher routing commands to workflows
//! - [`UiEvent`] / [`EngineMessage`]: the two halves of the UI protocol
//! - [`host::DocumentHost`]: injected abstraction over the design tool
//! - [`workflow::ConversionWorkflow`]: the convert state machine
//! - [`preview::PreviewPipeline`] / [`export::ExportPipeline`]
//!
//! # Quick Start
//!
//! ```ignore
//! use carousel_core::{Engine, EngineConfig, UiEvent};
//! use carousel_core::host::MemoryHost;
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let (tx, mut rx) = mpsc::channel(100);
//!     let mut engine = Engine::new(MemoryHost::new(), EngineConfig::from_env(), tx);
//!
//!     engine
//!         .handle_event(UiEvent::CreateCarousel {
//!             resolution: "square".to_string(),
//!             frame_count: 3,
//!         })
//!         .await
//!         .unwrap();
//!
//!     while let Some(msg) = rx.recv().await {
//!         // Render the message in the UI.
//!     }
//! }
//! ```
//!
//! # No UI Dependencies
//!
//! This crate has **zero** dependencies on any UI framework or design-tool
//! SDK. It is pure orchestration logic that can be embedded anywhere a
//! [`host::DocumentHost`] implementation exists.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]

pub mod catalog;
pub mod config;
pub mod decisions;
pub mod engine;
pub mod error;
pub mod events;
pub mod export;
pub mod geometry;
pub mod guidance;
pub mod host;
pub mod messages;
pub mod metadata;
pub mod preview;
pub mod transport;
pub mod workflow;

// Re-exports for convenience
pub use catalog::ResolutionPreset;
pub use config::{default_config_path, load_config, load_config_from_path, ConfigError, EngineConfig};
pub use decisions::DecisionRouter;
pub use engine::{ActiveOperations, Engine, OperationKind, OperationToken};
pub use error::EngineError;
pub use events::{PartialSlideAction, UiEvent};
pub use export::ExportPipeline;
pub use geometry::{CompatibilityReport, SlideGeometry};
pub use guidance::{GuidanceLayerManager, GuidanceSuppression};
pub use host::{DocumentHost, HostError, MemoryHost, NodeId, NodeKind, Paint, Rect};
pub use messages::{EngineMessage, NotifyLevel, SlidePayload};
pub use metadata::{CarouselMetadataStore, CarouselTags};
pub use preview::PreviewPipeline;
pub use workflow::{ConversionOutcome, ConversionWorkflow, WorkflowState};
