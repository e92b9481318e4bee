//! Error Taxonomy
//!
//! Typed failures for every operation the engine runs. Policy: per-node
//! failures are swallowed where they occur (a corrupt node never aborts a
//! scan), per-slide export failures degrade that slide only, and
//! workflow-step failures surface as user notices through
//! [`EngineError::user_notice`] without rolling back committed state.

use thiserror::Error;

use crate::host::{HostError, NodeId};
use crate::messages::NotifyLevel;

/// Failures surfaced by workflows and pipelines.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The current selection cannot be operated on (wrong count or kind).
    #[error("invalid selection: {0}")]
    InvalidSelection(String),

    /// A resolution key with no catalog entry. Defensive; a well-formed UI
    /// never sends one.
    #[error("unknown resolution preset '{0}'")]
    InvalidPreset(String),

    /// The target node disappeared mid-operation and stayed unreadable
    /// after recovery.
    #[error("node {0} vanished mid-operation")]
    EntityVanished(NodeId),

    /// The target node no longer exists; identity lookup failed. Terminal
    /// for the current run.
    #[error("lost reference to node {0}")]
    LostReference(NodeId),

    /// A tag read or write failed. Callers degrade gracefully.
    #[error("metadata access failed on node {node}: {reason}")]
    MetadataAccess {
        /// Node whose tags were being accessed.
        node: NodeId,
        /// Underlying reason.
        reason: String,
    },

    /// The selected frame carries no carousel tags.
    #[error("selected frame is not a carousel")]
    NotACarousel,

    /// One slide failed to export. Never aborts the batch.
    #[error("export of slide {index} failed: {reason}")]
    ExportFailure {
        /// Zero-based slide index.
        index: usize,
        /// Underlying reason.
        reason: String,
    },

    /// A decision exchange closed before a response arrived (UI gone or
    /// the request superseded).
    #[error("decision exchange closed before a response arrived")]
    DecisionAbandoned,

    /// A bounded decision wait expired.
    #[error("timed out waiting for a decision response")]
    DecisionTimeout,

    /// Host document call failed.
    #[error(transparent)]
    Host(#[from] HostError),
}

impl EngineError {
    /// User-facing notice text for this failure.
    #[must_use]
    pub fn user_notice(&self) -> String {
        match self {
            Self::InvalidSelection(reason) => format!("Select a single frame first ({reason})."),
            Self::InvalidPreset(key) => format!("Unknown resolution preset '{key}'."),
            Self::EntityVanished(_) | Self::LostReference(_) => {
                "The frame was deleted while the operation was running.".to_string()
            }
            Self::MetadataAccess { .. } => {
                "Frame metadata could not be updated; some features may be degraded.".to_string()
            }
            Self::NotACarousel => {
                "The selected frame is not a carousel yet. Run convert first.".to_string()
            }
            Self::ExportFailure { index, .. } => format!("Slide {} failed to export.", index + 1),
            Self::DecisionAbandoned => "The operation was cancelled.".to_string(),
            Self::DecisionTimeout => {
                "No response arrived in time; the operation was cancelled.".to_string()
            }
            Self::Host(e) => format!("The design tool reported an error: {e}."),
        }
    }

    /// Notice severity for this failure.
    #[must_use]
    pub fn notify_level(&self) -> NotifyLevel {
        match self {
            Self::InvalidSelection(_)
            | Self::NotACarousel
            | Self::MetadataAccess { .. }
            | Self::DecisionAbandoned
            | Self::DecisionTimeout => NotifyLevel::Warning,
            Self::InvalidPreset(_)
            | Self::EntityVanished(_)
            | Self::LostReference(_)
            | Self::ExportFailure { .. }
            | Self::Host(_) => NotifyLevel::Error,
        }
    }
}
