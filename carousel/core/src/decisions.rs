//! Decision Router
//!
//! Pending one-shot request/response exchanges between a suspended run and
//! the UI collaborator: the partial-slide decision, the height-resize
//! confirmation, and the current-slide query.
//!
//! A run registers the exchange with an `expect_*` call before sending the
//! request message, then awaits the returned receiver. The dispatcher
//! resolves the matching inbound response with `resolve_*`. At most one
//! exchange of each kind is pending; a new `expect_*` supersedes the old
//! one, whose waiter observes a closed channel and ends its run cleanly.

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::events::PartialSlideAction;

#[derive(Default)]
struct Pending {
    partial_slide: Option<oneshot::Sender<PartialSlideAction>>,
    resize: Option<oneshot::Sender<bool>>,
    current_slide: Option<oneshot::Sender<usize>>,
}

/// Routes inbound decision responses to the run awaiting them.
#[derive(Default)]
pub struct DecisionRouter {
    pending: Mutex<Pending>,
}

impl DecisionRouter {
    /// Create a router with no pending exchanges.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a partial-slide exchange and return its receiver.
    pub fn expect_partial_slide(&self) -> oneshot::Receiver<PartialSlideAction> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().partial_slide = Some(tx);
        rx
    }

    /// Deliver a partial-slide response. Returns false when nothing was
    /// pending or the waiter already went away.
    pub fn resolve_partial_slide(&self, action: PartialSlideAction) -> bool {
        match self.pending.lock().partial_slide.take() {
            Some(tx) => tx.send(action).is_ok(),
            None => false,
        }
    }

    /// Register a height-resize exchange and return its receiver.
    pub fn expect_resize(&self) -> oneshot::Receiver<bool> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().resize = Some(tx);
        rx
    }

    /// Deliver a resize response.
    pub fn resolve_resize(&self, should_resize: bool) -> bool {
        match self.pending.lock().resize.take() {
            Some(tx) => tx.send(should_resize).is_ok(),
            None => false,
        }
    }

    /// Register a current-slide query and return its receiver.
    pub fn expect_current_slide(&self) -> oneshot::Receiver<usize> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().current_slide = Some(tx);
        rx
    }

    /// Deliver a current-slide response.
    pub fn resolve_current_slide(&self, index: usize) -> bool {
        match self.pending.lock().current_slide.take() {
            Some(tx) => tx.send(index).is_ok(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_roundtrip() {
        let router = DecisionRouter::new();
        let rx = router.expect_partial_slide();
        assert!(router.resolve_partial_slide(PartialSlideAction::Expand));
        assert_eq!(rx.await.unwrap(), PartialSlideAction::Expand);
    }

    #[tokio::test]
    async fn test_resolve_without_pending() {
        let router = DecisionRouter::new();
        assert!(!router.resolve_partial_slide(PartialSlideAction::Keep));
        assert!(!router.resolve_resize(true));
        assert!(!router.resolve_current_slide(0));
    }

    #[tokio::test]
    async fn test_superseded_exchange_closes_old_waiter() {
        let router = DecisionRouter::new();
        let old_rx = router.expect_resize();
        let new_rx = router.expect_resize();

        // The superseded waiter sees a closed channel.
        assert!(old_rx.await.is_err());

        assert!(router.resolve_resize(true));
        assert!(new_rx.await.unwrap());
    }

    #[tokio::test]
    async fn test_exchange_kinds_are_independent() {
        let router = DecisionRouter::new();
        let partial_rx = router.expect_partial_slide();
        let slide_rx = router.expect_current_slide();

        assert!(router.resolve_current_slide(7));
        assert_eq!(slide_rx.await.unwrap(), 7);

        assert!(router.resolve_partial_slide(PartialSlideAction::Trim));
        assert_eq!(partial_rx.await.unwrap(), PartialSlideAction::Trim);
    }

    #[tokio::test]
    async fn test_dropped_receiver_reports_undelivered() {
        let router = DecisionRouter::new();
        let rx = router.expect_current_slide();
        drop(rx);
        assert!(!router.resolve_current_slide(3));
    }
}
