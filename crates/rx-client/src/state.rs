//! Coordinator state and snapshot publication

use tokio::sync::watch;

use rx_core::SessionView;

/// The coordinator's owned state.
///
/// The current value lives inside a watch channel so every mutation is
/// published to subscribers as a fresh [`SessionView`]. Observers only ever
/// see complete snapshots.
#[derive(Debug)]
pub struct ClientState {
    tx: watch::Sender<SessionView>,
}

impl ClientState {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionView::default());
        Self { tx }
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> SessionView {
        self.tx.borrow().clone()
    }

    /// Receiver notified after every change
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.tx.subscribe()
    }

    /// Read the current state without copying it
    pub fn read<R>(&self, f: impl FnOnce(&SessionView) -> R) -> R {
        f(&self.tx.borrow())
    }

    /// Mutate the state, notifying subscribers only if something changed
    pub fn update<R>(&self, f: impl FnOnce(&mut SessionView) -> R) -> R {
        let mut view = self.snapshot();
        let result = f(&mut view);
        if *self.tx.borrow() != view {
            self.tx.send_replace(view);
        }
        result
    }
}

impl Default for ClientState {
    fn default() -> Self {
        Self::new()
    }
}
