use serde::Serialize;
use std::fmt;
use tokio::sync::watch;

/// Where an indexing run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexerState {
    Idle,
    Scanning,
    Diffing,
    Embedding,
    Committing,
    Failed,
}

impl IndexerState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Scanning => "scanning",
            Self::Diffing => "diffing",
            Self::Embedding => "embedding",
            Self::Committing => "committing",
            Self::Failed => "failed",
        }
    }

    /// A new run may only begin from a resting state
    pub const fn can_start(self) -> bool {
        matches!(self, Self::Idle | Self::Failed)
    }

    pub const fn is_busy(self) -> bool {
        !self.can_start()
    }
}

impl fmt::Display for IndexerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Publishes transitions to any number of observers
#[derive(Debug)]
pub(crate) struct StateTracker {
    tx: watch::Sender<IndexerState>,
}

impl StateTracker {
    pub(crate) fn new() -> Self {
        let (tx, _) = watch::channel(IndexerState::Idle);
        Self { tx }
    }

    pub(crate) fn set(&self, next: IndexerState) {
        let prev = self.tx.send_replace(next);
        if prev != next {
            log::debug!("Indexer state {prev} -> {next}");
        }
    }

    pub(crate) fn current(&self) -> IndexerState {
        *self.tx.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<IndexerState> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_start_only_from_resting_states() {
        assert!(IndexerState::Idle.can_start());
        assert!(IndexerState::Failed.can_start());
        for busy in [
            IndexerState::Scanning,
            IndexerState::Diffing,
            IndexerState::Embedding,
            IndexerState::Committing,
        ] {
            assert!(busy.is_busy(), "{busy}");
        }
    }

    #[test]
    fn tracker_publishes_without_subscribers() {
        let tracker = StateTracker::new();
        tracker.set(IndexerState::Scanning);
        assert_eq!(tracker.current(), IndexerState::Scanning);

        let mut rx = tracker.subscribe();
        tracker.set(IndexerState::Failed);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), IndexerState::Failed);
    }
}
