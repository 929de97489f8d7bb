// file: src/pipeline/readiness.rs
// description: service readiness gate backed by a tokio watch channel

use tokio::sync::watch;

/// Lifecycle state of the pipeline as a whole. Requests should not be
/// accepted until the gate reports `Ready`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadinessState {
    NotStarted,
    InProgress,
    Ready,
    Failed(String),
}

impl ReadinessState {
    pub fn is_ready(&self) -> bool {
        matches!(self, ReadinessState::Ready)
    }
}

/// Broadcasts readiness transitions to any number of observers.
#[derive(Debug)]
pub struct ReadinessGate {
    tx: watch::Sender<ReadinessState>,
}

impl ReadinessGate {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ReadinessState::NotStarted);
        ReadinessGate { tx }
    }

    pub fn state(&self) -> ReadinessState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ReadinessState> {
        self.tx.subscribe()
    }

    pub fn begin(&self) {
        let _ = self.tx.send(ReadinessState::InProgress);
    }

    pub fn mark_ready(&self) {
        let _ = self.tx.send(ReadinessState::Ready);
    }

    pub fn mark_failed(&self, reason: impl Into<String>) {
        let _ = self.tx.send(ReadinessState::Failed(reason.into()));
    }

    /// Waits until the gate leaves the starting states. Returns `Ok` on
    /// `Ready` and the failure reason otherwise.
    pub async fn wait_ready(&self) -> Result<(), String> {
        let mut rx = self.tx.subscribe();
        loop {
            match &*rx.borrow_and_update() {
                ReadinessState::Ready => return Ok(()),
                ReadinessState::Failed(reason) => return Err(reason.clone()),
                _ => {}
            }
            if rx.changed().await.is_err() {
                return Err("readiness gate dropped".to_string());
            }
        }
    }
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_gate_starts_not_started() {
        let gate = ReadinessGate::new();
        assert_eq!(gate.state(), ReadinessState::NotStarted);
        assert!(!gate.state().is_ready());
    }

    #[tokio::test]
    async fn test_wait_ready_observes_transition() {
        let gate = std::sync::Arc::new(ReadinessGate::new());
        gate.begin();

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.wait_ready().await })
        };
        gate.mark_ready();

        assert!(waiter.await.unwrap().is_ok());
        assert!(gate.state().is_ready());
    }

    #[tokio::test]
    async fn test_wait_ready_surfaces_failure() {
        let gate = ReadinessGate::new();
        gate.begin();
        gate.mark_failed("snapshot corrupt");

        let err = gate.wait_ready().await.unwrap_err();
        assert_eq!(err, "snapshot corrupt");
    }
}
