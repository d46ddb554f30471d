//! Cancellation and per-call timeouts for capability calls.
//!
//! Every external call in a turn goes through `CallGuard::call`, which races
//! the call against the turn's `TurnCancel` and the per-call timeout. A
//! cancelled call never lets the orchestrator move on to the next stage.

use clinic_shared::{DeskError, Stage};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Cancellation handle for one turn.
///
/// Clone it, hand one copy to the orchestrator and keep the other to call
/// `cancel()` from anywhere (signal handler, client disconnect, ...).
#[derive(Clone, Debug)]
pub struct TurnCancel {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl TurnCancel {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once `cancel()` has been called
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // Sender is held by self, so this only happens during teardown
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for TurnCancel {
    fn default() -> Self {
        Self::new()
    }
}

/// Wraps capability futures with cancellation and a timeout
#[derive(Clone, Debug)]
pub struct CallGuard {
    cancel: TurnCancel,
    call_timeout: Duration,
}

impl CallGuard {
    pub fn new(cancel: TurnCancel, call_timeout: Duration) -> Self {
        Self {
            cancel,
            call_timeout,
        }
    }

    /// Fail fast if the turn was cancelled between stages
    pub fn check(&self, stage: Stage) -> Result<(), DeskError> {
        if self.cancel.is_cancelled() {
            return Err(DeskError::Cancelled { stage });
        }
        Ok(())
    }

    /// Run one capability call on behalf of `stage`
    pub async fn call<T, F>(&self, stage: Stage, fut: F) -> Result<T, DeskError>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        self.check(stage)?;

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(DeskError::Cancelled { stage }),
            res = tokio::time::timeout(self.call_timeout, fut) => match res {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => Err(DeskError::upstream(stage, e)),
                Err(_) => Err(DeskError::CallTimeout {
                    stage,
                    secs: self.call_timeout.as_secs(),
                }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard(cancel: &TurnCancel, ms: u64) -> CallGuard {
        CallGuard::new(cancel.clone(), Duration::from_millis(ms))
    }

    #[tokio::test]
    async fn test_call_passes_value_through() {
        let cancel = TurnCancel::new();
        let value = guard(&cancel, 1000)
            .call(Stage::Route, async { Ok::<_, anyhow::Error>(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_call_wraps_upstream_error() {
        let cancel = TurnCancel::new();
        let err = guard(&cancel, 1000)
            .call(Stage::Retrieve, async {
                Err::<(), _>(anyhow::anyhow!("index offline"))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DeskError::Upstream { stage: Stage::Retrieve, .. }));
    }

    #[tokio::test]
    async fn test_call_times_out() {
        let cancel = TurnCancel::new();
        let err = guard(&cancel, 20)
            .call(Stage::Generate, async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, anyhow::Error>(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DeskError::CallTimeout { stage: Stage::Generate, .. }));
    }

    #[tokio::test]
    async fn test_cancel_before_call() {
        let cancel = TurnCancel::new();
        cancel.cancel();
        let err = guard(&cancel, 1000)
            .call(Stage::Verify, async { Ok::<_, anyhow::Error>(()) })
            .await
            .unwrap_err();
        assert!(matches!(err, DeskError::Cancelled { stage: Stage::Verify }));
    }

    #[tokio::test]
    async fn test_cancel_during_call() {
        let cancel = TurnCancel::new();
        let g = guard(&cancel, 10_000);
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = g
            .call(Stage::Generate, async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, anyhow::Error>(())
            })
            .await
            .unwrap_err();
        assert!(err.is_cancellation());
    }
}
