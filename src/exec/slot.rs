// src/exec/slot.rs

//! The single in-flight execution.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::engine::CancelSignal;
use crate::errors::{DataChefError, Result};

/// Snapshot of the slot, as reported by `status()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStatusReport {
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipe_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
}

/// Handle for the execution currently holding the slot.
///
/// `cancel` is taken when a cancellation is requested, so a second
/// request finds nothing to signal.
struct ActiveExecution {
    pipe_id: String,
    execution_id: String,
    started_at: DateTime<Utc>,
    cancel: Option<oneshot::Sender<()>>,
}

/// Admits at most one execution at a time.
#[derive(Clone, Default)]
pub struct ExecutionSlot {
    active: Arc<Mutex<Option<ActiveExecution>>>,
}

impl std::fmt::Debug for ExecutionSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionSlot")
            .field("status", &self.status())
            .finish()
    }
}

impl ExecutionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<ActiveExecution>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim the slot. Fails with `ExecutionBusy` if something else holds it.
    ///
    /// The slot is released when the returned guard drops.
    pub fn try_acquire(&self, pipe_id: &str, execution_id: &str) -> Result<(SlotGuard, CancelSignal)> {
        let mut active = self.lock();
        if let Some(current) = active.as_ref() {
            return Err(DataChefError::ExecutionBusy {
                pipe_id: current.pipe_id.clone(),
            });
        }

        let (cancel_tx, signal) = CancelSignal::pair();
        *active = Some(ActiveExecution {
            pipe_id: pipe_id.to_string(),
            execution_id: execution_id.to_string(),
            started_at: Utc::now(),
            cancel: Some(cancel_tx),
        });
        debug!(pipe_id, execution_id, "execution slot acquired");

        Ok((
            SlotGuard {
                slot: self.clone(),
                execution_id: execution_id.to_string(),
            },
            signal,
        ))
    }

    pub fn status(&self) -> ExecutionStatusReport {
        match self.lock().as_ref() {
            Some(active) => ExecutionStatusReport {
                running: true,
                pipe_id: Some(active.pipe_id.clone()),
                execution_id: Some(active.execution_id.clone()),
                started_at: Some(active.started_at),
            },
            None => ExecutionStatusReport {
                running: false,
                pipe_id: None,
                execution_id: None,
                started_at: None,
            },
        }
    }

    /// Signal the active execution to stop and clear the slot.
    ///
    /// Returns `false` when nothing was running.
    pub fn cancel(&self) -> bool {
        let Some(mut active) = self.lock().take() else {
            return false;
        };

        if let Some(tx) = active.cancel.take() {
            let _ = tx.send(());
        }
        info!(
            pipe_id = %active.pipe_id,
            execution_id = %active.execution_id,
            "execution cancelled"
        );
        true
    }
}

/// Releases the slot on drop, unless it was already cleared (or re-claimed
/// by a newer execution) in the meantime.
pub struct SlotGuard {
    slot: ExecutionSlot,
    execution_id: String,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        let mut active = self.slot.lock();
        if active
            .as_ref()
            .is_some_and(|a| a.execution_id == self.execution_id)
        {
            *active = None;
            debug!(execution_id = %self.execution_id, "execution slot released");
        }
    }
}
