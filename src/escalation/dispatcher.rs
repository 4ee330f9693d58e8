//! Fire-and-forget escalation delivery on a dedicated worker thread

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{error, info, warn};

use super::{EscalationSink, Evidence};
use crate::error::SentinelError;

enum DispatchCommand {
    Deliver(Evidence),
    Shutdown,
}

#[derive(Debug, Default)]
struct Counters {
    queued: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
}

/// Delivery counters, readable while the worker runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    pub queued: u64,
    pub delivered: u64,
    pub failed: u64,
}

impl DispatchStats {
    pub fn pending(&self) -> u64 {
        self.queued.saturating_sub(self.delivered + self.failed)
    }
}

/// Queues escalations for a sink without blocking the caller
pub struct EscalationDispatcher {
    command_tx: mpsc::Sender<DispatchCommand>,
    counters: Arc<Counters>,
    worker: Option<JoinHandle<()>>,
}

impl EscalationDispatcher {
    pub fn spawn<S: EscalationSink>(sink: S) -> Result<Self, SentinelError> {
        let (command_tx, command_rx) = mpsc::channel::<DispatchCommand>();
        let counters = Arc::new(Counters::default());
        let worker_counters = Arc::clone(&counters);

        let worker = thread::Builder::new()
            .name("sentinel-escalation".into())
            .spawn(move || {
                while let Ok(command) = command_rx.recv() {
                    match command {
                        DispatchCommand::Deliver(evidence) => {
                            match sink.capture_and_notify(&evidence) {
                                Ok(()) => {
                                    worker_counters.delivered.fetch_add(1, Ordering::SeqCst);
                                    info!(
                                        session_id = %evidence.session_id,
                                        run_index = evidence.run_index,
                                        "escalation delivered"
                                    );
                                }
                                Err(err) => {
                                    worker_counters.failed.fetch_add(1, Ordering::SeqCst);
                                    warn!(
                                        session_id = %evidence.session_id,
                                        run_index = evidence.run_index,
                                        "escalation delivery failed: {}",
                                        err
                                    );
                                }
                            }
                        }
                        DispatchCommand::Shutdown => break,
                    }
                }
            })?;

        Ok(Self {
            command_tx,
            counters,
            worker: Some(worker),
        })
    }

    /// Enqueue evidence for delivery. Returns false if the worker is gone.
    pub fn dispatch(&self, evidence: Evidence) -> bool {
        self.counters.queued.fetch_add(1, Ordering::SeqCst);
        if self.command_tx.send(DispatchCommand::Deliver(evidence)).is_err() {
            self.counters.failed.fetch_add(1, Ordering::SeqCst);
            error!("escalation worker is not running, evidence dropped");
            return false;
        }
        true
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            queued: self.counters.queued.load(Ordering::SeqCst),
            delivered: self.counters.delivered.load(Ordering::SeqCst),
            failed: self.counters.failed.load(Ordering::SeqCst),
        }
    }

    /// Deliver everything already queued, then stop the worker
    pub fn shutdown(mut self) -> DispatchStats {
        self.stop_worker();
        self.stats()
    }

    fn stop_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = self.command_tx.send(DispatchCommand::Shutdown);
            if worker.join().is_err() {
                error!("escalation worker panicked");
            }
        }
    }
}

impl Drop for EscalationDispatcher {
    fn drop(&mut self) {
        self.stop_worker();
    }
}
