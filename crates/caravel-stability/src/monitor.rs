//! Stabilization monitor
//!
//! Polls a patched resource until its kind's readiness condition holds, the
//! per-kind timeout elapses, or a terminal failure is reported. The loop is
//! cancellable: cancellation wins immediately, without another poll.

use std::sync::Arc;
use std::time::Duration;

use caravel_cluster::{ClusterError, ClusterTransport};
use caravel_types::{Manifest, TargetIdentity};
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::StabilityConfig;
use crate::error::Result;
use crate::readiness::{readiness_check, StabilityExpectations};

/// Terminal outcome of one stabilization watch.
#[derive(Debug, Clone, PartialEq)]
pub enum StabilizationOutcome {
    /// Readiness condition held
    Stable,

    /// Deadline elapsed before readiness was observed
    TimedOut,

    /// Terminal failure, or caller cancellation when `cancelled` is set
    Failed { reason: String, cancelled: bool },
}

impl StabilizationOutcome {
    pub fn is_stable(&self) -> bool {
        matches!(self, StabilizationOutcome::Stable)
    }
}

/// What the monitor observed before reaching a terminal state.
#[derive(Debug, Clone)]
pub struct StabilizationReport {
    pub outcome: StabilizationOutcome,

    /// Completed readiness polls
    pub polls: u32,

    /// Wall-clock time spent watching
    pub elapsed: Duration,

    /// Last manifest fetched, if any poll succeeded
    pub last_manifest: Option<Manifest>,
}

/// Events emitted by the monitor.
#[derive(Debug, Clone)]
pub enum StabilityEvent {
    /// Polling started for a target.
    PollingStarted { target: TargetIdentity },

    /// One readiness poll completed.
    PollCompleted {
        target: TargetIdentity,
        attempt: u32,
        ready: bool,
    },

    /// Target reached its readiness condition.
    BecameStable { target: TargetIdentity },

    /// Deadline elapsed.
    TimedOut { target: TargetIdentity },

    /// Kind-specific terminal failure observed.
    TerminalFailure {
        target: TargetIdentity,
        reason: String,
    },

    /// Watch cancelled by the caller.
    Cancelled { target: TargetIdentity },
}

/// Polls resources until they stabilize.
pub struct StabilityMonitor {
    transport: Arc<dyn ClusterTransport>,
    config: StabilityConfig,
    event_tx: broadcast::Sender<StabilityEvent>,
}

impl StabilityMonitor {
    pub fn new(transport: Arc<dyn ClusterTransport>, config: StabilityConfig) -> Self {
        let (event_tx, _) = broadcast::channel(1024);
        Self {
            transport,
            config,
            event_tx,
        }
    }

    /// Subscribe to monitor events.
    pub fn subscribe(&self) -> broadcast::Receiver<StabilityEvent> {
        self.event_tx.subscribe()
    }

    /// The policy table in effect.
    pub fn config(&self) -> &StabilityConfig {
        &self.config
    }

    /// Watch a target until it stabilizes, times out, fails, or the caller
    /// cancels.
    #[instrument(skip(self, expectations, cancel), fields(target = %identity))]
    pub async fn await_stable(
        &self,
        identity: &TargetIdentity,
        expectations: StabilityExpectations,
        cancel: CancellationToken,
    ) -> Result<StabilizationReport> {
        let policy = self.config.policy_for(&identity.kind).clone();
        let check = readiness_check(&identity.kind);
        let started = Instant::now();
        let deadline = started + policy.timeout;
        let mut polls = 0u32;
        let mut last_manifest: Option<Manifest> = None;

        debug!(
            check = check.name(),
            poll_interval_ms = policy.poll_interval.as_millis() as u64,
            timeout_ms = policy.timeout.as_millis() as u64,
            "Watching target for stability"
        );
        self.emit(StabilityEvent::PollingStarted {
            target: identity.clone(),
        });

        loop {
            if cancel.is_cancelled() {
                return Ok(self.cancelled(identity, polls, started, last_manifest));
            }

            match self.transport.get_status(identity).await {
                Ok(manifest) => {
                    polls += 1;

                    if let Some(reason) = check.terminal_failure(&manifest) {
                        warn!(reason = %reason, "Target reported terminal failure");
                        self.emit(StabilityEvent::TerminalFailure {
                            target: identity.clone(),
                            reason: reason.clone(),
                        });
                        return Ok(report(
                            StabilizationOutcome::Failed {
                                reason,
                                cancelled: false,
                            },
                            polls,
                            started,
                            Some(manifest),
                        ));
                    }

                    let ready = check.is_ready(&manifest, &expectations);
                    self.emit(StabilityEvent::PollCompleted {
                        target: identity.clone(),
                        attempt: polls,
                        ready,
                    });
                    last_manifest = Some(manifest);

                    if ready {
                        info!(polls = polls, "Target is stable");
                        self.emit(StabilityEvent::BecameStable {
                            target: identity.clone(),
                        });
                        return Ok(report(
                            StabilizationOutcome::Stable,
                            polls,
                            started,
                            last_manifest,
                        ));
                    }
                }
                Err(ClusterError::TargetNotFound(_)) => {
                    let reason = "target disappeared during stabilization".to_string();
                    self.emit(StabilityEvent::TerminalFailure {
                        target: identity.clone(),
                        reason: reason.clone(),
                    });
                    return Ok(report(
                        StabilizationOutcome::Failed {
                            reason,
                            cancelled: false,
                        },
                        polls,
                        started,
                        last_manifest,
                    ));
                }
                Err(e) if e.is_retryable() => {
                    warn!(error = %e, "Status fetch failed, will retry");
                }
                Err(e) => return Err(e.into()),
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let wake = std::cmp::min(now + policy.poll_interval, deadline);
            tokio::select! {
                _ = cancel.cancelled() => {
                    return Ok(self.cancelled(identity, polls, started, last_manifest));
                }
                _ = tokio::time::sleep_until(wake) => {}
            }
            if Instant::now() >= deadline {
                break;
            }
        }

        warn!(polls = polls, "Stabilization deadline elapsed");
        self.emit(StabilityEvent::TimedOut {
            target: identity.clone(),
        });
        Ok(report(
            StabilizationOutcome::TimedOut,
            polls,
            started,
            last_manifest,
        ))
    }

    fn cancelled(
        &self,
        identity: &TargetIdentity,
        polls: u32,
        started: Instant,
        last_manifest: Option<Manifest>,
    ) -> StabilizationReport {
        info!("Stabilization watch cancelled");
        self.emit(StabilityEvent::Cancelled {
            target: identity.clone(),
        });
        report(
            StabilizationOutcome::Failed {
                reason: "operation cancelled".to_string(),
                cancelled: true,
            },
            polls,
            started,
            last_manifest,
        )
    }

    fn emit(&self, event: StabilityEvent) {
        let _ = self.event_tx.send(event);
    }
}

fn report(
    outcome: StabilizationOutcome,
    polls: u32,
    started: Instant,
    last_manifest: Option<Manifest>,
) -> StabilizationReport {
    StabilizationReport {
        outcome,
        polls,
        elapsed: started.elapsed(),
        last_manifest,
    }
}
