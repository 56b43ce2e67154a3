//! Settlement tracking
//!
//! Polls the execution network for the status of a submitted intent until a
//! terminal state is reached or the local wait bound elapses. The wait bound
//! only stops local observation: an `Expired` result means tracking was
//! abandoned, not that execution was aborted, and it never retracts the
//! intent from the network.

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::intent::{ExecutionHandle, SettlementStatus};
use crate::orchestrator::ExecutionNetwork;

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, info, warn};

/// Tracking policy: how long to wait, how often to poll, and how many
/// consecutive transient query faults to tolerate.
#[derive(Debug, Clone)]
pub struct TrackingPolicy {
    pub poll_interval: Duration,
    pub max_wait: Duration,
    pub max_query_retries: u32,
    pub retry_backoff: Duration,
}

impl TrackingPolicy {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            max_wait: config.max_wait(),
            max_query_retries: config.max_query_retries,
            retry_backoff: config.retry_backoff(),
        }
    }
}

/// Tracks submitted intents to a terminal settlement status
pub struct SettlementTracker {
    network: Arc<dyn ExecutionNetwork>,
    policy: TrackingPolicy,
}

impl SettlementTracker {
    pub fn new(network: Arc<dyn ExecutionNetwork>, policy: TrackingPolicy) -> Self {
        Self { network, policy }
    }

    /// Block until the intent reaches a terminal status or the wait bound
    /// elapses.
    ///
    /// Transient query faults are retried with doubling backoff up to the
    /// policy budget; exhausting the budget escalates to
    /// `TrackingBudgetExhausted`, which is distinct from a network-reported
    /// `Failed` settlement.
    pub async fn track(&self, handle: &ExecutionHandle) -> EngineResult<SettlementStatus> {
        let deadline = Instant::now() + self.policy.max_wait;
        let mut consecutive_failures: u32 = 0;

        loop {
            match self.network.status(handle).await {
                Ok(status) => {
                    consecutive_failures = 0;

                    if status.is_terminal() {
                        info!(%handle, status = %status, "Intent settled");
                        return Ok(status);
                    }
                    debug!(%handle, "Intent still pending");
                }
                Err(e @ EngineError::TrackingQuery { .. }) => {
                    consecutive_failures += 1;
                    if consecutive_failures > self.policy.max_query_retries {
                        warn!(%handle, attempts = consecutive_failures, "Tracking retry budget exhausted");
                        return Err(EngineError::TrackingBudgetExhausted {
                            handle: handle.to_string(),
                            attempts: consecutive_failures,
                        });
                    }

                    crate::metrics::record_tracking_retry();
                    let backoff = self
                        .policy
                        .retry_backoff
                        .saturating_mul(1u32 << (consecutive_failures - 1).min(8));
                    warn!(%handle, attempt = consecutive_failures, ?backoff, "Transient tracking fault: {}", e);
                    sleep(backoff).await;
                    // Backoff slept already; fall through to the deadline
                    // check instead of adding a full poll interval on top.
                    if Instant::now() >= deadline {
                        info!(%handle, "Wait bound elapsed, abandoning tracking");
                        return Ok(SettlementStatus::Expired);
                    }
                    continue;
                }
                Err(e) => return Err(e),
            }

            if Instant::now() + self.policy.poll_interval > deadline {
                // Next poll would land past the deadline; wait out the
                // remainder so Expired surfaces at max_wait, not before.
                let remaining = deadline.saturating_duration_since(Instant::now());
                if !remaining.is_zero() {
                    sleep(remaining).await;
                }
                info!(%handle, "Wait bound elapsed, abandoning tracking");
                return Ok(SettlementStatus::Expired);
            }

            sleep(self.policy.poll_interval).await;
        }
    }

    /// Non-blocking variant: spawn a tracking task and receive each observed
    /// status transition as it happens.
    ///
    /// The channel yields every distinct status and always ends with either
    /// a terminal status (Expired included) or an `Err` carrying the
    /// escalation (`TrackingBudgetExhausted` or a fatal query fault), so a
    /// closed channel never means "still pending". Dropping the receiver
    /// cancels local observation only.
    pub fn watch(&self, handle: ExecutionHandle) -> mpsc::Receiver<EngineResult<SettlementStatus>> {
        let (tx, rx) = mpsc::channel(8);
        let network = self.network.clone();
        let policy = self.policy.clone();

        tokio::spawn(async move {
            let tracker = SettlementTracker { network, policy };
            let deadline = Instant::now() + tracker.policy.max_wait;
            let mut last_reported: Option<SettlementStatus> = None;
            let mut consecutive_failures: u32 = 0;

            loop {
                match tracker.network.status(&handle).await {
                    Ok(status) => {
                        consecutive_failures = 0;
                        let terminal = status.is_terminal();

                        if last_reported.as_ref() != Some(&status) {
                            last_reported = Some(status.clone());
                            if tx.send(Ok(status)).await.is_err() {
                                // Receiver dropped: stop observing. The
                                // submitted intent is unaffected.
                                return;
                            }
                        }
                        if terminal {
                            return;
                        }
                    }
                    Err(e @ EngineError::TrackingQuery { .. }) => {
                        consecutive_failures += 1;
                        if consecutive_failures > tracker.policy.max_query_retries {
                            warn!(%handle, attempts = consecutive_failures, "Tracking retry budget exhausted");
                            let _ = tx
                                .send(Err(EngineError::TrackingBudgetExhausted {
                                    handle: handle.to_string(),
                                    attempts: consecutive_failures,
                                }))
                                .await;
                            return;
                        }

                        crate::metrics::record_tracking_retry();
                        let backoff = tracker
                            .policy
                            .retry_backoff
                            .saturating_mul(1u32 << (consecutive_failures - 1).min(8));
                        warn!(%handle, attempt = consecutive_failures, ?backoff, "Transient tracking fault: {}", e);
                        sleep(backoff).await;
                        if Instant::now() >= deadline {
                            info!(%handle, "Wait bound elapsed, abandoning tracking");
                            let _ = tx.send(Ok(SettlementStatus::Expired)).await;
                            return;
                        }
                        continue;
                    }
                    Err(e) => {
                        warn!(%handle, "Fatal tracking error, closing watch: {}", e);
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                }

                if Instant::now() + tracker.policy.poll_interval > deadline {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if !remaining.is_zero() {
                        sleep(remaining).await;
                    }
                    let _ = tx.send(Ok(SettlementStatus::Expired)).await;
                    return;
                }

                sleep(tracker.policy.poll_interval).await;
            }
        });

        rx
    }
}
