//! Orchestration driver
//!
//! Sequences an execution request end to end: derive the account address,
//! build the call bundle, assemble the intent, submit it to the execution
//! network and track it to a terminal settlement status. Validation errors
//! abort before any network call is attempted.
//!
//! Intents are independent units of work: each tracks on its own task with
//! no cross-intent locking, sharing only the network client behind an `Arc`.
//! No ordering guarantee exists between distinct intents, even from the
//! same account.

use crate::account::OwnerSet;
use crate::bundle::{self, RawAction, TokenRequirement};
use crate::config::Settings;
use crate::error::{EngineError, EngineResult};
use crate::intent::{ExecutionHandle, Intent, SettlementStatus};
use crate::orchestrator::ExecutionNetwork;
use crate::tracker::{SettlementTracker, TrackingPolicy};

use alloy_primitives::Address;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Terminal outcome of a driven execution
#[derive(Debug, Clone, Serialize)]
pub struct SettlementOutcome {
    pub handle: ExecutionHandle,
    pub account: Address,
    pub status: SettlementStatus,
}

/// In-flight intent record backing the status API.
///
/// Ephemeral by design: records live only as long as the process; the
/// handle is returned to callers so tracking can be re-established out of
/// band after a restart.
#[derive(Debug, Clone, Serialize)]
pub struct IntentRecord {
    pub handle: ExecutionHandle,
    pub account: Address,
    pub source_chain: u64,
    pub target_chain: u64,
    pub status: SettlementStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Cross-chain intent execution engine
pub struct IntentEngine {
    network: Arc<dyn ExecutionNetwork>,
    settings: Settings,
    factory: Address,
    /// In-flight and recently settled intents, keyed by handle
    registry: DashMap<String, IntentRecord>,
}

impl IntentEngine {
    /// Create a new engine over an execution network client
    pub fn new(network: Arc<dyn ExecutionNetwork>, settings: Settings) -> EngineResult<Self> {
        let factory = settings
            .account
            .factory_address
            .parse::<Address>()
            .map_err(|e| EngineError::Config(format!("bad factory address: {}", e)))?;

        Ok(Self {
            network,
            settings,
            factory,
            registry: DashMap::new(),
        })
    }

    /// Drive one execution request to a terminal status.
    ///
    /// Build and validation happen before submission; a rejected bundle or
    /// credential set never reaches the network. The returned status is the
    /// single classified result, with `Expired` meaning only that local
    /// tracking was abandoned.
    pub async fn execute(
        &self,
        owners: &OwnerSet,
        source_chain: u64,
        target_chain: u64,
        raw_actions: &[RawAction],
        token_requirements: Vec<TokenRequirement>,
    ) -> EngineResult<SettlementOutcome> {
        let intent = self.prepare(owners, source_chain, target_chain, raw_actions, token_requirements)?;
        let account = intent.account;

        let handle = self.submit(intent).await?;
        let started = Instant::now();

        let tracker = self.tracker();
        let result = tracker.track(&handle).await;

        match &result {
            Ok(status) => {
                self.record_settled(&handle, status.clone());
                crate::metrics::record_settlement(status.label(), started.elapsed().as_secs_f64());
            }
            Err(e) => {
                warn!(%handle, "Tracking aborted: {}", e);
                self.registry.remove(handle.as_str());
            }
        }

        result.map(|status| SettlementOutcome {
            handle,
            account,
            status,
        })
    }

    /// Submit without blocking on settlement: returns the handle once the
    /// network accepts the intent and tracks status transitions on a
    /// background task. Callers observe progress through [`Self::lookup`].
    pub async fn execute_detached(
        self: Arc<Self>,
        owners: &OwnerSet,
        source_chain: u64,
        target_chain: u64,
        raw_actions: &[RawAction],
        token_requirements: Vec<TokenRequirement>,
    ) -> EngineResult<ExecutionHandle> {
        let intent = self.prepare(owners, source_chain, target_chain, raw_actions, token_requirements)?;
        let handle = self.submit(intent).await?;
        let started = Instant::now();

        let mut transitions = self.tracker().watch(handle.clone());
        let engine = self;
        let task_handle = handle.clone();
        tokio::spawn(async move {
            let mut saw_terminal = false;
            while let Some(event) = transitions.recv().await {
                match event {
                    Ok(status) => {
                        let terminal = status.is_terminal();
                        engine.record_settled(&task_handle, status.clone());
                        if terminal {
                            saw_terminal = true;
                            crate::metrics::record_settlement(
                                status.label(),
                                started.elapsed().as_secs_f64(),
                            );
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(handle = %task_handle, "Tracking aborted: {}", e);
                        break;
                    }
                }
            }
            if !saw_terminal {
                // Tracking died without classifying the intent. Drop the
                // record so callers never see a Pending that will not move;
                // the handle stays valid out of band.
                engine.registry.remove(task_handle.as_str());
            }
        });

        Ok(handle)
    }

    /// Assemble a validated intent. No side effects; any error here means
    /// no network call was made.
    fn prepare(
        &self,
        owners: &OwnerSet,
        source_chain: u64,
        target_chain: u64,
        raw_actions: &[RawAction],
        token_requirements: Vec<TokenRequirement>,
    ) -> EngineResult<Intent> {
        self.require_chain(source_chain)?;
        self.require_chain(target_chain)?;

        let account = owners.derive_address(self.factory);
        let calls = bundle::build_bundle(target_chain, raw_actions)?;

        let intent = Intent {
            source_chain,
            target_chain,
            account,
            calls,
            token_requirements,
        };
        Ok(intent)
    }

    async fn submit(&self, intent: Intent) -> EngineResult<ExecutionHandle> {
        let handle = self.network.submit(&intent).await?;
        crate::metrics::record_intent_submitted(intent.source_chain, intent.target_chain);

        let now = Utc::now();
        self.registry.insert(
            handle.as_str().to_string(),
            IntentRecord {
                handle: handle.clone(),
                account: intent.account,
                source_chain: intent.source_chain,
                target_chain: intent.target_chain,
                status: SettlementStatus::Pending,
                created_at: now,
                updated_at: now,
            },
        );

        info!(
            %handle,
            source_chain = intent.source_chain,
            target_chain = intent.target_chain,
            calls = intent.calls.len(),
            requirements = intent.token_requirements.len(),
            account = %intent.account,
            "Intent submitted"
        );
        Ok(handle)
    }

    fn tracker(&self) -> SettlementTracker {
        SettlementTracker::new(
            self.network.clone(),
            TrackingPolicy::from_config(&self.settings.engine),
        )
    }

    fn record_settled(&self, handle: &ExecutionHandle, status: SettlementStatus) {
        if let Some(mut record) = self.registry.get_mut(handle.as_str()) {
            record.status = status;
            record.updated_at = Utc::now();
        }
    }

    /// Evict settled records older than the configured TTL.
    ///
    /// Records in a terminal state are kept for a bounded grace window so
    /// the status API can answer for recently settled intents, then dropped.
    /// Pending records are never evicted here. Returns the eviction count.
    pub fn evict_settled(&self) -> usize {
        let ttl = self.settings.engine.settled_record_ttl_secs as i64;
        let now = Utc::now();
        let before = self.registry.len();
        self.registry.retain(|_, record| {
            !(record.status.is_terminal()
                && now.signed_duration_since(record.updated_at).num_seconds() >= ttl)
        });
        before - self.registry.len()
    }

    fn require_chain(&self, chain_id: u64) -> EngineResult<()> {
        self.settings
            .get_chain_by_id(chain_id)
            .map(|_| ())
            .ok_or(EngineError::ChainNotFound { chain_id })
    }

    /// Counterfactual account address for an owner set under the configured
    /// factory
    pub fn derive_account(&self, owners: &OwnerSet) -> Address {
        owners.derive_address(self.factory)
    }

    /// Look up an in-flight or settled intent by handle
    pub fn lookup(&self, handle: &str) -> Option<IntentRecord> {
        self.registry.get(handle).map(|r| r.clone())
    }

    /// Snapshot of every tracked intent
    pub fn intents(&self) -> Vec<IntentRecord> {
        self.registry.iter().map(|r| r.clone()).collect()
    }

    /// Engine settings (read-only)
    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}
