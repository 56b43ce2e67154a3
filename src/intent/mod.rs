//! Intent data model and settlement state machine
//!
//! An intent aggregates the target-chain call bundle with its funding source
//! and token requirements. Once submitted to the execution network it is
//! immutable; the only thing that moves afterwards is its settlement status.

use crate::bundle::{Call, TokenRequirement};

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A declarative cross-chain execution request.
///
/// The calls execute atomically relative to each other on the target chain;
/// funding may be bridged from the source chain by the execution network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub source_chain: u64,
    pub target_chain: u64,
    /// Counterfactual account the calls execute from
    pub account: Address,
    /// Ordered call sequence; order is preserved through submission
    pub calls: Vec<Call>,
    /// Token amounts that must be available on the target chain
    pub token_requirements: Vec<TokenRequirement>,
}

/// Opaque correlation id issued by the execution network on submission.
///
/// Used solely to correlate status queries with a submitted intent; held in
/// memory for the duration of tracking and discarded on a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionHandle(pub String);

impl ExecutionHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExecutionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Settlement state of a submitted intent.
///
/// `Pending` is the only non-terminal state. `Expired` is a local decision
/// (tracking abandoned after the wait bound), not a network-reported
/// outcome; the underlying intent may still complete later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SettlementStatus {
    Pending,
    Filled {
        /// Settlement/transaction reference for audit; never empty
        receipt: String,
    },
    Failed {
        /// Failure detail reported by the execution network; never empty
        reason: String,
    },
    Expired,
}

impl SettlementStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SettlementStatus::Pending)
    }

    /// Short label for logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            SettlementStatus::Pending => "pending",
            SettlementStatus::Filled { .. } => "filled",
            SettlementStatus::Failed { .. } => "failed",
            SettlementStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for SettlementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
