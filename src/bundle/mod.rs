//! Call bundle builder
//!
//! Translates the loosely-typed transaction descriptors returned by the
//! upstream deposit/action API into the strict `Call` shape, rejecting
//! anything malformed at this boundary so nothing loosely-typed travels
//! deeper into the engine. Pure data assembly, no chain calls.

use crate::config::Settings;
use crate::error::{EngineError, EngineResult};

use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

/// Transaction descriptor as delivered by the upstream collaborator.
///
/// Untrusted input: every field is re-validated before use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawAction {
    /// Destination contract address, 0x-prefixed hex
    pub to: String,
    /// Native value in wei as a decimal string; absent means zero
    #[serde(default)]
    pub value: Option<String>,
    /// Calldata, 0x-prefixed hex
    pub data: String,
}

/// A single target-chain call. Payload bytes are opaque to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Call {
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
}

impl Call {
    pub fn new(to: Address, value: u64, data: Vec<u8>) -> Self {
        Self {
            to,
            value: U256::from(value),
            data: Bytes::from(data),
        }
    }
}

/// A token amount that must be available on the target chain before or as
/// part of bundle execution. Amounts are integers in the token's smallest
/// unit; there is no floating point anywhere in this path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRequirement {
    pub token: Address,
    pub amount: U256,
}

/// Loose wire form of a token requirement: the token may arrive as an
/// address or as a symbol resolved against the chain's token table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTokenRequirement {
    pub token: String,
    /// Amount in the token's smallest unit, as a decimal string
    pub amount: String,
}

/// Build an ordered call bundle from upstream action descriptors.
///
/// Ordering is significant (an approval call typically precedes a deposit
/// call) and is preserved exactly. Any malformed action fails the whole
/// build; no partial bundle is ever returned.
pub fn build_bundle(target_chain: u64, raw_actions: &[RawAction]) -> EngineResult<Vec<Call>> {
    let mut calls = Vec::with_capacity(raw_actions.len());

    for (idx, action) in raw_actions.iter().enumerate() {
        let to = parse_address(&action.to).map_err(|e| {
            EngineError::MalformedAction(format!("action {}: bad destination: {}", idx, e))
        })?;

        let value = match &action.value {
            Some(v) => parse_amount(v).map_err(|e| {
                EngineError::MalformedAction(format!("action {}: bad value: {}", idx, e))
            })?,
            None => U256::ZERO,
        };

        let data = parse_hex_payload(&action.data).map_err(|e| {
            EngineError::MalformedAction(format!("action {}: bad payload: {}", idx, e))
        })?;

        calls.push(Call { to, value, data });
    }

    debug!(
        target_chain,
        count = calls.len(),
        "Built call bundle from upstream actions"
    );
    Ok(calls)
}

/// Resolve and validate token requirements for a target chain.
///
/// Tokens given as symbols are looked up in the chain's configured token
/// table; unknown symbols and malformed amounts are rejected.
pub fn resolve_requirements(
    settings: &Settings,
    target_chain: u64,
    raw: &[RawTokenRequirement],
) -> EngineResult<Vec<TokenRequirement>> {
    let mut requirements = Vec::with_capacity(raw.len());

    for req in raw {
        let token = if req.token.starts_with("0x") {
            parse_address(&req.token)
                .map_err(|e| EngineError::MalformedAction(format!("bad token address: {}", e)))?
        } else {
            let address = settings.token_address(target_chain, &req.token).ok_or(
                EngineError::TokenNotFound {
                    symbol: req.token.clone(),
                    chain_id: target_chain,
                },
            )?;
            parse_address(address)
                .map_err(|e| EngineError::Config(format!("bad configured token address: {}", e)))?
        };

        let amount = parse_amount(&req.amount)
            .map_err(|e| EngineError::MalformedAction(format!("bad token amount: {}", e)))?;

        requirements.push(TokenRequirement { token, amount });
    }

    Ok(requirements)
}

fn parse_address(input: &str) -> Result<Address, String> {
    Address::from_str(input).map_err(|e| format!("{} ({:?})", e, input))
}

/// Parse a non-negative integer amount from a decimal string.
fn parse_amount(input: &str) -> Result<U256, String> {
    let trimmed = input.trim();
    if trimmed.starts_with('-') {
        return Err(format!("negative amount {:?}", trimmed));
    }
    U256::from_str_radix(trimmed, 10).map_err(|e| format!("{} ({:?})", e, trimmed))
}

fn parse_hex_payload(input: &str) -> Result<Bytes, String> {
    let stripped = input.strip_prefix("0x").unwrap_or(input);
    let bytes = hex::decode(stripped).map_err(|e| format!("{} ({:?})", e, input))?;
    Ok(Bytes::from(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    fn well_formed() -> RawAction {
        RawAction {
            to: "0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".into(),
            value: Some("0".into()),
            data: "0x1234".into(),
        }
    }

    #[test]
    fn test_fields_copied_verbatim() {
        let calls = build_bundle(8453, &[well_formed()]).unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].to,
            address!("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa")
        );
        assert_eq!(calls[0].value, U256::ZERO);
        assert_eq!(calls[0].data.as_ref(), &[0x12, 0x34]);
    }

    #[test]
    fn test_ordering_preserved() {
        let actions: Vec<RawAction> = (1..=5u8)
            .map(|i| RawAction {
                to: format!("0x{:040x}", i),
                value: None,
                data: format!("0x{:02x}", i),
            })
            .collect();

        let calls = build_bundle(8453, &actions).unwrap();
        for (i, call) in calls.iter().enumerate() {
            assert_eq!(call.data.as_ref(), &[(i + 1) as u8]);
        }
    }

    #[test]
    fn test_rejects_bad_destination() {
        let mut action = well_formed();
        action.to = "not-an-address".into();
        let err = build_bundle(8453, &[action]).unwrap_err();
        assert!(matches!(err, EngineError::MalformedAction(_)));
    }

    #[test]
    fn test_rejects_negative_value() {
        let mut action = well_formed();
        action.value = Some("-1".into());
        let err = build_bundle(8453, &[action]).unwrap_err();
        assert!(matches!(err, EngineError::MalformedAction(_)));
    }

    #[test]
    fn test_rejects_bad_payload_hex() {
        let mut action = well_formed();
        action.data = "0xzz".into();
        let err = build_bundle(8453, &[action]).unwrap_err();
        assert!(matches!(err, EngineError::MalformedAction(_)));
    }

    #[test]
    fn test_no_partial_bundle_on_failure() {
        let mut bad = well_formed();
        bad.to = "0x123".into(); // wrong length
        let result = build_bundle(8453, &[well_formed(), bad]);
        // The whole build fails; callers never see the valid prefix.
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_value_defaults_to_zero() {
        let mut action = well_formed();
        action.value = None;
        let calls = build_bundle(8453, &[action]).unwrap();
        assert_eq!(calls[0].value, U256::ZERO);
    }

    fn test_settings() -> Settings {
        toml::from_str(
            r#"
            [engine]
            instance_id = "t"
            poll_interval_ms = 1000
            max_wait_secs = 30
            max_query_retries = 5
            retry_backoff_ms = 200
            settled_record_ttl_secs = 3600

            [orchestrator]
            base_url = "http://localhost"
            api_key = "k"
            request_timeout_secs = 5

            [account]
            owner_keys = ["02c6047f9441ed7d6d3045406e95c07cd85c778e4b8cef3ca7abac09b95c709ee5"]
            factory_address = "0x000000000000000000000000000000000000f00d"

            [api]
            host = "127.0.0.1"
            port = 0

            [metrics]
            enabled = false
            port = 0

            [chains.base]
            chain_id = 8453
            name = "Base"
            enabled = true

            [chains.base.tokens]
            USDC = "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_resolve_requirement_by_symbol() {
        let settings = test_settings();
        let raw = vec![RawTokenRequirement {
            token: "USDC".into(),
            amount: "1000000".into(),
        }];
        let reqs = resolve_requirements(&settings, 8453, &raw).unwrap();
        assert_eq!(
            reqs[0].token,
            address!("833589fcd6edb6e08f4c7c32d4f71b54bda02913")
        );
        assert_eq!(reqs[0].amount, U256::from(1_000_000u64));
    }

    #[test]
    fn test_resolve_requirement_unknown_symbol() {
        let settings = test_settings();
        let raw = vec![RawTokenRequirement {
            token: "DAI".into(),
            amount: "1".into(),
        }];
        let err = resolve_requirements(&settings, 8453, &raw).unwrap_err();
        assert!(matches!(err, EngineError::TokenNotFound { .. }));
    }

    #[test]
    fn test_resolve_requirement_by_address() {
        let settings = test_settings();
        let raw = vec![RawTokenRequirement {
            token: "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913".into(),
            amount: "42".into(),
        }];
        let reqs = resolve_requirements(&settings, 8453, &raw).unwrap();
        assert_eq!(reqs[0].amount, U256::from(42u64));
    }

    #[test]
    fn test_large_amount_parses() {
        assert_eq!(
            parse_amount("1000000").unwrap(),
            U256::from(1_000_000u64)
        );
        // Beyond u64
        assert!(parse_amount("340282366920938463463374607431768211456").is_ok());
    }
}
