//! Static call policy: retry/backoff schedule, which endpoints mutate
//! state, and which ones need a particular dock state.

use serde_json::Value;
use std::time::Duration;

use super::envelope::Body;
use super::error::ApiError;
use crate::cache::Snapshot;

/// Bounded retry schedule for transient failures plus the ceiling under
/// which a server-suggested rate-limit wait is honoured automatically.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// One entry per extra attempt: `[1s, 2s]` means up to two retries.
    pub backoff: Vec<Duration>,
    pub rate_limit_ceiling: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            backoff: vec![Duration::from_secs(1), Duration::from_secs(2)],
            rate_limit_ceiling: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    #[cfg(test)]
    pub fn max_retries(&self) -> u32 {
        self.backoff.len() as u32
    }

    /// Delay before retry number `retry` (0-based), if the budget allows.
    pub fn delay_before(&self, retry: u32) -> Option<Duration> {
        self.backoff.get(retry as usize).copied()
    }

    /// Whether a suggested wait is short enough to sleep through.
    pub fn should_wait(&self, wait_seconds: u64) -> bool {
        Duration::from_secs(wait_seconds) <= self.rate_limit_ceiling
    }
}

/// Endpoints whose success changes player/ship state; the state cache is
/// cleared after each of them.
const MUTATING: &[&str] = &[
    "dock",
    "undock",
    "travel",
    "jump",
    "mine",
    "buy",
    "sell",
    "refuel",
    "repair",
    "craft",
    "jettison",
    "loot_wreck",
    "salvage_wreck",
    "buy_ship",
    "sell_ship",
    "switch_ship",
    "install_mod",
    "uninstall_mod",
    "deposit_items",
    "withdraw_items",
    "deposit_credits",
    "withdraw_credits",
    "send_gift",
    "use_item",
    "attack",
    "self_destruct",
    "buy_insurance",
    "claim_insurance",
    "trade_accept",
    "create_buy_order",
    "create_sell_order",
    "accept_mission",
    "complete_mission",
];

pub fn is_mutating(endpoint: &str) -> bool {
    MUTATING.contains(&endpoint)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DockRequirement {
    Docked,
    Undocked,
}

impl DockRequirement {
    fn violation(self, endpoint: &str) -> ApiError {
        match self {
            DockRequirement::Docked => ApiError::PreconditionFailed {
                reason: format!("You must dock first ('{endpoint}' needs a station)"),
                hint: "Hint: sm dock".into(),
            },
            DockRequirement::Undocked => ApiError::PreconditionFailed {
                reason: format!("You must undock first ('{endpoint}' is not possible while docked)"),
                hint: "Hint: sm undock".into(),
            },
        }
    }
}

pub fn dock_requirement(endpoint: &str) -> Option<DockRequirement> {
    match endpoint {
        "repair" | "refuel" | "undock" | "buy" | "sell" | "buy_ship" | "sell_ship"
        | "deposit_items" | "withdraw_items" | "deposit_credits" | "withdraw_credits"
        | "view_storage" | "create_buy_order" | "create_sell_order" | "estimate_purchase"
        | "buy_insurance" | "claim_insurance" => Some(DockRequirement::Docked),
        "dock" | "travel" | "jump" | "mine" => Some(DockRequirement::Undocked),
        _ => None,
    }
}

/// Check a fresh snapshot against the endpoint's requirements.
///
/// Only contradictions known from the snapshot fail; unknown fields pass.
pub fn preflight(endpoint: &str, body: &Body, snapshot: &Snapshot) -> Result<(), ApiError> {
    if let (Some(req), Some(docked)) = (dock_requirement(endpoint), snapshot.docked) {
        let satisfied = match req {
            DockRequirement::Docked => docked,
            DockRequirement::Undocked => !docked,
        };
        if !satisfied {
            return Err(req.violation(endpoint));
        }
    }

    if endpoint == "buy"
        && let Some(wanted) = body.get("quantity").and_then(Value::as_i64)
        && let Some(free) = snapshot.cargo_free()
        && free < wanted
    {
        return Err(ApiError::PreconditionFailed {
            reason: format!("Not enough cargo space (need {wanted}, have {free})"),
            hint: "Hint: sm sell-all or sm jettison <item_id> <quantity>".into(),
        });
    }

    Ok(())
}
