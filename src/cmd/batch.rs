/*!
batch.rs - compound commands made of several paced sub-calls.

`sell-all` reads the cargo hold once and sells every non-empty line.
Between mutating sub-calls the batch waits out the server's action
interval; it never waits after the last call or after a failed one.
A user interrupt stops the batch at the next sub-call boundary and the
report says how far it got.
*/

use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::api::{ApiError, Body, Session, Transport};

/// Default pause between mutating sub-calls.
pub const DEFAULT_ACTION_INTERVAL: Duration = Duration::from_secs(11);

/* ---- Pacing ---- */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingPolicy {
    pub interval: Duration,
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_ACTION_INTERVAL)
    }
}

impl PacingPolicy {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Pause owed after sub-call `index` (0-based) of `total`.
    pub fn pause_after(&self, index: usize, total: usize, succeeded: bool) -> Option<Duration> {
        if !succeeded || index + 1 >= total || self.interval.is_zero() {
            None
        } else {
            Some(self.interval)
        }
    }
}

/* ---- Report ---- */

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SaleOutcome {
    Sold { earned: Option<i64> },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaleLine {
    pub item_id: String,
    pub quantity: i64,
    #[serde(flatten)]
    pub outcome: SaleOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
    pub credits_earned: i64,
    pub interrupted: bool,
    pub lines: Vec<SaleLine>,
}

/* ---- sell-all ---- */

/// Sell every cargo line with a positive quantity.
///
/// Only the initial `get_cargo` failure is an error; individual sales
/// that fail are recorded in the report and the batch moves on.
pub async fn sell_all<T: Transport>(
    session: &mut Session<T>,
    pacing: &PacingPolicy,
) -> Result<BatchReport, ApiError> {
    let cancel = session.cancel_signal().clone();
    let cargo = session.execute("get_cargo", &Body::new()).await?;
    let items = cargo
        .get("cargo")
        .and_then(Value::as_array)
        .map(|lines| lines.iter().filter_map(cargo_line).collect::<Vec<_>>())
        .unwrap_or_default();

    let mut report = BatchReport {
        total: items.len(),
        ..Default::default()
    };
    if items.is_empty() {
        info!("nothing to sell");
        return Ok(report);
    }

    for (index, (item_id, quantity)) in items.into_iter().enumerate() {
        if cancel.is_cancelled() {
            report.interrupted = true;
            break;
        }

        let mut body = Body::new();
        body.insert("item_id".into(), Value::String(item_id.clone()));
        body.insert("quantity".into(), Value::from(quantity));

        let succeeded = match session.execute("sell", &body).await {
            Ok(env) => {
                let earned = env
                    .get("credits_earned")
                    .or_else(|| env.get("earned"))
                    .and_then(Value::as_i64);
                debug!(item_id = %item_id, quantity, ?earned, "sold");
                report.completed += 1;
                report.credits_earned += earned.unwrap_or(0);
                report.lines.push(SaleLine {
                    item_id,
                    quantity,
                    outcome: SaleOutcome::Sold { earned },
                });
                true
            }
            Err(ApiError::Interrupted) => {
                report.interrupted = true;
                break;
            }
            Err(e) => {
                warn!(item_id = %item_id, error = %e, "sale failed");
                report.failed += 1;
                report.lines.push(SaleLine {
                    item_id,
                    quantity,
                    outcome: SaleOutcome::Failed {
                        error: e.to_string(),
                    },
                });
                false
            }
        };

        if let Some(pause) = pacing.pause_after(index, report.total, succeeded) {
            debug!(secs = pause.as_secs(), "pacing before next sale");
            if !cancel.sleep(pause).await {
                report.interrupted = true;
                break;
            }
        }
    }

    Ok(report)
}

// (item_id, quantity) for a sellable cargo line.
fn cargo_line(line: &Value) -> Option<(String, i64)> {
    let quantity = line.get("quantity").and_then(Value::as_i64).unwrap_or(0);
    if quantity <= 0 {
        return None;
    }
    let id = ["item_id", "name", "id"]
        .iter()
        .find_map(|k| line.get(*k).and_then(Value::as_str))?;
    Some((id.to_string(), quantity))
}
