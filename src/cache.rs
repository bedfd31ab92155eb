//! Single-slot, short-TTL cache of the last known player/ship state.
//!
//! The session layer writes a [`Snapshot`] whenever a response carries
//! recognisable status fields and clears it after every state-mutating
//! call. Pre-flight checks read it; an empty or stale cache never blocks
//! a call, it only removes the shortcut.
//!
//! Timestamps use `tokio::time::Instant` so tests can drive expiry with a
//! paused clock.

use serde_json::{Map, Value};
use std::time::Duration;
use tokio::time::Instant;

/// Snapshots older than this are ignored.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5);

/// Last-known state captured from a status-bearing response.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub captured_at: Instant,
    /// `None` when the response said nothing about docking.
    pub docked: Option<bool>,
    pub system: Option<String>,
    pub poi: Option<String>,
    pub cargo_used: Option<i64>,
    pub cargo_capacity: Option<i64>,
    pub fuel: Option<i64>,
    pub max_fuel: Option<i64>,
}

impl Snapshot {
    /// Build a snapshot from a response `result` object.
    ///
    /// Looks at the top level and at the nested `player` / `ship` objects.
    /// Returns `None` unless the result yields a dock state or a location,
    /// so generic acknowledgements do not overwrite real state.
    pub fn extract(result: &Map<String, Value>, captured_at: Instant) -> Option<Self> {
        let player = result.get("player").and_then(Value::as_object);
        let ship = result.get("ship").and_then(Value::as_object);
        let scopes: Vec<&Map<String, Value>> = [Some(result), player, ship]
            .into_iter()
            .flatten()
            .collect();

        let docked = dock_state(result, player);
        let system = first_str(&scopes, &["current_system", "system", "system_name"]);
        let poi = first_str(&scopes, &["current_poi", "poi", "poi_name"]);

        if docked.is_none() && system.is_none() && poi.is_none() {
            return None;
        }

        Some(Snapshot {
            captured_at,
            docked,
            system,
            poi,
            cargo_used: first_int(&scopes, &["cargo_used"]),
            cargo_capacity: first_int(&scopes, &["cargo_capacity"]),
            fuel: first_int(&scopes, &["fuel"]),
            max_fuel: first_int(&scopes, &["max_fuel"]),
        })
    }

    /// Free cargo space, when both sides of the subtraction are known.
    pub fn cargo_free(&self) -> Option<i64> {
        Some(self.cargo_capacity? - self.cargo_used?)
    }
}

// Any of `docked`, `is_docked` or a non-empty `player.docked_at_base` means
// docked. `None` when none of the three is present.
fn dock_state(result: &Map<String, Value>, player: Option<&Map<String, Value>>) -> Option<bool> {
    let signals = [
        result.get("docked"),
        result.get("is_docked"),
        player.and_then(|p| p.get("docked_at_base")),
    ];
    signals
        .into_iter()
        .flatten()
        .map(truthy)
        .reduce(|a, b| a || b)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn first_str(scopes: &[&Map<String, Value>], keys: &[&str]) -> Option<String> {
    scopes.iter().find_map(|scope| {
        keys.iter()
            .find_map(|k| scope.get(*k).and_then(Value::as_str))
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

fn first_int(scopes: &[&Map<String, Value>], keys: &[&str]) -> Option<i64> {
    scopes
        .iter()
        .find_map(|scope| keys.iter().find_map(|k| scope.get(*k).and_then(Value::as_i64)))
}

/// One snapshot at a time; `put` replaces, `invalidate` clears.
#[derive(Debug)]
pub struct StateCache {
    slot: Option<Snapshot>,
    ttl: Duration,
}

impl Default for StateCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl StateCache {
    pub fn new(ttl: Duration) -> Self {
        Self { slot: None, ttl }
    }

    /// The stored snapshot, unless absent or older than the TTL.
    pub fn get(&self) -> Option<&Snapshot> {
        let snap = self.slot.as_ref()?;
        if Instant::now().saturating_duration_since(snap.captured_at) > self.ttl {
            return None;
        }
        Some(snap)
    }

    pub fn put(&mut self, snapshot: Snapshot) {
        tracing::trace!(docked = ?snapshot.docked, "state cache refreshed");
        self.slot = Some(snapshot);
    }

    pub fn invalidate(&mut self) {
        if self.slot.take().is_some() {
            tracing::trace!("state cache invalidated");
        }
    }
}
